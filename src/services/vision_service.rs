// src/services/vision_service.rs
use crate::errors::AppError;
use crate::models::PosterCaption;
use crate::tools::VisionTool;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::debug;
use reqwest::Client;
use serde_json::json;
use std::time::Instant;

const CAPTION_PROMPT: &str = r#"
You are looking at a movie poster. Describe it for a movie search engine.

1. CAPTION: One or two sentences describing what the poster shows: people,
   setting, colors, lighting and any visible title text. Quote any title
   text exactly as printed, in double quotes.

2. GENRES: The film genres the artwork suggests (e.g. Horror, Sci-Fi,
   Romance, Comedy, Action, Drama).

3. VISIBLE TEXT: The most prominent text printed on the poster, if any.

Return as JSON matching this structure:
{
    "caption": "...",
    "genres": ["..."],
    "visible_text": "..." or null
}
"#;

/// Inline `data:` URL with the MIME type sniffed from the image bytes.
fn data_url(image: &[u8]) -> String {
    let mime = image::guess_format(image)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/png");
    format!(
        "data:{};base64,{}",
        mime,
        general_purpose::STANDARD.encode(image)
    )
}

/// Vision captioning through an OpenAI-compatible chat completions API.
pub struct OpenAiVision {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

impl OpenAiVision {
    pub fn new(api_key: String, base_url: String, model: String, client: Client) -> Self {
        Self {
            api_key,
            base_url,
            model,
            client,
        }
    }

    fn parse_caption(&self, content: &str) -> Result<PosterCaption, AppError> {
        let data: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| AppError::Vision(format!("Failed to parse caption JSON: {}", e)))?;

        let caption = data["caption"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::Vision("Caption missing from vision response".to_string()))?
            .to_string();

        let genres = data["genres"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|g| g.as_str())
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let visible_text = data["visible_text"]
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(PosterCaption {
            caption,
            genres,
            visible_text,
        })
    }
}

#[async_trait]
impl VisionTool for OpenAiVision {
    async fn describe(&self, image: &[u8]) -> Result<PosterCaption, AppError> {
        let start = Instant::now();

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": [{
                    "role": "user",
                    "content": [
                        {
                            "type": "text",
                            "text": CAPTION_PROMPT
                        },
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": data_url(image)
                            }
                        }
                    ]
                }],
                "max_tokens": 512,
                "response_format": { "type": "json_object" }
            }))
            .send()
            .await
            .map_err(|e| AppError::Vision(format!("OpenAI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Vision(format!(
                "OpenAI error ({}): {}",
                status, error_text
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Vision(format!("Failed to parse OpenAI response: {}", e)))?;

        let content = result["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AppError::Vision("No content in OpenAI response".to_string()))?;

        let caption = self.parse_caption(content)?;
        debug!(
            "Captioned poster with {} in {}ms",
            self.model,
            start.elapsed().as_millis()
        );
        Ok(caption)
    }

    fn name(&self) -> &str {
        "openai_vision"
    }
}
