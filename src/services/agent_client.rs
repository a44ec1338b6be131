// src/services/agent_client.rs
use crate::errors::AppError;
use crate::models::{AgentInitRequest, ChatReply, ChatRequest, MovieHit};
use crate::tools::{MovieAgent, RetrieverTool};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<MovieHit>,
}

/// HTTP client for the external movie agent service.
pub struct AgentClient {
    base_url: String,
    client: Client,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Hands the agent its model and key configuration.
    pub async fn initialize(&self, init: &AgentInitRequest) -> Result<(), AppError> {
        let response = self
            .client
            .post(format!("{}/initialize", self.base_url))
            .json(init)
            .send()
            .await
            .map_err(|e| AppError::Agent(format!("Initialize request failed: {}", e)))?;

        check_status(response, "initialize").await?;
        Ok(())
    }
}

async fn check_status(response: Response, call: &str) -> Result<Response, AppError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    Err(AppError::Agent(format!(
        "{} failed ({}): {}",
        call, status, error_text
    )))
}

#[async_trait]
impl MovieAgent for AgentClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, AppError> {
        let response = self
            .client
            .post(format!("{}/chat", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Agent(format!("Chat request failed: {}", e)))?;

        check_status(response, "chat")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Agent(format!("Failed to parse chat response: {}", e)))
    }

    async fn clear_memory(&self, session_id: &str) -> Result<(), AppError> {
        let response = self
            .client
            .delete(format!("{}/sessions/{}/memory", self.base_url, session_id))
            .send()
            .await
            .map_err(|e| AppError::Agent(format!("Clear memory request failed: {}", e)))?;

        check_status(response, "clear_memory").await?;
        Ok(())
    }
}

#[async_trait]
impl RetrieverTool for AgentClient {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<MovieHit>, AppError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&json!({ "query": query, "k": k }))
            .send()
            .await
            .map_err(|e| AppError::Agent(format!("Search request failed: {}", e)))?;

        let body: SearchResponse = check_status(response, "search")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Agent(format!("Failed to parse search response: {}", e)))?;

        Ok(body.results)
    }

    fn name(&self) -> &str {
        "movie_search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentSettings, LlmProvider};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_request() -> ChatRequest {
        ChatRequest {
            query: "something like Alien".to_string(),
            session_id: "abc".to_string(),
            intent: "RECOMMENDATION".to_string(),
            history: Vec::new(),
            poster_context: None,
        }
    }

    #[tokio::test]
    async fn chat_posts_request_and_parses_reply() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_partial_json(json!({
                "query": "something like Alien",
                "session_id": "abc",
                "intent": "RECOMMENDATION"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "Try Event Horizon.",
                "movies": [{"title": "Event Horizon"}],
                "tools_used": ["movie_search"],
                "llm_latency_ms": 800,
                "tool_latency_ms": 40,
                "latency_ms": 840.5,
                "reasoning_type": "react",
                "quiz_data": {"question": "Who directed it?"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = AgentClient::new(mock_server.uri(), Client::new());
        let reply = client.chat(&chat_request()).await.unwrap();
        assert_eq!(reply.answer, "Try Event Horizon.");
        assert_eq!(reply.tools_used, vec!["movie_search"]);
        assert_eq!(reply.latency_ms, 840.5);
        assert_eq!(reply.llm_latency_ms, 800.0);
        assert!(reply.quiz_data.is_some());
        assert!(reply.resolution_metadata.is_none());
    }

    #[tokio::test]
    async fn chat_error_status_becomes_agent_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(502).set_body_string("llm down"))
            .mount(&mock_server)
            .await;

        let client = AgentClient::new(mock_server.uri(), Client::new());
        let err = client.chat(&chat_request()).await.unwrap_err();
        assert!(matches!(err, AppError::Agent(ref m) if m.contains("llm down")));
    }

    #[tokio::test]
    async fn search_returns_hits() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({ "query": "dark spaceship", "k": 3 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"title": "Alien", "year": 1979.0, "genres": ["Horror"], "score": 0.91},
                    {"title": "Sunshine", "year": 2007, "score": 0.55},
                    {"title": "Untitled", "year": null, "score": 0.2}
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = AgentClient::new(mock_server.uri(), Client::new());
        let hits = client.search("dark spaceship", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Alien");
        assert_eq!(hits[0].year, Some(1979));
        assert_eq!(hits[1].year, Some(2007));
        assert!(hits[1].genres.is_empty());
        assert_eq!(hits[2].year, None);
    }

    #[tokio::test]
    async fn clear_memory_uses_session_path() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/sessions/abc/memory"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = AgentClient::new(mock_server.uri(), Client::new());
        client.clear_memory("abc").await.unwrap();
    }

    #[tokio::test]
    async fn initialize_sends_selected_keys() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/initialize"))
            .and(body_partial_json(json!({
                "llm_provider": "groq",
                "llm_api_key": "gsk_x",
                "embedding_api_key": "sk-y",
                "warmup_on_start": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ready"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let settings = AgentSettings {
            llm_provider: LlmProvider::Groq,
            llm_model: "llama-3.1-8b-instant".to_string(),
            groq_api_key: Some("gsk_x".to_string()),
            openai_api_key: "sk-y".to_string(),
            openai_llm_api_key: None,
            enable_vision: true,
            enable_memory: true,
            memory_max_turns: 10,
            faiss_index_path: None,
        };
        let client = AgentClient::new(mock_server.uri(), Client::new());
        client
            .initialize(&AgentInitRequest::from(&settings))
            .await
            .unwrap();
    }
}
