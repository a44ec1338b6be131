// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of `POST /chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatQuery {
    pub query: Option<String>,
}

/// Request forwarded to the movie agent service.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub query: String,
    pub session_id: String,
    pub intent: String,
    pub history: Vec<ChatTurn>,
    pub poster_context: Option<PosterState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    #[serde(default)]
    pub movies: Vec<Value>,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub llm_latency_ms: f64,
    #[serde(default)]
    pub tool_latency_ms: f64,
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub reasoning_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub query: String,
    pub answer: String,
    pub intent: String,
    pub timestamp: DateTime<Utc>,
}

/// Last analyzed poster as remembered by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosterState {
    pub title: Option<String>,
    pub mood: String,
    pub confidence: f32,
    pub caption: String,
    pub timestamp: DateTime<Utc>,
}

/// What the vision tool says about an image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PosterCaption {
    pub caption: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub visible_text: Option<String>,
}

/// Accepts `1979` as well as `1979.0`; anything outside the `u16` range
/// is treated as unknown.
fn lenient_year<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let year = Option::<f64>::deserialize(deserializer)?;
    Ok(year
        .filter(|y| y.is_finite() && (1.0..=u16::MAX as f64).contains(y))
        .map(|y| y.round() as u16))
}

/// One semantic search hit from the retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieHit {
    pub title: String,
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<u16>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub score: f32,
    #[serde(default)]
    pub overview: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PosterAnalysis {
    pub title: Option<String>,
    pub caption: String,
    pub mood: String,
    pub confidence: f32,
    pub inferred_genres: Vec<String>,
    pub candidates: Vec<MovieHit>,
}

impl PosterAnalysis {
    pub fn to_state(&self) -> PosterState {
        PosterState {
            title: self.title.clone(),
            mood: self.mood.clone(),
            confidence: self.confidence,
            caption: self.caption.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Body of `POST /setup`. Every field is optional so validation can
/// report the first missing one by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetupRequest {
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_llm_api_key: Option<String>,
    pub enable_vision: Option<bool>,
    pub enable_memory: Option<bool>,
    pub memory_max_turns: Option<usize>,
    pub faiss_index_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Groq,
    OpenAi,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Groq => "groq",
            LlmProvider::OpenAi => "openai",
        }
    }
}

/// Validated agent configuration, persisted encrypted on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    pub llm_provider: LlmProvider,
    pub llm_model: String,
    pub groq_api_key: Option<String>,
    pub openai_api_key: String,
    pub openai_llm_api_key: Option<String>,
    pub enable_vision: bool,
    pub enable_memory: bool,
    pub memory_max_turns: usize,
    pub faiss_index_path: Option<String>,
}

impl AgentSettings {
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";
    pub const DEFAULT_MAX_TURNS: usize = 10;

    /// Key handed to the reasoning model for the configured provider.
    pub fn llm_api_key(&self) -> Option<&str> {
        match self.llm_provider {
            LlmProvider::Groq => self.groq_api_key.as_deref(),
            LlmProvider::OpenAi => self
                .openai_llm_api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .or(Some(self.openai_api_key.as_str())),
        }
    }

    /// Embeddings always go through OpenAI.
    pub fn embedding_api_key(&self) -> &str {
        &self.openai_api_key
    }
}

/// Payload for the agent service's `/initialize`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInitRequest {
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub embedding_api_key: String,
    pub enable_vision: bool,
    pub enable_memory: bool,
    pub memory_max_turns: usize,
    pub faiss_index_path: Option<String>,
    pub warmup_on_start: bool,
    pub verbose: bool,
}

impl From<&AgentSettings> for AgentInitRequest {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            llm_provider: settings.llm_provider.as_str().to_string(),
            llm_model: settings.llm_model.clone(),
            llm_api_key: settings.llm_api_key().map(str::to_string),
            embedding_api_key: settings.embedding_api_key().to_string(),
            enable_vision: settings.enable_vision,
            enable_memory: settings.enable_memory,
            memory_max_turns: settings.memory_max_turns,
            faiss_index_path: settings.faiss_index_path.clone(),
            warmup_on_start: false,
            verbose: true,
        }
    }
}
