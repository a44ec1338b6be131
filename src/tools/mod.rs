// src/tools/mod.rs
// External tools the poster orchestration and chat flow depend on.
use crate::errors::AppError;
use crate::models::{ChatReply, ChatRequest, MovieHit, PosterCaption};
use async_trait::async_trait;

/// Turns poster bytes into a caption plus genre hints.
#[async_trait]
pub trait VisionTool: Send + Sync {
    async fn describe(&self, image: &[u8]) -> Result<PosterCaption, AppError>;
    fn name(&self) -> &str;
}

/// Semantic movie search.
#[async_trait]
pub trait RetrieverTool: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<MovieHit>, AppError>;
    fn name(&self) -> &str;
}

/// The conversational movie agent.
#[async_trait]
pub trait MovieAgent: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, AppError>;
    async fn clear_memory(&self, session_id: &str) -> Result<(), AppError>;
}

#[cfg(test)]
pub mod fakes {
    //! Scripted tools for exercising handlers and orchestration offline.
    use super::*;
    use std::sync::Mutex;

    pub struct FakeVision {
        pub caption: PosterCaption,
    }

    impl FakeVision {
        pub fn new(caption: &str, genres: &[&str]) -> Self {
            Self {
                caption: PosterCaption {
                    caption: caption.to_string(),
                    genres: genres.iter().map(|g| g.to_string()).collect(),
                    visible_text: None,
                },
            }
        }
    }

    #[async_trait]
    impl VisionTool for FakeVision {
        async fn describe(&self, _image: &[u8]) -> Result<PosterCaption, AppError> {
            Ok(self.caption.clone())
        }

        fn name(&self) -> &str {
            "fake_vision"
        }
    }

    pub struct FailingVision;

    #[async_trait]
    impl VisionTool for FailingVision {
        async fn describe(&self, _image: &[u8]) -> Result<PosterCaption, AppError> {
            Err(AppError::Vision("model offline".to_string()))
        }

        fn name(&self) -> &str {
            "failing_vision"
        }
    }

    #[derive(Default)]
    pub struct FakeRetriever {
        pub hits: Vec<MovieHit>,
        pub fail: bool,
        pub queries: Mutex<Vec<String>>,
    }

    impl FakeRetriever {
        pub fn with_hits(hits: Vec<MovieHit>) -> Self {
            Self {
                hits,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RetrieverTool for FakeRetriever {
        async fn search(&self, query: &str, k: usize) -> Result<Vec<MovieHit>, AppError> {
            self.queries.lock().unwrap().push(query.to_string());
            if self.fail {
                return Err(AppError::Agent("index unavailable".to_string()));
            }
            Ok(self.hits.iter().take(k).cloned().collect())
        }

        fn name(&self) -> &str {
            "fake_retriever"
        }
    }

    #[derive(Default)]
    pub struct FakeAgent {
        pub requests: Mutex<Vec<ChatRequest>>,
        pub cleared: Mutex<Vec<String>>,
        pub quiz_data: Option<serde_json::Value>,
    }

    #[async_trait]
    impl MovieAgent for FakeAgent {
        async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, AppError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(ChatReply {
                answer: format!("You asked: {}", request.query),
                movies: vec![serde_json::json!({"title": "Alien", "year": 1979})],
                tools_used: vec!["movie_search".to_string()],
                llm_latency_ms: 12.0,
                tool_latency_ms: 3.0,
                latency_ms: 15.0,
                reasoning_type: Some("direct".to_string()),
                resolution_metadata: None,
                quiz_data: self.quiz_data.clone(),
            })
        }

        async fn clear_memory(&self, session_id: &str) -> Result<(), AppError> {
            self.cleared.lock().unwrap().push(session_id.to_string());
            Ok(())
        }
    }

    pub fn hit(title: &str, score: f32, genres: &[&str]) -> MovieHit {
        MovieHit {
            title: title.to_string(),
            year: None,
            genres: genres.iter().map(|g| g.to_string()).collect(),
            score,
            overview: None,
        }
    }
}
