// src/agent.rs
use crate::errors::AppError;
use crate::models::{AgentInitRequest, AgentSettings};
use crate::orchestration::PosterOrchestrator;
use crate::services::{AgentClient, OpenAiVision, SecureConfigStore};
use crate::tools::MovieAgent;
use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A ready-to-use agent plus the poster pipeline built from the same settings.
pub struct AgentHandle {
    pub agent: Arc<dyn MovieAgent>,
    /// `None` when vision is disabled in the settings.
    pub orchestrator: Option<PosterOrchestrator>,
    pub settings: AgentSettings,
}

#[async_trait]
pub trait AgentBuilder: Send + Sync {
    async fn build(&self, settings: &AgentSettings) -> Result<AgentHandle, AppError>;
}

/// Builds agents that talk to the external movie agent service over HTTP
/// and caption posters with OpenAI vision.
pub struct HttpAgentBuilder {
    agent_service_url: String,
    openai_base_url: String,
    vision_model: String,
    search_k: usize,
    client: Client,
}

impl HttpAgentBuilder {
    pub fn new(
        agent_service_url: String,
        openai_base_url: String,
        vision_model: String,
        search_k: usize,
        client: Client,
    ) -> Self {
        Self {
            agent_service_url,
            openai_base_url,
            vision_model,
            search_k,
            client,
        }
    }
}

#[async_trait]
impl AgentBuilder for HttpAgentBuilder {
    async fn build(&self, settings: &AgentSettings) -> Result<AgentHandle, AppError> {
        let client = Arc::new(AgentClient::new(
            self.agent_service_url.clone(),
            self.client.clone(),
        ));
        client.initialize(&AgentInitRequest::from(settings)).await?;

        let orchestrator = settings.enable_vision.then(|| {
            let vision = Arc::new(OpenAiVision::new(
                settings.openai_api_key.clone(),
                self.openai_base_url.clone(),
                self.vision_model.clone(),
                self.client.clone(),
            ));
            PosterOrchestrator::new(vision, client.clone()).with_search_k(self.search_k)
        });

        Ok(AgentHandle {
            agent: client,
            orchestrator,
            settings: settings.clone(),
        })
    }
}

/// Holds the single agent instance, built on first use from the secure
/// config and reused afterwards so service-side context survives.
///
/// `slot` is only locked briefly; builds are serialized on `building` so a
/// slow `/initialize` never blocks readers of the current handle.
pub struct AgentRegistry {
    builder: Arc<dyn AgentBuilder>,
    slot: Mutex<Option<Arc<AgentHandle>>>,
    building: Mutex<()>,
}

impl AgentRegistry {
    pub fn new(builder: Arc<dyn AgentBuilder>) -> Self {
        Self {
            builder,
            slot: Mutex::new(None),
            building: Mutex::new(()),
        }
    }

    pub async fn current(&self) -> Option<Arc<AgentHandle>> {
        self.slot.lock().await.clone()
    }

    /// Returns the agent, building it if needed. Build failures are logged
    /// and reported as `None`.
    pub async fn ensure(&self, config: &SecureConfigStore) -> Option<Arc<AgentHandle>> {
        if let Some(handle) = self.current().await {
            return Some(handle);
        }

        let _building = self.building.lock().await;
        // Another request may have finished a build while we waited.
        if let Some(handle) = self.current().await {
            return Some(handle);
        }

        if !config.is_configured() {
            warn!("Config not initialized. Agent will not be available.");
            return None;
        }

        let settings = match config.load() {
            Ok(Some(settings)) => settings,
            Ok(None) => return None,
            Err(e) => {
                error!("Failed to initialize agent: {}", e);
                return None;
            }
        };

        match self.builder.build(&settings).await {
            Ok(handle) => {
                info!(
                    "Agent initialized successfully (provider: {}, model: {})",
                    settings.llm_provider.as_str(),
                    settings.llm_model
                );
                let handle = Arc::new(handle);
                *self.slot.lock().await = Some(handle.clone());
                Some(handle)
            }
            Err(e) => {
                error!("Failed to initialize agent: {}", e);
                None
            }
        }
    }

    /// Drops the current agent. Waits for an in-flight build so a handle
    /// built from old settings can't land after the reset.
    pub async fn reset(&self) {
        let _building = self.building.lock().await;
        if self.slot.lock().await.take().is_some() {
            info!("Agent released");
        }
    }
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use crate::tools::fakes::{FakeAgent, FakeRetriever, FakeVision, hit};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Hands out fake tools; counts builds and can be told to fail.
    pub struct FakeBuilder {
        pub builds: AtomicUsize,
        pub fail: bool,
        pub agent: Arc<FakeAgent>,
        /// When set, builds wait for a notification before finishing.
        pub gate: Option<Arc<Notify>>,
    }

    impl FakeBuilder {
        pub fn new() -> Self {
            Self {
                builds: AtomicUsize::new(0),
                fail: false,
                agent: Arc::new(FakeAgent::default()),
                gate: None,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        pub fn build_count(&self) -> usize {
            self.builds.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AgentBuilder for FakeBuilder {
        async fn build(&self, settings: &AgentSettings) -> Result<AgentHandle, AppError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(AppError::Agent("connection refused".to_string()));
            }
            let orchestrator = settings.enable_vision.then(|| {
                PosterOrchestrator::new(
                    Arc::new(FakeVision::new(
                        r#"A dark spaceship corridor with the title "Alien""#,
                        &["Sci-Fi"],
                    )),
                    Arc::new(FakeRetriever::with_hits(vec![hit(
                        "Alien",
                        0.9,
                        &["Horror", "Sci-Fi"],
                    )])),
                )
            });
            Ok(AgentHandle {
                agent: self.agent.clone(),
                orchestrator,
                settings: settings.clone(),
            })
        }
    }
}
