// src/session.rs
use crate::errors::AppError;
use crate::models::{ChatTurn, PosterState};
use actix_web::HttpRequest;
use actix_web::cookie::{Cookie, SameSite};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";
pub const POSTER_HISTORY_LIMIT: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizProgress {
    pub active: bool,
    pub questions_seen: u32,
    pub last_quiz: Option<Value>,
}

/// Everything the web layer remembers about one browser session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub history: VecDeque<ChatTurn>,
    pub quiz: QuizProgress,
    pub poster_state: Option<PosterState>,
    pub poster_history: VecDeque<PosterState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(session_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            history: VecDeque::new(),
            quiz: QuizProgress::default(),
            poster_state: None,
            poster_history: VecDeque::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_turn(&mut self, turn: ChatTurn, max_turns: usize) {
        self.history.push_back(turn);
        while self.history.len() > max_turns {
            self.history.pop_front();
        }
        self.touch();
    }

    pub fn record_quiz(&mut self, quiz_data: Value) {
        self.quiz.active = true;
        self.quiz.questions_seen += 1;
        self.quiz.last_quiz = Some(quiz_data);
        self.touch();
    }

    pub fn set_poster(&mut self, state: PosterState) {
        self.poster_history.push_back(state.clone());
        while self.poster_history.len() > POSTER_HISTORY_LIMIT {
            self.poster_history.pop_front();
        }
        self.poster_state = Some(state);
        self.touch();
    }

    pub fn clear_poster(&mut self) {
        self.poster_state = None;
        self.poster_history.clear();
        self.touch();
    }

    pub fn poster_context(&self) -> Option<&PosterState> {
        self.poster_state.as_ref()
    }

    /// Nothing worth persisting: no turns, quiz or poster.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
            && self.quiz == QuizProgress::default()
            && self.poster_state.is_none()
            && self.poster_history.is_empty()
    }

    fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        (now - self.updated_at)
            .to_std()
            .map(|idle| idle > ttl)
            .unwrap_or(false)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &Uuid) -> Result<Option<SessionState>, AppError>;
    async fn save(&self, state: &SessionState) -> Result<(), AppError>;
    async fn remove(&self, id: &Uuid) -> Result<(), AppError>;

    /// Loads the session, starting a fresh one under the same id if unknown.
    async fn load_or_new(&self, id: &Uuid) -> Result<SessionState, AppError> {
        Ok(self
            .load(id)
            .await?
            .unwrap_or_else(|| SessionState::new(*id)))
    }
}

/// Process-local store. Sessions disappear on restart and expire after
/// `ttl` without updates.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, SessionState>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &Uuid) -> Result<Option<SessionState>, AppError> {
        let state = self.sessions.read().await.get(id).cloned();
        match state {
            Some(state) if state.is_expired(self.ttl, Utc::now()) => {
                self.remove(id).await?;
                Ok(None)
            }
            state => Ok(state),
        }
    }

    async fn save(&self, state: &SessionState) -> Result<(), AppError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| !s.is_expired(self.ttl, now));
        sessions.insert(state.session_id, state.clone());
        Ok(())
    }

    async fn remove(&self, id: &Uuid) -> Result<(), AppError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}

/// Persists the session, or drops it once there is nothing left to keep.
pub async fn persist(store: &dyn SessionStore, state: &SessionState) -> Result<(), AppError> {
    if state.is_empty() {
        store.remove(&state.session_id).await
    } else {
        store.save(state).await
    }
}

/// Session id carried by the request cookie, or a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId {
    pub id: Uuid,
    pub is_new: bool,
}

impl SessionId {
    pub fn from_request(req: &HttpRequest) -> Self {
        match req
            .cookie(SESSION_COOKIE)
            .and_then(|c| Uuid::parse_str(c.value()).ok())
        {
            Some(id) => Self { id, is_new: false },
            None => Self {
                id: Uuid::new_v4(),
                is_new: true,
            },
        }
    }

    /// Cookie to attach to the response, only when the id was just minted.
    pub fn cookie(&self) -> Option<Cookie<'static>> {
        self.is_new.then(|| {
            Cookie::build(SESSION_COOKIE, self.id.to_string())
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .finish()
        })
    }
}
