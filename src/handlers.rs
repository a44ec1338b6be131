// src/handlers.rs
use crate::{
    AppState,
    errors::AppError,
    models::*,
    session::{SessionId, persist},
};
use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, HttpResponseBuilder, http::header, web};
use bytes::BytesMut;
use chrono::Utc;
use futures_util::TryStreamExt;
use log::{error, info, warn};
use serde_json::{Value, json};

const IMAGE_FIELD: &str = "image";

struct UploadedImage {
    filename: String,
    data: Vec<u8>,
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// 200 response builder that also hands out a freshly minted session cookie.
fn ok_with_session(session: &SessionId) -> HttpResponseBuilder {
    let mut builder = HttpResponse::Ok();
    if let Some(cookie) = session.cookie() {
        builder.cookie(cookie);
    }
    builder
}

async fn render(req: &HttpRequest, data: &AppState, template: &str) -> Result<HttpResponse, AppError> {
    let file = NamedFile::open_async(data.settings.template_dir.join(template)).await?;
    Ok(file.into_response(req))
}

pub async fn index(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    if !data.config_store.is_configured() {
        return Ok(redirect("/setup"));
    }
    render(&req, &data, "index.html").await
}

pub async fn setup_form(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if data.config_store.is_configured() {
        return Ok(redirect("/"));
    }
    render(&req, &data, "setup.html").await
}

pub async fn setup_submit(
    body: web::Bytes,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let value = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) if !map.is_empty() => Value::Object(map),
        _ => return Err(AppError::Validation("No JSON data provided".to_string())),
    };
    let request: SetupRequest = serde_json::from_value(value)
        .map_err(|e| AppError::Validation(format!("Invalid setup data: {}", e)))?;

    let settings = crate::services::secure_config::validate_setup(&request)?;

    data.config_store.save(&settings).map_err(|e| {
        error!("Setup error: {}", e);
        e
    })?;
    info!("Configuration saved successfully");

    // New settings replace whatever agent was running.
    data.agents.reset().await;
    if data.agents.ensure(&data.config_store).await.is_none() {
        warn!("Configuration saved but the agent could not be initialized yet");
    }

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration saved"
    })))
}

fn parse_query(body: &[u8]) -> Result<String, AppError> {
    let missing = || AppError::Validation("Missing 'query' in request body".to_string());
    let request: ChatQuery = serde_json::from_slice(body).map_err(|_| missing())?;
    let query = request.query.ok_or_else(missing)?;
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("Empty query".to_string()));
    }
    Ok(query.to_string())
}

pub async fn chat(
    req: HttpRequest,
    body: web::Bytes,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !data.config_store.is_configured() {
        return Err(AppError::NotConfigured);
    }
    let handle = data
        .agents
        .ensure(&data.config_store)
        .await
        .ok_or(AppError::AgentUnavailable)?;

    let query = parse_query(&body)?;
    let intent = data.intent_router.route(&query);

    let session = SessionId::from_request(&req);
    let mut state = data.sessions.load_or_new(&session.id).await?;
    info!("Chat query - Session: {}, Intent: {}", session.id, intent.name());

    let settings = &handle.settings;
    let request = ChatRequest {
        query: query.clone(),
        session_id: session.id.to_string(),
        intent: intent.name().to_string(),
        history: if settings.enable_memory {
            state.history.iter().cloned().collect()
        } else {
            Vec::new()
        },
        poster_context: state.poster_context().cloned(),
    };

    let reply = handle.agent.chat(&request).await.map_err(|e| {
        error!(
            "Agent error - Session: {}, Query: {}, Error: {}",
            session.id, query, e
        );
        e
    })?;

    info!(
        "Chat response - Session: {}, Tools: {:?}, Latency: {}ms",
        session.id, reply.tools_used, reply.latency_ms
    );

    if settings.enable_memory {
        state.record_turn(
            ChatTurn {
                query,
                answer: reply.answer.clone(),
                intent: intent.name().to_string(),
                timestamp: Utc::now(),
            },
            settings.memory_max_turns,
        );
    }
    if let Some(quiz) = &reply.quiz_data {
        state.record_quiz(quiz.clone());
    }
    persist(data.sessions.as_ref(), &state).await?;

    Ok(ok_with_session(&session).json(&reply))
}

async fn read_image_field(
    payload: &mut Multipart,
    max_bytes: usize,
) -> Result<UploadedImage, AppError> {
    let mut upload = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {}", e)))?
    {
        let content_disposition = field.content_disposition();
        let is_image = content_disposition.get_name() == Some(IMAGE_FIELD);
        let filename = content_disposition
            .get_filename()
            .map(|f| f.trim().to_string())
            .unwrap_or_default();

        // Drain every field so the payload is fully consumed.
        let mut buf = BytesMut::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {}", e)))?
        {
            if !is_image {
                continue;
            }
            if buf.len() + chunk.len() > max_bytes {
                return Err(AppError::Validation(format!(
                    "Image exceeds the maximum upload size of {} bytes",
                    max_bytes
                )));
            }
            buf.extend_from_slice(&chunk);
        }

        if is_image && upload.is_none() {
            upload = Some(UploadedImage {
                filename,
                data: buf.to_vec(),
            });
        }
    }

    let upload = upload.ok_or_else(|| {
        AppError::Validation(format!("Missing '{}' file in form data", IMAGE_FIELD))
    })?;
    if upload.filename.is_empty() {
        return Err(AppError::Validation("Empty file".to_string()));
    }
    Ok(upload)
}

pub async fn poster(
    req: HttpRequest,
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !data.config_store.is_configured() {
        return Err(AppError::NotConfigured);
    }
    let handle = data
        .agents
        .ensure(&data.config_store)
        .await
        .ok_or(AppError::AgentUnavailable)?;

    let upload = read_image_field(&mut payload, data.settings.max_upload_bytes).await?;
    let orchestrator = handle.orchestrator.as_ref().ok_or_else(|| {
        AppError::Validation("Poster analysis is disabled: vision is turned off".to_string())
    })?;
    let image = data.image_processor.prepare_poster(&upload.data).map_err(|e| {
        warn!("Rejected poster upload {}: {}", upload.filename, e);
        e
    })?;

    let session = SessionId::from_request(&req);
    let mut state = data.sessions.load_or_new(&session.id).await?;

    // A new upload always replaces the current poster, even if analysis fails.
    state.poster_state = None;
    persist(data.sessions.as_ref(), &state).await?;
    info!("Cleared previous poster_state - Session: {}", session.id);

    info!(
        "Analyzing poster - Session: {}, File: {}, Bytes: {}",
        session.id,
        upload.filename,
        image.len()
    );
    let analysis = orchestrator.analyze(&image).await.map_err(|e| {
        error!(
            "Orchestration error during poster analysis - Session: {}, Error: {}",
            session.id, e
        );
        e
    })?;

    state.set_poster(analysis.to_state());
    persist(data.sessions.as_ref(), &state).await?;
    info!(
        "Stored poster_state in session - Session: {}, Title: {}, Mood: {}, Confidence: {}",
        session.id,
        analysis.title.as_deref().unwrap_or("None"),
        analysis.mood,
        analysis.confidence
    );

    Ok(ok_with_session(&session).json(json!({
        "title": analysis.title,
        "caption": analysis.caption,
        "mood": analysis.mood,
        "confidence": analysis.confidence,
        "inferred_genres": analysis.inferred_genres,
    })))
}

pub async fn reset_config(data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    data.config_store.delete().map_err(|e| {
        error!("Error resetting config: {}", e);
        e
    })?;
    data.agents.reset().await;
    info!("Configuration reset");

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration reset"
    })))
}

pub async fn clear_poster(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let session = SessionId::from_request(&req);

    if let Some(handle) = data.agents.current().await {
        if let Err(e) = handle.agent.clear_memory(&session.id.to_string()).await {
            warn!(
                "Agent failed to clear memory - Session: {}, Error: {}",
                session.id, e
            );
        }
    }

    let mut state = data.sessions.load_or_new(&session.id).await?;
    state.clear_poster();
    persist(data.sessions.as_ref(), &state).await?;
    info!("Cleared poster_state - Session: {}", session.id);

    Ok(ok_with_session(&session).json(json!({
        "status": "success",
        "message": "Poster state cleared"
    })))
}
