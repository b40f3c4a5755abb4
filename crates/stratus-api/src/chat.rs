use axum::{
    Json,
    extract::{Extension, Query, State},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use stratus_assistant::ChatMessage;
use stratus_types::api::{ChatHistoryMessage, ChatReply, ChatRequest, Claims};
use stratus_types::models::{ChatSender, LogLevel};

use crate::activity;
use crate::auth::AppState;
use crate::db_time;
use crate::error::{ApiError, AppJson, blocking};

/// Conversation turns handed to the model per request.
const HISTORY_TURNS: u32 = 10;

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 200;

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }

    let session_id = resolve_session(&state, &claims, req.session_id).await?;

    // Recent turns plus the user's saved location feed the assistant
    let (rows, last_known) = {
        let st = state.clone();
        let sid = session_id.to_string();
        let user_id = claims.sub.to_string();
        blocking(move || -> anyhow::Result<_> {
            let rows = st.db.recent_chat_messages(&sid, HISTORY_TURNS)?;
            let home = st
                .db
                .get_profile(&user_id)?
                .and_then(|p| p.home_location)
                .filter(|city| !city.trim().is_empty());
            let saved = match home {
                Some(city) => Some(city),
                None => st.db.get_location(&user_id)?.and_then(|l| l.label),
            };
            Ok((rows, saved))
        })
        .await??
    };

    let history: Vec<ChatMessage> = rows
        .iter()
        .filter_map(|row| match ChatSender::parse(&row.sender) {
            Some(ChatSender::User) => Some(ChatMessage::user(&row.content)),
            Some(ChatSender::Bot) => Some(ChatMessage::assistant(&row.content)),
            _ => None,
        })
        .collect();

    let reply = state
        .engine
        .respond(&message, &history, last_known.as_deref())
        .await;

    {
        let st = state.clone();
        let sid = session_id.to_string();
        let user_id = claims.sub;
        let message = message.clone();
        let text = reply.text.clone();
        let weather_json = reply
            .weather
            .as_ref()
            .and_then(|w| serde_json::to_string(w).ok());
        let location = reply.location.clone();
        // A fallback with a configured provider means the provider call failed
        let provider_failed = reply.fallback && state.chat.is_configured();
        blocking(move || -> anyhow::Result<()> {
            st.db.insert_chat_message(
                &Uuid::new_v4().to_string(),
                &sid,
                ChatSender::User.as_str(),
                &message,
                None,
                None,
            )?;
            st.db.insert_chat_message(
                &Uuid::new_v4().to_string(),
                &sid,
                ChatSender::Bot.as_str(),
                &text,
                weather_json.as_deref(),
                location.as_deref(),
            )?;
            if provider_failed {
                activity::record_system(
                    &st.db,
                    LogLevel::Warning,
                    "Assistant provider call failed, served a fallback reply",
                    "assistant",
                    Some(user_id),
                    None,
                );
            }
            Ok(())
        })
        .await??;
    }

    let weather_info = reply.weather.as_ref().and_then(|w| serde_json::to_value(w).ok());

    Ok(Json(ChatReply {
        success: true,
        response: reply.text,
        session_id,
        fallback: reply.fallback,
        weather_info,
        location: reply.location,
        model: reply.model,
        usage: reply.usage,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub session_id: Uuid,
    pub limit: Option<u32>,
}

pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session_id = query.session_id;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    let rows = {
        let st = state.clone();
        let sid = session_id.to_string();
        let user_id = claims.sub.to_string();
        blocking(move || -> anyhow::Result<_> {
            let session = st.db.get_chat_session(&sid)?;
            match session {
                Some(s) if s.user_id == user_id => Ok(Some(st.db.get_chat_messages(&sid, limit)?)),
                _ => Ok(None),
            }
        })
        .await??
    }
    .ok_or_else(|| ApiError::NotFound("Chat session not found".into()))?;

    let messages = rows
        .into_iter()
        .map(|row| -> anyhow::Result<ChatHistoryMessage> {
            Ok(ChatHistoryMessage {
                id: row.id.parse()?,
                sender: ChatSender::parse(&row.sender)
                    .ok_or_else(|| anyhow::anyhow!("unknown chat sender: {}", row.sender))?,
                content: row.content,
                location_queried: row.location_queried,
                created_at: db_time(&row.created_at)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(json!({
        "success": true,
        "session_id": session_id,
        "messages": messages,
    })))
}

/// Reuse the caller's session when the id checks out, otherwise start a new
/// one. A session id belonging to another user reads as not found.
async fn resolve_session(
    state: &AppState,
    claims: &Claims,
    requested: Option<Uuid>,
) -> Result<Uuid, ApiError> {
    match requested {
        Some(id) => {
            let st = state.clone();
            let session = blocking(move || st.db.get_chat_session(&id.to_string())).await??;
            match session {
                Some(s) if s.user_id == claims.sub.to_string() => Ok(id),
                _ => Err(ApiError::NotFound("Chat session not found".into())),
            }
        }
        None => {
            let id = Uuid::new_v4();
            let st = state.clone();
            let user_id = claims.sub.to_string();
            blocking(move || st.db.create_chat_session(&id.to_string(), &user_id)).await??;
            Ok(id)
        }
    }
}
