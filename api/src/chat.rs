use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use palaver_shared::{moderate, ChatMessage, CreateChatMessage};
use serde::Deserialize;
use uuid::Uuid;

use crate::{auth, error::AppError, AppState};

#[derive(Deserialize)]
pub struct ChatListParams {
    limit: Option<i64>,
}

/// GET /api/chat?limit=50 — most recent messages, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Query(params): Query<ChatListParams>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let pool = state.db.clone();
    let limit = params.limit.unwrap_or(50).clamp(1, 200);

    let messages = tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, author_id, author_name, body, created_at
             FROM chat_messages
             ORDER BY created_at DESC
             LIMIT ?1",
        )?;

        let mut rows = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(id, author_id, author_name, body, created_at)| {
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .ok()?
                    .with_timezone(&Utc);
                Some(ChatMessage {
                    id,
                    author_id,
                    author_name,
                    body,
                    created_at,
                })
            })
            .collect::<Vec<_>>();

        rows.reverse();
        Ok::<_, AppError>(rows)
    })
    .await??;

    Ok(Json(messages))
}

/// POST /api/chat — same moderation gate as every other free-text write.
pub async fn create_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateChatMessage>,
) -> Result<Json<ChatMessage>, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;

    let body = ammonia::clean(&payload.body);
    moderate(&body)?;

    let message = ChatMessage {
        id: Uuid::new_v4().to_string(),
        author_id: principal.user_id,
        author_name: principal.name,
        body,
        created_at: Utc::now(),
    };

    let pool = state.db.clone();
    let stored = message.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO chat_messages (id, author_id, author_name, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                stored.id,
                stored.author_id,
                stored.author_name,
                stored.body,
                stored.created_at.to_rfc3339(),
            ],
        )?;
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(Json(message))
}
