use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use palaver_shared::*;
use uuid::Uuid;

use crate::{auth, db, error::AppError, AppState};

/// POST /api/posts/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(payload): Json<CreateComment>,
) -> Result<Json<Comment>, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;

    let body = ammonia::clean(&payload.body);
    moderate(&body)?;

    let pool = state.db.clone();
    let comment = tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut stored = db::fetch_post(&conn, &post_id)?;

        let comment = Comment::new(
            Uuid::new_v4().to_string(),
            principal.user_id,
            principal.name,
            body,
            Utc::now(),
        );
        stored.post.add_comment(comment.clone());
        db::update_post(&conn, &stored.post, stored.rev)?;
        Ok::<_, AppError>(comment)
    })
    .await??;

    Ok(Json(comment))
}

/// POST /api/posts/:id/comments/:cid/replies
pub async fn create_reply(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((post_id, comment_id)): Path<(String, String)>,
    Json(payload): Json<CreateReply>,
) -> Result<Json<Reply>, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;

    let body = ammonia::clean(&payload.body);
    moderate(&body)?;

    let pool = state.db.clone();
    let reply = tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut stored = db::fetch_post(&conn, &post_id)?;

        let reply = Reply::new(
            Uuid::new_v4().to_string(),
            principal.user_id,
            principal.name,
            body,
            Utc::now(),
        );
        // Nesting stops at replies; there is no deeper level to attach to.
        stored
            .post
            .comment_mut(&comment_id)
            .ok_or(AppError::NotFound("comment"))?
            .replies
            .push(reply.clone());
        db::update_post(&conn, &stored.post, stored.rev)?;
        Ok::<_, AppError>(reply)
    })
    .await??;

    Ok(Json(reply))
}

/// PATCH /api/posts/:id/content/:content_id — edit a comment or reply.
pub async fn edit_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((post_id, content_id)): Path<(String, String)>,
    Json(payload): Json<EditContent>,
) -> Result<StatusCode, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;
    let is_admin = state.authorizer.is_admin(&principal);

    let body = ammonia::clean(&payload.body);
    moderate(&body)?;

    let pool = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut stored = db::fetch_post(&conn, &post_id)?;
        stored
            .post
            .edit_content(&content_id, &principal.user_id, is_admin, body, Utc::now())?;
        db::update_post(&conn, &stored.post, stored.rev)?;
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/posts/:id/content/:content_id — a comment goes down with its
/// replies; a reply goes alone.
pub async fn delete_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((post_id, content_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;
    let is_admin = state.authorizer.is_admin(&principal);

    let pool = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut stored = db::fetch_post(&conn, &post_id)?;
        stored
            .post
            .delete_content(&content_id, &principal.user_id, is_admin)?;
        db::update_post(&conn, &stored.post, stored.rev)?;
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}
