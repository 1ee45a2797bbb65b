use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use palaver_shared::*;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{auth, db, error::AppError, AppState};

#[derive(Deserialize)]
pub struct PostListParams {
    page: Option<i64>,
}

/// GET /api/posts?page=1 — pinned first, then newest.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<PostListParams>,
) -> Result<Json<Paginated<PostSummary>>, AppError> {
    let pool = state.db.clone();
    let page = params.page.unwrap_or(1).max(1);
    let per_page: i64 = 20;
    let offset = (page - 1) * per_page;

    let result = tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let total = db::count_posts(&conn)?;
        let items = db::list_post_summaries(&conn, per_page, offset)?;

        Ok::<_, AppError>(Paginated {
            items,
            total,
            page,
            per_page,
        })
    })
    .await??;

    Ok(Json(result))
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePost>,
) -> Result<Json<Post>, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;

    let title = ammonia::clean(&payload.title);
    let body = ammonia::clean(&payload.body);
    moderate(&title)?;
    moderate(&body)?;
    let tags = TagSet::try_from(payload.tags)?;

    let now = Utc::now();
    let cooldown = state.post_cooldown;
    let pool = state.db.clone();

    let post = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;

        let post = Post::new(
            Uuid::new_v4().to_string(),
            principal.user_id,
            principal.name,
            title,
            body,
            tags,
            now,
        );
        db::insert_post_cooled(&mut conn, &post, cooldown)?;
        info!(post_id = %post.id, "post created");
        Ok::<_, AppError>(post)
    })
    .await??;

    Ok(Json(post))
}

/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PostDetail>, AppError> {
    let pool = state.db.clone();

    let detail = tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let stored = db::fetch_post(&conn, &id)?;
        let comment_count = stored.post.comment_count();
        let participants = stored
            .post
            .participants()
            .into_iter()
            .map(String::from)
            .collect();
        Ok::<_, AppError>(PostDetail {
            post: stored.post,
            comment_count,
            participants,
        })
    })
    .await??;

    Ok(Json(detail))
}

/// PATCH /api/posts/:id — edit the body; author or admin only.
pub async fn edit_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<EditContent>,
) -> Result<Json<Post>, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;
    let is_admin = state.authorizer.is_admin(&principal);

    let body = ammonia::clean(&payload.body);
    moderate(&body)?;

    let pool = state.db.clone();
    let post = tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut stored = db::fetch_post(&conn, &id)?;

        if stored.post.author_id != principal.user_id && !is_admin {
            return Err(AppError::Forbidden);
        }

        stored.post.body = body;
        db::update_post(&conn, &stored.post, stored.rev)?;
        Ok::<_, AppError>(stored.post)
    })
    .await??;

    Ok(Json(post))
}

/// DELETE /api/posts/:id — author or admin only.
pub async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;
    let is_admin = state.authorizer.is_admin(&principal);

    let pool = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let stored = db::fetch_post(&conn, &id)?;

        if stored.post.author_id != principal.user_id && !is_admin {
            return Err(AppError::Forbidden);
        }

        db::delete_post(&conn, &id)?;
        info!(post_id = %id, "post deleted");
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/posts/:id/pin — admin only.
pub async fn set_pinned(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<SetPinned>,
) -> Result<Json<Post>, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;
    if !state.authorizer.is_admin(&principal) {
        return Err(AppError::Forbidden);
    }

    let pool = state.db.clone();
    let post = tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut stored = db::fetch_post(&conn, &id)?;
        stored.post.pinned = payload.pinned;
        db::update_post(&conn, &stored.post, stored.rev)?;
        Ok::<_, AppError>(stored.post)
    })
    .await??;

    Ok(Json(post))
}
