use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use palaver_shared::{CastVote, Direction, VoteResponse};

use crate::{auth, db, error::AppError, AppState};

/// POST /api/posts/:id/votes — vote on the post itself (no target id) or on
/// a comment/reply inside it. The same reducer runs for all three; the only
/// difference is which ledger the walk lands on.
pub async fn cast_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(payload): Json<CastVote>,
) -> Result<Json<VoteResponse>, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;

    let direction = Direction::try_from(payload.value)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let pool = state.db.clone();
    let target_id = payload.target_id;

    let resp = tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut stored = db::fetch_post(&conn, &post_id)?;

        let ledger = stored
            .post
            .ledger_mut(target_id.as_deref())
            .ok_or(AppError::NotFound("content"))?;
        let your_ballot = ledger.apply(&principal.user_id, direction);
        let vote_total = ledger.total;

        db::update_post(&conn, &stored.post, stored.rev)?;
        Ok::<_, AppError>(VoteResponse {
            vote_total,
            your_ballot,
        })
    })
    .await??;

    Ok(Json(resp))
}
