use std::collections::HashSet;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use jsonwebtoken::{decode, DecodingKey, Validation};
use palaver_shared::User;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, AppState};

// ── JWT claims, minted by the external identity provider ──

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Opaque user id.
    pub sub: String,
    pub email: String,
    pub name: String,
    /// Expiry (unix timestamp).
    pub exp: usize,
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

pub fn extract_principal(headers: &HeaderMap, jwt_secret: &str) -> Result<Principal, AppError> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;

    Ok(Principal {
        user_id: data.claims.sub,
        email: data.claims.email,
        name: data.claims.name,
    })
}

// ── Admin capability ──

/// Built once from configuration and injected through state; handlers ask
/// `is_admin` instead of comparing email strings themselves.
#[derive(Debug, Clone)]
pub struct Authorizer {
    admins: HashSet<String>,
}

impl Authorizer {
    pub fn new(emails: impl IntoIterator<Item = String>) -> Self {
        Self {
            admins: emails.into_iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub fn is_admin(&self, principal: &Principal) -> bool {
        self.admins.contains(&principal.email.to_lowercase())
    }
}

// ── Handlers ──

/// GET /api/auth/me — upsert the profile and bump last_login.
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<User>, AppError> {
    let principal = extract_principal(&headers, &state.jwt_secret)?;
    let now = Utc::now();

    let pool = state.db.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO users (id, email, name, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(id) DO UPDATE SET email = ?2, name = ?3, last_login = ?4",
            rusqlite::params![
                principal.user_id,
                principal.email,
                principal.name,
                now.to_rfc3339()
            ],
        )?;

        Ok::<_, AppError>(User {
            id: principal.user_id,
            name: principal.name,
            email: principal.email,
            last_login: Some(now),
        })
    })
    .await??;

    Ok(Json(user))
}
