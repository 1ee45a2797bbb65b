use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use palaver_shared::*;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::{auth, db, error::AppError, AppState};

fn kind_to_str(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::Post => "post",
        TargetKind::Comment => "comment",
        TargetKind::Reply => "reply",
    }
}

fn kind_from_str(s: &str) -> Option<TargetKind> {
    match s {
        "post" => Some(TargetKind::Post),
        "comment" => Some(TargetKind::Comment),
        "reply" => Some(TargetKind::Reply),
        _ => None,
    }
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// POST /api/reports — the reported user is resolved by walking the thread
/// now, so the report stays meaningful even if the content is later deleted.
pub async fn create_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateReport>,
) -> Result<Json<Report>, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;

    let reason = ammonia::clean(&payload.reason);
    moderate(&reason)?;
    let details = ammonia::clean(&payload.details);

    let pool = state.db.clone();
    let report = tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let stored = db::fetch_post(&conn, &payload.post_id)?;
        let reported_user_id =
            resolve_report_target(&stored.post, payload.target_kind, &payload.target_id);

        let report = Report {
            id: Uuid::new_v4().to_string(),
            target_kind: payload.target_kind,
            target_id: payload.target_id,
            reporter_id: principal.user_id,
            reported_user_id,
            reason,
            details,
            status: ReportStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        };

        conn.execute(
            "INSERT INTO reports (id, target_kind, target_id, reporter_id,
                                  reported_user_id, reason, details, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8)",
            rusqlite::params![
                report.id,
                kind_to_str(report.target_kind),
                report.target_id,
                report.reporter_id,
                report.reported_user_id,
                report.reason,
                report.details,
                report.created_at.to_rfc3339(),
            ],
        )?;

        info!(report_id = %report.id, reported = %report.reported_user_id, "report filed");
        Ok::<_, AppError>(report)
    })
    .await??;

    Ok(Json(report))
}

/// POST /api/tickets
pub async fn create_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTicket>,
) -> Result<Json<SupportTicket>, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;

    let subject = ammonia::clean(&payload.subject);
    let details = ammonia::clean(&payload.details);
    moderate(&subject)?;
    moderate(&details)?;

    let ticket = SupportTicket {
        id: Uuid::new_v4().to_string(),
        user_id: principal.user_id,
        subject,
        details,
        status: TicketStatus::Open,
        created_at: Utc::now(),
        resolved_at: None,
    };

    let pool = state.db.clone();
    let row = ticket.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO tickets (id, user_id, subject, details, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'open', ?5)",
            rusqlite::params![
                row.id,
                row.user_id,
                row.subject,
                row.details,
                row.created_at.to_rfc3339(),
            ],
        )?;
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(Json(ticket))
}

fn pending_reports(conn: &Connection) -> Result<Vec<InboxItem>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, target_kind, target_id, reporter_id, reported_user_id,
                reason, details, created_at
         FROM reports WHERE status = 'pending'",
    )?;

    let items = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?
        .filter_map(|r| r.ok())
        .filter_map(
            |(id, kind, target_id, reporter_id, reported_user_id, reason, details, created)| {
                Some(InboxItem::Report(Report {
                    id,
                    target_kind: kind_from_str(&kind)?,
                    target_id,
                    reporter_id,
                    reported_user_id,
                    reason,
                    details,
                    status: ReportStatus::Pending,
                    created_at: parse_ts(&created)?,
                    resolved_at: None,
                }))
            },
        )
        .collect();

    Ok(items)
}

fn open_tickets(conn: &Connection) -> Result<Vec<InboxItem>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, subject, details, created_at
         FROM tickets WHERE status = 'open'",
    )?;

    let items = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .filter_map(|r| r.ok())
        .filter_map(|(id, user_id, subject, details, created)| {
            Some(InboxItem::Ticket(SupportTicket {
                id,
                user_id,
                subject,
                details,
                status: TicketStatus::Open,
                created_at: parse_ts(&created)?,
                resolved_at: None,
            }))
        })
        .collect();

    Ok(items)
}

/// GET /api/admin/inbox — pending reports and open tickets as one tagged
/// list, newest first. Admin only.
pub async fn admin_inbox(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<InboxItem>>, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;
    if !state.authorizer.is_admin(&principal) {
        return Err(AppError::Forbidden);
    }

    let pool = state.db.clone();
    let items = tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut items = pending_reports(&conn)?;
        items.extend(open_tickets(&conn)?);
        items.sort_by_key(|item| std::cmp::Reverse(item.created_at()));
        Ok::<_, AppError>(items)
    })
    .await??;

    Ok(Json(items))
}

/// POST /api/admin/inbox/:kind/:id/resolve — admin only.
pub async fn resolve_inbox_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let principal = auth::extract_principal(&headers, &state.jwt_secret)?;
    if !state.authorizer.is_admin(&principal) {
        return Err(AppError::Forbidden);
    }

    let pool = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let now = Utc::now().to_rfc3339();

        let affected = match kind.as_str() {
            "report" => conn.execute(
                "UPDATE reports SET status = 'resolved', resolved_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
                rusqlite::params![now, id],
            )?,
            "ticket" => conn.execute(
                "UPDATE tickets SET status = 'resolved', resolved_at = ?1
                 WHERE id = ?2 AND status = 'open'",
                rusqlite::params![now, id],
            )?,
            _ => return Err(AppError::BadRequest("kind must be report or ticket".into())),
        };

        if affected == 0 {
            return Err(AppError::NotFound("inbox item"));
        }
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}
