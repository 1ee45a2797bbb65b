use chrono::{DateTime, Duration, Utc};
use palaver_shared::{Post, PostSummary};
use rusqlite::{Connection, TransactionBehavior};
use tracing::warn;

use crate::{error::AppError, DbPool};

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT UNIQUE NOT NULL,
            name        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            last_login  TEXT NOT NULL
        );

        -- The thread aggregate lives in `doc` as one JSON document; the
        -- sidecar columns only exist for ordering and filtering. `rev` is
        -- the optimistic-concurrency token bumped on every rewrite.
        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            rev         INTEGER NOT NULL DEFAULT 0,
            author_id   TEXT NOT NULL,
            pinned      INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            doc         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_posts_order ON posts(pinned, created_at);
        CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id, created_at);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY,
            author_id   TEXT NOT NULL,
            author_name TEXT NOT NULL,
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chat_created ON chat_messages(created_at);

        CREATE TABLE IF NOT EXISTS reports (
            id               TEXT PRIMARY KEY,
            target_kind      TEXT NOT NULL,
            target_id        TEXT NOT NULL,
            reporter_id      TEXT NOT NULL,
            reported_user_id TEXT NOT NULL,
            reason           TEXT NOT NULL,
            details          TEXT NOT NULL DEFAULT '',
            status           TEXT NOT NULL DEFAULT 'pending',
            created_at       TEXT NOT NULL,
            resolved_at      TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_reports_status ON reports(status, created_at);

        CREATE TABLE IF NOT EXISTS tickets (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            subject     TEXT NOT NULL,
            details     TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'open',
            created_at  TEXT NOT NULL,
            resolved_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status, created_at);
        ",
    )?;

    Ok(())
}

/// A post document together with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPost {
    pub post: Post,
    pub rev: i64,
}

pub fn insert_post(conn: &Connection, post: &Post) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO posts (id, rev, author_id, pinned, created_at, doc)
         VALUES (?1, 0, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            post.id,
            post.author_id,
            post.pinned,
            post.created_at.to_rfc3339(),
            serde_json::to_string(post)?,
        ],
    )?;
    Ok(())
}

/// Cooldown check and insert inside one immediate transaction, so two
/// concurrent creates by the same author cannot both slip through the
/// window.
pub fn insert_post_cooled(
    conn: &mut Connection,
    post: &Post,
    cooldown: Duration,
) -> Result<(), AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if let Some(last) = latest_post_at(&tx, &post.author_id)? {
        if post.created_at - last < cooldown {
            return Err(AppError::Cooldown);
        }
    }

    insert_post(&tx, post)?;
    tx.commit()?;
    Ok(())
}

pub fn count_posts(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
        .map_err(Into::into)
}

/// One page of the post list, pinned first then newest. A row whose
/// document no longer parses is logged and skipped rather than failing the
/// whole page.
pub fn list_post_summaries(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostSummary>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, doc FROM posts
         ORDER BY pinned DESC, created_at DESC
         LIMIT ?1 OFFSET ?2",
    )?;

    let items = stmt
        .query_map(rusqlite::params![limit, offset], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .filter_map(|r| r.ok())
        .filter_map(|(id, doc)| match serde_json::from_str::<Post>(&doc) {
            Ok(post) => Some(PostSummary::from(&post)),
            Err(e) => {
                warn!(post_id = %id, "skipping corrupt post document: {e}");
                None
            }
        })
        .collect();

    Ok(items)
}

pub fn fetch_post(conn: &Connection, id: &str) -> Result<StoredPost, AppError> {
    let (rev, doc): (i64, String) = conn
        .query_row(
            "SELECT rev, doc FROM posts WHERE id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound("post"),
            other => other.into(),
        })?;

    Ok(StoredPost {
        post: serde_json::from_str(&doc)?,
        rev,
    })
}

/// Whole-document rewrite, guarded by the revision the caller read. A
/// concurrent writer that got there first leaves zero rows matching and the
/// write surfaces as a conflict instead of silently clobbering.
pub fn update_post(conn: &Connection, post: &Post, expected_rev: i64) -> Result<i64, AppError> {
    let affected = conn.execute(
        "UPDATE posts SET rev = rev + 1, pinned = ?1, doc = ?2
         WHERE id = ?3 AND rev = ?4",
        rusqlite::params![
            post.pinned,
            serde_json::to_string(post)?,
            post.id,
            expected_rev,
        ],
    )?;

    if affected == 0 {
        // Either the post vanished or someone else won the race.
        let exists: bool = conn
            .query_row("SELECT 1 FROM posts WHERE id = ?1", [&post.id], |_| Ok(true))
            .unwrap_or(false);
        return Err(if exists {
            AppError::Conflict
        } else {
            AppError::NotFound("post")
        });
    }

    Ok(expected_rev + 1)
}

pub fn delete_post(conn: &Connection, id: &str) -> Result<(), AppError> {
    let affected = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
    if affected == 0 {
        return Err(AppError::NotFound("post"));
    }
    Ok(())
}

/// When the author last posted, for the creation cooldown.
pub fn latest_post_at(
    conn: &Connection,
    author_id: &str,
) -> Result<Option<DateTime<Utc>>, AppError> {
    let latest: Option<String> = conn.query_row(
        "SELECT MAX(created_at) FROM posts WHERE author_id = ?1",
        [author_id],
        |row| row.get(0),
    )?;

    Ok(latest
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use palaver_shared::{Comment, Direction, Reply, Tag, TagSet};

    fn test_pool() -> DbPool {
        // One connection, or each pooled handle would get its own :memory: db.
        let manager = r2d2_sqlite::SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        run_migrations(&pool).unwrap();
        pool
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn nested_post() -> Post {
        let mut tags = TagSet::default();
        tags.add(Tag::Gaming);
        tags.add(Tag::Important);
        let mut post = Post::new(
            "p1".into(),
            "alice".into(),
            "Alice".into(),
            "Weekend thread".into(),
            "What is everyone playing?".into(),
            tags,
            at(0),
        );
        post.votes.apply("bob", Direction::Up);
        post.votes.apply("carol", Direction::Down);

        let mut comment =
            Comment::new("c1".into(), "bob".into(), "Bob".into(), "Chess".into(), at(10));
        comment.votes.apply("alice", Direction::Up);
        comment.replies.push(Reply::new(
            "r1".into(),
            "carol".into(),
            "Carol".into(),
            "Same here".into(),
            at(20),
        ));
        post.add_comment(comment);
        post
    }

    #[test]
    fn post_document_round_trips_exactly() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let post = nested_post();

        insert_post(&conn, &post).unwrap();
        let stored = fetch_post(&conn, "p1").unwrap();

        assert_eq!(stored.rev, 0);
        assert_eq!(stored.post, post);
    }

    #[test]
    fn stale_revision_is_a_conflict() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let post = nested_post();
        insert_post(&conn, &post).unwrap();

        // First writer wins and bumps the revision.
        let mut first = fetch_post(&conn, "p1").unwrap();
        first.post.votes.apply("dave", Direction::Up);
        assert_eq!(update_post(&conn, &first.post, first.rev).unwrap(), 1);

        // Second writer still holds rev 0.
        let mut second = post.clone();
        second.votes.apply("erin", Direction::Down);
        assert!(matches!(
            update_post(&conn, &second, 0),
            Err(AppError::Conflict)
        ));

        // The winning write survived.
        let stored = fetch_post(&conn, "p1").unwrap();
        assert_eq!(stored.rev, 1);
        assert_eq!(stored.post.votes.ballot("dave"), 1);
        assert_eq!(stored.post.votes.ballot("erin"), 0);
    }

    #[test]
    fn updating_a_deleted_post_is_not_found() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let post = nested_post();
        insert_post(&conn, &post).unwrap();
        delete_post(&conn, "p1").unwrap();

        assert!(matches!(
            update_post(&conn, &post, 0),
            Err(AppError::NotFound("post"))
        ));
        assert!(matches!(
            fetch_post(&conn, "p1"),
            Err(AppError::NotFound("post"))
        ));
    }

    #[test]
    fn cooldown_blocks_rapid_successive_posts() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let cooldown = Duration::seconds(60);

        let mut first = nested_post();
        first.id = "p-first".into();
        insert_post_cooled(&mut conn, &first, cooldown).unwrap();

        // Same author inside the window is rejected.
        let mut second = nested_post();
        second.id = "p-second".into();
        second.created_at = at(30);
        assert!(matches!(
            insert_post_cooled(&mut conn, &second, cooldown),
            Err(AppError::Cooldown)
        ));

        // A different author inside the window is unaffected.
        let mut other = nested_post();
        other.id = "p-other".into();
        other.author_id = "zed".into();
        other.created_at = at(30);
        insert_post_cooled(&mut conn, &other, cooldown).unwrap();

        // Same author once the window has passed is fine.
        let mut third = nested_post();
        third.id = "p-third".into();
        third.created_at = at(120);
        insert_post_cooled(&mut conn, &third, cooldown).unwrap();

        assert_eq!(count_posts(&conn).unwrap(), 3);
    }

    #[test]
    fn corrupt_documents_are_skipped_from_listings() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        insert_post(&conn, &nested_post()).unwrap();
        conn.execute(
            "INSERT INTO posts (id, rev, author_id, pinned, created_at, doc)
             VALUES ('p-bad', 0, 'mallory', 0, ?1, 'not json')",
            [at(99).to_rfc3339()],
        )
        .unwrap();

        let items = list_post_summaries(&conn, 20, 0).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "p1");
        // The raw count still sees both rows; listings just skip the bad one.
        assert_eq!(count_posts(&conn).unwrap(), 2);
    }

    #[test]
    fn latest_post_at_tracks_the_newest_post() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        assert_eq!(latest_post_at(&conn, "alice").unwrap(), None);

        let mut older = nested_post();
        older.id = "p-old".into();
        insert_post(&conn, &older).unwrap();

        let mut newer = nested_post();
        newer.id = "p-new".into();
        newer.created_at = at(500);
        insert_post(&conn, &newer).unwrap();

        assert_eq!(latest_post_at(&conn, "alice").unwrap(), Some(at(500)));
    }
}
