use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::thread::{Post, TargetKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Resolved,
}

/// A user report against a post, comment, or reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub target_kind: TargetKind,
    pub target_id: String,
    pub reporter_id: String,
    /// Resolved by walking the thread at report time; see
    /// [`resolve_report_target`].
    pub reported_user_id: String,
    pub reason: String,
    pub details: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub details: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// What lands in the admin inbox. An explicit tagged union: the `kind`
/// discriminant travels in the payload, so consumers never sniff for
/// ticket-only fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboxItem {
    Report(Report),
    Ticket(SupportTicket),
}

impl InboxItem {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            InboxItem::Report(r) => r.created_at,
            InboxItem::Ticket(t) => t.created_at,
        }
    }
}

/// Find the author of the reported content by walking post → comments →
/// replies. A target that cannot be located (stale report, content already
/// deleted) falls back to the post's own author; there is deliberately no
/// "not found" signal.
pub fn resolve_report_target(post: &Post, kind: TargetKind, target_id: &str) -> String {
    let found = match kind {
        TargetKind::Post => Some(post.author_id.as_str()),
        TargetKind::Comment => post
            .comments
            .iter()
            .find(|c| c.id == target_id)
            .map(|c| c.author_id.as_str()),
        TargetKind::Reply => post
            .comments
            .iter()
            .flat_map(|c| c.replies.iter())
            .find(|r| r.id == target_id)
            .map(|r| r.author_id.as_str()),
    };
    found.unwrap_or(post.author_id.as_str()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{Comment, Reply, TagSet};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample_post() -> Post {
        let mut post = Post::new(
            "p1".into(),
            "alice".into(),
            "Alice".into(),
            "Title".into(),
            "Body".into(),
            TagSet::default(),
            at(0),
        );
        let mut comment =
            Comment::new("c1".into(), "bob".into(), "Bob".into(), "hm".into(), at(1));
        comment.replies.push(Reply::new(
            "r1".into(),
            "carol".into(),
            "Carol".into(),
            "deep".into(),
            at(2),
        ));
        post.add_comment(comment);
        post
    }

    #[test]
    fn reply_two_levels_deep_reports_its_author() {
        let post = sample_post();
        assert_eq!(
            resolve_report_target(&post, TargetKind::Reply, "r1"),
            "carol"
        );
    }

    #[test]
    fn comment_target_reports_comment_author() {
        let post = sample_post();
        assert_eq!(
            resolve_report_target(&post, TargetKind::Comment, "c1"),
            "bob"
        );
    }

    #[test]
    fn missing_target_falls_back_to_post_author() {
        let post = sample_post();
        assert_eq!(
            resolve_report_target(&post, TargetKind::Reply, "deleted"),
            "alice"
        );
        assert_eq!(
            resolve_report_target(&post, TargetKind::Comment, "deleted"),
            "alice"
        );
    }

    #[test]
    fn post_target_reports_post_author() {
        let post = sample_post();
        assert_eq!(resolve_report_target(&post, TargetKind::Post, "p1"), "alice");
    }

    #[test]
    fn inbox_items_carry_a_kind_discriminant() {
        let item = InboxItem::Ticket(SupportTicket {
            id: "t1".into(),
            user_id: "bob".into(),
            subject: "Login loop".into(),
            details: "Keeps bouncing me back".into(),
            status: TicketStatus::Open,
            created_at: at(5),
            resolved_at: None,
        });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], "ticket");
        assert_eq!(json["subject"], "Login loop");
    }
}
