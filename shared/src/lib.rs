pub mod moderate;
pub mod report;
pub mod thread;
pub mod vote;

pub use moderate::{moderate, Rejection};
pub use report::{resolve_report_target, InboxItem, Report, ReportStatus, SupportTicket, TicketStatus};
pub use thread::{Comment, ContentMut, Post, Reply, Tag, TagSet, TargetKind, ThreadError, ThreadEntry};
pub use vote::{Direction, InvalidDirection, VoteLedger};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Auth ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

// ── Posts ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePost {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditContent {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPinned {
    pub pinned: bool,
}

/// One row of the post list; the comments stay behind in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub title: String,
    pub tags: TagSet,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
    pub vote_total: i64,
    pub comment_count: usize,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            author_id: post.author_id.clone(),
            author_name: post.author_name.clone(),
            title: post.title.clone(),
            tags: post.tags.clone(),
            pinned: post.pinned,
            created_at: post.created_at,
            vote_total: post.votes.total,
            comment_count: post.comment_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    pub post: Post,
    pub comment_count: usize,
    pub participants: Vec<String>,
}

// ── Comments & replies ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComment {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReply {
    pub body: String,
}

// ── Votes ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVote {
    /// Comment or reply id; absent means the post itself.
    #[serde(default)]
    pub target_id: Option<String>,
    pub value: i8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub vote_total: i64,
    pub your_ballot: Option<i8>,
}

// ── Chat ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatMessage {
    pub body: String,
}

// ── Reports & tickets ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReport {
    pub post_id: String,
    pub target_kind: TargetKind,
    pub target_id: String,
    pub reason: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTicket {
    pub subject: String,
    pub details: String,
}

// ── Pagination ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}
