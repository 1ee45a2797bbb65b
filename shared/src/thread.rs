use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vote::VoteLedger;

/// The fixed set of tags a post may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Gaming,
    Movies,
    Shows,
    Important,
    Help,
    OffTopic,
}

/// At most three distinct tags per post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(Vec<Tag>);

impl TagSet {
    pub const MAX: usize = 3;

    /// Add a tag. Returns false (and leaves the set unchanged) when the tag
    /// is already present or the set is full.
    pub fn add(&mut self, tag: Tag) -> bool {
        if self.0.contains(&tag) || self.0.len() >= Self::MAX {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn remove(&mut self, tag: Tag) -> bool {
        let before = self.0.len();
        self.0.retain(|&t| t != tag);
        self.0.len() != before
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Tag] {
        &self.0
    }
}

impl TryFrom<Vec<Tag>> for TagSet {
    type Error = ThreadError;

    fn try_from(tags: Vec<Tag>) -> Result<Self, ThreadError> {
        let mut set = TagSet::default();
        for tag in tags {
            // Duplicates collapse silently; a fourth distinct tag is an error.
            if !set.add(tag) && !set.0.contains(&tag) {
                return Err(ThreadError::TooManyTags);
            }
        }
        Ok(set)
    }
}

/// What a piece of thread content is, used for report targets and delete
/// results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Post,
    Comment,
    Reply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ThreadError {
    #[error("content not found")]
    NotFound,
    #[error("only the author or an admin may do that")]
    Forbidden,
    #[error("a post carries at most three tags")]
    TooManyTags,
}

/// Terminal content: a reply never holds further replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub votes: VoteLedger,
}

impl Reply {
    pub fn new(
        id: String,
        author_id: String,
        author_name: String,
        body: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author_id,
            author_name,
            body,
            created_at,
            edited_at: None,
            votes: VoteLedger::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub votes: VoteLedger,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

impl Comment {
    pub fn new(
        id: String,
        author_id: String,
        author_name: String,
        body: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author_id,
            author_name,
            body,
            created_at,
            edited_at: None,
            votes: VoteLedger::default(),
            replies: Vec::new(),
        }
    }
}

/// One whole thread: the post plus its two levels of nested discussion.
/// This is the unit of storage and of mutation; every nested change
/// rewrites the entire document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    /// Denormalized at creation time; never back-filled on rename.
    pub author_name: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: TagSet,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub votes: VoteLedger,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// A mutable handle to a located comment or reply.
pub enum ContentMut<'a> {
    Comment(&'a mut Comment),
    Reply(&'a mut Reply),
}

/// One row of a flattened thread, in display order: each comment followed
/// by its replies, chronologically.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadEntry<'a> {
    pub kind: TargetKind,
    pub depth: usize,
    pub id: &'a str,
    pub author_id: &'a str,
    pub body: &'a str,
    pub vote_total: i64,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(
        id: String,
        author_id: String,
        author_name: String,
        title: String,
        body: String,
        tags: TagSet,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author_id,
            author_name,
            title,
            body,
            tags,
            created_at,
            pinned: false,
            votes: VoteLedger::default(),
            comments: Vec::new(),
        }
    }

    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    pub fn comment_mut(&mut self, comment_id: &str) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == comment_id)
    }

    /// Locate a content id: top-level comments first, then each comment's
    /// replies.
    pub fn find_content_mut(&mut self, content_id: &str) -> Option<ContentMut<'_>> {
        if self.comments.iter().any(|c| c.id == content_id) {
            return self
                .comments
                .iter_mut()
                .find(|c| c.id == content_id)
                .map(ContentMut::Comment);
        }
        self.comments
            .iter_mut()
            .flat_map(|c| c.replies.iter_mut())
            .find(|r| r.id == content_id)
            .map(ContentMut::Reply)
    }

    /// The vote ledger for the post itself (no target id) or for a nested
    /// comment/reply.
    pub fn ledger_mut(&mut self, target_id: Option<&str>) -> Option<&mut VoteLedger> {
        match target_id {
            None => Some(&mut self.votes),
            Some(id) => match self.find_content_mut(id)? {
                ContentMut::Comment(c) => Some(&mut c.votes),
                ContentMut::Reply(r) => Some(&mut r.votes),
            },
        }
    }

    /// Replace a comment's or reply's body and stamp `edited_at`. Only the
    /// author or an admin may edit.
    pub fn edit_content(
        &mut self,
        content_id: &str,
        principal_id: &str,
        is_admin: bool,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<(), ThreadError> {
        match self.find_content_mut(content_id) {
            None => Err(ThreadError::NotFound),
            Some(ContentMut::Comment(c)) => {
                if c.author_id != principal_id && !is_admin {
                    return Err(ThreadError::Forbidden);
                }
                c.body = body;
                c.edited_at = Some(now);
                Ok(())
            }
            Some(ContentMut::Reply(r)) => {
                if r.author_id != principal_id && !is_admin {
                    return Err(ThreadError::Forbidden);
                }
                r.body = body;
                r.edited_at = Some(now);
                Ok(())
            }
        }
    }

    /// Remove a comment (with all its replies) or a single reply. No
    /// tombstones; reports pointing at the content go stale.
    pub fn delete_content(
        &mut self,
        content_id: &str,
        principal_id: &str,
        is_admin: bool,
    ) -> Result<TargetKind, ThreadError> {
        if let Some(idx) = self.comments.iter().position(|c| c.id == content_id) {
            if self.comments[idx].author_id != principal_id && !is_admin {
                return Err(ThreadError::Forbidden);
            }
            self.comments.remove(idx);
            return Ok(TargetKind::Comment);
        }

        for comment in &mut self.comments {
            if let Some(idx) = comment.replies.iter().position(|r| r.id == content_id) {
                if comment.replies[idx].author_id != principal_id && !is_admin {
                    return Err(ThreadError::Forbidden);
                }
                comment.replies.remove(idx);
                return Ok(TargetKind::Reply);
            }
        }

        Err(ThreadError::NotFound)
    }

    /// Comments plus replies.
    pub fn comment_count(&self) -> usize {
        self.comments.iter().map(|c| 1 + c.replies.len()).sum()
    }

    /// Flatten the discussion into display order.
    pub fn flatten(&self) -> Vec<ThreadEntry<'_>> {
        let mut entries = Vec::with_capacity(self.comment_count());
        for comment in &self.comments {
            entries.push(ThreadEntry {
                kind: TargetKind::Comment,
                depth: 0,
                id: &comment.id,
                author_id: &comment.author_id,
                body: &comment.body,
                vote_total: comment.votes.total,
                created_at: comment.created_at,
            });
            for reply in &comment.replies {
                entries.push(ThreadEntry {
                    kind: TargetKind::Reply,
                    depth: 1,
                    id: &reply.id,
                    author_id: &reply.author_id,
                    body: &reply.body,
                    vote_total: reply.votes.total,
                    created_at: reply.created_at,
                });
            }
        }
        entries
    }

    /// Unique participant ids in thread order, the post author first.
    pub fn participants(&self) -> Vec<&str> {
        let mut seen = vec![self.author_id.as_str()];
        for entry in self.flatten() {
            if !seen.contains(&entry.author_id) {
                seen.push(entry.author_id);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample_post() -> Post {
        let mut post = Post::new(
            "p1".into(),
            "alice".into(),
            "Alice".into(),
            "Weekend thread".into(),
            "What is everyone playing?".into(),
            TagSet::default(),
            at(0),
        );
        let mut c1 = Comment::new("c1".into(), "bob".into(), "Bob".into(), "Chess".into(), at(10));
        c1.replies.push(Reply::new(
            "r1".into(),
            "carol".into(),
            "Carol".into(),
            "Same".into(),
            at(20),
        ));
        c1.replies.push(Reply::new(
            "r2".into(),
            "dave".into(),
            "Dave".into(),
            "Blitz or classical?".into(),
            at(30),
        ));
        post.add_comment(c1);
        post.add_comment(Comment::new(
            "c2".into(),
            "erin".into(),
            "Erin".into(),
            "Factorio again".into(),
            at(40),
        ));
        post
    }

    #[test]
    fn fourth_tag_is_rejected() {
        let mut tags = TagSet::default();
        assert!(tags.add(Tag::Gaming));
        assert!(tags.add(Tag::Movies));
        assert!(tags.add(Tag::Important));
        assert!(!tags.add(Tag::Help));
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn duplicate_tag_is_rejected() {
        let mut tags = TagSet::default();
        assert!(tags.add(Tag::Gaming));
        assert!(!tags.add(Tag::Gaming));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn deleting_a_reply_leaves_siblings_and_parent() {
        let mut post = sample_post();
        let kind = post.delete_content("r1", "carol", false).unwrap();
        assert_eq!(kind, TargetKind::Reply);
        assert_eq!(post.comments.len(), 2);
        let replies: Vec<_> = post.comments[0].replies.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(replies, ["r2"]);
    }

    #[test]
    fn deleting_a_comment_drops_its_replies() {
        let mut post = sample_post();
        let kind = post.delete_content("c1", "bob", false).unwrap();
        assert_eq!(kind, TargetKind::Comment);
        let ids: Vec<_> = post.comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c2"]);
        assert!(post.find_content_mut("r2").is_none());
    }

    #[test]
    fn non_author_cannot_delete_without_admin() {
        let mut post = sample_post();
        assert_eq!(
            post.delete_content("c1", "mallory", false),
            Err(ThreadError::Forbidden)
        );
        assert_eq!(post.comments.len(), 2);
        // Admin capability overrides ownership.
        assert!(post.delete_content("c1", "mallory", true).is_ok());
    }

    #[test]
    fn edit_stamps_edited_at_once_touched() {
        let mut post = sample_post();
        post.edit_content("c2", "erin", false, "Satisfactory, actually".into(), at(99))
            .unwrap();
        let comment = post.comment_mut("c2").unwrap();
        assert_eq!(comment.body, "Satisfactory, actually");
        assert_eq!(comment.edited_at, Some(at(99)));
    }

    #[test]
    fn edit_by_stranger_is_forbidden() {
        let mut post = sample_post();
        assert_eq!(
            post.edit_content("r2", "erin", false, "hijack".into(), at(99)),
            Err(ThreadError::Forbidden)
        );
        assert_eq!(post.comments[0].replies[1].body, "Blitz or classical?");
    }

    #[test]
    fn lookup_checks_comments_before_replies() {
        let mut post = sample_post();
        // Give a reply the same id as a top-level comment; the comment wins.
        post.comments[0].replies[0].id = "c2".into();
        match post.find_content_mut("c2") {
            Some(ContentMut::Comment(c)) => assert_eq!(c.author_id, "erin"),
            _ => panic!("expected the top-level comment"),
        }
    }

    #[test]
    fn ledger_lookup_reaches_every_level() {
        let mut post = sample_post();
        assert!(post.ledger_mut(None).is_some());
        assert!(post.ledger_mut(Some("c1")).is_some());
        assert!(post.ledger_mut(Some("r2")).is_some());
        assert!(post.ledger_mut(Some("nope")).is_none());
    }

    #[test]
    fn flatten_preserves_display_order() {
        let post = sample_post();
        let ids: Vec<_> = post.flatten().iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, ["c1", "r1", "r2", "c2"]);
        let depths: Vec<_> = post.flatten().iter().map(|e| e.depth).collect();
        assert_eq!(depths, [0, 1, 1, 0]);
        assert_eq!(post.comment_count(), 4);
    }

    #[test]
    fn participants_are_unique_in_thread_order() {
        let post = sample_post();
        assert_eq!(post.participants(), ["alice", "bob", "carol", "dave", "erin"]);
    }
}
