use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Announcement,
    Assignment,
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "announcement" => Ok(ItemKind::Announcement),
            "assignment" => Ok(ItemKind::Assignment),
            other => Err(format!("unrecognized item type '{}'", other)),
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Announcement => write!(f, "announcement"),
            ItemKind::Assignment => write!(f, "assignment"),
        }
    }
}

/// The single item a comment is attached to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CommentSubject {
    Announcement(Uuid),
    Assignment(Uuid),
}

impl CommentSubject {
    pub fn new(kind: ItemKind, id: Uuid) -> CommentSubject {
        match kind {
            ItemKind::Announcement => CommentSubject::Announcement(id),
            ItemKind::Assignment => CommentSubject::Assignment(id),
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            CommentSubject::Announcement(_) => ItemKind::Announcement,
            CommentSubject::Assignment(_) => ItemKind::Assignment,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            CommentSubject::Announcement(id) | CommentSubject::Assignment(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: Uuid,
    pub classroom: Uuid,
    /// Author.
    pub user: Uuid,
    pub content: String,
    pub subject: CommentSubject,
    #[serde(default)]
    pub parent: Option<Uuid>,
    #[serde(default)]
    pub replies: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        classroom: Uuid,
        user: Uuid,
        subject: CommentSubject,
        content: impl ToString,
        parent: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            classroom,
            user,
            content: content.to_string(),
            subject,
            parent,
            replies: vec![],
            created_at: at,
            updated_at: at,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

/// A top-level comment with its direct replies resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CommentThread {
    pub id: Uuid,
    pub classroom: Uuid,
    pub user: Uuid,
    pub content: String,
    pub subject: CommentSubject,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub replies: Vec<Comment>,
}

impl CommentThread {
    pub fn new(comment: Comment, replies: Vec<Comment>) -> CommentThread {
        CommentThread {
            id: comment.id,
            classroom: comment.classroom,
            user: comment.user,
            content: comment.content,
            subject: comment.subject,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            replies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_kinds_parse_case_insensitively() {
        assert_eq!("Assignment".parse::<ItemKind>(), Ok(ItemKind::Assignment));
        assert_eq!(
            "announcement".parse::<ItemKind>(),
            Ok(ItemKind::Announcement)
        );
        assert!("quiz".parse::<ItemKind>().is_err());
    }

    #[test]
    fn subjects_serialize_as_tagged_union() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(CommentSubject::Assignment(id)).unwrap();

        assert_eq!(json["kind"], "assignment");
        assert_eq!(json["id"], id.to_string());
    }
}
