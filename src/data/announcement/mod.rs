use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage::FileRef;

pub mod db;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Announcement {
    pub id: Uuid,
    pub classroom: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub files: Vec<FileRef>,
    pub created_at: DateTime<Utc>,
}
