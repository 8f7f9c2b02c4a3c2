use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage::FileRef;

pub mod db;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Submission {
    pub id: Uuid,
    pub student: Uuid,
    pub files: Vec<FileRef>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub grade: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl Submission {
    pub fn new(student: Uuid, files: Vec<FileRef>, submitted_at: DateTime<Utc>) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            student,
            files,
            submitted_at,
            grade: None,
            feedback: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Assignment {
    pub id: Uuid,
    pub classroom: Uuid,
    pub teacher: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: DateTime<Utc>,
    /// Maximum points, never negative.
    pub points: f64,
    /// At most one per student.
    #[serde(default)]
    pub submissions: Vec<Submission>,
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    pub fn submission_of(&self, student: Uuid) -> Option<&Submission> {
        self.submissions.iter().find(|it| it.student == student)
    }

    pub fn submission(&self, id: Uuid) -> Option<&Submission> {
        self.submissions.iter().find(|it| it.id == id)
    }

    /// `now` is strictly before the due date.
    pub fn accepts_submissions_at(&self, now: DateTime<Utc>) -> bool {
        now < self.due_date
    }
}
