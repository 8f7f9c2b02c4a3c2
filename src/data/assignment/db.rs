use super::{Assignment, Submission};

use bson::{doc, Bson};
use chrono::{DateTime, Utc};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{filter, time};
use crate::error::StoreError;
use crate::storage::FileRef;

pub static ASSIGNMENT_COLLECTION_NAME: &str = "assignments";

/// Fields are optional so that missing values are reported as validation
/// failures instead of body parse errors.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AssignmentCreateData {
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub points: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct GradeData {
    pub grade: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// A submission as written by the store, with the files it no longer holds.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSubmission {
    pub submission: Submission,
    /// Files the submission pointed at before it was overwritten.
    pub replaced: Vec<FileRef>,
}

impl StoredSubmission {
    pub fn created(submission: Submission) -> StoredSubmission {
        StoredSubmission {
            submission,
            replaced: vec![],
        }
    }
}

#[rocket::async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn insert_assignment(&self, assignment: &Assignment) -> Result<(), StoreError>;

    async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>, StoreError>;

    /// Newest first.
    async fn assignments_for_classroom(
        &self,
        classroom: Uuid,
    ) -> Result<Vec<Assignment>, StoreError>;

    /// Overwrites files and timestamp of the submission `student` already has
    /// on the assignment. `None` if there is no such submission.
    async fn replace_submission_files(
        &self,
        assignment: Uuid,
        student: Uuid,
        files: &[FileRef],
        submitted_at: DateTime<Utc>,
    ) -> Result<Option<StoredSubmission>, StoreError>;

    /// Appends `submission` only while its student has none on the assignment.
    /// Returns whether the append happened.
    async fn append_submission(
        &self,
        assignment: Uuid,
        submission: &Submission,
    ) -> Result<bool, StoreError>;

    /// `None` if either the assignment or the submission doesn't exist.
    async fn set_grade(
        &self,
        assignment: Uuid,
        submission: Uuid,
        grade: f64,
        feedback: Option<String>,
    ) -> Result<Option<Assignment>, StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SubmissionDoc {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    student: bson::Uuid,
    files: Vec<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    submitted_at: DateTime<Utc>,
    #[serde(default)]
    grade: Option<f64>,
    #[serde(default)]
    feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssignmentDoc {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    classroom: bson::Uuid,
    teacher: bson::Uuid,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    due_date: DateTime<Utc>,
    points: f64,
    #[serde(default)]
    submissions: Vec<SubmissionDoc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

fn file_strings(files: &[FileRef]) -> Vec<String> {
    files.iter().map(|it| it.0.clone()).collect()
}

impl From<&Submission> for SubmissionDoc {
    fn from(value: &Submission) -> Self {
        SubmissionDoc {
            id: filter::uuid(value.id),
            student: filter::uuid(value.student),
            files: file_strings(&value.files),
            submitted_at: value.submitted_at,
            grade: value.grade,
            feedback: value.feedback.clone(),
        }
    }
}

impl From<SubmissionDoc> for Submission {
    fn from(value: SubmissionDoc) -> Self {
        Submission {
            id: value.id.to_uuid_1(),
            student: value.student.to_uuid_1(),
            files: value.files.into_iter().map(FileRef).collect(),
            submitted_at: value.submitted_at,
            grade: value.grade,
            feedback: value.feedback,
        }
    }
}

impl From<&Assignment> for AssignmentDoc {
    fn from(value: &Assignment) -> Self {
        AssignmentDoc {
            id: filter::uuid(value.id),
            classroom: filter::uuid(value.classroom),
            teacher: filter::uuid(value.teacher),
            title: value.title.clone(),
            description: value.description.clone(),
            due_date: value.due_date,
            points: value.points,
            submissions: value.submissions.iter().map(SubmissionDoc::from).collect(),
            created_at: value.created_at,
        }
    }
}

impl From<AssignmentDoc> for Assignment {
    fn from(value: AssignmentDoc) -> Self {
        Assignment {
            id: value.id.to_uuid_1(),
            classroom: value.classroom.to_uuid_1(),
            teacher: value.teacher.to_uuid_1(),
            title: value.title,
            description: value.description,
            due_date: value.due_date,
            points: value.points,
            submissions: value.submissions.into_iter().map(Submission::from).collect(),
            created_at: value.created_at,
        }
    }
}

fn return_after() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

#[rocket::async_trait]
impl AssignmentStore for Database {
    #[tracing::instrument(skip(self, assignment), fields(id = %assignment.id))]
    async fn insert_assignment(&self, assignment: &Assignment) -> Result<(), StoreError> {
        self.collection::<AssignmentDoc>(ASSIGNMENT_COLLECTION_NAME)
            .insert_one(AssignmentDoc::from(assignment), None)
            .await?;
        Ok(())
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>, StoreError> {
        Ok(self
            .collection::<AssignmentDoc>(ASSIGNMENT_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?
            .map(Assignment::from))
    }

    async fn assignments_for_classroom(
        &self,
        classroom: Uuid,
    ) -> Result<Vec<Assignment>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let documents: Vec<AssignmentDoc> = self
            .collection::<AssignmentDoc>(ASSIGNMENT_COLLECTION_NAME)
            .find(filter::by_classroom(classroom), options)
            .await?
            .try_collect()
            .await?;

        Ok(documents.into_iter().map(Assignment::from).collect())
    }

    #[tracing::instrument(skip(self, files))]
    async fn replace_submission_files(
        &self,
        assignment: Uuid,
        student: Uuid,
        files: &[FileRef],
        submitted_at: DateTime<Utc>,
    ) -> Result<Option<StoredSubmission>, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();

        let previous = self
            .collection::<AssignmentDoc>(ASSIGNMENT_COLLECTION_NAME)
            .find_one_and_update(
                doc! {
                    "_id": filter::uuid(assignment),
                    "submissions.student": filter::uuid(student),
                },
                doc! {
                    "$set": {
                        "submissions.$.files": file_strings(files),
                        "submissions.$.submitted_at": time::bson(submitted_at),
                    }
                },
                options,
            )
            .await?;

        Ok(previous
            .map(Assignment::from)
            .and_then(|it| it.submission_of(student).cloned())
            .map(|previous| {
                let replaced = previous.files.clone();
                StoredSubmission {
                    submission: Submission {
                        files: files.to_vec(),
                        submitted_at,
                        ..previous
                    },
                    replaced,
                }
            }))
    }

    #[tracing::instrument(skip(self, submission), fields(student = %submission.student))]
    async fn append_submission(
        &self,
        assignment: Uuid,
        submission: &Submission,
    ) -> Result<bool, StoreError> {
        let pushed = bson::to_bson(&SubmissionDoc::from(submission))?;

        let result = self
            .collection::<AssignmentDoc>(ASSIGNMENT_COLLECTION_NAME)
            .update_one(
                doc! {
                    "_id": filter::uuid(assignment),
                    "submissions.student": { "$ne": filter::uuid(submission.student) },
                },
                doc! { "$push": { "submissions": pushed } },
                None,
            )
            .await?;

        Ok(result.modified_count == 1)
    }

    #[tracing::instrument(skip(self, feedback))]
    async fn set_grade(
        &self,
        assignment: Uuid,
        submission: Uuid,
        grade: f64,
        feedback: Option<String>,
    ) -> Result<Option<Assignment>, StoreError> {
        let feedback = feedback.map(Bson::String).unwrap_or(Bson::Null);

        Ok(self
            .collection::<AssignmentDoc>(ASSIGNMENT_COLLECTION_NAME)
            .find_one_and_update(
                doc! {
                    "_id": filter::uuid(assignment),
                    "submissions._id": filter::uuid(submission),
                },
                doc! {
                    "$set": {
                        "submissions.$.grade": grade,
                        "submissions.$.feedback": feedback,
                    }
                },
                return_after(),
            )
            .await?
            .map(Assignment::from))
    }
}
