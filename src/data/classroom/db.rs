use super::Classroom;

use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{filter, is_duplicate_key};
use crate::error::StoreError;

pub static CLASSROOM_COLLECTION_NAME: &str = "classrooms";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ClassroomCreateData {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct JoinData {
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InviteData {
    pub emails: Vec<String>,
    /// `teacher` or `student`
    pub role: String,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// Another classroom already holds the code.
    CodeTaken,
}

#[rocket::async_trait]
pub trait ClassroomStore: Send + Sync {
    async fn insert_classroom(&self, classroom: &Classroom) -> Result<InsertOutcome, StoreError>;

    async fn get_classroom(&self, id: Uuid) -> Result<Option<Classroom>, StoreError>;

    /// `code` must already be normalized.
    async fn find_classroom_by_code(&self, code: &str) -> Result<Option<Classroom>, StoreError>;

    /// Classrooms taught or attended by `user`, newest first.
    async fn classrooms_for_user(&self, user: Uuid) -> Result<Vec<Classroom>, StoreError>;

    /// Atomically appends `student` unless they are the classroom's teacher or
    /// already enrolled. Returns the updated classroom, or `None` when the
    /// guarded write matched nothing.
    async fn add_student(&self, id: Uuid, student: Uuid) -> Result<Option<Classroom>, StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassroomDoc {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    name: String,
    subject: String,
    #[serde(default)]
    description: Option<String>,
    code: String,
    teacher: bson::Uuid,
    #[serde(default)]
    students: Vec<bson::Uuid>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<&Classroom> for ClassroomDoc {
    fn from(value: &Classroom) -> Self {
        ClassroomDoc {
            id: filter::uuid(value.id),
            name: value.name.clone(),
            subject: value.subject.clone(),
            description: value.description.clone(),
            code: value.code.clone(),
            teacher: filter::uuid(value.teacher),
            students: value.students.iter().copied().map(filter::uuid).collect(),
            created_at: value.created_at,
        }
    }
}

impl From<ClassroomDoc> for Classroom {
    fn from(value: ClassroomDoc) -> Self {
        Classroom {
            id: value.id.to_uuid_1(),
            name: value.name,
            subject: value.subject,
            description: value.description,
            code: value.code,
            teacher: value.teacher.to_uuid_1(),
            students: value.students.into_iter().map(|it| it.to_uuid_1()).collect(),
            created_at: value.created_at,
        }
    }
}

#[rocket::async_trait]
impl ClassroomStore for Database {
    #[tracing::instrument(skip(self, classroom), fields(id = %classroom.id, code = %classroom.code))]
    async fn insert_classroom(&self, classroom: &Classroom) -> Result<InsertOutcome, StoreError> {
        let result = self
            .collection::<ClassroomDoc>(CLASSROOM_COLLECTION_NAME)
            .insert_one(ClassroomDoc::from(classroom), None)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::CodeTaken),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_classroom(&self, id: Uuid) -> Result<Option<Classroom>, StoreError> {
        Ok(self
            .collection::<ClassroomDoc>(CLASSROOM_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?
            .map(Classroom::from))
    }

    async fn find_classroom_by_code(&self, code: &str) -> Result<Option<Classroom>, StoreError> {
        Ok(self
            .collection::<ClassroomDoc>(CLASSROOM_COLLECTION_NAME)
            .find_one(doc! { "code": code }, None)
            .await?
            .map(Classroom::from))
    }

    async fn classrooms_for_user(&self, user: Uuid) -> Result<Vec<Classroom>, StoreError> {
        let user = filter::uuid(user);
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let documents: Vec<ClassroomDoc> = self
            .collection::<ClassroomDoc>(CLASSROOM_COLLECTION_NAME)
            .find(
                doc! { "$or": [ { "teacher": user }, { "students": user } ] },
                options,
            )
            .await?
            .try_collect()
            .await?;

        Ok(documents.into_iter().map(Classroom::from).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn add_student(&self, id: Uuid, student: Uuid) -> Result<Option<Classroom>, StoreError> {
        let student = filter::uuid(student);
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .collection::<ClassroomDoc>(CLASSROOM_COLLECTION_NAME)
            .find_one_and_update(
                doc! {
                    "_id": filter::uuid(id),
                    "teacher": { "$ne": student },
                    "students": { "$ne": student },
                },
                doc! { "$push": { "students": student } },
                options,
            )
            .await?
            .map(Classroom::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::spec::BinarySubtype;
    use bson::Bson;
    use chrono::TimeZone;

    #[test]
    fn classroom_documents_store_binary_uuids() {
        let mut classroom = Classroom::new(
            "Chemistry",
            "Science",
            None,
            "CHEM42",
            Uuid::new_v4(),
            Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        );
        classroom.students.push(Uuid::new_v4());

        let document = bson::to_document(&ClassroomDoc::from(&classroom)).expect("serializable");

        match document.get("_id") {
            Some(Bson::Binary(binary)) => assert_eq!(binary.subtype, BinarySubtype::Uuid),
            other => panic!("unexpected _id: {:?}", other),
        }
        assert!(matches!(document.get("created_at"), Some(Bson::DateTime(_))));

        let restored: ClassroomDoc = bson::from_document(document).expect("deserializable");
        assert_eq!(Classroom::from(restored), classroom);
    }
}
