//! Entity models and the store traits the classroom core persists them with.
//!
//! Each entity module holds the model in `mod.rs` and its store trait, request
//! payloads and MongoDB implementation in `db.rs`. [`memory::MemoryStore`]
//! implements every store trait in-process.

pub mod announcement;
pub mod assignment;
pub mod classroom;
pub mod comment;
pub mod memory;
pub mod user;

use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};

use crate::error::StoreError;
use announcement::db::{AnnouncementStore, ANNOUNCEMENT_COLLECTION_NAME};
use assignment::db::{AssignmentStore, ASSIGNMENT_COLLECTION_NAME};
use classroom::db::{ClassroomStore, CLASSROOM_COLLECTION_NAME};
use comment::db::{CommentStore, COMMENT_COLLECTION_NAME};
use user::db::{UserStore, USER_COLLECTION_NAME};

/// Everything the request layer needs from persistence.
pub trait Store: ClassroomStore + AssignmentStore + AnnouncementStore + CommentStore + UserStore {}

impl<T> Store for T where
    T: ClassroomStore + AssignmentStore + AnnouncementStore + CommentStore + UserStore
{
}

pub(crate) mod filter {
    use bson::{doc, Document};
    use uuid::Uuid;

    #[inline]
    pub fn uuid(id: Uuid) -> bson::Uuid {
        bson::Uuid::from(id)
    }

    #[inline]
    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": uuid(id) }
    }

    pub fn by_ids(ids: &[Uuid]) -> Document {
        let ids: Vec<bson::Uuid> = ids.iter().copied().map(uuid).collect();
        doc! { "_id": { "$in": ids } }
    }

    #[inline]
    pub fn by_classroom(classroom: Uuid) -> Document {
        doc! { "classroom": uuid(classroom) }
    }
}

const DUPLICATE_KEY: i32 = 11000;

/// Unique index violations surface as write errors from inserts and as
/// command errors from `findAndModify`.
pub(crate) fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY,
        ErrorKind::Command(command) => command.code == DUPLICATE_KEY,
        _ => false,
    }
}

pub(crate) mod time {
    use chrono::{DateTime, Utc};

    #[inline]
    pub fn bson(at: DateTime<Utc>) -> bson::DateTime {
        bson::DateTime::from_chrono(at)
    }
}

/// Creates the indexes the MongoDB stores rely on, including the unique join
/// code index that backs classroom code allocation.
#[tracing::instrument(skip(db))]
pub async fn ensure_indexes(db: &Database) -> Result<(), StoreError> {
    use bson::doc;

    db.collection::<bson::Document>(CLASSROOM_COLLECTION_NAME)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "code": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            None,
        )
        .await?;
    db.collection::<bson::Document>(CLASSROOM_COLLECTION_NAME)
        .create_index(IndexModel::builder().keys(doc! { "students": 1 }).build(), None)
        .await?;
    db.collection::<bson::Document>(ASSIGNMENT_COLLECTION_NAME)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "classroom": 1, "created_at": -1 })
                .build(),
            None,
        )
        .await?;
    db.collection::<bson::Document>(ANNOUNCEMENT_COLLECTION_NAME)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "classroom": 1, "created_at": -1 })
                .build(),
            None,
        )
        .await?;
    db.collection::<bson::Document>(COMMENT_COLLECTION_NAME)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "subject.kind": 1, "subject.id": 1, "parent": 1 })
                .build(),
            None,
        )
        .await?;
    db.collection::<bson::Document>(USER_COLLECTION_NAME)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            None,
        )
        .await?;

    tracing::info!("MongoDB indexes are in place.");
    Ok(())
}
