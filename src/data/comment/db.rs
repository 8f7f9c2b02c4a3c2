use super::{Comment, CommentSubject};

use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{filter, time};
use crate::error::StoreError;

pub static COMMENT_COLLECTION_NAME: &str = "comments";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CommentCreateData {
    /// `announcement` or `assignment`
    pub item_type: String,
    pub item_id: Uuid,
    pub content: Option<String>,
    #[serde(default)]
    pub parent_comment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CommentUpdateData {
    pub content: Option<String>,
}

#[rocket::async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError>;

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, StoreError>;

    /// Comments with the given ids, in no particular order.
    async fn get_comments(&self, ids: &[Uuid]) -> Result<Vec<Comment>, StoreError>;

    /// Comments without a parent attached to `subject`, newest first.
    async fn top_level_comments(
        &self,
        classroom: Uuid,
        subject: CommentSubject,
    ) -> Result<Vec<Comment>, StoreError>;

    /// Appends `reply` to the parent's replies. `false` if the parent is gone.
    async fn push_reply(&self, parent: Uuid, reply: Uuid) -> Result<bool, StoreError>;

    async fn pull_reply(&self, parent: Uuid, reply: Uuid) -> Result<(), StoreError>;

    async fn update_comment_content(
        &self,
        id: Uuid,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Comment>, StoreError>;

    /// Returns how many comments were removed.
    async fn delete_comments(&self, ids: &[Uuid]) -> Result<u64, StoreError>;

    /// Removes every comment attached to `subject`, replies included.
    async fn delete_comments_for_subject(&self, subject: CommentSubject) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
enum SubjectDoc {
    Announcement(bson::Uuid),
    Assignment(bson::Uuid),
}

impl From<CommentSubject> for SubjectDoc {
    fn from(value: CommentSubject) -> Self {
        match value {
            CommentSubject::Announcement(id) => SubjectDoc::Announcement(filter::uuid(id)),
            CommentSubject::Assignment(id) => SubjectDoc::Assignment(filter::uuid(id)),
        }
    }
}

impl From<SubjectDoc> for CommentSubject {
    fn from(value: SubjectDoc) -> Self {
        match value {
            SubjectDoc::Announcement(id) => CommentSubject::Announcement(id.to_uuid_1()),
            SubjectDoc::Assignment(id) => CommentSubject::Assignment(id.to_uuid_1()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommentDoc {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    classroom: bson::Uuid,
    user: bson::Uuid,
    content: String,
    subject: SubjectDoc,
    #[serde(default)]
    parent: Option<bson::Uuid>,
    #[serde(default)]
    replies: Vec<bson::Uuid>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
}

impl From<&Comment> for CommentDoc {
    fn from(value: &Comment) -> Self {
        CommentDoc {
            id: filter::uuid(value.id),
            classroom: filter::uuid(value.classroom),
            user: filter::uuid(value.user),
            content: value.content.clone(),
            subject: value.subject.into(),
            parent: value.parent.map(filter::uuid),
            replies: value.replies.iter().copied().map(filter::uuid).collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<CommentDoc> for Comment {
    fn from(value: CommentDoc) -> Self {
        Comment {
            id: value.id.to_uuid_1(),
            classroom: value.classroom.to_uuid_1(),
            user: value.user.to_uuid_1(),
            content: value.content,
            subject: value.subject.into(),
            parent: value.parent.map(|it| it.to_uuid_1()),
            replies: value.replies.into_iter().map(|it| it.to_uuid_1()).collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

fn subject_filter(subject: CommentSubject) -> bson::Document {
    doc! {
        "subject.kind": subject.kind().to_string(),
        "subject.id": filter::uuid(subject.id()),
    }
}

#[rocket::async_trait]
impl CommentStore for Database {
    #[tracing::instrument(skip(self, comment), fields(id = %comment.id))]
    async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        self.collection::<CommentDoc>(COMMENT_COLLECTION_NAME)
            .insert_one(CommentDoc::from(comment), None)
            .await?;
        Ok(())
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        Ok(self
            .collection::<CommentDoc>(COMMENT_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?
            .map(Comment::from))
    }

    async fn get_comments(&self, ids: &[Uuid]) -> Result<Vec<Comment>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let documents: Vec<CommentDoc> = self
            .collection::<CommentDoc>(COMMENT_COLLECTION_NAME)
            .find(filter::by_ids(ids), None)
            .await?
            .try_collect()
            .await?;

        Ok(documents.into_iter().map(Comment::from).collect())
    }

    async fn top_level_comments(
        &self,
        classroom: Uuid,
        subject: CommentSubject,
    ) -> Result<Vec<Comment>, StoreError> {
        let mut query = subject_filter(subject);
        query.insert("classroom", filter::uuid(classroom));
        query.insert("parent", bson::Bson::Null);

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let documents: Vec<CommentDoc> = self
            .collection::<CommentDoc>(COMMENT_COLLECTION_NAME)
            .find(query, options)
            .await?
            .try_collect()
            .await?;

        Ok(documents.into_iter().map(Comment::from).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn push_reply(&self, parent: Uuid, reply: Uuid) -> Result<bool, StoreError> {
        let result = self
            .collection::<CommentDoc>(COMMENT_COLLECTION_NAME)
            .update_one(
                filter::by_id(parent),
                doc! { "$push": { "replies": filter::uuid(reply) } },
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    #[tracing::instrument(skip(self))]
    async fn pull_reply(&self, parent: Uuid, reply: Uuid) -> Result<(), StoreError> {
        self.collection::<CommentDoc>(COMMENT_COLLECTION_NAME)
            .update_one(
                filter::by_id(parent),
                doc! { "$pull": { "replies": filter::uuid(reply) } },
                None,
            )
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, content))]
    async fn update_comment_content(
        &self,
        id: Uuid,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Comment>, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .collection::<CommentDoc>(COMMENT_COLLECTION_NAME)
            .find_one_and_update(
                filter::by_id(id),
                doc! { "$set": { "content": content, "updated_at": time::bson(updated_at) } },
                options,
            )
            .await?
            .map(Comment::from))
    }

    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete_comments(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = self
            .collection::<CommentDoc>(COMMENT_COLLECTION_NAME)
            .delete_many(filter::by_ids(ids), None)
            .await?;
        Ok(result.deleted_count)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_comments_for_subject(&self, subject: CommentSubject) -> Result<u64, StoreError> {
        let result = self
            .collection::<CommentDoc>(COMMENT_COLLECTION_NAME)
            .delete_many(subject_filter(subject), None)
            .await?;
        Ok(result.deleted_count)
    }
}
