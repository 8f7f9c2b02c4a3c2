use super::Announcement;

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::filter;
use crate::error::StoreError;
use crate::storage::FileRef;

pub static ANNOUNCEMENT_COLLECTION_NAME: &str = "announcements";

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AnnouncementUpdateData {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[rocket::async_trait]
pub trait AnnouncementStore: Send + Sync {
    async fn insert_announcement(&self, announcement: &Announcement) -> Result<(), StoreError>;

    async fn get_announcement(&self, id: Uuid) -> Result<Option<Announcement>, StoreError>;

    /// Newest first.
    async fn announcements_for_classroom(
        &self,
        classroom: Uuid,
    ) -> Result<Vec<Announcement>, StoreError>;

    /// Sets whichever of `title` and `content` are given.
    async fn update_announcement(
        &self,
        id: Uuid,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Option<Announcement>, StoreError>;

    async fn delete_announcement(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnnouncementDoc {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    classroom: bson::Uuid,
    created_by: bson::Uuid,
    title: String,
    content: String,
    #[serde(default)]
    files: Vec<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<&Announcement> for AnnouncementDoc {
    fn from(value: &Announcement) -> Self {
        AnnouncementDoc {
            id: filter::uuid(value.id),
            classroom: filter::uuid(value.classroom),
            created_by: filter::uuid(value.created_by),
            title: value.title.clone(),
            content: value.content.clone(),
            files: value.files.iter().map(|it| it.0.clone()).collect(),
            created_at: value.created_at,
        }
    }
}

impl From<AnnouncementDoc> for Announcement {
    fn from(value: AnnouncementDoc) -> Self {
        Announcement {
            id: value.id.to_uuid_1(),
            classroom: value.classroom.to_uuid_1(),
            created_by: value.created_by.to_uuid_1(),
            title: value.title,
            content: value.content,
            files: value.files.into_iter().map(FileRef).collect(),
            created_at: value.created_at,
        }
    }
}

#[rocket::async_trait]
impl AnnouncementStore for Database {
    #[tracing::instrument(skip(self, announcement), fields(id = %announcement.id))]
    async fn insert_announcement(&self, announcement: &Announcement) -> Result<(), StoreError> {
        self.collection::<AnnouncementDoc>(ANNOUNCEMENT_COLLECTION_NAME)
            .insert_one(AnnouncementDoc::from(announcement), None)
            .await?;
        Ok(())
    }

    async fn get_announcement(&self, id: Uuid) -> Result<Option<Announcement>, StoreError> {
        Ok(self
            .collection::<AnnouncementDoc>(ANNOUNCEMENT_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?
            .map(Announcement::from))
    }

    async fn announcements_for_classroom(
        &self,
        classroom: Uuid,
    ) -> Result<Vec<Announcement>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let documents: Vec<AnnouncementDoc> = self
            .collection::<AnnouncementDoc>(ANNOUNCEMENT_COLLECTION_NAME)
            .find(filter::by_classroom(classroom), options)
            .await?
            .try_collect()
            .await?;

        Ok(documents.into_iter().map(Announcement::from).collect())
    }

    #[tracing::instrument(skip(self, title, content))]
    async fn update_announcement(
        &self,
        id: Uuid,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Option<Announcement>, StoreError> {
        let mut set = Document::new();
        if let Some(title) = title {
            set.insert("title", title);
        }
        if let Some(content) = content {
            set.insert("content", content);
        }
        if set.is_empty() {
            return self.get_announcement(id).await;
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .collection::<AnnouncementDoc>(ANNOUNCEMENT_COLLECTION_NAME)
            .find_one_and_update(filter::by_id(id), doc! { "$set": set }, options)
            .await?
            .map(Announcement::from))
    }

    #[tracing::instrument(skip(self))]
    async fn delete_announcement(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = self
            .collection::<AnnouncementDoc>(ANNOUNCEMENT_COLLECTION_NAME)
            .delete_one(filter::by_id(id), None)
            .await?;
        Ok(result.deleted_count == 1)
    }
}
