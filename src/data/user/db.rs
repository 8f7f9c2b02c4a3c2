use super::{AccountRole, User};

use bson::doc;
use mongodb::options::{FindOneAndReplaceOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{filter, is_duplicate_key};
use crate::error::StoreError;

pub static USER_COLLECTION_NAME: &str = "users";

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn bad_email(email: impl ToString, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad email.")
            .insert_str("email", email)
            .detail(detail)
            .to_owned()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UserBatchData {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProfileData {
    pub name: String,
    #[schema(format = "email")]
    pub email: String,
}

impl ProfileData {
    pub fn validate(&self) -> Result<(), crate::resp::problem::Problem> {
        if self.name.trim().is_empty() {
            return Err(crate::resp::problem::problems::validation_problem(
                "Name can't be blank.",
            ));
        }
        if !self.email.contains('@') {
            return Err(problem::bad_email(
                self.email.clone(),
                "Not a valid e-mail address.",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Stored(User),
    /// Another directory record already holds the email.
    EmailTaken,
}

#[rocket::async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts or replaces the directory record with `user.id`. Emails are
    /// unique across records.
    async fn upsert_user(&self, user: &User) -> Result<UpsertOutcome, StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Records for the ids that exist, in no particular order.
    async fn get_users(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;

    /// `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDoc {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    name: String,
    email: String,
    #[serde(default)]
    role: Option<AccountRole>,
}

impl From<&User> for UserDoc {
    fn from(value: &User) -> Self {
        UserDoc {
            id: filter::uuid(value.id),
            name: value.name.clone(),
            email: value.email.clone(),
            role: value.role,
        }
    }
}

impl From<UserDoc> for User {
    fn from(value: UserDoc) -> Self {
        User {
            id: value.id.to_uuid_1(),
            name: value.name,
            email: value.email,
            role: value.role,
        }
    }
}

#[rocket::async_trait]
impl UserStore for Database {
    #[tracing::instrument(skip(self, user), fields(id = %user.id))]
    async fn upsert_user(&self, user: &User) -> Result<UpsertOutcome, StoreError> {
        let options = FindOneAndReplaceOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let result = self
            .collection::<UserDoc>(USER_COLLECTION_NAME)
            .find_one_and_replace(filter::by_id(user.id), UserDoc::from(user), options)
            .await;

        match result {
            Ok(stored) => Ok(UpsertOutcome::Stored(
                stored.map(User::from).unwrap_or_else(|| user.clone()),
            )),
            Err(e) if is_duplicate_key(&e) => Ok(UpsertOutcome::EmailTaken),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self
            .collection::<UserDoc>(USER_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?
            .map(User::from))
    }

    async fn get_users(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let documents: Vec<UserDoc> = self
            .collection::<UserDoc>(USER_COLLECTION_NAME)
            .find(filter::by_ids(ids), None)
            .await?
            .try_collect()
            .await?;

        Ok(documents.into_iter().map(User::from).collect())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .collection::<UserDoc>(USER_COLLECTION_NAME)
            .find_one(doc! { "email": email }, None)
            .await?
            .map(User::from))
    }
}
