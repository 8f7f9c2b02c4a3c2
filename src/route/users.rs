use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::user::db::{ProfileData, UpsertOutcome, UserBatchData};
use crate::data::user::User;
use crate::error::ClassError;
use crate::hub::Classhub;
use crate::resp::principal::Principal;
use crate::resp::problem::Problem;

/// Register or update the caller's directory record
///
/// Invitations resolve emails against these records.
#[utoipa::path(
    request_body = ProfileData,
    responses(
        (status = 200, description = "Stored directory record", body = User),
        (status = 400, description = "Invalid name or email", body = Problem),
        (status = 401, description = "Missing caller identity", body = Problem),
        (status = 409, description = "Email belongs to another user", body = Problem),
    ),
    security(("user_id" = []))
)]
#[put("/users/me", format = "application/json", data = "<profile>")]
#[tracing::instrument(skip(hub))]
pub async fn user_update_me(
    profile: Json<ProfileData>,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<Json<User>, Problem> {
    profile.validate()?;

    let mut user = User::new(principal.user, profile.name.trim(), &profile.email);
    user.role = principal.account_role;

    match hub.store().upsert_user(&user).await? {
        UpsertOutcome::Stored(stored) => Ok(Json(stored)),
        UpsertOutcome::EmailTaken => {
            tracing::warn!(user = %principal.user, "email already registered");
            Err(ClassError::EmailTaken(user.email).into())
        }
    }
}

/// Get the caller's directory record
#[utoipa::path(
    responses(
        (status = 200, description = "Directory record of the caller", body = User),
        (status = 404, description = "Caller never registered a profile", body = Problem),
    ),
    security(("user_id" = []))
)]
#[get("/users/me")]
#[tracing::instrument(skip(hub))]
pub async fn user_get_me(principal: Principal, hub: &State<Classhub>) -> Result<Json<User>, Problem> {
    user_get(principal.user, principal, hub).await
}

/// Get a directory record
#[utoipa::path(
    params(
        ("id", description = "user ID")
    ),
    responses(
        (status = 200, description = "Information about existing user", body = User),
        (status = 404, description = "Queried user doesn't exist", body = Problem),
    ),
    security(("user_id" = []))
)]
#[get("/users/<id>")]
#[tracing::instrument(skip(hub))]
pub async fn user_get(
    id: Uuid,
    _principal: Principal,
    hub: &State<Classhub>,
) -> Result<Json<User>, Problem> {
    match hub.store().get_user(id).await? {
        Some(user) => Ok(Json(user)),
        None => Err(ClassError::not_found("user").into()),
    }
}

/// Resolve several directory records at once
///
/// Only records of the caller and of users sharing a classroom with them are
/// returned. Unknown ids are skipped.
#[utoipa::path(
    request_body = UserBatchData,
    responses(
        (status = 200, description = "Known directory records", body = [User]),
        (status = 401, description = "Missing caller identity", body = Problem),
    ),
    security(("user_id" = []))
)]
#[post("/users/batch", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(hub, data), fields(ids = data.ids.len()))]
pub async fn user_get_batch(
    data: Json<UserBatchData>,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<Json<Vec<User>>, Problem> {
    let known = hub.registry().classmates_of(principal.user).await?;
    let ids: Vec<Uuid> = data
        .ids
        .iter()
        .copied()
        .filter(|it| known.contains(it))
        .collect();
    if ids.is_empty() {
        return Ok(Json(vec![]));
    }

    Ok(Json(hub.store().get_users(&ids).await?))
}

///////////////////////
//       TESTS
///////////////////////
