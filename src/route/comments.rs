use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::comment::db::{CommentCreateData, CommentUpdateData};
use crate::data::comment::{Comment, CommentThread};
use crate::hub::Classhub;
use crate::middleware::paging::PageState;
use crate::resp::principal::Principal;
use crate::resp::problem::Problem;

/// Comment on an announcement or assignment
#[utoipa::path(
    params(
        ("cid", description = "classroom ID")
    ),
    request_body = CommentCreateData,
    responses(
        (status = 201, description = "Posted comment", body = Comment),
        (status = 400, description = "Blank content, unknown item type or mismatched parent", body = Problem),
        (status = 403, description = "Caller isn't a member", body = Problem),
        (status = 404, description = "Item or parent comment doesn't exist", body = Problem),
    ),
    security(("user_id" = []))
)]
#[post("/comments/classroom/<cid>", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(hub, data))]
pub async fn comment_create(
    cid: Uuid,
    data: Json<CommentCreateData>,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<(Status, Json<Comment>), Problem> {
    let comment = hub
        .threads()
        .create_comment(
            cid,
            principal.user,
            &data.item_type,
            data.item_id,
            data.content.as_deref(),
            data.parent_comment_id,
        )
        .await?;
    Ok((Status::Created, Json(comment)))
}

/// List top level comments of an item with their replies
#[utoipa::path(
    params(
        ("cid", description = "classroom ID"),
        ("item_type", description = "`announcement` or `assignment`"),
        ("item_id", description = "ID of the commented item"),
        ("page" = Option<u32>, Query, description = "zero based page"),
        ("len" = Option<u32>, Query, description = "page length"),
    ),
    responses(
        (status = 200, description = "Threads, newest first", body = Vec<CommentThread>),
        (status = 400, description = "Unknown item type", body = Problem),
        (status = 403, description = "Caller isn't a member", body = Problem),
    ),
    security(("user_id" = []))
)]
#[get("/comments/classroom/<cid>?<item_type>&<item_id>")]
#[tracing::instrument(skip(hub))]
pub async fn comment_list(
    cid: Uuid,
    item_type: &str,
    item_id: Uuid,
    principal: Principal,
    page: PageState,
    hub: &State<Classhub>,
) -> Result<Json<Vec<CommentThread>>, Problem> {
    let threads = hub
        .threads()
        .list_top_level_for_item(cid, item_type, item_id, principal.user)
        .await?;
    Ok(Json(page.apply(threads)))
}

/// Edit a comment
#[utoipa::path(
    params(
        ("id", description = "comment ID")
    ),
    request_body = CommentUpdateData,
    responses(
        (status = 200, description = "Edited comment", body = Comment),
        (status = 403, description = "Caller isn't the author", body = Problem),
        (status = 404, description = "Queried comment doesn't exist", body = Problem),
    ),
    security(("user_id" = []))
)]
#[put("/comments/<id>", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(hub, data))]
pub async fn comment_update(
    id: Uuid,
    data: Json<CommentUpdateData>,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<Json<Comment>, Problem> {
    let comment = hub
        .threads()
        .update_comment(id, principal.user, data.content.as_deref())
        .await?;
    Ok(Json(comment))
}

/// Delete a comment with all of its replies
#[utoipa::path(
    params(
        ("id", description = "comment ID")
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Caller is neither author nor teacher", body = Problem),
        (status = 404, description = "Queried comment doesn't exist", body = Problem),
    ),
    security(("user_id" = []))
)]
#[delete("/comments/<id>")]
#[tracing::instrument(skip(hub))]
pub async fn comment_delete(
    id: Uuid,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<Status, Problem> {
    hub.threads().delete_comment(id, principal.user).await?;
    Ok(Status::NoContent)
}
