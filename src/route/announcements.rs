use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::announcement::db::AnnouncementUpdateData;
use crate::data::announcement::Announcement;
use crate::hub::Classhub;
use crate::middleware::paging::PageState;
use crate::resp::principal::Principal;
use crate::resp::problem::Problem;
use crate::route::files::read_uploads;

#[derive(Debug, FromForm)]
pub struct AnnouncementForm<'r> {
    pub title: Option<String>,
    pub content: Option<String>,
    #[field(default = Vec::new())]
    pub files: Vec<TempFile<'r>>,
}

/// OpenAPI shape of [`AnnouncementForm`].
#[derive(ToSchema)]
pub struct AnnouncementUpload {
    pub title: String,
    pub content: String,
    #[schema(value_type = Option<Vec<String>>, format = Binary)]
    pub files: Vec<Vec<u8>>,
}

/// Post an announcement to a classroom the caller teaches
#[utoipa::path(
    params(
        ("cid", description = "classroom ID")
    ),
    request_body(content = AnnouncementUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Posted announcement", body = Announcement),
        (status = 400, description = "Blank title or content", body = Problem),
        (status = 403, description = "Caller isn't the teacher", body = Problem),
    ),
    security(("user_id" = []))
)]
#[post("/announcements/classroom/<cid>", data = "<form>")]
#[tracing::instrument(skip(hub, form))]
pub async fn announcement_create(
    cid: Uuid,
    form: Form<AnnouncementForm<'_>>,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<(Status, Json<Announcement>), Problem> {
    let uploads = read_uploads(&form.files, hub.max_upload_bytes()).await?;
    let files = hub.store_uploads(uploads).await?;

    let posted = hub
        .board()
        .create_announcement(
            cid,
            principal.user,
            form.title.as_deref(),
            form.content.as_deref(),
            files.clone(),
        )
        .await;

    match posted {
        Ok(announcement) => Ok((Status::Created, Json(announcement))),
        Err(e) => {
            hub.discard(&files).await;
            Err(e.into())
        }
    }
}

/// List announcements of a classroom
#[utoipa::path(
    params(
        ("cid", description = "classroom ID"),
        ("page" = Option<u32>, Query, description = "zero based page"),
        ("len" = Option<u32>, Query, description = "page length"),
    ),
    responses(
        (status = 200, description = "Announcements, newest first", body = Vec<Announcement>),
        (status = 403, description = "Caller isn't a member", body = Problem),
    ),
    security(("user_id" = []))
)]
#[get("/announcements/classroom/<cid>")]
#[tracing::instrument(skip(hub))]
pub async fn announcement_list(
    cid: Uuid,
    principal: Principal,
    page: PageState,
    hub: &State<Classhub>,
) -> Result<Json<Vec<Announcement>>, Problem> {
    let announcements = hub.board().list_for_classroom(cid, principal.user).await?;
    Ok(Json(page.apply(announcements)))
}

/// Edit an announcement
#[utoipa::path(
    params(
        ("id", description = "announcement ID")
    ),
    request_body = AnnouncementUpdateData,
    responses(
        (status = 200, description = "Updated announcement", body = Announcement),
        (status = 403, description = "Caller isn't the author", body = Problem),
        (status = 404, description = "Queried announcement doesn't exist", body = Problem),
    ),
    security(("user_id" = []))
)]
#[put("/announcements/<id>", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(hub, data))]
pub async fn announcement_update(
    id: Uuid,
    data: Json<AnnouncementUpdateData>,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<Json<Announcement>, Problem> {
    let updated = hub
        .board()
        .update_announcement(
            id,
            principal.user,
            data.title.as_deref(),
            data.content.as_deref(),
        )
        .await?;
    Ok(Json(updated))
}

/// Delete an announcement and its comments
#[utoipa::path(
    params(
        ("id", description = "announcement ID")
    ),
    responses(
        (status = 204, description = "Announcement deleted"),
        (status = 403, description = "Caller isn't the author", body = Problem),
        (status = 404, description = "Queried announcement doesn't exist", body = Problem),
    ),
    security(("user_id" = []))
)]
#[delete("/announcements/<id>")]
#[tracing::instrument(skip(hub))]
pub async fn announcement_delete(
    id: Uuid,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<Status, Problem> {
    hub.board().delete_announcement(id, principal.user).await?;
    Ok(Status::NoContent)
}

#[cfg(test)]
mod announcement_endpoints {
    use rocket::http::{ContentType, Status};
    use serde_json::json;
    use uuid::Uuid;

    use crate::data::announcement::Announcement;
    use crate::data::classroom::Classroom;
    use crate::route::testing::{as_user, client, multipart_with_fields};

    #[rocket::async_test]
    async fn v1_announcement_lifecycle_works() {
        let client = client().await;
        let teacher = Uuid::new_v4();

        let classroom: Classroom = client
            .post("/api/v1/classrooms")
            .header(ContentType::JSON)
            .header(as_user(teacher))
            .body(json!({ "name": "Music", "subject": "Arts" }).to_string())
            .dispatch()
            .await
            .into_json()
            .await
            .expect("classroom body");

        let (content_type, body) = multipart_with_fields(
            &[("title", "Concert"), ("content", "Friday at 6")],
            &[("program.txt", "Bach, Brahms")],
        );
        let response = client
            .post(format!("/api/v1/announcements/classroom/{}", classroom.id))
            .header(content_type)
            .header(as_user(teacher))
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let posted: Announcement = response.into_json().await.expect("announcement body");
        assert_eq!(posted.files.len(), 1);

        let response = client
            .put(format!("/api/v1/announcements/{}", posted.id))
            .header(ContentType::JSON)
            .header(as_user(teacher))
            .body(json!({ "content": "Friday at 7" }).to_string())
            .dispatch()
            .await;
        let updated: Announcement = response.into_json().await.expect("announcement body");
        assert_eq!(updated.content, "Friday at 7");

        let response = client
            .delete(format!("/api/v1/announcements/{}", posted.id))
            .header(as_user(Uuid::new_v4()))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .delete(format!("/api/v1/announcements/{}", posted.id))
            .header(as_user(teacher))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NoContent);

        let response = client
            .get(format!("/api/v1/announcements/classroom/{}", classroom.id))
            .header(as_user(teacher))
            .dispatch()
            .await;
        let listed: Vec<Announcement> = response.into_json().await.expect("list body");
        assert!(listed.is_empty());
    }
}
