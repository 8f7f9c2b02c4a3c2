use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::classroom::db::{ClassroomCreateData, InviteData, JoinData};
use crate::data::classroom::Classroom;
use crate::hub::Classhub;
use crate::invite::InviteReport;
use crate::middleware::paging::PageState;
use crate::resp::principal::Principal;
use crate::resp::problem::Problem;

/// Create a classroom taught by the caller
#[utoipa::path(
    request_body = ClassroomCreateData,
    responses(
        (status = 201, description = "Created classroom with its join code", body = Classroom),
        (status = 400, description = "Missing name or subject", body = Problem),
        (status = 401, description = "Missing caller identity", body = Problem),
    ),
    security(("user_id" = []))
)]
#[post("/classrooms", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(hub, data))]
pub async fn classroom_create(
    data: Json<ClassroomCreateData>,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<(Status, Json<Classroom>), Problem> {
    let data = data.into_inner();
    let classroom = hub
        .registry()
        .create_classroom(
            data.name.as_deref(),
            data.subject.as_deref(),
            data.description.as_deref(),
            principal.user,
        )
        .await?;

    Ok((Status::Created, Json(classroom)))
}

/// List classrooms the caller teaches or attends
#[utoipa::path(
    params(
        ("page" = Option<u32>, Query, description = "zero based page"),
        ("len" = Option<u32>, Query, description = "page length"),
    ),
    responses(
        (status = 200, description = "Classrooms, newest first", body = Vec<Classroom>),
        (status = 401, description = "Missing caller identity", body = Problem),
    ),
    security(("user_id" = []))
)]
#[get("/classrooms/my")]
#[tracing::instrument(skip(hub))]
pub async fn classroom_list_my(
    principal: Principal,
    page: PageState,
    hub: &State<Classhub>,
) -> Result<Json<Vec<Classroom>>, Problem> {
    let classrooms = hub.registry().list_my_classrooms(principal.user).await?;
    Ok(Json(page.apply(classrooms)))
}

/// Join a classroom as a student using its code
#[utoipa::path(
    request_body = JoinData,
    responses(
        (status = 200, description = "Joined classroom", body = Classroom),
        (status = 404, description = "No classroom with that code", body = Problem),
        (status = 409, description = "Already a member or the teacher", body = Problem),
    ),
    security(("user_id" = []))
)]
#[post("/classrooms/join", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(hub))]
pub async fn classroom_join(
    data: Json<JoinData>,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<Json<Classroom>, Problem> {
    let classroom = hub
        .registry()
        .join_classroom(&data.code, principal.user)
        .await?;
    Ok(Json(classroom))
}

/// Get a classroom the caller belongs to
#[utoipa::path(
    params(
        ("id", description = "classroom ID")
    ),
    responses(
        (status = 200, description = "Classroom information", body = Classroom),
        (status = 403, description = "Caller isn't a member", body = Problem),
        (status = 404, description = "Queried classroom doesn't exist", body = Problem),
    ),
    security(("user_id" = []))
)]
#[get("/classrooms/<id>")]
#[tracing::instrument(skip(hub))]
pub async fn classroom_get(
    id: Uuid,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<Json<Classroom>, Problem> {
    let classroom = hub
        .registry()
        .get_accessible_classroom(id, principal.user)
        .await?;
    Ok(Json(classroom))
}

/// Invite directory users into a classroom by email
#[utoipa::path(
    params(
        ("id", description = "classroom ID")
    ),
    request_body = InviteData,
    responses(
        (status = 200, description = "Per-email outcome", body = InviteReport),
        (status = 400, description = "No emails or unknown role", body = Problem),
        (status = 403, description = "Caller isn't the teacher", body = Problem),
    ),
    security(("user_id" = []))
)]
#[post("/classrooms/<id>/invite", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(hub, data))]
pub async fn classroom_invite(
    id: Uuid,
    data: Json<InviteData>,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<Json<InviteReport>, Problem> {
    let report = hub
        .invitations()
        .invite(id, principal.user, &data.emails, &data.role)
        .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod classroom_endpoints {
    use rocket::http::{ContentType, Status};
    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::data::classroom::Classroom;
    use crate::data::user::User;
    use crate::route::testing::{as_user, client};

    #[rocket::async_test]
    async fn v1_classroom_create_and_join_work() {
        let client = client().await;
        let teacher = Uuid::new_v4();
        let student = Uuid::new_v4();

        let response = client
            .post("/api/v1/classrooms")
            .header(ContentType::JSON)
            .header(as_user(teacher))
            .body(json!({ "name": "Algebra", "subject": "Math" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let classroom: Classroom = response.into_json().await.expect("classroom body");
        assert_eq!(classroom.code.len(), 6);

        let response = client
            .post("/api/v1/classrooms/join")
            .header(ContentType::JSON)
            .header(as_user(student))
            .body(json!({ "code": classroom.code.to_lowercase() }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .post("/api/v1/classrooms/join")
            .header(ContentType::JSON)
            .header(as_user(teacher))
            .body(json!({ "code": classroom.code }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
        assert_eq!(
            response.content_type(),
            Some(ContentType::new("application", "problem+json"))
        );

        let response = client
            .get("/api/v1/classrooms/my")
            .header(as_user(student))
            .dispatch()
            .await;
        let mine: Vec<Classroom> = response.into_json().await.expect("list body");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].students, vec![student]);
    }

    #[rocket::async_test]
    async fn v1_classroom_requires_identity_and_membership() {
        let client = client().await;
        let teacher = Uuid::new_v4();

        let response = client
            .post("/api/v1/classrooms")
            .header(ContentType::JSON)
            .body(json!({ "name": "Algebra", "subject": "Math" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client
            .post("/api/v1/classrooms")
            .header(ContentType::JSON)
            .header(as_user(teacher))
            .body(json!({ "name": "Algebra" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let problem: Value = response.into_json().await.expect("problem body");
        assert_eq!(problem["status"], 400);

        let classroom: Classroom = client
            .post("/api/v1/classrooms")
            .header(ContentType::JSON)
            .header(as_user(teacher))
            .body(json!({ "name": "Algebra", "subject": "Math" }).to_string())
            .dispatch()
            .await
            .into_json()
            .await
            .expect("classroom body");

        let response = client
            .get(format!("/api/v1/classrooms/{}", classroom.id))
            .header(as_user(Uuid::new_v4()))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .get(format!("/api/v1/classrooms/{}", Uuid::new_v4()))
            .header(as_user(teacher))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn v1_classroom_invite_reports_buckets() {
        let client = client().await;
        let teacher = Uuid::new_v4();
        let invitee = User::new(Uuid::new_v4(), "Ida", "ida@school.edu");

        client
            .put("/api/v1/users/me")
            .header(ContentType::JSON)
            .header(as_user(invitee.id))
            .body(json!({ "name": invitee.name, "email": "IDA@school.edu" }).to_string())
            .dispatch()
            .await;

        let classroom: Classroom = client
            .post("/api/v1/classrooms")
            .header(ContentType::JSON)
            .header(as_user(teacher))
            .body(json!({ "name": "Art", "subject": "Arts" }).to_string())
            .dispatch()
            .await
            .into_json()
            .await
            .expect("classroom body");

        let response = client
            .post(format!("/api/v1/classrooms/{}/invite", classroom.id))
            .header(ContentType::JSON)
            .header(as_user(teacher))
            .body(
                json!({
                    "emails": ["ida@school.edu", "ghost@school.edu"],
                    "role": "student"
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let report: Value = response.into_json().await.expect("report body");
        assert_eq!(report["success"], json!(["ida@school.edu"]));
        assert_eq!(report["not_found"], json!(["ghost@school.edu"]));
        assert_eq!(report["already_member"], json!([]));
        assert_eq!(report["conflict_role"], json!([]));
    }
}
