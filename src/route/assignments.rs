use rocket::form::Form;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::assignment::db::{AssignmentCreateData, GradeData};
use crate::data::assignment::{Assignment, Submission};
use crate::hub::Classhub;
use crate::middleware::paging::PageState;
use crate::resp::principal::Principal;
use crate::resp::problem::Problem;
use crate::route::files::{read_uploads, FileUpload, UploadForm};

/// Create an assignment in a classroom the caller teaches
#[utoipa::path(
    params(
        ("cid", description = "classroom ID")
    ),
    request_body = AssignmentCreateData,
    responses(
        (status = 201, description = "Created assignment", body = Assignment),
        (status = 400, description = "Missing fields, negative points or past due date", body = Problem),
        (status = 403, description = "Caller isn't the teacher", body = Problem),
        (status = 404, description = "Queried classroom doesn't exist", body = Problem),
    ),
    security(("user_id" = []))
)]
#[post("/assignments/classroom/<cid>", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(hub, data))]
pub async fn assignment_create(
    cid: Uuid,
    data: Json<AssignmentCreateData>,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<(Status, Json<Assignment>), Problem> {
    let assignment = hub
        .ledger()
        .create_assignment(cid, principal.user, data.into_inner())
        .await?;
    Ok((Status::Created, Json(assignment)))
}

/// List assignments of a classroom
#[utoipa::path(
    params(
        ("cid", description = "classroom ID"),
        ("page" = Option<u32>, Query, description = "zero based page"),
        ("len" = Option<u32>, Query, description = "page length"),
    ),
    responses(
        (status = 200, description = "Assignments, newest first", body = Vec<Assignment>),
        (status = 403, description = "Caller isn't a member", body = Problem),
    ),
    security(("user_id" = []))
)]
#[get("/assignments/classroom/<cid>")]
#[tracing::instrument(skip(hub))]
pub async fn assignment_list(
    cid: Uuid,
    principal: Principal,
    page: PageState,
    hub: &State<Classhub>,
) -> Result<Json<Vec<Assignment>>, Problem> {
    let assignments = hub.ledger().list_for_classroom(cid, principal.user).await?;
    Ok(Json(page.apply(assignments)))
}

/// Get an assignment
///
/// Students only receive their own submission.
#[utoipa::path(
    params(
        ("id", description = "assignment ID")
    ),
    responses(
        (status = 200, description = "Assignment information", body = Assignment),
        (status = 403, description = "Caller isn't a member", body = Problem),
        (status = 404, description = "Queried assignment doesn't exist", body = Problem),
    ),
    security(("user_id" = []))
)]
#[get("/assignments/<id>")]
#[tracing::instrument(skip(hub))]
pub async fn assignment_get(
    id: Uuid,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<Json<Assignment>, Problem> {
    let assignment = hub.ledger().get_assignment(id, principal.user).await?;
    Ok(Json(assignment))
}

/// Submit or resubmit files for an assignment
#[utoipa::path(
    params(
        ("id", description = "assignment ID")
    ),
    request_body(content = FileUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Stored submission", body = Submission),
        (status = 400, description = "No files, file too large or due date passed", body = Problem),
        (status = 403, description = "Caller isn't a student of the classroom", body = Problem),
        (status = 404, description = "Queried assignment doesn't exist", body = Problem),
    ),
    security(("user_id" = []))
)]
#[post("/assignments/<id>/submit", format = "multipart/form-data", data = "<upload>", rank = 2)]
#[tracing::instrument(skip(hub, upload))]
pub async fn assignment_submit(
    id: Uuid,
    upload: Form<UploadForm<'_>>,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<Json<Submission>, Problem> {
    let uploads = read_uploads(&upload.files, hub.max_upload_bytes()).await?;
    let files = hub.store_uploads(uploads).await?;

    match hub.ledger().submit(id, principal.user, files.clone()).await {
        Ok(stored) => {
            hub.discard(&stored.replaced).await;
            Ok(Json(stored.submission))
        }
        Err(e) => {
            hub.discard(&files).await;
            Err(e.into())
        }
    }
}

/// Grade a submission
#[utoipa::path(
    params(
        ("id", description = "assignment ID"),
        ("sid", description = "submission ID"),
    ),
    request_body = GradeData,
    responses(
        (status = 200, description = "Assignment with the graded submission", body = Assignment),
        (status = 400, description = "Grade outside 0 to 100", body = Problem),
        (status = 403, description = "Caller isn't the teacher", body = Problem),
        (status = 404, description = "Assignment or submission doesn't exist", body = Problem),
    ),
    security(("user_id" = []))
)]
#[post("/assignments/<id>/grade/<sid>", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(hub, data))]
pub async fn assignment_grade(
    id: Uuid,
    sid: Uuid,
    data: Json<GradeData>,
    principal: Principal,
    hub: &State<Classhub>,
) -> Result<Json<Assignment>, Problem> {
    let data = data.into_inner();
    let assignment = hub
        .ledger()
        .grade(id, sid, principal.user, data.grade, data.feedback)
        .await?;
    Ok(Json(assignment))
}

#[cfg(test)]
mod assignment_endpoints {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::data::assignment::{Assignment, Submission};
    use crate::data::classroom::Classroom;
    use crate::hub::Classhub;
    use crate::route::testing::{as_user, client, client_with, multipart};
    use crate::storage::MemoryStorage;

    struct Class {
        classroom: Classroom,
        teacher: Uuid,
        student: Uuid,
    }

    async fn class(client: &Client) -> Class {
        let teacher = Uuid::new_v4();
        let student = Uuid::new_v4();

        let classroom: Classroom = client
            .post("/api/v1/classrooms")
            .header(ContentType::JSON)
            .header(as_user(teacher))
            .body(json!({ "name": "Biology", "subject": "Science" }).to_string())
            .dispatch()
            .await
            .into_json()
            .await
            .expect("classroom body");
        client
            .post("/api/v1/classrooms/join")
            .header(ContentType::JSON)
            .header(as_user(student))
            .body(json!({ "code": classroom.code }).to_string())
            .dispatch()
            .await;

        Class {
            classroom,
            teacher,
            student,
        }
    }

    async fn assignment(client: &Client, class: &Class) -> Assignment {
        let response = client
            .post(format!("/api/v1/assignments/classroom/{}", class.classroom.id))
            .header(ContentType::JSON)
            .header(as_user(class.teacher))
            .body(
                json!({
                    "title": "Cell diagram",
                    "description": "Label every organelle.",
                    "due_date": Utc::now() + Duration::hours(1),
                    "points": 50.0
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        response.into_json().await.expect("assignment body")
    }

    #[rocket::async_test]
    async fn v1_assignment_submit_and_grade_work() {
        let client = client().await;
        let class = class(&client).await;
        let assignment = assignment(&client, &class).await;

        let (content_type, body) = multipart(&[("cell.txt", "nucleus, ribosome")]);
        let response = client
            .post(format!("/api/v1/assignments/{}/submit", assignment.id))
            .header(content_type)
            .header(as_user(class.student))
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let submission: Submission = response.into_json().await.expect("submission body");
        assert_eq!(submission.files.len(), 1);

        let (content_type, body) = multipart(&[("a.txt", "one"), ("b.txt", "two")]);
        let response = client
            .post(format!("/api/v1/assignments/{}/submit", assignment.id))
            .header(content_type)
            .header(as_user(class.student))
            .body(body)
            .dispatch()
            .await;
        let resubmitted: Submission = response.into_json().await.expect("submission body");
        assert_eq!(resubmitted.id, submission.id);
        assert_eq!(resubmitted.files.len(), 2);

        let response = client
            .post(format!(
                "/api/v1/assignments/{}/grade/{}",
                assignment.id, submission.id
            ))
            .header(ContentType::JSON)
            .header(as_user(class.teacher))
            .body(json!({ "grade": 85, "feedback": "Nice labels" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let graded: Assignment = response.into_json().await.expect("assignment body");
        assert_eq!(graded.submissions[0].grade, Some(85.0));

        let response = client
            .post(format!(
                "/api/v1/assignments/{}/grade/{}",
                assignment.id, submission.id
            ))
            .header(ContentType::JSON)
            .header(as_user(class.student))
            .body(json!({ "grade": 100 }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .post(format!(
                "/api/v1/assignments/{}/grade/{}",
                assignment.id, submission.id
            ))
            .header(ContentType::JSON)
            .header(as_user(class.teacher))
            .body(json!({ "grade": 101 }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn v1_assignment_resubmit_removes_replaced_files() {
        let files = Arc::new(MemoryStorage::new());
        let client = client_with(Classhub::in_memory().with_files(files.clone())).await;
        let class = class(&client).await;
        let assignment = assignment(&client, &class).await;

        let (content_type, body) = multipart(&[("a.txt", "first try")]);
        let first: Submission = client
            .post(format!("/api/v1/assignments/{}/submit", assignment.id))
            .header(content_type)
            .header(as_user(class.student))
            .body(body)
            .dispatch()
            .await
            .into_json()
            .await
            .expect("submission body");
        assert_eq!(files.len().await, 1);

        let (content_type, body) = multipart(&[("b.txt", "second"), ("c.txt", "try")]);
        let response = client
            .post(format!("/api/v1/assignments/{}/submit", assignment.id))
            .header(content_type)
            .header(as_user(class.student))
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let second: Submission = response.into_json().await.expect("submission body");
        assert_eq!(files.len().await, second.files.len());

        let response = client
            .get(format!("/api/v1/files/{}", first.files[0]))
            .header(as_user(class.student))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
        for reference in &second.files {
            let response = client
                .get(format!("/api/v1/files/{}", reference))
                .header(as_user(class.student))
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Ok);
        }
    }

    #[rocket::async_test]
    async fn v1_assignment_rejects_bad_requests() {
        let client = client().await;
        let class = class(&client).await;

        let response = client
            .post(format!("/api/v1/assignments/classroom/{}", class.classroom.id))
            .header(ContentType::JSON)
            .header(as_user(class.teacher))
            .body(
                json!({
                    "title": "Late",
                    "due_date": Utc::now() - Duration::hours(1),
                    "points": 10
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let problem: Value = response.into_json().await.expect("problem body");
        assert_eq!(problem["status"], 400);

        let assignment = assignment(&client, &class).await;
        let (content_type, body) = multipart(&[("x.txt", "x")]);
        let response = client
            .post(format!("/api/v1/assignments/{}/submit", assignment.id))
            .header(content_type)
            .header(as_user(class.teacher))
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .get(format!("/api/v1/assignments/{}", Uuid::new_v4()))
            .header(as_user(class.student))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .get(format!("/api/v1/assignments/classroom/{}", class.classroom.id))
            .header(as_user(class.student))
            .dispatch()
            .await;
        let listed: Vec<Assignment> = response.into_json().await.expect("list body");
        assert_eq!(listed.len(), 1);
    }
}
