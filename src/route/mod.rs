use std::collections::BTreeMap;

use rocket::{Build, Rocket, Route};

pub mod announcements;
pub mod assignments;
pub mod classrooms;
pub mod comments;
pub mod files;
pub mod users;

use announcements::*;
use assignments::*;
use classrooms::*;
use comments::*;
use files::*;
use users::*;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    data::{
        announcement::{self as ad, db::AnnouncementUpdateData},
        assignment::{self as asd, db::AssignmentCreateData, db::GradeData},
        classroom::{self as cd, db::ClassroomCreateData, db::InviteData, db::JoinData},
        comment::{self as cmd, db::CommentCreateData, db::CommentUpdateData},
        user::{self as ud, db::ProfileData, db::UserBatchData},
    },
    invite::InviteReport,
    resp::{principal::doc::UserHeaderAuth, problem::Problem},
    storage::FileRef,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        classroom_create,
        classroom_list_my,
        classroom_join,
        classroom_get,
        classroom_invite,
        assignment_create,
        assignment_list,
        assignment_get,
        assignment_submit,
        assignment_grade,
        announcement_create,
        announcement_list,
        announcement_update,
        announcement_delete,
        comment_create,
        comment_list,
        comment_update,
        comment_delete,
        user_update_me,
        user_get_me,
        user_get,
        user_get_batch,
        file_get
    ),
    components(schemas(
        cd::Classroom,
        asd::Assignment,
        asd::Submission,
        ad::Announcement,
        cmd::Comment,
        cmd::CommentSubject,
        cmd::CommentThread,
        cmd::ItemKind,
        ud::User,
        ud::AccountRole,
        FileRef,
        InviteReport,
        ClassroomCreateData,
        JoinData,
        InviteData,
        AssignmentCreateData,
        GradeData,
        AnnouncementUpdateData,
        CommentCreateData,
        CommentUpdateData,
        ProfileData,
        UserBatchData,
        FileUpload,
        AnnouncementUpload,
        Problem
    )),
    modifiers(&UserHeaderAuth, &V1_PREFIX)
)]
pub struct ApiDocV1;

pub struct PathPrefix(pub &'static str);
static V1_PREFIX: PathPrefix = PathPrefix("/api/v1");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

pub fn api_v1() -> Vec<Route> {
    routes![
        classroom_create,
        classroom_list_my,
        classroom_join,
        classroom_get,
        classroom_invite,
        assignment_create,
        assignment_list,
        assignment_get,
        assignment_submit,
        assignment_grade,
        announcement_create,
        announcement_list,
        announcement_update,
        announcement_delete,
        comment_create,
        comment_list,
        comment_update,
        comment_delete,
        user_update_me,
        user_get_me,
        user_get,
        user_get_batch,
        file_get
    ]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/api/v1", api_v1()).mount(
        "/",
        SwaggerUi::new("/swagger/<_..>").url("/api/v1/openapi.json", ApiDocV1::openapi()),
    )
}
