use rocket::http::Status;
use rocket::outcome::Outcome::{Error, Success};
use rocket::request::{self, FromRequest, Request};
use uuid::Uuid;

use crate::data::user::AccountRole;
use crate::resp::problem::problems::auth_problem;
use crate::resp::problem::Problem;

pub static USER_ID_HEADER: &str = "X-User-Id";
pub static USER_ROLE_HEADER: &str = "X-User-Role";

/// Caller identity as asserted by the upstream identity provider.
///
/// The account role is informational. Classroom authority always comes from
/// classroom membership.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Principal {
    pub user: Uuid,
    pub account_role: Option<AccountRole>,
}

pub fn extract_principal(req: &Request<'_>) -> Result<Principal, Problem> {
    let user = match req.headers().get_one(USER_ID_HEADER) {
        Some(value) => value
            .trim()
            .parse::<Uuid>()
            .map_err(|_| auth_problem("X-User-Id header is not a valid UUID."))?,
        None => return Err(auth_problem("Missing X-User-Id header.")),
    };

    // Unknown roles are ignored rather than rejected.
    let account_role = req
        .headers()
        .get_one(USER_ROLE_HEADER)
        .and_then(|it| it.parse::<AccountRole>().ok());

    Ok(Principal { user, account_role })
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Principal {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match extract_principal(req) {
            Ok(principal) => {
                tracing::trace!(user = %principal.user, "resolved request principal");
                Success(principal)
            }
            Err(problem) => {
                tracing::debug!("unable to resolve request principal");
                req.local_cache(|| Some(problem.clone()));
                Error((Status::Unauthorized, problem))
            }
        }
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct UserHeaderAuth;

    impl From<UserHeaderAuth> for SecurityScheme {
        fn from(_: UserHeaderAuth) -> SecurityScheme {
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                super::USER_ID_HEADER,
                "UUID of the calling user",
            )))
        }
    }

    impl utoipa::Modify for UserHeaderAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(components) = openapi.components.as_mut() {
                components.add_security_scheme("user_id", *self)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Header;
    use rocket::local::asynchronous::Client;

    async fn client() -> Client {
        Client::untracked(rocket::build())
            .await
            .expect("valid rocket")
    }

    #[rocket::async_test]
    async fn headers_resolve_to_a_principal() {
        let client = client().await;
        let user = Uuid::new_v4();
        let request = client
            .get("/")
            .header(Header::new(USER_ID_HEADER, user.to_string()))
            .header(Header::new(USER_ROLE_HEADER, "Teacher"));

        let principal = extract_principal(request.inner()).expect("principal");
        assert_eq!(principal.user, user);
        assert_eq!(principal.account_role, Some(AccountRole::Teacher));
    }

    #[rocket::async_test]
    async fn missing_or_malformed_ids_are_unauthorized() {
        let client = client().await;

        let missing = extract_principal(client.get("/").inner()).unwrap_err();
        assert_eq!(missing.status, Status::Unauthorized);

        let request = client
            .get("/")
            .header(Header::new(USER_ID_HEADER, "not-a-uuid"));
        let malformed = extract_principal(request.inner()).unwrap_err();
        assert_eq!(malformed.status, Status::Unauthorized);
    }
}
