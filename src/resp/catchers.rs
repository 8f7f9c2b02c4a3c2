use rocket::http::Status;
use rocket::{Catcher, Request};

use crate::resp::problem::{problems, Problem};

/// Keeps error responses in `application/problem+json`, including the ones
/// Rocket produces before a handler runs.
#[catch(default)]
pub fn problem_catcher(status: Status, req: &Request<'_>) -> Problem {
    if let Some(problem) = req.local_cache(|| None::<Problem>) {
        return problem.clone();
    }

    match status.code {
        400 | 422 => problems::parse_problem(),
        401 => problems::auth_problem("Missing or malformed caller identity."),
        _ => Problem::new_untyped(status, status.reason().unwrap_or("Unknown error.")),
    }
}

pub fn catchers() -> Vec<Catcher> {
    catchers![problem_catcher]
}
