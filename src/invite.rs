//! Batch invitations of directory users into a classroom.

use serde::Serialize;
use std::collections::HashSet;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::clock::Clock;
use crate::data::classroom::db::ClassroomStore;
use crate::data::user::db::UserStore;
use crate::data::user::AccountRole;
use crate::error::{ClassError, ClassResult};
use crate::registry::Registry;
use crate::role::{require_teacher, role_of, ClassRole};
use crate::util::normalize_email;

/// Every distinct invited email ends up in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct InviteReport {
    pub success: Vec<String>,
    pub not_found: Vec<String>,
    pub already_member: Vec<String>,
    pub conflict_role: Vec<String>,
}

impl InviteReport {
    pub fn len(&self) -> usize {
        self.success.len() + self.not_found.len() + self.already_member.len() + self.conflict_role.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Invitations<'a, S: ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: ClassroomStore + UserStore + ?Sized> Invitations<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Invitations<'a, S> {
        Invitations { store, clock }
    }

    #[tracing::instrument(skip(self, emails), fields(emails = emails.len()))]
    pub async fn invite(
        &self,
        classroom: Uuid,
        inviter: Uuid,
        emails: &[String],
        role: &str,
    ) -> ClassResult<InviteReport> {
        let registry = Registry::new(self.store, self.clock);
        let mut classroom = registry.get_accessible_classroom(classroom, inviter).await?;
        require_teacher(&classroom, inviter)?;

        let role: AccountRole = role.parse().map_err(ClassError::Validation)?;
        let mut seen = HashSet::new();
        let emails: Vec<String> = emails
            .iter()
            .map(normalize_email)
            .filter(|it| !it.is_empty() && seen.insert(it.clone()))
            .collect();
        if emails.is_empty() {
            return Err(ClassError::validation("please provide at least one email"));
        }

        let mut report = InviteReport::default();
        for email in emails {
            // A classroom has exactly one teacher.
            if role == AccountRole::Teacher {
                report.conflict_role.push(email);
                continue;
            }

            let user = match self.store.find_user_by_email(&email).await? {
                Some(user) => user,
                None => {
                    report.not_found.push(email);
                    continue;
                }
            };

            match role_of(&classroom, user.id) {
                ClassRole::Teacher => report.conflict_role.push(email),
                ClassRole::Student => report.already_member.push(email),
                ClassRole::None => match registry.enroll(&classroom, user.id).await {
                    Ok(updated) => {
                        classroom = updated;
                        report.success.push(email);
                    }
                    Err(ClassError::AlreadyMember) => report.already_member.push(email),
                    Err(ClassError::SelfJoin) => report.conflict_role.push(email),
                    Err(e) => return Err(e),
                },
            }
        }

        tracing::info!(
            classroom = %classroom.id,
            success = report.success.len(),
            not_found = report.not_found.len(),
            already_member = report.already_member.len(),
            conflict_role = report.conflict_role.len(),
            "processed invitations"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::data::classroom::Classroom;
    use crate::data::memory::MemoryStore;
    use crate::data::user::User;

    struct Fixture {
        store: MemoryStore,
        classroom: Classroom,
        teacher: User,
        member: User,
        outsider: User,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let teacher = User::new(Uuid::new_v4(), "Tess", "tess@school.edu");
        let member = User::new(Uuid::new_v4(), "Milo", "milo@school.edu");
        let outsider = User::new(Uuid::new_v4(), "Omar", "omar@school.edu");
        for user in [&teacher, &member, &outsider] {
            store.upsert_user(user).await.unwrap();
        }

        let registry = Registry::new(&store, &SystemClock);
        let classroom = registry
            .create_classroom(Some("Physics"), Some("Science"), None, teacher.id)
            .await
            .unwrap();
        let classroom = registry.join_classroom(&classroom.code, member.id).await.unwrap();

        Fixture {
            store,
            classroom,
            teacher,
            member,
            outsider,
        }
    }

    fn emails(values: &[&str]) -> Vec<String> {
        values.iter().map(|it| it.to_string()).collect()
    }

    #[rocket::async_test]
    async fn student_invites_are_classified() {
        let fx = fixture().await;
        let invitations = Invitations::new(&fx.store, &SystemClock);

        let report = invitations
            .invite(
                fx.classroom.id,
                fx.teacher.id,
                &emails(&[
                    " OMAR@school.edu ",
                    "omar@school.edu",
                    "milo@school.edu",
                    "tess@school.edu",
                    "nobody@school.edu",
                ]),
                "student",
            )
            .await
            .unwrap();

        assert_eq!(report.success, emails(&["omar@school.edu"]));
        assert_eq!(report.already_member, emails(&["milo@school.edu"]));
        assert_eq!(report.conflict_role, emails(&["tess@school.edu"]));
        assert_eq!(report.not_found, emails(&["nobody@school.edu"]));
        assert_eq!(report.len(), 4);

        let stored = fx.store.get_classroom(fx.classroom.id).await.unwrap().unwrap();
        assert_eq!(stored.students, vec![fx.member.id, fx.outsider.id]);
    }

    #[rocket::async_test]
    async fn teacher_invites_always_conflict() {
        let fx = fixture().await;
        let report = Invitations::new(&fx.store, &SystemClock)
            .invite(
                fx.classroom.id,
                fx.teacher.id,
                &emails(&["omar@school.edu", "ghost@school.edu"]),
                "Teacher",
            )
            .await
            .unwrap();

        assert_eq!(report.conflict_role.len(), 2);
        assert!(report.success.is_empty());
        let stored = fx.store.get_classroom(fx.classroom.id).await.unwrap().unwrap();
        assert_eq!(stored.students, vec![fx.member.id]);
    }

    #[rocket::async_test]
    async fn invitations_are_validated_and_gated() {
        let fx = fixture().await;
        let invitations = Invitations::new(&fx.store, &SystemClock);

        assert!(matches!(
            invitations
                .invite(fx.classroom.id, fx.member.id, &emails(&["omar@school.edu"]), "student")
                .await,
            Err(ClassError::Forbidden(_))
        ));
        assert!(matches!(
            invitations
                .invite(fx.classroom.id, fx.teacher.id, &emails(&["  "]), "student")
                .await,
            Err(ClassError::Validation(_))
        ));
        assert!(matches!(
            invitations
                .invite(fx.classroom.id, fx.teacher.id, &emails(&["omar@school.edu"]), "admin")
                .await,
            Err(ClassError::Validation(_))
        ));
        assert!(matches!(
            invitations
                .invite(Uuid::new_v4(), fx.teacher.id, &emails(&["omar@school.edu"]), "student")
                .await,
            Err(ClassError::NotFound(_))
        ));
    }
}
