//! Classroom registry: creation with unique join codes, enrollment and the
//! access gate every other component goes through.

use std::collections::HashSet;

use rand::rngs::OsRng;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::DEFAULT_CODE_ATTEMPTS;
use crate::data::classroom::db::{ClassroomStore, InsertOutcome};
use crate::data::classroom::{generate_code, normalize_code, Classroom};
use crate::error::{ClassError, ClassResult};
use crate::role::{require_member, role_of, ClassRole};
use crate::util::non_blank;

pub struct Registry<'a, S: ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
    code_attempts: u32,
}

impl<'a, S: ClassroomStore + ?Sized> Registry<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Registry<'a, S> {
        Registry {
            store,
            clock,
            code_attempts: DEFAULT_CODE_ATTEMPTS,
        }
    }

    pub fn code_attempts(mut self, attempts: u32) -> Registry<'a, S> {
        self.code_attempts = attempts;
        self
    }

    #[tracing::instrument(skip(self, description))]
    pub async fn create_classroom(
        &self,
        name: Option<&str>,
        subject: Option<&str>,
        description: Option<&str>,
        teacher: Uuid,
    ) -> ClassResult<Classroom> {
        let (name, subject) = match (non_blank(name), non_blank(subject)) {
            (Some(name), Some(subject)) => (name, subject),
            _ => {
                return Err(ClassError::validation(
                    "please provide both name and subject for the classroom",
                ))
            }
        };
        let description = non_blank(description).map(str::to_string);

        for attempt in 1..=self.code_attempts {
            let code = generate_code(&mut OsRng);

            if self.store.find_classroom_by_code(&code).await?.is_some() {
                tracing::debug!(attempt, %code, "join code already taken");
                continue;
            }

            let classroom = Classroom::new(
                name,
                subject,
                description.clone(),
                &code,
                teacher,
                self.clock.now(),
            );
            match self.store.insert_classroom(&classroom).await? {
                InsertOutcome::Inserted => {
                    tracing::info!(id = %classroom.id, %code, "created classroom");
                    return Ok(classroom);
                }
                InsertOutcome::CodeTaken => {
                    tracing::debug!(attempt, %code, "join code claimed concurrently");
                }
            }
        }

        tracing::error!(attempts = self.code_attempts, "ran out of join code attempts");
        Err(ClassError::CodeGenerationExhausted {
            attempts: self.code_attempts,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn join_classroom(&self, code: &str, user: Uuid) -> ClassResult<Classroom> {
        let classroom = self
            .store
            .find_classroom_by_code(&normalize_code(code))
            .await?
            .ok_or_else(|| ClassError::not_found("classroom"))?;

        let joined = self.enroll(&classroom, user).await?;
        tracing::info!(classroom = %joined.id, %user, "student joined classroom");
        Ok(joined)
    }

    /// Adds `user` to the students of `classroom`, re-checking membership
    /// against the stored state at write time.
    pub(crate) async fn enroll(&self, classroom: &Classroom, user: Uuid) -> ClassResult<Classroom> {
        check_enrollable(classroom, user)?;

        if let Some(updated) = self.store.add_student(classroom.id, user).await? {
            return Ok(updated);
        }

        // The guarded write matched nothing; classify against the latest state.
        let latest = self
            .store
            .get_classroom(classroom.id)
            .await?
            .ok_or_else(|| ClassError::not_found("classroom"))?;
        check_enrollable(&latest, user)?;

        tracing::warn!(classroom = %classroom.id, %user, "enrollment write matched nothing");
        Err(ClassError::AlreadyMember)
    }

    pub async fn get_accessible_classroom(&self, id: Uuid, user: Uuid) -> ClassResult<Classroom> {
        let classroom = self
            .store
            .get_classroom(id)
            .await?
            .ok_or_else(|| ClassError::not_found("classroom"))?;

        require_member(&classroom, user)?;
        Ok(classroom)
    }

    pub async fn list_my_classrooms(&self, user: Uuid) -> ClassResult<Vec<Classroom>> {
        Ok(self.store.classrooms_for_user(user).await?)
    }

    /// `user` and everyone sharing at least one classroom with them.
    pub async fn classmates_of(&self, user: Uuid) -> ClassResult<HashSet<Uuid>> {
        let mut known = HashSet::from([user]);
        for classroom in self.store.classrooms_for_user(user).await? {
            known.insert(classroom.teacher);
            known.extend(classroom.students);
        }
        Ok(known)
    }
}

fn check_enrollable(classroom: &Classroom, user: Uuid) -> ClassResult<()> {
    match role_of(classroom, user) {
        ClassRole::Teacher => Err(ClassError::SelfJoin),
        ClassRole::Student => Err(ClassError::AlreadyMember),
        ClassRole::None => Ok(()),
    }
}
