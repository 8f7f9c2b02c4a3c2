//! Assignment ledger: assignments, per-student submissions and grades.

use uuid::Uuid;

use crate::clock::Clock;
use crate::data::assignment::db::{AssignmentCreateData, AssignmentStore, StoredSubmission};
use crate::data::assignment::{Assignment, Submission};
use crate::data::classroom::db::ClassroomStore;
use crate::error::{ClassError, ClassResult};
use crate::registry::Registry;
use crate::role::{require_student, require_teacher, ClassRole};
use crate::storage::FileRef;
use crate::util::non_blank;

pub const GRADE_MIN: f64 = 0.0;
pub const GRADE_MAX: f64 = 100.0;

/// A submission upsert loses at most one race against a concurrent append of
/// the same student before it turns into an in-place update.
const SUBMIT_ROUNDS: usize = 2;

pub struct Ledger<'a, S: ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: ClassroomStore + AssignmentStore + ?Sized> Ledger<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Ledger<'a, S> {
        Ledger { store, clock }
    }

    fn registry(&self) -> Registry<'a, S> {
        Registry::new(self.store, self.clock)
    }

    async fn find(&self, id: Uuid) -> ClassResult<Assignment> {
        self.store
            .get_assignment(id)
            .await?
            .ok_or_else(|| ClassError::not_found("assignment"))
    }

    #[tracing::instrument(skip(self, data))]
    pub async fn create_assignment(
        &self,
        classroom: Uuid,
        teacher: Uuid,
        data: AssignmentCreateData,
    ) -> ClassResult<Assignment> {
        let classroom = self
            .registry()
            .get_accessible_classroom(classroom, teacher)
            .await?;
        require_teacher(&classroom, teacher)?;

        let (title, due_date, points) =
            match (non_blank(data.title.as_deref()), data.due_date, data.points) {
                (Some(title), Some(due_date), Some(points)) => (title, due_date, points),
                _ => {
                    return Err(ClassError::validation(
                        "please provide title, due date, and points for the assignment",
                    ))
                }
            };
        if !points.is_finite() || points < 0.0 {
            return Err(ClassError::validation("points must be a non-negative number"));
        }
        let now = self.clock.now();
        if due_date <= now {
            return Err(ClassError::validation("due date must be in the future"));
        }

        let assignment = Assignment {
            id: Uuid::new_v4(),
            classroom: classroom.id,
            teacher,
            title: title.to_string(),
            description: data.description.unwrap_or_default().trim().to_string(),
            due_date,
            points,
            submissions: vec![],
            created_at: now,
        };
        self.store.insert_assignment(&assignment).await?;

        tracing::info!(id = %assignment.id, classroom = %classroom.id, "created assignment");
        Ok(assignment)
    }

    /// Creates or overwrites the caller's submission. Files an overwrite
    /// dropped are reported back so the caller can remove them.
    #[tracing::instrument(skip(self, files), fields(files = files.len()))]
    pub async fn submit(
        &self,
        assignment: Uuid,
        student: Uuid,
        files: Vec<FileRef>,
    ) -> ClassResult<StoredSubmission> {
        let assignment = self.find(assignment).await?;
        let classroom = self
            .registry()
            .get_accessible_classroom(assignment.classroom, student)
            .await?;
        require_student(&classroom, student)?;

        let now = self.clock.now();
        if !assignment.accepts_submissions_at(now) {
            tracing::warn!(assignment = %assignment.id, %student, "submission after due date");
            return Err(ClassError::DueDatePassed);
        }
        if files.is_empty() {
            return Err(ClassError::validation("please upload at least one file"));
        }

        for _ in 0..SUBMIT_ROUNDS {
            if let Some(updated) = self
                .store
                .replace_submission_files(assignment.id, student, &files, now)
                .await?
            {
                tracing::info!(
                    assignment = %assignment.id,
                    %student,
                    replaced = updated.replaced.len(),
                    "updated submission"
                );
                return Ok(updated);
            }

            let submission = Submission::new(student, files.clone(), now);
            if self
                .store
                .append_submission(assignment.id, &submission)
                .await?
            {
                tracing::info!(assignment = %assignment.id, %student, "created submission");
                return Ok(StoredSubmission::created(submission));
            }
        }

        // Neither an update nor an append matched: the assignment went away.
        Err(ClassError::not_found("assignment"))
    }

    #[tracing::instrument(skip(self, feedback))]
    pub async fn grade(
        &self,
        assignment: Uuid,
        submission: Uuid,
        teacher: Uuid,
        grade: Option<f64>,
        feedback: Option<String>,
    ) -> ClassResult<Assignment> {
        let assignment = self.find(assignment).await?;
        let classroom = self
            .registry()
            .get_accessible_classroom(assignment.classroom, teacher)
            .await?;
        require_teacher(&classroom, teacher)?;

        let grade = match grade {
            Some(grade) if grade.is_finite() && (GRADE_MIN..=GRADE_MAX).contains(&grade) => grade,
            _ => {
                return Err(ClassError::validation(format!(
                    "please provide a valid grade between {} and {}",
                    GRADE_MIN, GRADE_MAX
                )))
            }
        };
        if assignment.submission(submission).is_none() {
            return Err(ClassError::not_found("submission"));
        }

        let feedback = feedback
            .map(|it| it.trim().to_string())
            .filter(|it| !it.is_empty());
        let graded = self
            .store
            .set_grade(assignment.id, submission, grade, feedback)
            .await?
            .ok_or_else(|| ClassError::not_found("submission"))?;

        tracing::info!(assignment = %graded.id, %submission, grade, "graded submission");
        Ok(graded)
    }

    pub async fn list_for_classroom(
        &self,
        classroom: Uuid,
        caller: Uuid,
    ) -> ClassResult<Vec<Assignment>> {
        let classroom = self
            .registry()
            .get_accessible_classroom(classroom, caller)
            .await?;
        let role = crate::role::role_of(&classroom, caller);

        Ok(self
            .store
            .assignments_for_classroom(classroom.id)
            .await?
            .into_iter()
            .map(|it| visible_to(it, role, caller))
            .collect())
    }

    pub async fn get_assignment(&self, id: Uuid, caller: Uuid) -> ClassResult<Assignment> {
        let assignment = self.find(id).await?;
        let classroom = self
            .registry()
            .get_accessible_classroom(assignment.classroom, caller)
            .await?;

        Ok(visible_to(
            assignment,
            crate::role::role_of(&classroom, caller),
            caller,
        ))
    }

    /// Whether `id` names an assignment of `classroom`.
    pub(crate) async fn belongs_to(&self, classroom: Uuid, id: Uuid) -> ClassResult<bool> {
        Ok(self
            .store
            .get_assignment(id)
            .await?
            .map_or(false, |it| it.classroom == classroom))
    }
}

/// Students only see their own submission.
fn visible_to(mut assignment: Assignment, role: ClassRole, caller: Uuid) -> Assignment {
    if role != ClassRole::Teacher {
        assignment.submissions.retain(|it| it.student == caller);
    }
    assignment
}
