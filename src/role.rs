//! Membership-derived roles.
//!
//! Authority inside a classroom comes only from the classroom's `teacher` and
//! `students` fields. Whatever role an account carries globally is never
//! consulted here.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::classroom::Classroom;
use crate::error::{ClassError, ClassResult};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClassRole {
    None,
    Student,
    Teacher,
}

impl ClassRole {
    pub fn is_member(self) -> bool {
        self != ClassRole::None
    }
}

impl Default for ClassRole {
    fn default() -> Self {
        ClassRole::None
    }
}

impl std::fmt::Display for ClassRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassRole::None => write!(f, "none"),
            ClassRole::Student => write!(f, "student"),
            ClassRole::Teacher => write!(f, "teacher"),
        }
    }
}

/// Teacher wins when an id shows up in both fields.
pub fn role_of(classroom: &Classroom, user: Uuid) -> ClassRole {
    if classroom.teacher == user {
        ClassRole::Teacher
    } else if classroom.students.contains(&user) {
        ClassRole::Student
    } else {
        ClassRole::None
    }
}

pub fn require_teacher(classroom: &Classroom, user: Uuid) -> ClassResult<()> {
    match role_of(classroom, user) {
        ClassRole::Teacher => Ok(()),
        other => {
            tracing::debug!(classroom = %classroom.id, %user, role = %other, "teacher role required");
            Err(ClassError::forbidden("must be the teacher of this classroom"))
        }
    }
}

pub fn require_student(classroom: &Classroom, user: Uuid) -> ClassResult<()> {
    match role_of(classroom, user) {
        ClassRole::Student => Ok(()),
        other => {
            tracing::debug!(classroom = %classroom.id, %user, role = %other, "student role required");
            Err(ClassError::forbidden("must be a student in this classroom"))
        }
    }
}

pub fn require_member(classroom: &Classroom, user: Uuid) -> ClassResult<ClassRole> {
    let role = role_of(classroom, user);
    if role.is_member() {
        Ok(role)
    } else {
        tracing::debug!(classroom = %classroom.id, %user, "membership required");
        Err(ClassError::forbidden(
            "must be either teacher or student in this classroom",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn classroom(teacher: Uuid, students: Vec<Uuid>) -> Classroom {
        Classroom {
            id: Uuid::new_v4(),
            name: "Physics".to_string(),
            subject: "Science".to_string(),
            description: None,
            code: "PHY123".to_string(),
            teacher,
            students,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn roles_follow_membership() {
        let teacher = Uuid::new_v4();
        let student = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let class = classroom(teacher, vec![student]);

        assert_eq!(role_of(&class, teacher), ClassRole::Teacher);
        assert_eq!(role_of(&class, student), ClassRole::Student);
        assert_eq!(role_of(&class, stranger), ClassRole::None);
    }

    #[test]
    fn teacher_wins_over_corrupted_student_entry() {
        let teacher = Uuid::new_v4();
        let class = classroom(teacher, vec![teacher]);

        assert_eq!(role_of(&class, teacher), ClassRole::Teacher);
    }

    #[test]
    fn guards_reject_wrong_roles() {
        let teacher = Uuid::new_v4();
        let student = Uuid::new_v4();
        let class = classroom(teacher, vec![student]);

        assert!(require_teacher(&class, teacher).is_ok());
        assert!(matches!(
            require_teacher(&class, student),
            Err(ClassError::Forbidden(_))
        ));
        assert!(require_student(&class, student).is_ok());
        assert!(matches!(
            require_student(&class, teacher),
            Err(ClassError::Forbidden(_))
        ));
        assert_eq!(require_member(&class, student).unwrap(), ClassRole::Student);
        assert!(matches!(
            require_member(&class, Uuid::new_v4()),
            Err(ClassError::Forbidden(_))
        ));
    }
}
