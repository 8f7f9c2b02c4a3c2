//! In-process store. Every write holds the single state lock, which makes each
//! trait method atomic the same way a single MongoDB document update is.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::announcement::db::AnnouncementStore;
use super::announcement::Announcement;
use super::assignment::db::{AssignmentStore, StoredSubmission};
use super::assignment::{Assignment, Submission};
use super::classroom::db::{ClassroomStore, InsertOutcome};
use super::classroom::Classroom;
use super::comment::db::CommentStore;
use super::comment::{Comment, CommentSubject};
use super::user::db::{UpsertOutcome, UserStore};
use super::user::User;
use crate::error::StoreError;
use crate::storage::FileRef;

#[derive(Debug, Default)]
struct State {
    classrooms: Vec<Classroom>,
    assignments: Vec<Assignment>,
    announcements: Vec<Announcement>,
    comments: Vec<Comment>,
    users: Vec<User>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

/// Newest first; among equal timestamps the later insertion comes first.
fn newest_first<T: Clone>(
    items: impl DoubleEndedIterator<Item = T>,
    created_at: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<T> {
    let mut items: Vec<T> = items.rev().collect();
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    items
}

#[rocket::async_trait]
impl ClassroomStore for MemoryStore {
    async fn insert_classroom(&self, classroom: &Classroom) -> Result<InsertOutcome, StoreError> {
        let mut state = self.state.write().await;
        if state.classrooms.iter().any(|it| it.code == classroom.code) {
            return Ok(InsertOutcome::CodeTaken);
        }
        state.classrooms.push(classroom.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get_classroom(&self, id: Uuid) -> Result<Option<Classroom>, StoreError> {
        let state = self.state.read().await;
        Ok(state.classrooms.iter().find(|it| it.id == id).cloned())
    }

    async fn find_classroom_by_code(&self, code: &str) -> Result<Option<Classroom>, StoreError> {
        let state = self.state.read().await;
        Ok(state.classrooms.iter().find(|it| it.code == code).cloned())
    }

    async fn classrooms_for_user(&self, user: Uuid) -> Result<Vec<Classroom>, StoreError> {
        let state = self.state.read().await;
        Ok(newest_first(
            state
                .classrooms
                .iter()
                .filter(|it| it.teacher == user || it.has_student(user))
                .cloned(),
            |it| it.created_at,
        ))
    }

    async fn add_student(&self, id: Uuid, student: Uuid) -> Result<Option<Classroom>, StoreError> {
        let mut state = self.state.write().await;
        let classroom = state
            .classrooms
            .iter_mut()
            .find(|it| it.id == id && it.teacher != student && !it.has_student(student));

        Ok(classroom.map(|it| {
            it.students.push(student);
            it.clone()
        }))
    }
}

#[rocket::async_trait]
impl AssignmentStore for MemoryStore {
    async fn insert_assignment(&self, assignment: &Assignment) -> Result<(), StoreError> {
        self.state.write().await.assignments.push(assignment.clone());
        Ok(())
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>, StoreError> {
        let state = self.state.read().await;
        Ok(state.assignments.iter().find(|it| it.id == id).cloned())
    }

    async fn assignments_for_classroom(
        &self,
        classroom: Uuid,
    ) -> Result<Vec<Assignment>, StoreError> {
        let state = self.state.read().await;
        Ok(newest_first(
            state
                .assignments
                .iter()
                .filter(|it| it.classroom == classroom)
                .cloned(),
            |it| it.created_at,
        ))
    }

    async fn replace_submission_files(
        &self,
        assignment: Uuid,
        student: Uuid,
        files: &[FileRef],
        submitted_at: DateTime<Utc>,
    ) -> Result<Option<StoredSubmission>, StoreError> {
        let mut state = self.state.write().await;
        let submission = state
            .assignments
            .iter_mut()
            .find(|it| it.id == assignment)
            .and_then(|it| it.submissions.iter_mut().find(|s| s.student == student));

        Ok(submission.map(|it| {
            let replaced = std::mem::replace(&mut it.files, files.to_vec());
            it.submitted_at = submitted_at;
            StoredSubmission {
                submission: it.clone(),
                replaced,
            }
        }))
    }

    async fn append_submission(
        &self,
        assignment: Uuid,
        submission: &Submission,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let assignment = state
            .assignments
            .iter_mut()
            .find(|it| it.id == assignment && it.submission_of(submission.student).is_none());

        Ok(match assignment {
            Some(it) => {
                it.submissions.push(submission.clone());
                true
            }
            None => false,
        })
    }

    async fn set_grade(
        &self,
        assignment: Uuid,
        submission: Uuid,
        grade: f64,
        feedback: Option<String>,
    ) -> Result<Option<Assignment>, StoreError> {
        let mut state = self.state.write().await;
        let Some(assignment) = state.assignments.iter_mut().find(|it| it.id == assignment) else {
            return Ok(None);
        };
        let Some(target) = assignment
            .submissions
            .iter_mut()
            .find(|it| it.id == submission)
        else {
            return Ok(None);
        };

        target.grade = Some(grade);
        target.feedback = feedback;
        Ok(Some(assignment.clone()))
    }
}

#[rocket::async_trait]
impl AnnouncementStore for MemoryStore {
    async fn insert_announcement(&self, announcement: &Announcement) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .announcements
            .push(announcement.clone());
        Ok(())
    }

    async fn get_announcement(&self, id: Uuid) -> Result<Option<Announcement>, StoreError> {
        let state = self.state.read().await;
        Ok(state.announcements.iter().find(|it| it.id == id).cloned())
    }

    async fn announcements_for_classroom(
        &self,
        classroom: Uuid,
    ) -> Result<Vec<Announcement>, StoreError> {
        let state = self.state.read().await;
        Ok(newest_first(
            state
                .announcements
                .iter()
                .filter(|it| it.classroom == classroom)
                .cloned(),
            |it| it.created_at,
        ))
    }

    async fn update_announcement(
        &self,
        id: Uuid,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Option<Announcement>, StoreError> {
        let mut state = self.state.write().await;
        let announcement = state.announcements.iter_mut().find(|it| it.id == id);

        Ok(announcement.map(|it| {
            if let Some(title) = title {
                it.title = title.to_string();
            }
            if let Some(content) = content {
                it.content = content.to_string();
            }
            it.clone()
        }))
    }

    async fn delete_announcement(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.announcements.len();
        state.announcements.retain(|it| it.id != id);
        Ok(state.announcements.len() != before)
    }
}

#[rocket::async_trait]
impl CommentStore for MemoryStore {
    async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        self.state.write().await.comments.push(comment.clone());
        Ok(())
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        let state = self.state.read().await;
        Ok(state.comments.iter().find(|it| it.id == id).cloned())
    }

    async fn get_comments(&self, ids: &[Uuid]) -> Result<Vec<Comment>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|it| ids.contains(&it.id))
            .cloned()
            .collect())
    }

    async fn top_level_comments(
        &self,
        classroom: Uuid,
        subject: CommentSubject,
    ) -> Result<Vec<Comment>, StoreError> {
        let state = self.state.read().await;
        Ok(newest_first(
            state
                .comments
                .iter()
                .filter(|it| it.classroom == classroom && it.subject == subject && it.is_top_level())
                .cloned(),
            |it| it.created_at,
        ))
    }

    async fn push_reply(&self, parent: Uuid, reply: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(match state.comments.iter_mut().find(|it| it.id == parent) {
            Some(parent) => {
                parent.replies.push(reply);
                true
            }
            None => false,
        })
    }

    async fn pull_reply(&self, parent: Uuid, reply: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(parent) = state.comments.iter_mut().find(|it| it.id == parent) {
            parent.replies.retain(|it| *it != reply);
        }
        Ok(())
    }

    async fn update_comment_content(
        &self,
        id: Uuid,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Comment>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.comments.iter_mut().find(|it| it.id == id).map(|it| {
            it.content = content.to_string();
            it.updated_at = updated_at;
            it.clone()
        }))
    }

    async fn delete_comments(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let ids: HashSet<&Uuid> = ids.iter().collect();
        let mut state = self.state.write().await;
        let before = state.comments.len();
        state.comments.retain(|it| !ids.contains(&it.id));
        Ok((before - state.comments.len()) as u64)
    }

    async fn delete_comments_for_subject(&self, subject: CommentSubject) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let before = state.comments.len();
        state.comments.retain(|it| it.subject != subject);
        Ok((before - state.comments.len()) as u64)
    }
}

#[rocket::async_trait]
impl UserStore for MemoryStore {
    async fn upsert_user(&self, user: &User) -> Result<UpsertOutcome, StoreError> {
        let mut state = self.state.write().await;
        if state
            .users
            .iter()
            .any(|it| it.email == user.email && it.id != user.id)
        {
            return Ok(UpsertOutcome::EmailTaken);
        }
        match state.users.iter_mut().find(|it| it.id == user.id) {
            Some(existing) => *existing = user.clone(),
            None => state.users.push(user.clone()),
        }
        Ok(UpsertOutcome::Stored(user.clone()))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|it| it.id == id).cloned())
    }

    async fn get_users(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let ids: HashSet<&Uuid> = ids.iter().collect();
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .filter(|it| ids.contains(&it.id))
            .cloned()
            .collect())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|it| it.email == email).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn add_student_refuses_teacher_and_duplicates() {
        let store = MemoryStore::new();
        let teacher = Uuid::new_v4();
        let student = Uuid::new_v4();
        let classroom = Classroom::new("Art", "Art", None, "ART001", teacher, Utc::now());
        store.insert_classroom(&classroom).await.unwrap();

        assert!(store.add_student(classroom.id, teacher).await.unwrap().is_none());
        let updated = store
            .add_student(classroom.id, student)
            .await
            .unwrap()
            .expect("student added");
        assert_eq!(updated.students, vec![student]);
        assert!(store.add_student(classroom.id, student).await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn user_emails_stay_unique() {
        let store = MemoryStore::new();
        let first = User::new(Uuid::new_v4(), "Ana", "same@x.io");
        let second = User::new(Uuid::new_v4(), "Bo", "same@x.io");

        assert_eq!(
            store.upsert_user(&first).await.unwrap(),
            UpsertOutcome::Stored(first.clone())
        );
        assert_eq!(
            store.upsert_user(&second).await.unwrap(),
            UpsertOutcome::EmailTaken
        );

        let renamed = User::new(first.id, "Ana B.", "same@x.io");
        assert_eq!(
            store.upsert_user(&renamed).await.unwrap(),
            UpsertOutcome::Stored(renamed.clone())
        );
        assert_eq!(
            store.find_user_by_email("same@x.io").await.unwrap(),
            Some(renamed)
        );
        assert!(store.get_user(second.id).await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn resubmission_reports_replaced_files() {
        let store = MemoryStore::new();
        let student = Uuid::new_v4();
        let now = Utc::now();
        let assignment = Assignment {
            id: Uuid::new_v4(),
            classroom: Uuid::new_v4(),
            teacher: Uuid::new_v4(),
            title: "Essay".to_string(),
            description: String::new(),
            due_date: now + chrono::Duration::days(1),
            points: 10.0,
            submissions: vec![],
            created_at: now,
        };
        store.insert_assignment(&assignment).await.unwrap();

        let old = vec![FileRef("old.pdf".to_string())];
        let submission = Submission::new(student, old.clone(), now);
        assert!(store.append_submission(assignment.id, &submission).await.unwrap());

        let new = vec![FileRef("new.pdf".to_string())];
        let stored = store
            .replace_submission_files(assignment.id, student, &new, now)
            .await
            .unwrap()
            .expect("existing submission");
        assert_eq!(stored.replaced, old);
        assert_eq!(stored.submission.id, submission.id);
        assert_eq!(stored.submission.files, new);
    }

    #[rocket::async_test]
    async fn duplicate_codes_are_reported() {
        let store = MemoryStore::new();
        let first = Classroom::new("A", "A", None, "SAME01", Uuid::new_v4(), Utc::now());
        let second = Classroom::new("B", "B", None, "SAME01", Uuid::new_v4(), Utc::now());

        assert_eq!(
            store.insert_classroom(&first).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert_classroom(&second).await.unwrap(),
            InsertOutcome::CodeTaken
        );
    }

    #[test]
    fn equal_timestamps_list_latest_insert_first() {
        let at = Utc::now();
        let items = vec![(1, at), (2, at), (3, at - chrono::Duration::seconds(1))];

        let ordered = newest_first(items.into_iter(), |it| it.1);
        let ids: Vec<i32> = ordered.into_iter().map(|it| it.0).collect();

        assert_eq!(ids, vec![2, 1, 3]);
    }
}
