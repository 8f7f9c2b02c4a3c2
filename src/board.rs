//! Announcement board of a classroom.

use uuid::Uuid;

use crate::clock::Clock;
use crate::data::announcement::db::AnnouncementStore;
use crate::data::announcement::Announcement;
use crate::data::classroom::db::ClassroomStore;
use crate::data::comment::db::CommentStore;
use crate::data::comment::CommentSubject;
use crate::error::{ClassError, ClassResult};
use crate::registry::Registry;
use crate::role::require_teacher;
use crate::storage::FileRef;
use crate::util::non_blank;

pub struct Board<'a, S: ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: ClassroomStore + AnnouncementStore + CommentStore + ?Sized> Board<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Board<'a, S> {
        Board { store, clock }
    }

    async fn find(&self, id: Uuid) -> ClassResult<Announcement> {
        self.store
            .get_announcement(id)
            .await?
            .ok_or_else(|| ClassError::not_found("announcement"))
    }

    fn require_author(announcement: &Announcement, user: Uuid) -> ClassResult<()> {
        if announcement.created_by == user {
            Ok(())
        } else {
            tracing::debug!(announcement = %announcement.id, %user, "author required");
            Err(ClassError::forbidden("only the author can change this announcement"))
        }
    }

    #[tracing::instrument(skip(self, title, content, files))]
    pub async fn create_announcement(
        &self,
        classroom: Uuid,
        teacher: Uuid,
        title: Option<&str>,
        content: Option<&str>,
        files: Vec<FileRef>,
    ) -> ClassResult<Announcement> {
        let classroom = Registry::new(self.store, self.clock)
            .get_accessible_classroom(classroom, teacher)
            .await?;
        require_teacher(&classroom, teacher)?;

        let (title, content) = match (non_blank(title), non_blank(content)) {
            (Some(title), Some(content)) => (title, content),
            _ => {
                return Err(ClassError::validation(
                    "please provide both title and content for the announcement",
                ))
            }
        };

        let announcement = Announcement {
            id: Uuid::new_v4(),
            classroom: classroom.id,
            created_by: teacher,
            title: title.to_string(),
            content: content.to_string(),
            files,
            created_at: self.clock.now(),
        };
        self.store.insert_announcement(&announcement).await?;

        tracing::info!(id = %announcement.id, classroom = %classroom.id, "posted announcement");
        Ok(announcement)
    }

    pub async fn list_for_classroom(
        &self,
        classroom: Uuid,
        caller: Uuid,
    ) -> ClassResult<Vec<Announcement>> {
        let classroom = Registry::new(self.store, self.clock)
            .get_accessible_classroom(classroom, caller)
            .await?;
        Ok(self.store.announcements_for_classroom(classroom.id).await?)
    }

    #[tracing::instrument(skip(self, title, content))]
    pub async fn update_announcement(
        &self,
        id: Uuid,
        caller: Uuid,
        title: Option<&str>,
        content: Option<&str>,
    ) -> ClassResult<Announcement> {
        let announcement = self.find(id).await?;
        Self::require_author(&announcement, caller)?;

        let title = match title {
            Some(title) => Some(
                non_blank(Some(title))
                    .ok_or_else(|| ClassError::validation("title can't be blank"))?,
            ),
            None => None,
        };
        let content = match content {
            Some(content) => Some(
                non_blank(Some(content))
                    .ok_or_else(|| ClassError::validation("content can't be blank"))?,
            ),
            None => None,
        };
        if title.is_none() && content.is_none() {
            return Ok(announcement);
        }

        let updated = self
            .store
            .update_announcement(id, title, content)
            .await?
            .ok_or_else(|| ClassError::not_found("announcement"))?;

        tracing::info!(%id, "updated announcement");
        Ok(updated)
    }

    /// Removes the announcement along with every comment attached to it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_announcement(&self, id: Uuid, caller: Uuid) -> ClassResult<()> {
        let announcement = self.find(id).await?;
        Self::require_author(&announcement, caller)?;

        let comments = self
            .store
            .delete_comments_for_subject(CommentSubject::Announcement(id))
            .await?;
        if !self.store.delete_announcement(id).await? {
            return Err(ClassError::not_found("announcement"));
        }

        tracing::info!(%id, comments, "deleted announcement");
        Ok(())
    }

    /// Whether `id` names an announcement of `classroom`.
    pub(crate) async fn belongs_to(&self, classroom: Uuid, id: Uuid) -> ClassResult<bool> {
        Ok(self
            .store
            .get_announcement(id)
            .await?
            .map_or(false, |it| it.classroom == classroom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::data::classroom::Classroom;
    use crate::data::comment::Comment;
    use crate::data::memory::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    async fn classroom(store: &MemoryStore, clock: &ManualClock) -> (Classroom, Uuid, Uuid) {
        let teacher = Uuid::new_v4();
        let student = Uuid::new_v4();
        let registry = Registry::new(store, clock);
        let classroom = registry
            .create_classroom(Some("Chemistry"), Some("Science"), None, teacher)
            .await
            .unwrap();
        let classroom = registry.join_classroom(&classroom.code, student).await.unwrap();
        (classroom, teacher, student)
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap())
    }

    #[rocket::async_test]
    async fn teachers_post_and_members_read() {
        let store = MemoryStore::new();
        let clock = clock();
        let (classroom, teacher, student) = classroom(&store, &clock).await;
        let board = Board::new(&store, &clock);

        let first = board
            .create_announcement(classroom.id, teacher, Some("Welcome"), Some("Hi all"), vec![])
            .await
            .unwrap();
        clock.advance(Duration::minutes(5));
        let second = board
            .create_announcement(
                classroom.id,
                teacher,
                Some("Lab safety"),
                Some("Read this"),
                vec![FileRef("rules.pdf".to_string())],
            )
            .await
            .unwrap();

        let listed: Vec<Uuid> = board
            .list_for_classroom(classroom.id, student)
            .await
            .unwrap()
            .into_iter()
            .map(|it| it.id)
            .collect();
        assert_eq!(listed, vec![second.id, first.id]);

        assert!(matches!(
            board
                .create_announcement(classroom.id, student, Some("Hey"), Some("Hey"), vec![])
                .await,
            Err(ClassError::Forbidden(_))
        ));
        assert!(matches!(
            board
                .create_announcement(classroom.id, teacher, Some("Empty"), Some(" "), vec![])
                .await,
            Err(ClassError::Validation(_))
        ));
        assert!(matches!(
            board.list_for_classroom(classroom.id, Uuid::new_v4()).await,
            Err(ClassError::Forbidden(_))
        ));
    }

    #[rocket::async_test]
    async fn only_the_author_edits() {
        let store = MemoryStore::new();
        let clock = clock();
        let (classroom, teacher, student) = classroom(&store, &clock).await;
        let board = Board::new(&store, &clock);
        let posted = board
            .create_announcement(classroom.id, teacher, Some("Quiz"), Some("Friday"), vec![])
            .await
            .unwrap();

        let updated = board
            .update_announcement(posted.id, teacher, None, Some("Monday"))
            .await
            .unwrap();
        assert_eq!(updated.title, "Quiz");
        assert_eq!(updated.content, "Monday");

        assert!(matches!(
            board
                .update_announcement(posted.id, student, Some("Cancelled"), None)
                .await,
            Err(ClassError::Forbidden(_))
        ));
        assert!(matches!(
            board
                .update_announcement(posted.id, teacher, Some(""), None)
                .await,
            Err(ClassError::Validation(_))
        ));
        assert!(matches!(
            board
                .update_announcement(Uuid::new_v4(), teacher, Some("x"), None)
                .await,
            Err(ClassError::NotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn deleting_purges_comments() {
        let store = MemoryStore::new();
        let clock = clock();
        let (classroom, teacher, student) = classroom(&store, &clock).await;
        let board = Board::new(&store, &clock);
        let posted = board
            .create_announcement(classroom.id, teacher, Some("Trip"), Some("Museum"), vec![])
            .await
            .unwrap();

        let comment = Comment::new(
            classroom.id,
            student,
            CommentSubject::Announcement(posted.id),
            "Can't wait",
            None,
            clock.now(),
        );
        store.insert_comment(&comment).await.unwrap();

        assert!(matches!(
            board.delete_announcement(posted.id, student).await,
            Err(ClassError::Forbidden(_))
        ));
        board.delete_announcement(posted.id, teacher).await.unwrap();

        assert!(store.get_announcement(posted.id).await.unwrap().is_none());
        assert!(store.get_comment(comment.id).await.unwrap().is_none());
    }
}
