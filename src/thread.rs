//! Comment threads on announcements and assignments.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::board::Board;
use crate::clock::Clock;
use crate::data::announcement::db::AnnouncementStore;
use crate::data::assignment::db::AssignmentStore;
use crate::data::classroom::db::ClassroomStore;
use crate::data::comment::db::CommentStore;
use crate::data::comment::{Comment, CommentSubject, CommentThread, ItemKind};
use crate::error::{ClassError, ClassResult};
use crate::ledger::Ledger;
use crate::registry::Registry;
use crate::role::{role_of, ClassRole};
use crate::util::non_blank;

pub struct Threads<'a, S: ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S> Threads<'a, S>
where
    S: ClassroomStore + AssignmentStore + AnnouncementStore + CommentStore + ?Sized,
{
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Threads<'a, S> {
        Threads { store, clock }
    }

    async fn find(&self, id: Uuid) -> ClassResult<Comment> {
        self.store
            .get_comment(id)
            .await?
            .ok_or_else(|| ClassError::not_found("comment"))
    }

    /// Resolves `item_type`/`item_id` to a subject that exists in `classroom`.
    async fn subject(
        &self,
        classroom: Uuid,
        item_type: &str,
        item_id: Uuid,
    ) -> ClassResult<CommentSubject> {
        let kind: ItemKind = item_type.parse().map_err(ClassError::Validation)?;
        let exists = match kind {
            ItemKind::Announcement => {
                Board::new(self.store, self.clock)
                    .belongs_to(classroom, item_id)
                    .await?
            }
            ItemKind::Assignment => {
                Ledger::new(self.store, self.clock)
                    .belongs_to(classroom, item_id)
                    .await?
            }
        };
        if !exists {
            return Err(ClassError::not_found(kind));
        }
        Ok(CommentSubject::new(kind, item_id))
    }

    #[tracing::instrument(skip(self, content))]
    pub async fn create_comment(
        &self,
        classroom: Uuid,
        author: Uuid,
        item_type: &str,
        item_id: Uuid,
        content: Option<&str>,
        parent: Option<Uuid>,
    ) -> ClassResult<Comment> {
        let classroom = Registry::new(self.store, self.clock)
            .get_accessible_classroom(classroom, author)
            .await?;
        let content =
            non_blank(content).ok_or_else(|| ClassError::validation("comment content is required"))?;
        let subject = self.subject(classroom.id, item_type, item_id).await?;

        if let Some(parent) = parent {
            let parent = self
                .store
                .get_comment(parent)
                .await?
                .ok_or_else(|| ClassError::not_found("parent comment"))?;
            if parent.classroom != classroom.id || parent.subject != subject {
                return Err(ClassError::validation(
                    "parent comment belongs to a different item",
                ));
            }
        }

        let comment = Comment::new(
            classroom.id,
            author,
            subject,
            content,
            parent,
            self.clock.now(),
        );
        self.store.insert_comment(&comment).await?;

        if let Some(parent) = parent {
            if !self.store.push_reply(parent, comment.id).await? {
                // Parent vanished between the check and the link.
                self.store.delete_comments(&[comment.id]).await?;
                return Err(ClassError::not_found("parent comment"));
            }
        }

        tracing::info!(id = %comment.id, kind = %subject.kind(), "posted comment");
        Ok(comment)
    }

    pub async fn list_top_level_for_item(
        &self,
        classroom: Uuid,
        item_type: &str,
        item_id: Uuid,
        caller: Uuid,
    ) -> ClassResult<Vec<CommentThread>> {
        let classroom = Registry::new(self.store, self.clock)
            .get_accessible_classroom(classroom, caller)
            .await?;
        let kind: ItemKind = item_type.parse().map_err(ClassError::Validation)?;

        let top_level = self
            .store
            .top_level_comments(classroom.id, CommentSubject::new(kind, item_id))
            .await?;

        let reply_ids: Vec<Uuid> = top_level
            .iter()
            .flat_map(|it| it.replies.iter().copied())
            .collect();
        let mut replies: HashMap<Uuid, Comment> = self
            .store
            .get_comments(&reply_ids)
            .await?
            .into_iter()
            .map(|it| (it.id, it))
            .collect();

        Ok(top_level
            .into_iter()
            .map(|comment| {
                let resolved = comment
                    .replies
                    .iter()
                    .filter_map(|id| replies.remove(id))
                    .collect();
                CommentThread::new(comment, resolved)
            })
            .collect())
    }

    #[tracing::instrument(skip(self, content))]
    pub async fn update_comment(
        &self,
        id: Uuid,
        caller: Uuid,
        content: Option<&str>,
    ) -> ClassResult<Comment> {
        let comment = self.find(id).await?;
        if comment.user != caller {
            tracing::debug!(%id, %caller, "author required");
            return Err(ClassError::forbidden("only the author can edit this comment"));
        }
        let content =
            non_blank(content).ok_or_else(|| ClassError::validation("comment content is required"))?;

        let updated = self
            .store
            .update_comment_content(id, content, self.clock.now())
            .await?
            .ok_or_else(|| ClassError::not_found("comment"))?;

        tracing::info!(%id, "edited comment");
        Ok(updated)
    }

    /// Deletes the comment with all replies below it and detaches it from
    /// its parent.
    #[tracing::instrument(skip(self))]
    pub async fn delete_comment(&self, id: Uuid, caller: Uuid) -> ClassResult<()> {
        let comment = self.find(id).await?;
        if comment.user != caller {
            let teaches = self
                .store
                .get_classroom(comment.classroom)
                .await?
                .map_or(false, |it| role_of(&it, caller) == ClassRole::Teacher);
            if !teaches {
                tracing::debug!(%id, %caller, "author or teacher required");
                return Err(ClassError::forbidden(
                    "only the author or the teacher can delete this comment",
                ));
            }
        }

        let descendants = self.descendants(&comment).await?;
        if !descendants.is_empty() {
            self.store.delete_comments(&descendants).await?;
        }
        if let Some(parent) = comment.parent {
            self.store.pull_reply(parent, comment.id).await?;
        }
        self.store.delete_comments(&[comment.id]).await?;

        tracing::info!(%id, replies = descendants.len(), "deleted comment");
        Ok(())
    }

    /// Every reply below `root`, breadth first.
    async fn descendants(&self, root: &Comment) -> ClassResult<Vec<Uuid>> {
        let mut seen: HashSet<Uuid> = HashSet::from([root.id]);
        let mut found = vec![];
        let mut frontier: Vec<Uuid> = root.replies.clone();

        while !frontier.is_empty() {
            frontier.retain(|it| seen.insert(*it));
            found.extend(frontier.iter().copied());

            frontier = self
                .store
                .get_comments(&frontier)
                .await?
                .into_iter()
                .flat_map(|it| it.replies)
                .collect();
        }

        Ok(found)
    }
}
