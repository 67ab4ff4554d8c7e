//! Undoable mailbox actions
//!
//! Delete, archive, move and spam each push exactly one undo entry. The
//! entry records where the first affected message lived, including a snooze
//! or send deadline, and undo puts the whole id set back there through the
//! normal mailbox path.

use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::MailboxError;
use crate::mail::{Folder, MessageId, Placement};
use crate::mailbox::{MailboxHandle, MailboxOp, Outcome};
use crate::undo::{UndoCommand, UndoConfig, UndoId, UndoStack};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoCategory {
    Delete,
    Archive,
    Move,
    Spam,
}

impl UndoCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Archive => "archive",
            Self::Move => "move",
            Self::Spam => "spam",
        }
    }
}

/// Reversal of a folder move: put `ids` back in `restore_to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxUndo {
    pub category: UndoCategory,
    pub ids: Vec<MessageId>,
    pub restore_to: Placement,
}

impl UndoCommand for MailboxUndo {
    fn category(&self) -> &'static str {
        self.category.as_str()
    }
}

async fn restore(handle: MailboxHandle, undo: MailboxUndo) -> anyhow::Result<()> {
    let folder = undo.restore_to.folder;
    let outcome = handle.restore(undo.ids, undo.restore_to).await?;
    if !outcome.is_persisted() {
        anyhow::bail!("nothing to restore into {}", folder);
    }
    Ok(())
}

fn describe(category: UndoCategory, count: usize, target: Folder) -> String {
    let noun = if count == 1 { "message" } else { "messages" };
    match category {
        UndoCategory::Delete => format!("Deleted {} {}", count, noun),
        UndoCategory::Archive => format!("Archived {} {}", count, noun),
        UndoCategory::Move => format!("Moved {} {} to {}", count, noun, target.display_name()),
        UndoCategory::Spam => format!("Marked {} {} as spam", count, noun),
    }
}

pub struct MailActions {
    handle: MailboxHandle,
    undo: UndoStack<MailboxUndo>,
}

impl MailActions {
    pub fn new(handle: MailboxHandle, config: UndoConfig) -> Self {
        let reverter = handle.clone();
        let undo = UndoStack::new(config, move |command: MailboxUndo| {
            restore(reverter.clone(), command).boxed()
        });
        Self { handle, undo }
    }

    /// Replace the undo stack, e.g. to attach an expiry callback
    pub fn map_undo(
        mut self,
        f: impl FnOnce(UndoStack<MailboxUndo>) -> UndoStack<MailboxUndo>,
    ) -> Self {
        self.undo = f(self.undo);
        self
    }

    pub fn handle(&self) -> &MailboxHandle {
        &self.handle
    }

    pub fn undo(&self) -> &UndoStack<MailboxUndo> {
        &self.undo
    }

    pub async fn delete(
        &self,
        ids: Vec<MessageId>,
    ) -> Result<(Outcome, Option<UndoId>), MailboxError> {
        self.perform(UndoCategory::Delete, Folder::Trash, MailboxOp::Delete(ids.clone()), ids)
            .await
    }

    pub async fn archive(
        &self,
        ids: Vec<MessageId>,
    ) -> Result<(Outcome, Option<UndoId>), MailboxError> {
        self.perform(
            UndoCategory::Archive,
            Folder::Archive,
            MailboxOp::Archive(ids.clone()),
            ids,
        )
        .await
    }

    pub async fn move_to(
        &self,
        ids: Vec<MessageId>,
        folder: Folder,
    ) -> Result<(Outcome, Option<UndoId>), MailboxError> {
        let op = MailboxOp::MoveTo {
            ids: ids.clone(),
            folder,
        };
        self.perform(UndoCategory::Move, folder, op, ids).await
    }

    pub async fn mark_spam(
        &self,
        ids: Vec<MessageId>,
    ) -> Result<(Outcome, Option<UndoId>), MailboxError> {
        self.perform(UndoCategory::Spam, Folder::Spam, MailboxOp::MarkSpam(ids.clone()), ids)
            .await
    }

    async fn perform(
        &self,
        category: UndoCategory,
        target: Folder,
        op: MailboxOp,
        ids: Vec<MessageId>,
    ) -> Result<(Outcome, Option<UndoId>), MailboxError> {
        let outcome = self.handle.execute(op).await?;
        let undo_id = match outcome.previous {
            Some(restore_to) if outcome.is_persisted() => {
                let description = describe(category, ids.len(), target);
                let command = MailboxUndo {
                    category,
                    ids,
                    restore_to,
                };
                Some(self.undo.push(command, description))
            }
            _ => None,
        };
        Ok((outcome, undo_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use crate::mail::{ComposeInput, Message, MessageFlags};
    use crate::mailbox::{MailboxStore, spawn_mailbox_actor};
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn make_message(id: &str, folder: Folder) -> Message {
        let mut message =
            Message::from_compose(id.to_string(), &ComposeInput::default(), folder, Utc::now());
        message.flags = MessageFlags::empty();
        message
    }

    fn make_actions(messages: Vec<Message>) -> (MailActions, Arc<MemoryGateway>) {
        let gateway = Arc::new(MemoryGateway::with_messages(messages.clone()));
        let (handle, _task) =
            spawn_mailbox_actor(MailboxStore::new(Arc::clone(&gateway), messages));
        let config = UndoConfig {
            expire: Duration::from_secs(10),
            max_size: 10,
        };
        (MailActions::new(handle, config), gateway)
    }

    fn ids(v: &[&str]) -> Vec<MessageId> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_bulk_delete_then_undo_restores_all() {
        let (actions, _gateway) = make_actions(vec![
            make_message("a", Folder::Archive),
            make_message("b", Folder::Archive),
            make_message("c", Folder::Archive),
        ]);

        let (_outcome, undo_id) = actions.delete(ids(&["a", "b", "c"])).await.unwrap();
        let undo_id = undo_id.unwrap();
        let entry = actions.undo().last().unwrap();
        assert_eq!(entry.description, "Deleted 3 messages");
        assert_eq!(entry.category, "delete");
        assert_eq!(entry.command.restore_to, Placement::folder(Folder::Archive));

        assert!(actions.undo().undo_by_id(undo_id).await);
        let state = actions.handle().snapshot();
        for id in ["a", "b", "c"] {
            assert_eq!(state.message(id).unwrap().folder, Folder::Archive);
        }
        assert!(!actions.undo().can_undo());
    }

    #[tokio::test]
    async fn test_mixed_folders_restore_to_first() {
        let (actions, _gateway) = make_actions(vec![
            make_message("a", Folder::Inbox),
            make_message("b", Folder::Archive),
        ]);
        actions.mark_spam(ids(&["a", "b"])).await.unwrap();
        assert!(actions.undo().undo_last().await);

        let state = actions.handle().snapshot();
        assert_eq!(state.message("a").unwrap().folder, Folder::Inbox);
        assert_eq!(state.message("b").unwrap().folder, Folder::Inbox);
    }

    #[tokio::test]
    async fn test_each_action_pushes_one_entry() {
        let (actions, _gateway) = make_actions(vec![
            make_message("a", Folder::Inbox),
            make_message("b", Folder::Inbox),
        ]);
        actions.archive(ids(&["a"])).await.unwrap();
        actions.move_to(ids(&["b"]), Folder::Sent).await.unwrap();

        let descriptions: Vec<String> = actions
            .undo()
            .entries()
            .into_iter()
            .map(|e| e.description)
            .collect();
        assert_eq!(descriptions, vec!["Moved 1 message to Sent", "Archived 1 message"]);

        // Stale ids move nothing and record nothing
        let (outcome, undo_id) = actions.delete(ids(&["ghost"])).await.unwrap();
        assert!(!outcome.is_persisted());
        assert!(undo_id.is_none());
        assert_eq!(actions.undo().len(), 2);

        // Undo goes through the store like any other move
        assert!(actions.undo().undo_last().await);
        let state = actions.handle().snapshot();
        assert_eq!(state.message("b").unwrap().folder, Folder::Inbox);
        assert_eq!(state.message("a").unwrap().folder, Folder::Archive);
    }

    #[tokio::test]
    async fn test_undo_of_vanished_messages_fails_quietly() {
        let (actions, _gateway) = make_actions(vec![make_message("a", Folder::Inbox)]);
        let (_, undo_id) = actions.delete(ids(&["a"])).await.unwrap();
        actions
            .handle()
            .execute(MailboxOp::EmptyFolder(Folder::Trash))
            .await
            .unwrap();

        assert!(!actions.undo().undo_by_id(undo_id.unwrap()).await);
        assert!(actions.undo().is_empty());
    }

    #[tokio::test]
    async fn test_undo_delete_of_snoozed_message_keeps_deadline() {
        let (actions, gateway) = make_actions(vec![make_message("s", Folder::Archive)]);
        let until = Utc::now() + chrono::Duration::hours(1);
        actions
            .handle()
            .execute(MailboxOp::Snooze {
                ids: ids(&["s"]),
                until,
            })
            .await
            .unwrap();

        let (_, undo_id) = actions.delete(ids(&["s"])).await.unwrap();
        assert!(actions.undo().undo_by_id(undo_id.unwrap()).await);

        let restored = actions.handle().snapshot().message("s").cloned().unwrap();
        assert_eq!(restored.folder, Folder::Snoozed);
        assert_eq!(restored.snooze_until, Some(until));
        assert_eq!(restored.snoozed_from, Some(Folder::Archive));

        // Queued behind the restore, so the gateway has caught up
        actions
            .handle()
            .execute(MailboxOp::SetRead {
                ids: ids(&["s"]),
                read: true,
            })
            .await
            .unwrap()
            .settle()
            .await;
        let stored = gateway.message("s").unwrap();
        assert_eq!(stored.placement(), restored.placement());
        assert_eq!(gateway.calls(), vec!["snooze", "delete", "restore", "set_read"]);
    }

    #[tokio::test]
    async fn test_undo_move_of_scheduled_message_keeps_send_time() {
        let (actions, _gateway) = make_actions(vec![]);
        let at = Utc::now() + chrono::Duration::hours(2);
        let outcome = actions
            .handle()
            .execute(MailboxOp::Schedule {
                input: Box::default(),
                at,
            })
            .await
            .unwrap();
        let id = outcome.message_id.clone().unwrap();

        let (_, undo_id) = actions.move_to(vec![id.clone()], Folder::Archive).await.unwrap();
        assert!(actions.undo().undo_by_id(undo_id.unwrap()).await);
        let state = actions.handle().snapshot();
        let restored = state.message(&id).unwrap();
        assert_eq!(restored.folder, Folder::Scheduled);
        assert_eq!(restored.scheduled_send_at, Some(at));
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_after_expiry_is_noop() {
        let (actions, _gateway) = make_actions(vec![make_message("a", Folder::Inbox)]);
        let (_, undo_id) = actions.delete(ids(&["a"])).await.unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(!actions.undo().undo_by_id(undo_id.unwrap()).await);
        let state = actions.handle().snapshot();
        assert_eq!(state.message("a").unwrap().folder, Folder::Trash);
    }
}
