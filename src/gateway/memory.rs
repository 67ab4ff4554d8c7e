//! In-process gateway backed by a map
//!
//! Used by the binary's demo mode and by tests. Records every call so
//! callers can assert on persistence traffic, and can be told to fail the
//! next call.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{GatewayError, GatewayResult, PersistenceGateway};
use crate::mail::{Folder, LabelId, Message, MessageFlags, MessageId, Placement};

#[derive(Debug, Default)]
struct Inner {
    messages: HashMap<MessageId, Message>,
    calls: Vec<&'static str>,
    fail_next: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryGateway {
    inner: Mutex<Inner>,
}

impl MemoryGateway {
    pub fn with_messages(messages: impl IntoIterator<Item = Message>) -> Self {
        let gateway = Self::default();
        gateway.inner().messages = messages.into_iter().map(|m| (m.id.clone(), m)).collect();
        gateway
    }

    /// Make the next call return `Unavailable`
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.inner().fail_next = Some(reason.into());
    }

    /// Operation kinds received so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.inner().calls.clone()
    }

    pub fn message(&self, id: &str) -> Option<Message> {
        self.inner().messages.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call, honour a pending failure, then run `f`
    fn call<T>(
        &self,
        kind: &'static str,
        f: impl FnOnce(&mut Inner) -> GatewayResult<T>,
    ) -> GatewayResult<T> {
        let mut inner = self.inner();
        inner.calls.push(kind);
        if let Some(reason) = inner.fail_next.take() {
            return Err(GatewayError::Unavailable(reason));
        }
        f(&mut inner)
    }

    fn each(
        &self,
        kind: &'static str,
        ids: &[MessageId],
        mut f: impl FnMut(&mut Message),
    ) -> GatewayResult<()> {
        self.call(kind, |inner| {
            if let Some(missing) = ids.iter().find(|id| !inner.messages.contains_key(*id)) {
                return Err(GatewayError::NotFound(missing.clone()));
            }
            for id in ids {
                if let Some(message) = inner.messages.get_mut(id) {
                    f(message);
                }
            }
            Ok(())
        })
    }
}

impl PersistenceGateway for MemoryGateway {
    async fn fetch_all(&self) -> GatewayResult<Vec<Message>> {
        self.call("fetch_all", |inner| {
            // Map order is arbitrary; newest first with id as tie-break keeps
            // repeated fetches identical
            let mut messages: Vec<Message> = inner.messages.values().cloned().collect();
            messages.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
            Ok(messages)
        })
    }

    async fn set_read(&self, ids: &[MessageId], read: bool) -> GatewayResult<()> {
        self.each("set_read", ids, |m| m.flags.set(MessageFlags::READ, read))
    }

    async fn set_starred(&self, id: &MessageId, starred: bool) -> GatewayResult<()> {
        self.each("set_starred", std::slice::from_ref(id), |m| {
            m.flags.set(MessageFlags::STARRED, starred)
        })
    }

    async fn delete(&self, ids: &[MessageId]) -> GatewayResult<()> {
        self.each("delete", ids, |m| m.relocate(Folder::Trash))
    }

    async fn delete_permanently(&self, ids: &[MessageId]) -> GatewayResult<()> {
        self.call("delete_permanently", |inner| {
            for id in ids {
                inner.messages.remove(id);
            }
            Ok(())
        })
    }

    async fn archive(&self, ids: &[MessageId]) -> GatewayResult<()> {
        self.each("archive", ids, |m| m.relocate(Folder::Archive))
    }

    async fn move_to(&self, ids: &[MessageId], folder: Folder) -> GatewayResult<()> {
        self.each("move_to", ids, |m| m.relocate(folder))
    }

    async fn restore(&self, ids: &[MessageId], placement: &Placement) -> GatewayResult<()> {
        self.each("restore", ids, |m| m.place(placement))
    }

    async fn set_spam(&self, ids: &[MessageId], spam: bool) -> GatewayResult<()> {
        let folder = if spam { Folder::Spam } else { Folder::Inbox };
        self.each("set_spam", ids, |m| m.relocate(folder))
    }

    async fn add_labels(&self, ids: &[MessageId], labels: &[LabelId]) -> GatewayResult<()> {
        self.each("add_labels", ids, |m| m.labels.extend(labels.iter().cloned()))
    }

    async fn remove_labels(&self, ids: &[MessageId], labels: &[LabelId]) -> GatewayResult<()> {
        self.each("remove_labels", ids, |m| {
            m.labels.retain(|l| !labels.contains(l))
        })
    }

    async fn snooze(&self, ids: &[MessageId], until: DateTime<Utc>) -> GatewayResult<()> {
        self.each("snooze", ids, |m| {
            if m.folder != Folder::Snoozed {
                m.snoozed_from = Some(m.folder);
                m.folder = Folder::Snoozed;
            }
            m.snooze_until = Some(until);
        })
    }

    async fn create(&self, message: &Message) -> GatewayResult<Message> {
        self.call("create", |inner| {
            if inner.messages.contains_key(&message.id) {
                return Err(GatewayError::Rejected(format!(
                    "duplicate id {}",
                    message.id
                )));
            }
            inner.messages.insert(message.id.clone(), message.clone());
            Ok(message.clone())
        })
    }

    async fn update(&self, message: &Message) -> GatewayResult<Message> {
        self.call("update", |inner| match inner.messages.get_mut(&message.id) {
            Some(stored) => {
                *stored = message.clone();
                Ok(message.clone())
            }
            None => Err(GatewayError::NotFound(message.id.clone())),
        })
    }

    async fn save_draft(&self, message: &Message) -> GatewayResult<Message> {
        self.call("save_draft", |inner| {
            inner.messages.insert(message.id.clone(), message.clone());
            Ok(message.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::ComposeInput;

    fn make_message(id: &str, folder: Folder) -> Message {
        Message::from_compose(id.to_string(), &ComposeInput::default(), folder, Utc::now())
    }

    #[tokio::test]
    async fn test_bulk_call_rejects_unknown_ids() {
        let gateway = MemoryGateway::with_messages([make_message("a", Folder::Inbox)]);
        let result = gateway
            .archive(&["a".to_string(), "ghost".to_string()])
            .await;
        assert_eq!(result, Err(GatewayError::NotFound("ghost".to_string())));
        // Nothing applied on rejection
        assert_eq!(gateway.message("a").unwrap().folder, Folder::Inbox);
    }

    #[tokio::test]
    async fn test_create_then_update() {
        let gateway = MemoryGateway::default();
        let mut message = make_message("d", Folder::Drafts);
        gateway.create(&message).await.unwrap();
        assert!(gateway.create(&message).await.is_err());

        message.relocate(Folder::Sent);
        gateway.update(&message).await.unwrap();
        assert_eq!(gateway.message("d").unwrap().folder, Folder::Sent);
        assert_eq!(gateway.calls(), vec!["create", "create", "update"]);
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let gateway = MemoryGateway::with_messages([make_message("a", Folder::Inbox)]);
        gateway.fail_next("down");
        assert!(gateway.fetch_all().await.is_err());
        assert_eq!(gateway.fetch_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_all_order_is_stable() {
        let date = Utc::now();
        let mut older = make_message("z", Folder::Inbox);
        older.date = date - chrono::Duration::minutes(5);
        let mut messages = vec![older];
        for id in ["d", "b", "c", "a"] {
            let mut message = make_message(id, Folder::Inbox);
            message.date = date;
            messages.push(message);
        }
        let gateway = MemoryGateway::with_messages(messages);

        let first: Vec<MessageId> = gateway
            .fetch_all()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(first, vec!["a", "b", "c", "d", "z"]);
        for _ in 0..5 {
            let again: Vec<MessageId> = gateway
                .fetch_all()
                .await
                .unwrap()
                .into_iter()
                .map(|m| m.id)
                .collect();
            assert_eq!(again, first);
        }
    }

    #[tokio::test]
    async fn test_restore_sets_deadline() {
        let gateway = MemoryGateway::with_messages([make_message("a", Folder::Trash)]);
        let until = Utc::now();
        let placement = Placement {
            folder: Folder::Snoozed,
            snooze_until: Some(until),
            snoozed_from: Some(Folder::Inbox),
            scheduled_send_at: None,
        };
        gateway.restore(&["a".to_string()], &placement).await.unwrap();
        let stored = gateway.message("a").unwrap();
        assert_eq!(stored.placement(), placement);
        assert!(stored.deadlines_consistent());
    }
}
