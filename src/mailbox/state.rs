//! Mailbox view state and its transition function
//!
//! `MailboxState` is never mutated in place by callers. `apply` takes the
//! current state plus one `Transition` and returns the complete next state,
//! so a half-applied update is impossible to observe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mail::{
    AccountScope, Folder, LabelId, Message, MessageFlags, MessageId, Placement, ViewFolder,
};

use super::filter::{SearchFilters, derive_view};
use super::selection::Selection;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Date,
    From,
    Subject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// User sort preference. Stored with the view; the primary list stays
/// newest-first regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Closed set of state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    SelectFolder(ViewFolder),
    SelectAccount(AccountScope),
    /// Open (or close with `None`) a message; opening marks it read
    SelectMessage(Option<MessageId>),
    ToggleStar(MessageId),
    SetRead { ids: Vec<MessageId>, read: bool },
    Move { ids: Vec<MessageId>, folder: Folder },
    /// Undo of a move: back into `placement`, holding-folder deadline included
    Restore { ids: Vec<MessageId>, placement: Placement },
    DeletePermanently(Vec<MessageId>),
    EmptyFolder(Folder),
    AddLabels { ids: Vec<MessageId>, labels: Vec<LabelId> },
    RemoveLabels { ids: Vec<MessageId>, labels: Vec<LabelId> },
    Snooze { ids: Vec<MessageId>, until: DateTime<Utc> },
    /// Manual un-snooze
    Unsnooze(MessageId),
    /// Scheduler-driven wake; narrows selection instead of clearing it
    WakeSnoozed(MessageId),
    Schedule { message: Box<Message>, at: DateTime<Utc> },
    CancelScheduled(MessageId),
    /// Scheduler-driven send of a scheduled message
    ReleaseScheduled(MessageId),
    /// Insert or replace a message by id (send, save draft)
    Upsert(Box<Message>),
    SetFilters(SearchFilters),
    SetSearch(String),
    SetSort(SortOrder),
    ToggleSelection(MessageId),
    /// `visible` is the post-filter id order at the time of the click
    ToggleSelectionRange { id: MessageId, visible: Vec<MessageId> },
    SelectAll { visible: Vec<MessageId> },
    SetSelection(Vec<MessageId>),
    ClearSelection,
    /// Authoritative reload from the gateway
    ReplaceAll(Vec<Message>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MailboxState {
    pub messages: Vec<Message>,
    pub folder: ViewFolder,
    pub scope: AccountScope,
    pub filters: SearchFilters,
    pub sort: SortOrder,
    pub selection: Selection,
    /// Message currently open in the reader
    pub selected_id: Option<MessageId>,
}

impl MailboxState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn selected_message(&self) -> Option<&Message> {
        self.selected_id.as_deref().and_then(|id| self.message(id))
    }

    /// Derived list for the current view
    pub fn visible(&self, day_start: DateTime<Utc>) -> Vec<&Message> {
        derive_view(
            &self.messages,
            self.folder,
            &self.scope,
            &self.filters,
            day_start,
        )
    }

    pub fn visible_ids(&self, day_start: DateTime<Utc>) -> Vec<MessageId> {
        self.visible(day_start)
            .into_iter()
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.is_selected(id)
    }

    /// Thread members, oldest first
    pub fn thread(&self, thread_id: &str) -> Vec<&Message> {
        let mut members: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .collect();
        members.sort_by(|a, b| a.date.cmp(&b.date));
        members
    }

    pub fn folder_count(&self, folder: ViewFolder, scope: &AccountScope) -> usize {
        self.messages
            .iter()
            .filter(|m| folder.contains(m) && scope.contains(m))
            .count()
    }

    pub fn unread_count(&self, folder: ViewFolder, scope: &AccountScope) -> usize {
        self.messages
            .iter()
            .filter(|m| folder.contains(m) && scope.contains(m) && !m.is_read())
            .count()
    }

    /// Unread inbox messages across every account
    pub fn total_unread(&self) -> usize {
        self.unread_count(Folder::Inbox.into(), &AccountScope::All)
    }

    /// Snoozed messages whose deadline is at or before `now`
    pub fn due_snoozes(&self, now: DateTime<Utc>) -> Vec<MessageId> {
        self.messages
            .iter()
            .filter(|m| m.folder == Folder::Snoozed && m.snooze_until.is_some_and(|t| t <= now))
            .map(|m| m.id.clone())
            .collect()
    }

    /// Scheduled messages whose send time is at or before `now`
    pub fn due_scheduled(&self, now: DateTime<Utc>) -> Vec<MessageId> {
        self.messages
            .iter()
            .filter(|m| {
                m.folder == Folder::Scheduled && m.scheduled_send_at.is_some_and(|t| t <= now)
            })
            .map(|m| m.id.clone())
            .collect()
    }

    /// Produce the next state
    pub fn apply(&self, transition: Transition) -> Self {
        let mut next = self.clone();
        match transition {
            Transition::SelectFolder(folder) => {
                next.folder = folder;
                next.reset_view();
            }
            Transition::SelectAccount(scope) => {
                next.scope = scope;
                next.reset_view();
            }
            Transition::SelectMessage(id) => {
                if let Some(ref id) = id {
                    next.update(std::slice::from_ref(id), |m| {
                        m.flags.insert(MessageFlags::READ)
                    });
                }
                next.selected_id = id;
            }
            Transition::ToggleStar(id) => {
                next.update(std::slice::from_ref(&id), |m| {
                    m.flags.toggle(MessageFlags::STARRED)
                });
            }
            Transition::SetRead { ids, read } => {
                next.update(&ids, |m| m.flags.set(MessageFlags::READ, read));
                next.selection = Selection::cleared();
            }
            Transition::Move { ids, folder } => {
                if matches!(folder, Folder::Snoozed | Folder::Scheduled) {
                    tracing::warn!("Refusing plain move into holding folder {}", folder);
                    return next;
                }
                next.update(&ids, |m| m.relocate(folder));
                next.release(&ids);
            }
            Transition::Restore { ids, placement } => {
                if !placement.is_complete() {
                    tracing::warn!("Refusing restore into {} without a deadline", placement.folder);
                    return next;
                }
                next.update(&ids, |m| m.place(&placement));
                next.release(&ids);
            }
            Transition::DeletePermanently(ids) => {
                next.messages.retain(|m| !ids.contains(&m.id));
                next.release(&ids);
            }
            Transition::EmptyFolder(folder) => {
                let ids: Vec<MessageId> = next
                    .messages
                    .iter()
                    .filter(|m| m.folder == folder)
                    .map(|m| m.id.clone())
                    .collect();
                next.messages.retain(|m| m.folder != folder);
                next.release(&ids);
            }
            Transition::AddLabels { ids, labels } => {
                next.update(&ids, |m| m.labels.extend(labels.iter().cloned()));
            }
            Transition::RemoveLabels { ids, labels } => {
                next.update(&ids, |m| m.labels.retain(|l| !labels.contains(l)));
            }
            Transition::Snooze { ids, until } => {
                next.update(&ids, |m| match m.folder {
                    // Deadline would be lost on wake
                    Folder::Scheduled => {}
                    // Re-snooze keeps the original return folder
                    Folder::Snoozed => m.snooze_until = Some(until),
                    from => {
                        m.folder = Folder::Snoozed;
                        m.snooze_until = Some(until);
                        m.snoozed_from = Some(from);
                    }
                });
                next.release(&ids);
            }
            Transition::Unsnooze(id) => {
                next.wake(&id);
                next.release(std::slice::from_ref(&id));
            }
            Transition::WakeSnoozed(id) => {
                next.wake(&id);
                next.narrow(std::slice::from_ref(&id));
            }
            Transition::Schedule { message, at } => {
                let mut message = *message;
                message.relocate(Folder::Scheduled);
                message.scheduled_send_at = Some(at);
                message.flags.remove(MessageFlags::DRAFT);
                let id = message.id.clone();
                next.upsert(message);
                next.release(std::slice::from_ref(&id));
            }
            Transition::CancelScheduled(id) => {
                next.update(std::slice::from_ref(&id), |m| {
                    if m.folder == Folder::Scheduled {
                        m.relocate(Folder::Drafts);
                        m.flags.insert(MessageFlags::DRAFT);
                    }
                });
                next.release(std::slice::from_ref(&id));
            }
            Transition::ReleaseScheduled(id) => {
                next.update(std::slice::from_ref(&id), |m| {
                    if m.folder == Folder::Scheduled {
                        if let Some(at) = m.scheduled_send_at {
                            m.date = at;
                        }
                        m.relocate(Folder::Sent);
                    }
                });
                next.narrow(std::slice::from_ref(&id));
            }
            Transition::Upsert(message) => {
                let id = message.id.clone();
                let moved = next.message(&id).is_some_and(|m| m.folder != message.folder);
                next.upsert(*message);
                if moved {
                    next.release(std::slice::from_ref(&id));
                }
            }
            Transition::SetFilters(filters) => {
                next.filters = filters;
                next.selection = Selection::cleared();
            }
            Transition::SetSearch(text) => {
                next.filters.text = text;
                next.selection = Selection::cleared();
            }
            Transition::SetSort(sort) => {
                next.sort = sort;
            }
            Transition::ToggleSelection(id) => {
                next.selection = next.selection.toggle(&id);
            }
            Transition::ToggleSelectionRange { id, visible } => {
                next.selection = next.selection.toggle_range(&id, &visible);
            }
            Transition::SelectAll { visible } => {
                next.selection = next.selection.select_all(&visible);
            }
            Transition::SetSelection(ids) => {
                next.selection = next.selection.with_ids(ids);
            }
            Transition::ClearSelection => {
                next.selection = Selection::cleared();
            }
            Transition::ReplaceAll(messages) => {
                next.messages = messages;
                let present = |id: &str| next.messages.iter().any(|m| m.id == id);
                next.selection = next.selection.retain(present);
                if next.selected_id.as_deref().is_some_and(|id| !present(id)) {
                    next.selected_id = None;
                }
            }
        }
        next
    }

    fn update(&mut self, ids: &[MessageId], mut f: impl FnMut(&mut Message)) {
        for message in self.messages.iter_mut().filter(|m| ids.contains(&m.id)) {
            f(message);
        }
    }

    fn upsert(&mut self, message: Message) {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => self.messages.push(message),
        }
    }

    fn wake(&mut self, id: &MessageId) {
        self.update(std::slice::from_ref(id), |m| {
            if m.folder == Folder::Snoozed {
                let to = m.snoozed_from.unwrap_or(Folder::Inbox);
                m.relocate(to);
            }
        });
    }

    fn reset_view(&mut self) {
        self.selected_id = None;
        self.selection = Selection::cleared();
        self.filters = SearchFilters::default();
    }

    /// Bulk actions are one-shot: clear multi-selection and close the reader
    /// if it shows one of `ids`
    fn release(&mut self, ids: &[MessageId]) {
        self.selection = Selection::cleared();
        self.close_if_affected(ids);
    }

    /// Drop only `ids` from the selection
    fn narrow(&mut self, ids: &[MessageId]) {
        self.selection = self.selection.retain(|id| !ids.iter().any(|i| i == id));
        self.close_if_affected(ids);
    }

    fn close_if_affected(&mut self, ids: &[MessageId]) {
        if self
            .selected_id
            .as_ref()
            .is_some_and(|selected| ids.contains(selected))
        {
            self.selected_id = None;
        }
    }
}

/// Placement of the first message in `ids` that still exists
pub fn first_placement(state: &MailboxState, ids: &[MessageId]) -> Option<Placement> {
    ids.iter()
        .find_map(|id| state.message(id))
        .map(Message::placement)
}
