//! Mailbox actor: the single task that owns the store
//!
//! User commands, scheduler ticks and undo reversals all arrive on one
//! channel and run one at a time, in arrival order. After every command the
//! new state is published on a watch channel.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::filter::{SearchFilters, day_start};
use super::state::{MailboxState, SortOrder, first_placement};
use super::store::MailboxStore;
use crate::constants::COMMAND_CHANNEL_CAPACITY;
use crate::error::MailboxError;
use crate::gateway::{GatewayResult, PersistTicket, PersistenceGateway};
use crate::mail::{
    AccountScope, ComposeInput, Folder, LabelId, Message, MessageId, Placement, ViewFolder,
};

/// Store operations as values
#[derive(Debug, Clone)]
pub enum MailboxOp {
    SelectFolder(ViewFolder),
    SelectAccount(AccountScope),
    SelectMessage(Option<MessageId>),
    SetSearch(String),
    SetFilters(SearchFilters),
    SetSort(SortOrder),
    ToggleSelection(MessageId),
    ToggleSelectionRange(MessageId),
    SelectAll,
    SetSelection(Vec<MessageId>),
    ClearSelection,
    ToggleStar(MessageId),
    SetRead {
        ids: Vec<MessageId>,
        read: bool,
    },
    Delete(Vec<MessageId>),
    DeletePermanently(Vec<MessageId>),
    EmptyFolder(Folder),
    Archive(Vec<MessageId>),
    MoveTo {
        ids: Vec<MessageId>,
        folder: Folder,
    },
    Restore {
        ids: Vec<MessageId>,
        placement: Placement,
    },
    MarkSpam(Vec<MessageId>),
    MarkNotSpam(Vec<MessageId>),
    AddLabels {
        ids: Vec<MessageId>,
        labels: Vec<LabelId>,
    },
    RemoveLabels {
        ids: Vec<MessageId>,
        labels: Vec<LabelId>,
    },
    Snooze {
        ids: Vec<MessageId>,
        until: DateTime<Utc>,
    },
    Unsnooze(MessageId),
    WakeDueSnoozes(DateTime<Utc>),
    Schedule {
        input: Box<ComposeInput>,
        at: DateTime<Utc>,
    },
    CancelScheduled(MessageId),
    ReleaseDueScheduled(DateTime<Utc>),
    Send(Box<ComposeInput>),
    SaveDraft(Box<ComposeInput>),
    ReplaceAll(Vec<Message>),
}

/// What an operation did: the gateway calls it issued, the id produced by
/// compose operations, and for folder moves where the first affected
/// message lived beforehand
#[derive(Debug, Default)]
pub struct Outcome {
    pub tickets: Vec<PersistTicket>,
    pub message_id: Option<MessageId>,
    pub previous: Option<Placement>,
}

impl Outcome {
    fn persisted(ticket: Option<PersistTicket>) -> Self {
        Self {
            tickets: ticket.into_iter().collect(),
            ..Default::default()
        }
    }

    fn composed(id: MessageId, ticket: Option<PersistTicket>) -> Self {
        Self {
            tickets: ticket.into_iter().collect(),
            message_id: Some(id),
            ..Default::default()
        }
    }

    fn moved(previous: Option<Placement>, ticket: Option<PersistTicket>) -> Self {
        Self {
            tickets: ticket.into_iter().collect(),
            previous,
            ..Default::default()
        }
    }

    /// Whether the operation changed anything that needed persisting
    pub fn is_persisted(&self) -> bool {
        !self.tickets.is_empty()
    }

    /// Await every gateway call
    pub async fn settle(self) -> Vec<GatewayResult<Option<Message>>> {
        let mut results = Vec::with_capacity(self.tickets.len());
        for ticket in self.tickets {
            results.push(ticket.outcome().await);
        }
        results
    }
}

fn run<G: PersistenceGateway>(store: &mut MailboxStore<G>, op: MailboxOp) -> Outcome {
    match op {
        MailboxOp::SelectFolder(folder) => {
            store.select_folder(folder);
            Outcome::default()
        }
        MailboxOp::SelectAccount(scope) => {
            store.select_account(scope);
            Outcome::default()
        }
        MailboxOp::SelectMessage(id) => Outcome::persisted(store.select_message(id)),
        MailboxOp::SetSearch(text) => {
            store.set_search(text);
            Outcome::default()
        }
        MailboxOp::SetFilters(filters) => {
            store.set_filters(filters);
            Outcome::default()
        }
        MailboxOp::SetSort(sort) => {
            store.set_sort(sort);
            Outcome::default()
        }
        MailboxOp::ToggleSelection(id) => {
            store.toggle_selection(id);
            Outcome::default()
        }
        MailboxOp::ToggleSelectionRange(id) => {
            store.toggle_selection_range(id);
            Outcome::default()
        }
        MailboxOp::SelectAll => {
            store.select_all();
            Outcome::default()
        }
        MailboxOp::SetSelection(ids) => {
            store.set_selection(ids);
            Outcome::default()
        }
        MailboxOp::ClearSelection => {
            store.clear_selection();
            Outcome::default()
        }
        MailboxOp::ToggleStar(id) => Outcome::persisted(store.toggle_star(id)),
        MailboxOp::SetRead { ids, read } => Outcome::persisted(store.set_read(&ids, read)),
        MailboxOp::Delete(ids) => {
            let before = first_placement(store.state(), &ids);
            Outcome::moved(before, store.delete(&ids))
        }
        MailboxOp::DeletePermanently(ids) => Outcome::persisted(store.delete_permanently(&ids)),
        MailboxOp::EmptyFolder(folder) => Outcome::persisted(store.empty_folder(folder)),
        MailboxOp::Archive(ids) => {
            let before = first_placement(store.state(), &ids);
            Outcome::moved(before, store.archive(&ids))
        }
        MailboxOp::MoveTo { ids, folder } => {
            let before = first_placement(store.state(), &ids);
            Outcome::moved(before, store.move_to(&ids, folder))
        }
        MailboxOp::Restore { ids, placement } => {
            let before = first_placement(store.state(), &ids);
            Outcome::moved(before, store.restore(&ids, placement))
        }
        MailboxOp::MarkSpam(ids) => {
            let before = first_placement(store.state(), &ids);
            Outcome::moved(before, store.mark_spam(&ids))
        }
        MailboxOp::MarkNotSpam(ids) => {
            let before = first_placement(store.state(), &ids);
            Outcome::moved(before, store.mark_not_spam(&ids))
        }
        MailboxOp::AddLabels { ids, labels } => {
            Outcome::persisted(store.add_labels(&ids, labels))
        }
        MailboxOp::RemoveLabels { ids, labels } => {
            Outcome::persisted(store.remove_labels(&ids, labels))
        }
        MailboxOp::Snooze { ids, until } => Outcome::persisted(store.snooze(&ids, until)),
        MailboxOp::Unsnooze(id) => Outcome::persisted(store.unsnooze(id)),
        MailboxOp::WakeDueSnoozes(now) => Outcome {
            tickets: store.wake_due_snoozes(now),
            ..Default::default()
        },
        MailboxOp::Schedule { input, at } => {
            let (id, ticket) = store.schedule(&input, at);
            Outcome::composed(id, ticket)
        }
        MailboxOp::CancelScheduled(id) => Outcome::persisted(store.cancel_scheduled(id)),
        MailboxOp::ReleaseDueScheduled(now) => Outcome {
            tickets: store.release_due_scheduled(now),
            ..Default::default()
        },
        MailboxOp::Send(input) => {
            let (id, ticket) = store.send(&input);
            Outcome::composed(id, Some(ticket))
        }
        MailboxOp::SaveDraft(input) => {
            let (id, ticket) = store.save_draft(&input);
            Outcome::composed(id, Some(ticket))
        }
        MailboxOp::ReplaceAll(messages) => {
            store.replace_all(messages);
            Outcome::default()
        }
    }
}

enum MailboxCommand {
    Execute {
        op: MailboxOp,
        reply: oneshot::Sender<Outcome>,
    },
    Shutdown,
}

/// Cloneable handle for talking to the mailbox actor
#[derive(Clone)]
pub struct MailboxHandle {
    cmd_tx: mpsc::Sender<MailboxCommand>,
    state_rx: watch::Receiver<Arc<MailboxState>>,
}

impl MailboxHandle {
    /// Queue an operation and wait for it to be applied
    pub async fn execute(&self, op: MailboxOp) -> Result<Outcome, MailboxError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(MailboxCommand::Execute { op, reply })
            .await
            .map_err(|_| MailboxError::Closed)?;
        rx.await.map_err(|_| MailboxError::NoReply)
    }

    pub async fn move_to(
        &self,
        ids: Vec<MessageId>,
        folder: Folder,
    ) -> Result<Outcome, MailboxError> {
        self.execute(MailboxOp::MoveTo { ids, folder }).await
    }

    pub async fn restore(
        &self,
        ids: Vec<MessageId>,
        placement: Placement,
    ) -> Result<Outcome, MailboxError> {
        self.execute(MailboxOp::Restore { ids, placement }).await
    }

    /// Latest published state
    pub fn snapshot(&self) -> Arc<MailboxState> {
        Arc::clone(&self.state_rx.borrow())
    }

    /// Visible ids of the latest snapshot
    pub fn visible_ids(&self) -> Vec<MessageId> {
        self.snapshot().visible_ids(day_start(&Local::now()))
    }

    /// Receiver notified after every applied command
    pub fn subscribe(&self) -> watch::Receiver<Arc<MailboxState>> {
        self.state_rx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(MailboxCommand::Shutdown).await;
    }
}

/// Spawn the actor task that owns `store`
pub fn spawn_mailbox_actor<G: PersistenceGateway>(
    store: MailboxStore<G>,
) -> (MailboxHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (state_tx, state_rx) = watch::channel(Arc::new(store.state().clone()));

    let task = tokio::spawn(mailbox_actor_loop(store, cmd_rx, state_tx));

    (MailboxHandle { cmd_tx, state_rx }, task)
}

async fn mailbox_actor_loop<G: PersistenceGateway>(
    mut store: MailboxStore<G>,
    mut cmd_rx: mpsc::Receiver<MailboxCommand>,
    state_tx: watch::Sender<Arc<MailboxState>>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            MailboxCommand::Execute { op, reply } => {
                let outcome = run(&mut store, op);
                state_tx.send_replace(Arc::new(store.state().clone()));
                if reply.send(outcome).is_err() {
                    tracing::debug!("Mailbox actor: caller dropped reply");
                }
            }
            MailboxCommand::Shutdown => break,
        }
    }
    tracing::info!("Mailbox actor stopped");
}
