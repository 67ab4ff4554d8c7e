//! Persistence gateway boundary
//!
//! The mailbox store never awaits persistence inline. Every persisted
//! mutation is turned into one `PersistOp` and queued on a `PersistQueue`.
//! A single worker task applies the queue to the gateway in order, while the
//! in-memory state has already moved on.

pub mod memory;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::mail::{Folder, LabelId, Message, MessageId, Placement};

pub use memory::MemoryGateway;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("message not found: {0}")]
    NotFound(MessageId),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Async CRUD surface the store persists through. Implementations decide
/// where and how data lives.
pub trait PersistenceGateway: Send + Sync + 'static {
    /// Authoritative collection, used for reconciliation
    fn fetch_all(&self) -> impl Future<Output = GatewayResult<Vec<Message>>> + Send;

    fn set_read(
        &self,
        ids: &[MessageId],
        read: bool,
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    fn set_starred(
        &self,
        id: &MessageId,
        starred: bool,
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Soft delete (move to trash)
    fn delete(&self, ids: &[MessageId]) -> impl Future<Output = GatewayResult<()>> + Send;

    fn delete_permanently(
        &self,
        ids: &[MessageId],
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    fn archive(&self, ids: &[MessageId]) -> impl Future<Output = GatewayResult<()>> + Send;

    fn move_to(
        &self,
        ids: &[MessageId],
        folder: Folder,
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Put `ids` back into `placement`, holding-folder deadline included
    fn restore(
        &self,
        ids: &[MessageId],
        placement: &Placement,
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    fn set_spam(
        &self,
        ids: &[MessageId],
        spam: bool,
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    fn add_labels(
        &self,
        ids: &[MessageId],
        labels: &[LabelId],
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    fn remove_labels(
        &self,
        ids: &[MessageId],
        labels: &[LabelId],
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    fn snooze(
        &self,
        ids: &[MessageId],
        until: DateTime<Utc>,
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    fn create(&self, message: &Message) -> impl Future<Output = GatewayResult<Message>> + Send;

    /// Replace the stored entity wholesale
    fn update(&self, message: &Message) -> impl Future<Output = GatewayResult<Message>> + Send;

    fn save_draft(&self, message: &Message)
    -> impl Future<Output = GatewayResult<Message>> + Send;
}

/// One persisted mutation, as a value that can be logged or replayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PersistOp {
    SetRead {
        ids: Vec<MessageId>,
        read: bool,
    },
    SetStarred {
        id: MessageId,
        starred: bool,
    },
    Delete {
        ids: Vec<MessageId>,
    },
    DeletePermanently {
        ids: Vec<MessageId>,
    },
    Archive {
        ids: Vec<MessageId>,
    },
    MoveTo {
        ids: Vec<MessageId>,
        folder: Folder,
    },
    Restore {
        ids: Vec<MessageId>,
        placement: Placement,
    },
    SetSpam {
        ids: Vec<MessageId>,
        spam: bool,
    },
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
    Create {
        message: Box<Message>,
    },
    Update {
        message: Box<Message>,
    },
    SaveDraft {
        message: Box<Message>,
    },
}

impl PersistOp {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetRead { .. } => "set_read",
            Self::SetStarred { .. } => "set_starred",
            Self::Delete { .. } => "delete",
            Self::DeletePermanently { .. } => "delete_permanently",
            Self::Archive { .. } => "archive",
            Self::MoveTo { .. } => "move_to",
            Self::Restore { .. } => "restore",
            Self::SetSpam { .. } => "set_spam",
            Self::AddLabels { .. } => "add_labels",
            Self::RemoveLabels { .. } => "remove_labels",
            Self::Snooze { .. } => "snooze",
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::SaveDraft { .. } => "save_draft",
        }
    }
}

/// Route an operation to the matching gateway method
pub async fn dispatch<G: PersistenceGateway>(
    gateway: &G,
    op: &PersistOp,
) -> GatewayResult<Option<Message>> {
    match op {
        PersistOp::SetRead { ids, read } => gateway.set_read(ids, *read).await.map(|_| None),
        PersistOp::SetStarred { id, starred } => {
            gateway.set_starred(id, *starred).await.map(|_| None)
        }
        PersistOp::Delete { ids } => gateway.delete(ids).await.map(|_| None),
        PersistOp::DeletePermanently { ids } => {
            gateway.delete_permanently(ids).await.map(|_| None)
        }
        PersistOp::Archive { ids } => gateway.archive(ids).await.map(|_| None),
        PersistOp::MoveTo { ids, folder } => gateway.move_to(ids, *folder).await.map(|_| None),
        PersistOp::Restore { ids, placement } => {
            gateway.restore(ids, placement).await.map(|_| None)
        }
        PersistOp::SetSpam { ids, spam } => gateway.set_spam(ids, *spam).await.map(|_| None),
        PersistOp::AddLabels { ids, labels } => {
            gateway.add_labels(ids, labels).await.map(|_| None)
        }
        PersistOp::RemoveLabels { ids, labels } => {
            gateway.remove_labels(ids, labels).await.map(|_| None)
        }
        PersistOp::Snooze { ids, until } => gateway.snooze(ids, *until).await.map(|_| None),
        PersistOp::Create { message } => gateway.create(message).await.map(Some),
        PersistOp::Update { message } => gateway.update(message).await.map(Some),
        PersistOp::SaveDraft { message } => gateway.save_draft(message).await.map(Some),
    }
}

/// Handle to a queued gateway call. Dropping it detaches the call; it
/// still runs to completion.
#[derive(Debug)]
pub struct PersistTicket {
    kind: &'static str,
    reply: oneshot::Receiver<GatewayResult<Option<Message>>>,
}

impl PersistTicket {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Wait for the gateway's verdict. The local state is not touched
    /// whatever the outcome.
    pub async fn outcome(self) -> GatewayResult<Option<Message>> {
        self.reply
            .await
            .map_err(|_| GatewayError::Unavailable("persist worker stopped".to_string()))?
    }
}

struct PersistJob {
    op: PersistOp,
    reply: oneshot::Sender<GatewayResult<Option<Message>>>,
}

impl std::fmt::Debug for PersistJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistJob").field("op", &self.op.kind()).finish()
    }
}

/// Sending side of the persistence worker. Calls reach the gateway one at a
/// time, in the order they were queued.
#[derive(Debug, Clone)]
pub struct PersistQueue {
    job_tx: mpsc::UnboundedSender<PersistJob>,
}

impl PersistQueue {
    /// Queue `op` behind every earlier call. Failures are logged by the
    /// worker; the caller may additionally await the ticket.
    pub fn submit(&self, op: PersistOp) -> PersistTicket {
        let kind = op.kind();
        tracing::debug!("Persisting {}", kind);
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .job_tx
            .send(PersistJob {
                op,
                reply: reply_tx,
            })
            .is_err()
        {
            tracing::warn!("Persist worker gone, dropping {}", kind);
        }
        PersistTicket {
            kind,
            reply: reply_rx,
        }
    }
}

/// Spawn the single task that drains queued calls into `gateway`. It exits
/// once every `PersistQueue` clone is dropped and the backlog is flushed.
pub fn spawn_persist_worker<G: PersistenceGateway>(
    gateway: Arc<G>,
) -> (PersistQueue, JoinHandle<()>) {
    let (job_tx, job_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_persist_worker(gateway, job_rx));
    (PersistQueue { job_tx }, task)
}

async fn run_persist_worker<G: PersistenceGateway>(
    gateway: Arc<G>,
    mut job_rx: mpsc::UnboundedReceiver<PersistJob>,
) {
    while let Some(PersistJob { op, reply }) = job_rx.recv().await {
        let result = dispatch(gateway.as_ref(), &op).await;
        if let Err(ref e) = result {
            tracing::warn!("Gateway {} failed, keeping local state: {}", op.kind(), e);
        }
        // Detached tickets are fine
        let _ = reply.send(result);
    }
    tracing::debug!("Persist worker finished");
}
