//! Mailbox state engine: message collection, filtered views, selection,
//! snooze/scheduled-send timers and an expiring undo stack.

pub mod actions;
pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod mail;
pub mod mailbox;
pub mod retry;
pub mod scheduler;
pub mod undo;

pub use actions::{MailActions, MailboxUndo, UndoCategory};
pub use error::MailboxError;
pub use gateway::{
    GatewayError, MemoryGateway, PersistOp, PersistQueue, PersistTicket, PersistenceGateway,
};
pub use mailbox::{MailboxHandle, MailboxOp, MailboxState, MailboxStore, spawn_mailbox_actor};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use undo::{UndoConfig, UndoStack};
