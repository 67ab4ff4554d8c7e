pub mod actor;
pub mod filter;
pub mod selection;
pub mod state;
pub mod store;

pub use actor::{MailboxHandle, MailboxOp, Outcome, spawn_mailbox_actor};
pub use filter::{CompiledFilters, DateRange, SearchFilters, day_start, derive_view};
pub use selection::Selection;
pub use state::{MailboxState, SortDirection, SortField, SortOrder, Transition, first_placement};
pub use store::{MailboxStore, new_message_id};
