pub mod types;

pub use types::{
    AccountId, AccountScope, Attachment, ComposeInput, EmailAddress, Folder, LabelId, Message,
    MessageFlags, MessageId, Placement, ThreadId, ViewFolder, make_preview,
};
