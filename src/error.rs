use thiserror::Error;

/// Failures talking to the mailbox actor. Mutation outcomes themselves are
/// reported as data, never as errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailboxError {
    #[error("mailbox actor has shut down")]
    Closed,
    #[error("mailbox actor dropped the reply")]
    NoReply,
}
