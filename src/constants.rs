//! Engine-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Default lifetime of an undo entry in seconds before it silently expires.
pub const UNDO_EXPIRE_SECS: u64 = 10;

/// Default number of undo entries retained. Oldest entries fall off first.
pub const UNDO_MAX_SIZE: usize = 10;

/// Interval in seconds between snooze wake checks.
pub const SNOOZE_CHECK_SECS: u64 = 60;

/// Interval in seconds between scheduled-send checks.
pub const SCHEDULED_SEND_CHECK_SECS: u64 = 60;

/// Maximum characters kept in a generated preview snippet.
pub const PREVIEW_LENGTH: usize = 100;

/// Capacity of the mailbox actor command channel.
pub const COMMAND_CHANNEL_CAPACITY: usize = 128;

// === Date range windows (fixed offsets, not calendar-aware) ===

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;
pub const WEEK_MS: i64 = 7 * DAY_MS;
pub const MONTH_MS: i64 = 30 * DAY_MS;
pub const YEAR_MS: i64 = 365 * DAY_MS;
