use std::collections::BTreeSet;
use std::fmt;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::PREVIEW_LENGTH;

pub type MessageId = String;
pub type AccountId = String;
pub type LabelId = String;
pub type ThreadId = String;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct MessageFlags: u32 {
        const READ = 0b00000001;
        const STARRED = 0b00000010;
        const HAS_ATTACHMENT = 0b00000100;
        const DRAFT = 0b00001000;
    }
}

/// Where a message currently lives. Closed set; `Snoozed` and `Scheduled`
/// are transient holding folders driven by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    #[default]
    Inbox,
    Sent,
    Drafts,
    Trash,
    Spam,
    Archive,
    Snoozed,
    Scheduled,
}

impl Folder {
    pub const ALL: [Folder; 8] = [
        Folder::Inbox,
        Folder::Sent,
        Folder::Drafts,
        Folder::Trash,
        Folder::Spam,
        Folder::Archive,
        Folder::Snoozed,
        Folder::Scheduled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
            Self::Drafts => "drafts",
            Self::Trash => "trash",
            Self::Spam => "spam",
            Self::Archive => "archive",
            Self::Snoozed => "snoozed",
            Self::Scheduled => "scheduled",
        }
    }

    /// Display name used in action descriptions
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Inbox => "Inbox",
            Self::Sent => "Sent",
            Self::Drafts => "Drafts",
            Self::Trash => "Trash",
            Self::Spam => "Spam",
            Self::Archive => "Archive",
            Self::Snoozed => "Snoozed",
            Self::Scheduled => "Scheduled",
        }
    }

    /// Folders whose contents drop out of the starred view
    pub fn is_discarded(self) -> bool {
        matches!(self, Self::Trash | Self::Spam)
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Folder selector for the message list. `Starred` is a cross-folder view,
/// never a place a message can be moved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewFolder {
    Folder(Folder),
    Starred,
}

impl Default for ViewFolder {
    fn default() -> Self {
        Self::Folder(Folder::Inbox)
    }
}

impl From<Folder> for ViewFolder {
    fn from(folder: Folder) -> Self {
        Self::Folder(folder)
    }
}

impl ViewFolder {
    /// Folder membership rule shared by the list and the counters
    pub fn contains(self, message: &Message) -> bool {
        match self {
            Self::Folder(folder) => message.folder == folder,
            Self::Starred => message.is_starred() && !message.folder.is_discarded(),
        }
    }
}

/// Which accounts the view covers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccountScope {
    #[default]
    All,
    Account(AccountId),
}

impl AccountScope {
    pub fn contains(&self, message: &Message) -> bool {
        match self {
            Self::All => true,
            Self::Account(id) => &message.account_id == id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub name: String,
    pub email: String,
}

impl EmailAddress {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn display(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

/// Where a message lives. Holding folders carry their deadline, so a
/// placement can be restored without losing the wake or send time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub folder: Folder,
    pub snooze_until: Option<DateTime<Utc>>,
    pub snoozed_from: Option<Folder>,
    pub scheduled_send_at: Option<DateTime<Utc>>,
}

impl Placement {
    /// Plain folder with no deadline
    pub fn folder(folder: Folder) -> Self {
        Self {
            folder,
            snooze_until: None,
            snoozed_from: None,
            scheduled_send_at: None,
        }
    }

    /// A holding folder needs its deadline
    pub fn is_complete(&self) -> bool {
        match self.folder {
            Folder::Snoozed => self.snooze_until.is_some(),
            Folder::Scheduled => self.scheduled_send_at.is_some(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub account_id: AccountId,
    #[serde(default)]
    pub folder: Folder,
    #[serde(default)]
    pub flags: MessageFlags,
    #[serde(default)]
    pub labels: BTreeSet<LabelId>,
    pub thread_id: ThreadId,
    #[serde(default)]
    pub from: EmailAddress,
    #[serde(default)]
    pub to: Vec<EmailAddress>,
    #[serde(default)]
    pub cc: Vec<EmailAddress>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub date: DateTime<Utc>,
    pub scheduled_send_at: Option<DateTime<Utc>>,
    pub snooze_until: Option<DateTime<Utc>>,
    pub snoozed_from: Option<Folder>,
    pub reply_to_id: Option<MessageId>,
}

impl Message {
    pub fn is_read(&self) -> bool {
        self.flags.contains(MessageFlags::READ)
    }

    pub fn is_starred(&self) -> bool {
        self.flags.contains(MessageFlags::STARRED)
    }

    pub fn has_attachment(&self) -> bool {
        self.flags.contains(MessageFlags::HAS_ATTACHMENT)
    }

    pub fn is_draft(&self) -> bool {
        self.flags.contains(MessageFlags::DRAFT)
    }

    /// Deadline fields are only set while the message sits in the matching
    /// holding folder.
    pub fn deadlines_consistent(&self) -> bool {
        let snooze_ok = match self.folder {
            Folder::Snoozed => self.snooze_until.is_some(),
            _ => self.snooze_until.is_none() && self.snoozed_from.is_none(),
        };
        let schedule_ok = match self.folder {
            Folder::Scheduled => self.scheduled_send_at.is_some(),
            _ => self.scheduled_send_at.is_none(),
        };
        snooze_ok && schedule_ok
    }

    /// Folder plus any holding-folder deadline
    pub fn placement(&self) -> Placement {
        Placement {
            folder: self.folder,
            snooze_until: self.snooze_until,
            snoozed_from: self.snoozed_from,
            scheduled_send_at: self.scheduled_send_at,
        }
    }

    /// Put the message back where `placement` says, deadline included
    pub(crate) fn place(&mut self, placement: &Placement) {
        self.relocate(placement.folder);
        match placement.folder {
            Folder::Snoozed => {
                self.snooze_until = placement.snooze_until;
                self.snoozed_from = placement.snoozed_from;
            }
            Folder::Scheduled => self.scheduled_send_at = placement.scheduled_send_at,
            _ => {}
        }
    }

    /// Move to `folder`, dropping any deadline that no longer applies
    pub(crate) fn relocate(&mut self, folder: Folder) {
        self.folder = folder;
        if folder != Folder::Snoozed {
            self.snooze_until = None;
            self.snoozed_from = None;
        }
        if folder != Folder::Scheduled {
            self.scheduled_send_at = None;
        }
    }

    /// Build a locally-owned message from compose input
    pub fn from_compose(
        id: MessageId,
        input: &ComposeInput,
        folder: Folder,
        date: DateTime<Utc>,
    ) -> Self {
        let mut flags = MessageFlags::READ;
        if !input.attachments.is_empty() {
            flags |= MessageFlags::HAS_ATTACHMENT;
        }
        if folder == Folder::Drafts {
            flags |= MessageFlags::DRAFT;
        }
        Self {
            thread_id: input.thread_id.clone().unwrap_or_else(|| id.clone()),
            id,
            account_id: input.account_id.clone(),
            folder,
            flags,
            labels: BTreeSet::new(),
            from: input.from.clone().unwrap_or_default(),
            to: input.to.clone(),
            cc: input.cc.clone(),
            subject: input.subject.clone(),
            preview: make_preview(&input.body, PREVIEW_LENGTH),
            body: input.body.clone(),
            attachments: input.attachments.clone(),
            date,
            scheduled_send_at: None,
            snooze_until: None,
            snoozed_from: None,
            reply_to_id: input.reply_to_id.clone(),
        }
    }

    /// Overwrite the composed content, keeping identity and flags
    pub(crate) fn apply_compose(&mut self, input: &ComposeInput) {
        self.account_id = input.account_id.clone();
        if let Some(ref from) = input.from {
            self.from = from.clone();
        }
        self.to = input.to.clone();
        self.cc = input.cc.clone();
        self.subject = input.subject.clone();
        self.preview = make_preview(&input.body, PREVIEW_LENGTH);
        self.body = input.body.clone();
        self.attachments = input.attachments.clone();
        self.flags
            .set(MessageFlags::HAS_ATTACHMENT, !input.attachments.is_empty());
        if let Some(ref thread_id) = input.thread_id {
            self.thread_id = thread_id.clone();
        }
        if input.reply_to_id.is_some() {
            self.reply_to_id = input.reply_to_id.clone();
        }
    }
}

/// Content handed over by the compose window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeInput {
    /// Existing message id when editing a draft or scheduled message
    pub id: Option<MessageId>,
    pub account_id: AccountId,
    pub from: Option<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub subject: String,
    /// HTML body
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub thread_id: Option<ThreadId>,
    pub reply_to_id: Option<MessageId>,
}

/// Plain-text snippet of an HTML body, cut at `max_chars`
pub fn make_preview(html: &str, max_chars: usize) -> String {
    let text = html2text::from_read(html.as_bytes(), 200)
        .unwrap_or_else(|_| html.to_string());
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}
