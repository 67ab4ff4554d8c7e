//! Filter engine: derives the visible message list from the collection
//!
//! Pure functions only. Every predicate is ANDed; an empty string or `None`
//! means "don't care" and always passes. Text predicates use aho-corasick over
//! lowercased haystacks, matching case-insensitively.

use aho_corasick::AhoCorasick;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{MONTH_MS, WEEK_MS, YEAR_MS};
use crate::mail::{AccountScope, LabelId, Message, ViewFolder};

/// Date window applied to `Message::date`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DateRange {
    #[default]
    Any,
    Today,
    Week,
    Month,
    Year,
    /// Inclusive bounds; a missing side is unconstrained
    Custom {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
}

impl DateRange {
    /// Whether `date` falls inside the range, measured back from the start of
    /// the current day rather than from the current instant
    pub fn contains(&self, date: DateTime<Utc>, day_start: DateTime<Utc>) -> bool {
        let window_ms = match *self {
            Self::Any => return true,
            Self::Custom { from, to } => {
                return from.is_none_or(|from| date >= from) && to.is_none_or(|to| date <= to);
            }
            Self::Today => 0,
            Self::Week => WEEK_MS,
            Self::Month => MONTH_MS,
            Self::Year => YEAR_MS,
        };
        date >= day_start - Duration::milliseconds(window_ms)
    }
}

/// Structured search predicates. Replaced wholesale, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    /// Matches subject, sender name/address, preview and body
    pub text: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub has_attachment: Option<bool>,
    pub is_unread: Option<bool>,
    pub is_starred: Option<bool>,
    pub date_range: DateRange,
    /// Message must carry every listed label
    pub labels: Vec<LabelId>,
}

impl SearchFilters {
    /// Filters with only the free-text predicate set
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            text: query.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Case-insensitive substring matcher. `None` when the needle is blank.
struct TextMatcher(Option<AhoCorasick>);

impl TextMatcher {
    fn new(needle: &str) -> Self {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Self(None);
        }
        // A failed build degrades to permissive matching
        Self(AhoCorasick::new([needle]).ok())
    }

    fn is_active(&self) -> bool {
        self.0.is_some()
    }

    fn matches(&self, haystack: &str) -> bool {
        match self.0 {
            Some(ref ac) => ac.is_match(&haystack.to_lowercase()),
            None => true,
        }
    }

    fn matches_any<'a>(&self, haystacks: impl IntoIterator<Item = &'a str>) -> bool {
        match self.0 {
            Some(ref ac) => haystacks
                .into_iter()
                .any(|h| ac.is_match(&h.to_lowercase())),
            None => true,
        }
    }
}

/// Search predicates with automata built once per derivation
pub struct CompiledFilters<'f> {
    filters: &'f SearchFilters,
    text: TextMatcher,
    from: TextMatcher,
    to: TextMatcher,
    subject: TextMatcher,
    day_start: DateTime<Utc>,
}

impl<'f> CompiledFilters<'f> {
    pub fn new(filters: &'f SearchFilters, day_start: DateTime<Utc>) -> Self {
        Self {
            text: TextMatcher::new(&filters.text),
            from: TextMatcher::new(&filters.from),
            to: TextMatcher::new(&filters.to),
            subject: TextMatcher::new(&filters.subject),
            filters,
            day_start,
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        let f = self.filters;

        if self.text.is_active()
            && !self.text.matches_any([
                message.subject.as_str(),
                message.from.name.as_str(),
                message.from.email.as_str(),
                message.preview.as_str(),
                message.body.as_str(),
            ])
        {
            return false;
        }

        if self.from.is_active()
            && !self
                .from
                .matches_any([message.from.name.as_str(), message.from.email.as_str()])
        {
            return false;
        }

        if self.to.is_active()
            && !self.to.matches_any(
                message
                    .to
                    .iter()
                    .flat_map(|r| [r.name.as_str(), r.email.as_str()]),
            )
        {
            return false;
        }

        if !self.subject.matches(&message.subject) {
            return false;
        }

        if f.has_attachment.is_some_and(|want| message.has_attachment() != want) {
            return false;
        }
        if f.is_unread.is_some_and(|want| message.is_read() == want) {
            return false;
        }
        if f.is_starred.is_some_and(|want| message.is_starred() != want) {
            return false;
        }

        if !f.labels.iter().all(|label| message.labels.contains(label)) {
            return false;
        }

        f.date_range.contains(message.date, self.day_start)
    }
}

/// Derive the visible list: folder scope, account scope and every search
/// predicate, newest first. Equal dates keep collection order.
pub fn derive_view<'a>(
    messages: &'a [Message],
    folder: ViewFolder,
    scope: &AccountScope,
    filters: &SearchFilters,
    day_start: DateTime<Utc>,
) -> Vec<&'a Message> {
    let compiled = CompiledFilters::new(filters, day_start);
    let mut visible: Vec<&Message> = messages
        .iter()
        .filter(|m| folder.contains(m) && scope.contains(m) && compiled.matches(m))
        .collect();
    // sort_by is stable
    visible.sort_by(|a, b| b.date.cmp(&a.date));
    visible
}

/// Start of the calendar day containing `now`, in `now`'s time zone
pub fn day_start<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc))
}
