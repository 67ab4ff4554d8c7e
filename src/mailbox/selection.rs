//! Multi-select state with shift-click range support
//!
//! Every operation returns a new `Selection`. Range computation always runs
//! against the visible (post-filter) id order handed in by the caller.

use std::collections::HashSet;

use crate::mail::MessageId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    selected: HashSet<MessageId>,
    /// Last toggled id, used as the range anchor
    anchor: Option<MessageId>,
}

impl Selection {
    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &MessageId> {
        self.selected.iter()
    }

    /// Selected ids in `visible` order, for bulk actions
    pub fn ordered_ids<S: AsRef<str>>(&self, visible: &[S]) -> Vec<MessageId> {
        visible
            .iter()
            .map(|v| v.as_ref())
            .filter(|id: &&str| self.selected.contains(*id))
            .map(str::to_string)
            .collect()
    }

    /// Flip one id and make it the anchor
    pub fn toggle(&self, id: &str) -> Self {
        let mut selected = self.selected.clone();
        if !selected.remove(id) {
            selected.insert(id.to_string());
        }
        Self {
            selected,
            anchor: Some(id.to_string()),
        }
    }

    /// Shift-click: union the span between the anchor and `id` into the
    /// selection. Without an anchor this is a plain toggle; with an anchor
    /// that is no longer visible only `id` is added.
    pub fn toggle_range<S: AsRef<str>>(&self, id: &str, visible: &[S]) -> Self {
        let Some(ref anchor) = self.anchor else {
            return self.toggle(id);
        };

        let position = |needle: &str| visible.iter().position(|v| v.as_ref() == needle);
        let mut selected = self.selected.clone();

        match (position(anchor.as_str()), position(id)) {
            (Some(a), Some(b)) => {
                let (from, to) = (a.min(b), a.max(b));
                selected.extend(visible[from..=to].iter().map(|v| v.as_ref().to_string()));
            }
            _ => {
                tracing::debug!("Range anchor {} not visible, selecting {} only", anchor, id);
                selected.insert(id.to_string());
            }
        }

        Self {
            selected,
            anchor: Some(id.to_string()),
        }
    }

    /// Replace the selection with every visible id
    pub fn select_all<S: AsRef<str>>(&self, visible: &[S]) -> Self {
        Self {
            selected: visible.iter().map(|v| v.as_ref().to_string()).collect(),
            anchor: self.anchor.clone(),
        }
    }

    /// Replace the selection wholesale, keeping the anchor
    pub fn with_ids(&self, ids: impl IntoIterator<Item = MessageId>) -> Self {
        Self {
            selected: ids.into_iter().collect(),
            anchor: self.anchor.clone(),
        }
    }

    /// Drop ids that no longer pass `keep`. The anchor goes too if it fails.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> Self {
        Self {
            selected: self
                .selected
                .iter()
                .filter(|id| keep(id.as_str()))
                .cloned()
                .collect(),
            anchor: self.anchor.clone().filter(|id| keep(id.as_str())),
        }
    }

    pub fn cleared() -> Self {
        Self::default()
    }
}
