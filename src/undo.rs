//! Expiring undo stack
//!
//! Entries are tagged command values, newest first, bounded in size. Each
//! entry owns a timer task that drops it at expiry unless it is undone or
//! dismissed first. Reversal runs through an executor supplied at
//! construction, so the stack itself never touches mailbox state.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::AbortHandle;

use crate::constants::{UNDO_EXPIRE_SECS, UNDO_MAX_SIZE};

pub type UndoId = u64;

/// A reversible action as data
pub trait UndoCommand: Clone + fmt::Debug + Send + Sync + 'static {
    /// Short tag such as "delete" or "archive"
    fn category(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct UndoEntry<C> {
    pub id: UndoId,
    pub category: &'static str,
    pub description: String,
    pub command: C,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoConfig {
    pub expire: Duration,
    pub max_size: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            expire: Duration::from_secs(UNDO_EXPIRE_SECS),
            max_size: UNDO_MAX_SIZE,
        }
    }
}

/// Runs a command's reversal
pub type Executor<C> = Arc<dyn Fn(C) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Notified when an entry times out
pub type ExpireCallback<C> = Arc<dyn Fn(&UndoEntry<C>) + Send + Sync>;

struct Inner<C> {
    entries: VecDeque<UndoEntry<C>>,
    timers: HashMap<UndoId, AbortHandle>,
    next_id: UndoId,
}

impl<C> Inner<C> {
    fn remove(&mut self, id: UndoId) -> Option<UndoEntry<C>> {
        if let Some(timer) = self.timers.remove(&id) {
            timer.abort();
        }
        let index = self.entries.iter().position(|e| e.id == id)?;
        self.entries.remove(index)
    }
}

pub struct UndoStack<C: UndoCommand> {
    inner: Arc<Mutex<Inner<C>>>,
    config: UndoConfig,
    executor: Executor<C>,
    on_expire: Option<ExpireCallback<C>>,
}

impl<C: UndoCommand> Clone for UndoStack<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config,
            executor: Arc::clone(&self.executor),
            on_expire: self.on_expire.clone(),
        }
    }
}

fn lock<C>(inner: &Mutex<Inner<C>>) -> MutexGuard<'_, Inner<C>> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

impl<C: UndoCommand> UndoStack<C> {
    pub fn new<F>(config: UndoConfig, executor: F) -> Self
    where
        F: Fn(C) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: VecDeque::new(),
                timers: HashMap::new(),
                next_id: 1,
            })),
            config,
            executor: Arc::new(executor),
            on_expire: None,
        }
    }

    pub fn with_on_expire<F>(mut self, callback: F) -> Self
    where
        F: Fn(&UndoEntry<C>) + Send + Sync + 'static,
    {
        self.on_expire = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> UndoConfig {
        self.config
    }

    /// Record a reversible action. Must be called inside a tokio runtime.
    pub fn push(&self, command: C, description: impl Into<String>) -> UndoId {
        let created_at = Utc::now();
        let expires_at = chrono::Duration::from_std(self.config.expire)
            .ok()
            .and_then(|window| created_at.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;

        let entry = UndoEntry {
            id,
            category: command.category(),
            description: description.into(),
            command,
            created_at,
            expires_at,
        };
        tracing::debug!("Undo push #{} [{}] {}", id, entry.category, entry.description);
        inner.entries.push_front(entry);

        while inner.entries.len() > self.config.max_size.max(1) {
            if let Some(oldest) = inner.entries.pop_back() {
                if let Some(timer) = inner.timers.remove(&oldest.id) {
                    timer.abort();
                }
                tracing::debug!("Undo #{} evicted", oldest.id);
            }
        }

        let timer = tokio::spawn(expire_after(
            Arc::downgrade(&self.inner),
            id,
            self.config.expire,
            self.on_expire.clone(),
        ));
        inner.timers.insert(id, timer.abort_handle());
        id
    }

    /// Run the reversal for `id`. The entry is removed whatever happens;
    /// returns `false` if it was gone or the reversal failed.
    pub async fn undo_by_id(&self, id: UndoId) -> bool {
        let Some(entry) = lock(&self.inner).remove(id) else {
            tracing::debug!("Undo #{} not found (expired or already used)", id);
            return false;
        };

        let executor = Arc::clone(&self.executor);
        let command = entry.command;
        let result = AssertUnwindSafe(async move { executor(command).await })
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(())) => {
                tracing::info!("Undid #{}: {}", id, entry.description);
                true
            }
            Ok(Err(e)) => {
                tracing::warn!("Undo #{} failed, discarding: {}", id, e);
                false
            }
            Err(_) => {
                tracing::warn!("Undo #{} panicked, discarding", id);
                false
            }
        }
    }

    pub async fn undo_last(&self) -> bool {
        let newest = lock(&self.inner).entries.front().map(|e| e.id);
        match newest {
            Some(id) => self.undo_by_id(id).await,
            None => false,
        }
    }

    /// Drop an entry without reverting it
    pub fn dismiss(&self, id: UndoId) -> bool {
        lock(&self.inner).remove(id).is_some()
    }

    /// Cancel every timer and drop every entry
    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        for (_, timer) in inner.timers.drain() {
            timer.abort();
        }
        inner.entries.clear();
    }

    /// Newest first
    pub fn entries(&self) -> Vec<UndoEntry<C>> {
        lock(&self.inner).entries.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<UndoEntry<C>> {
        lock(&self.inner).entries.front().cloned()
    }

    pub fn can_undo(&self) -> bool {
        !lock(&self.inner).entries.is_empty()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.can_undo()
    }
}

async fn expire_after<C: UndoCommand>(
    inner: Weak<Mutex<Inner<C>>>,
    id: UndoId,
    after: Duration,
    on_expire: Option<ExpireCallback<C>>,
) {
    tokio::time::sleep(after).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let expired = {
        let mut guard = lock(&inner);
        guard.timers.remove(&id);
        let index = guard.entries.iter().position(|e| e.id == id);
        index.and_then(|i| guard.entries.remove(i))
    };
    if let Some(entry) = expired {
        tracing::debug!("Undo #{} expired", id);
        if let Some(callback) = on_expire {
            callback(&entry);
        }
    }
}
