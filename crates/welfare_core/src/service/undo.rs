//! Time-boxed undo for deletions.
//!
//! # Responsibility
//! - Hold the captured record of every deletion still inside its undo window.
//! - Decide whether an undo request may proceed, and settle entries as
//!   restored or permanently deleted.
//!
//! # Invariants
//! - Per record id the lifecycle is `present -> pending-undo ->
//!   {restored | permanently-deleted}`; a settled entry never becomes pending
//!   again except through a new deletion.
//! - At most one pending entry exists per id. Arming a new deletion for an id
//!   that is still pending settles the stale entry as permanently deleted.
//! - A ticket only matches the entry it was issued for (same generation), so
//!   a late undo cannot resurrect a newer deletion.
//! - The window is checked against caller-supplied time; expiry needs no
//!   timer thread.

use log::{debug, info};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Handle returned by a deletion; present it to undo within the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoTicket {
    pub record_id: String,
    pub generation: u64,
    pub expires_at_ms: i64,
}

/// Lifecycle state of one deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoState {
    PendingUndo { expires_at_ms: i64 },
    Restored,
    PermanentlyDeleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoError {
    /// No pending deletion exists for this ticket's record.
    NotPending(String),
    /// The window elapsed; the deletion is permanent.
    Expired(String),
    /// A newer deletion of the same id replaced this ticket's entry.
    Superseded(String),
}

impl Display for UndoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPending(id) => write!(f, "no pending deletion for {id}"),
            Self::Expired(id) => write!(f, "undo window elapsed for {id}"),
            Self::Superseded(id) => write!(f, "deletion of {id} was superseded"),
        }
    }
}

impl Error for UndoError {}

#[derive(Debug, Clone)]
struct PendingDeletion<T> {
    record: T,
    generation: u64,
    expires_at_ms: i64,
}

/// Pending-undo registry keyed by record id.
#[derive(Debug)]
pub struct UndoCoordinator<T> {
    window_ms: i64,
    next_generation: u64,
    pending: HashMap<String, PendingDeletion<T>>,
}

impl<T: Clone> UndoCoordinator<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
            next_generation: 1,
            pending: HashMap::new(),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// Starts the undo window for a record that was just deleted.
    ///
    /// A still-pending entry for the same id is settled as permanently
    /// deleted before the new one is armed.
    pub fn arm(&mut self, record_id: &str, record: T, now_ms: i64) -> UndoTicket {
        let generation = self.next_generation;
        self.next_generation += 1;
        let expires_at_ms = now_ms.saturating_add(self.window_ms);

        let previous = self.pending.insert(
            record_id.to_string(),
            PendingDeletion {
                record,
                generation,
                expires_at_ms,
            },
        );
        if let Some(stale) = previous {
            info!(
                "event=undo_superseded module=undo status=ok id={record_id} stale_generation={} generation={generation}",
                stale.generation
            );
        }
        debug!(
            "event=undo_armed module=undo status=ok id={record_id} generation={generation} expires_at_ms={expires_at_ms}"
        );

        UndoTicket {
            record_id: record_id.to_string(),
            generation,
            expires_at_ms,
        }
    }

    /// Returns the captured record if `ticket` may still be undone.
    ///
    /// An expired entry is settled on the spot.
    pub fn check(&mut self, ticket: &UndoTicket, now_ms: i64) -> Result<&T, UndoError> {
        let id = ticket.record_id.as_str();
        let entry = self
            .pending
            .get(id)
            .ok_or_else(|| UndoError::NotPending(id.to_string()))?;

        if entry.generation != ticket.generation {
            return Err(UndoError::Superseded(id.to_string()));
        }
        if now_ms >= entry.expires_at_ms {
            self.pending.remove(id);
            info!("event=undo_expired module=undo status=ok id={id}");
            return Err(UndoError::Expired(id.to_string()));
        }

        self.pending
            .get(id)
            .map(|entry| &entry.record)
            .ok_or_else(|| UndoError::NotPending(id.to_string()))
    }

    /// Settles the entry for `ticket` as restored.
    ///
    /// Fails without touching the registry when the entry is gone or belongs
    /// to a newer deletion.
    pub fn complete(&mut self, ticket: &UndoTicket) -> Result<UndoState, UndoError> {
        let id = ticket.record_id.as_str();
        match self.pending.get(id) {
            None => Err(UndoError::NotPending(id.to_string())),
            Some(entry) if entry.generation != ticket.generation => {
                Err(UndoError::Superseded(id.to_string()))
            }
            Some(_) => {
                self.pending.remove(id);
                Ok(UndoState::Restored)
            }
        }
    }

    /// Drops the pending entry for `record_id`, making the deletion permanent.
    pub fn cancel(&mut self, record_id: &str) -> Option<T> {
        self.pending.remove(record_id).map(|entry| entry.record)
    }

    /// Settles every entry whose window has elapsed; returns their ids.
    pub fn sweep(&mut self, now_ms: i64) -> Vec<String> {
        let mut expired = self
            .pending
            .iter()
            .filter(|(_, entry)| now_ms >= entry.expires_at_ms)
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();
        expired.sort();
        for id in &expired {
            self.pending.remove(id);
        }
        if !expired.is_empty() {
            info!(
                "event=undo_sweep module=undo status=ok expired={}",
                expired.len()
            );
        }
        expired
    }

    /// Current state for `record_id`, if a deletion is pending.
    pub fn state(&self, record_id: &str) -> Option<UndoState> {
        self.pending
            .get(record_id)
            .map(|entry| UndoState::PendingUndo {
                expires_at_ms: entry.expires_at_ms,
            })
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
