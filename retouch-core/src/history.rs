//! # Edit History
//!
//! Linear, branch-discarding undo/redo over raster [`Snapshot`]s.
//!
//! ```text
//!   commit(S0) commit(S1) commit(S2)   undo()        commit(S3)
//!   [S0]       [S0,S1]    [S0,S1,S2]   [S0,S1,S2]    [S0,S1,S3]
//!    ^              ^               ^       ^                 ^
//! ```
//!
//! A commit made after one or more undos discards the redo branch for good.
//! `restore` only moves the cursor and never discards anything.

use std::fmt;
use std::sync::Arc;

use crate::error::{EditorError, EditorResult};

/// Immutable serialization of the full raster buffer at one point in time.
///
/// Cloning is cheap: the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    bytes: Arc<[u8]>,
}

impl Snapshot {
    /// Wrap encoded image bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// The encoded image bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of the encoded snapshot in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the snapshot holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl From<Vec<u8>> for Snapshot {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Snapshot stack with a cursor.
///
/// `position` is `None` only while no snapshot has been committed.
#[derive(Debug, Clone, Default)]
pub struct HistoryEngine {
    entries: Vec<Snapshot>,
    position: Option<usize>,
    /// Oldest entries are evicted past this many snapshots.
    capacity_limit: Option<usize>,
    /// Commits ever made, evicted ones included.
    commit_count: u64,
}

impl HistoryEngine {
    /// Create an empty, unbounded history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty history that keeps at most `limit` snapshots.
    ///
    /// A limit of zero is treated as one.
    #[must_use]
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            capacity_limit: Some(limit.max(1)),
            ..Self::default()
        }
    }

    /// Append a snapshot, discarding any redo branch first.
    pub fn commit(&mut self, snapshot: Snapshot) {
        if let Some(position) = self.position {
            let discarded = self.entries.len() - position - 1;
            if discarded > 0 {
                tracing::debug!(discarded, "Discarding redo branch");
                self.entries.truncate(position + 1);
            }
        }

        self.entries.push(snapshot);
        self.commit_count += 1;

        if let Some(limit) = self.capacity_limit {
            if self.entries.len() > limit {
                let evicted = self.entries.len() - limit;
                self.entries.drain(..evicted);
                tracing::debug!(evicted, limit, "Evicted oldest history entries");
            }
        }

        self.position = Some(self.entries.len() - 1);
        tracing::debug!(
            position = self.entries.len() - 1,
            len = self.entries.len(),
            "History commit"
        );
    }

    /// Step back one entry.
    ///
    /// Returns the snapshot now current. At the oldest entry this is a no-op
    /// that returns the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::EmptyHistory`] if nothing was committed yet.
    pub fn undo(&mut self) -> EditorResult<Snapshot> {
        let position = self.position.ok_or(EditorError::EmptyHistory)?;
        if position > 0 {
            self.position = Some(position - 1);
            tracing::debug!(position = position - 1, len = self.entries.len(), "History undo");
        }
        self.current()
    }

    /// Step forward one entry.
    ///
    /// Returns the snapshot now current. At the newest entry this is a no-op
    /// that returns the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::EmptyHistory`] if nothing was committed yet.
    pub fn redo(&mut self) -> EditorResult<Snapshot> {
        let position = self.position.ok_or(EditorError::EmptyHistory)?;
        if position + 1 < self.entries.len() {
            self.position = Some(position + 1);
            tracing::debug!(position = position + 1, len = self.entries.len(), "History redo");
        }
        self.current()
    }

    /// Jump to `index` without truncating.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::OutOfRange`] unless `index < len()`; the cursor
    /// is left where it was.
    pub fn restore(&mut self, index: usize) -> EditorResult<Snapshot> {
        let snapshot = self
            .entries
            .get(index)
            .cloned()
            .ok_or(EditorError::OutOfRange {
                index,
                len: self.entries.len(),
            })?;
        self.position = Some(index);
        tracing::debug!(position = index, len = self.entries.len(), "History restore");
        Ok(snapshot)
    }

    /// The snapshot currently shown.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::EmptyHistory`] if nothing was committed yet.
    pub fn current(&self) -> EditorResult<Snapshot> {
        self.position
            .and_then(|p| self.entries.get(p))
            .cloned()
            .ok_or(EditorError::EmptyHistory)
    }

    /// Cursor into the entries, `None` while empty.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was committed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `undo` would move the cursor.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.position.is_some_and(|p| p > 0)
    }

    /// Whether `redo` would move the cursor.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.position.is_some_and(|p| p + 1 < self.entries.len())
    }

    /// Total number of commits made, including evicted and truncated ones.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }

    /// The configured capacity limit, if any.
    #[must_use]
    pub fn capacity_limit(&self) -> Option<usize> {
        self.capacity_limit
    }

    /// Iterate over all entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }
}
