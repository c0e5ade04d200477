// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history over serialized graph snapshots.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Default maximum undo history depth
const MAX_HISTORY: usize = 100;

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// A serialized state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Serialized state
    pub data: Vec<u8>,
    /// Size in bytes
    pub size: usize,
}

impl StateSnapshot {
    /// Create a snapshot from raw bytes
    pub fn new(data: Vec<u8>) -> Self {
        let size = data.len();
        Self { data, size }
    }

    /// Create from a serializable value
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self> {
        let data = bincode::serialize(value)?;
        Ok(Self::new(data))
    }

    /// Deserialize to a value
    pub fn to_value<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        Ok(bincode::deserialize(&self.data)?)
    }
}

/// An operation that can be undone/redone
#[derive(Debug, Clone)]
pub struct Operation {
    /// Human-readable description
    pub description: String,
    /// State before the operation (for undo)
    pub before: StateSnapshot,
    /// State after the operation (for redo)
    pub after: StateSnapshot,
}

impl Operation {
    /// Get memory size of this operation
    pub fn memory_size(&self) -> usize {
        self.before.size + self.after.size
    }
}

/// Undo/redo history manager
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<Operation>,
    redo_stack: VecDeque<Operation>,
    max_depth: usize,
    memory_used: usize,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
            memory_used: 0,
        }
    }

    /// Record an operation, clearing the redo stack
    pub fn record(
        &mut self,
        description: impl Into<String>,
        before: StateSnapshot,
        after: StateSnapshot,
    ) {
        let operation = Operation {
            description: description.into(),
            before,
            after,
        };

        self.redo_stack.clear();
        self.memory_used += operation.memory_size();
        self.undo_stack.push_back(operation);

        while self.undo_stack.len() > self.max_depth {
            if let Some(old) = self.undo_stack.pop_front() {
                self.memory_used = self.memory_used.saturating_sub(old.memory_size());
            }
        }
    }

    /// Undo the last operation, returning it
    pub fn undo(&mut self) -> Result<Operation> {
        let operation = self
            .undo_stack
            .pop_back()
            .ok_or(HistoryError::NothingToUndo)?;

        self.memory_used = self.memory_used.saturating_sub(operation.memory_size());
        self.redo_stack.push_back(operation.clone());

        Ok(operation)
    }

    /// Redo the last undone operation, returning it
    pub fn redo(&mut self) -> Result<Operation> {
        let operation = self
            .redo_stack
            .pop_back()
            .ok_or(HistoryError::NothingToRedo)?;

        self.memory_used += operation.memory_size();
        self.undo_stack.push_back(operation.clone());

        Ok(operation)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|op| op.description.as_str())
    }

    /// Get description of next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|op| op.description.as_str())
    }

    /// Total memory used by retained snapshots, in bytes
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.memory_used = 0;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tag: &str) -> StateSnapshot {
        StateSnapshot::from_value(&tag.to_string()).expect("snapshot")
    }

    #[test]
    fn test_record_undo_redo() {
        let mut history = History::new();
        assert!(!history.can_undo());

        history.record("add node", snapshot("before"), snapshot("after"));
        assert!(history.can_undo());
        assert_eq!(history.undo_description(), Some("add node"));

        let operation = history.undo().expect("undo");
        assert_eq!(operation.before.to_value::<String>().expect("value"), "before");
        assert!(history.can_redo());

        let operation = history.redo().expect("redo");
        assert_eq!(operation.after.to_value::<String>().expect("value"), "after");
        assert!(history.can_undo());
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = History::new();
        history.record("a", snapshot("1"), snapshot("2"));
        history.undo().expect("undo");
        assert!(history.can_redo());

        history.record("b", snapshot("3"), snapshot("4"));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_depth_limit() {
        let mut history = History::with_max_depth(2);
        history.record("a", snapshot("1"), snapshot("2"));
        history.record("b", snapshot("3"), snapshot("4"));
        history.record("c", snapshot("5"), snapshot("6"));

        history.undo().expect("undo c");
        history.undo().expect("undo b");
        assert!(matches!(history.undo(), Err(HistoryError::NothingToUndo)));
    }

    #[test]
    fn test_empty_stacks_error() {
        let mut history = History::new();
        assert!(matches!(history.undo(), Err(HistoryError::NothingToUndo)));
        assert!(matches!(history.redo(), Err(HistoryError::NothingToRedo)));
    }
}
