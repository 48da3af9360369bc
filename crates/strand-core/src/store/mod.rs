//! Store interfaces and backends.
//!
//! This module defines the log store abstraction and backend implementations.

pub mod memory;
pub mod postgres;
pub mod sqlite;

pub use self::memory::MemoryStore;
pub use self::postgres::PostgresStore;
pub use self::sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::StoreError;

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value was written; the key was previously absent.
    Written,
    /// The key already held a value; the write was discarded and the
    /// existing value is returned as authoritative.
    Conflict(Vec<u8>),
}

impl WriteOutcome {
    /// True if this outcome is a conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Keyed, append-only durable store consumed by the workflow runtime.
///
/// Keys are UTF-8 strings; values are opaque bytes. The store is the
/// single source of truth: conflicting concurrent writers are arbitrated
/// by [`put_if_absent`](LogStore::put_if_absent), so the runtime needs no
/// in-process locking for correctness.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Write `value` at `key` only if the key is absent.
    ///
    /// Returns [`WriteOutcome::Conflict`] with the existing value when
    /// another writer got there first; the existing value is then
    /// authoritative.
    async fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<WriteOutcome, StoreError>;

    /// Unconditionally write `value` at `key`, replacing any existing value.
    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Read the value at `key`, or `None` if absent.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// List all `(key, value)` pairs whose key starts with `prefix`,
    /// in ascending key order.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError>;

    /// Verify the store is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Escape `%`, `_` and the escape character itself for use in a SQL
/// LIKE pattern with `ESCAPE '\'`.
pub(crate) fn escape_like(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_passthrough() {
        assert_eq!(escape_like("instance/"), "instance/");
    }

    #[test]
    fn test_escape_like_special_chars() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
    }

    #[test]
    fn test_write_outcome_conflict() {
        assert!(WriteOutcome::Conflict(vec![1]).is_conflict());
        assert!(!WriteOutcome::Written.is_conflict());
    }
}
