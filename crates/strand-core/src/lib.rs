//! strand-core - Durable Log Store Client
//!
//! This crate provides the storage side of the strand durable workflow
//! runtime: a keyed, append-only log store abstraction with SQLite,
//! PostgreSQL and in-memory backends, and a typed journal layer that
//! maps workflow instances and step results onto store keys.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 strand-sdk                  │
//! │   (engine, step executor, recovery scan)    │
//! └─────────────────────┬───────────────────────┘
//!                       │ typed records
//!                       ▼
//! ┌─────────────────────────────────────────────┐
//! │                  Journal                    │
//! │   instance/<id>      step/<id>/<seq>        │
//! └─────────────────────┬───────────────────────┘
//!                       │ keys + bytes
//!                       ▼
//! ┌─────────────────────────────────────────────┐
//! │                 LogStore                    │
//! │   put_if_absent / write / read / prefix     │
//! ├──────────────┬──────────────┬───────────────┤
//! │   SQLite     │  PostgreSQL  │   in-memory   │
//! └──────────────┴──────────────┴───────────────┘
//! ```
//!
//! # Conditional-write semantics
//!
//! [`LogStore::put_if_absent`](store::LogStore::put_if_absent) is the
//! durability primitive everything else is built on: the first writer of
//! a key wins, later writers receive the stored value back and must
//! treat it as authoritative. Step records are written exclusively
//! through this path, which is what makes concurrent recovery of the
//! same instance by two runtimes safe without any cross-process
//! coordination.

#![deny(missing_docs)]

/// Store errors with error-code mapping.
pub mod error;

/// Typed records and journal operations over the store.
pub mod journal;

/// Log store trait and backend implementations.
pub mod store;

pub use error::{Result, StoreError};
pub use journal::{
    InstanceRecord, Journal, StepOutcome, StepRecord, StepWrite, WorkflowStatus,
};
pub use store::{LogStore, MemoryStore, PostgresStore, SqliteStore, WriteOutcome};
