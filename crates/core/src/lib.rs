// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! jmd-core: sync engine between a remote issue tracker and a local
//! markdown mirror.
//!
//! This crate provides the domain entities, conflict detection, the SQLite
//! sync-state store, the retry queue, and the reconciler that drives tickets
//! between the two sides. The remote tracker and the markdown mirror are
//! consumed through the [`RemoteRepository`] and [`MarkdownRepository`]
//! traits; the HTTP client lives in `jmd-remote`.

pub mod clock;
pub mod comment;
pub mod config;
pub mod conflict;
pub mod error;
pub mod markdown;
pub mod project;
pub mod queue;
pub mod reconcile;
pub mod remote;
pub mod store;
pub mod sync;
pub mod ticket;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use comment::Comment;
pub use config::Config;
pub use conflict::Resolution;
pub use error::{Error, Result};
pub use markdown::MarkdownRepository;
pub use project::{CustomField, DerivedValue, Project, SyncDirection};
pub use queue::{DrainReport, OperationExecutor, RetryQueue};
pub use reconcile::{ConflictSide, ProjectSyncReport, Reconciler, SyncMode};
pub use remote::{RemoteFuture, RemoteRepository};
pub use store::{StateRepository, StateStore, StoreConfig, StoreTransaction};
pub use sync::{
    OperationType, PendingOperation, SyncResult, SyncState, SyncStatus, SyncTimestamp,
    TicketState, MAX_ATTEMPTS,
};
pub use ticket::{FieldValue, Ticket, TicketKey};
