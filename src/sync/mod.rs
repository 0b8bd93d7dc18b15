//! Synchronization core: turns decoded change events into document-store
//! writes and drives the consumption loop.
//!
//! # Architecture
//! - **Dispatcher**: pure mapping from [`ChangeEvent`](crate::events::ChangeEvent) to [`DocumentAction`]
//! - **Lifecycle**: Running → Draining → Stopped run-state
//! - **Bridge**: batch consumption loop with commit-after-apply
//!
//! # Guarantees
//! - At-least-once delivery (offsets committed only after a batch is applied)
//! - Per-partition ordering (messages applied sequentially in arrival order)
//! - Idempotent replay (upserts replace wholesale, deletes tolerate absence)

pub mod bridge;
pub mod dispatcher;
pub mod lifecycle;

pub use bridge::{BatchOutcome, BatchReport, BatchSettings, CdcBridge};
pub use dispatcher::{dispatch, ActionKind, DocumentAction};
pub use lifecycle::{RunState, ShutdownController};
