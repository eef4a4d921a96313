//! Durable Storage for Event-Sourced Services
//!
//! Provides append-only operation logging with per-frame checksums,
//! sequential reading with corruption reporting, integrity-checked
//! state snapshots, and snapshot-plus-replay crash recovery.
//!
//! The crate is domain-agnostic: log payloads are opaque bytes and
//! snapshot state is any serde-serializable type. Services supply a
//! [`recovery::ReplayHandler`] to fold entries back into their state.

pub mod journal;
pub mod reader;
pub mod recovery;
pub mod snapshot;
