//! # mtpanel-server
//!
//! Credential registry and relay synchronization service.
//!
//! This crate owns everything with I/O around the pure rules in
//! `panel-core`:
//! - Persists the client registry and the fallback secret as JSON files
//! - Renders the relay's secrets file from the active client set
//! - Recreates the relay container through an external command
//! - Runs periodic expiry cleanup and public IP refresh
//! - Serves a bearer-protected JSON admin API
//!
//! ## Architecture
//!
//! ```text
//!  HTTP API ──┐        ┌── cleanup timer
//!             ▼        ▼
//!        ┌──────────────────────┐
//!        │      ProxyPanel      │
//!        │  registry (JSON)     │
//!        │  sync queue ─► worker├──► mtproxy.env ──► reload command
//!        └──────────────────────┘
//! ```
//!
//! Every mutation is persisted before its sync request is queued. Sync
//! attempts run one at a time in arrival order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod config;
pub mod error;
pub mod http;
pub mod public_ip;
pub mod registry;
pub mod reload;
pub mod server;
pub mod storage;
pub mod sync;
