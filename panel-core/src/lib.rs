//! # panel-core
//!
//! Pure credential logic for mtpanel (no I/O, instant tests).
//!
//! This crate implements the rules that decide which secrets a relay should
//! accept, without any disk, process or network I/O:
//! - [`secret`] - generate, validate and extract relay secrets
//! - [`expiry`] - expiration presets and the expiry test
//! - [`selector`] - the deduplicated, capped set of active relay secrets
//! - [`update`] - when an update must produce a new secret
//! - [`links`] - client share links
//!
//! Every function that depends on the current time takes `now` explicitly so
//! tests stay deterministic. The I/O lives in `panel-server`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod expiry;
pub mod links;
pub mod secret;
pub mod selector;
pub mod update;

pub use error::ValidationError;
pub use expiry::{compute_expires_at, is_expired, ExpiryPreset};
pub use links::{make_proxy_links, ProxyEndpoint, ProxyLinks};
pub use secret::{
    extract_relay_secret, normalize_secret, validate_custom_secret, RelaySecret, SecretCodec,
};
pub use selector::select_active_secrets;
pub use update::{plan_secret_update, secret_action, SecretAction, SecretPlan};
