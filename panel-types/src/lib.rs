//! # panel-types
//!
//! Shared record types for mtpanel.
//!
//! This crate provides the foundational types used across all mtpanel crates:
//! - [`ClientId`] - Identity of an issued credential
//! - [`SecretMode`] - Encoding family of a credential string
//! - [`Client`] - The persisted credential record
//! - [`NewClient`], [`ClientPatch`] - Registry mutation inputs

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
mod ids;
mod request;

pub use client::{Client, ParseSecretModeError, SecretMode};
pub use ids::ClientId;
pub use request::{ClientPatch, NewClient};
