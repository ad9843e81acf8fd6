// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SWAN Relay Core Library
//!
//! A publisher's page holds a blob that only the SWIFT storage network can
//! read. This crate takes that blob, has the network's access node decrypt
//! it, and re-issues every value inside as an OWID: a small token signed by
//! the publisher's own domain that anyone can verify without asking us.
//!
//! The same crate composes the URLs that start a new storage operation, so
//! the browser can be sent off to write preferences back to the network.
//!
//! ## Modules
//!
//! - **pipeline**: decrypt, decode, hash emails, sign, stamp. One pass.
//! - **owid**: the signed token format, creators and the creator registry.
//! - **swift**: access node discovery, client, results codec, URL composer.
//! - **sid**: turns an email into a pseudonymous, fixed-length identifier.
//! - **access**: who gets to call us at all.
//! - **validate**: publisher parameter checks for fetch and update.
//! - **offer**: signed offer IDs.
//! - **whitespace**: template normalization.
//! - **config**: constants, endpoint paths and request-time settings.
//! - **error**: the error taxonomy every module returns.
//!
//! ## Ground Rules
//!
//! 1. Every external collaborator is a trait. Tests run without a network.
//! 2. An email never leaves the relay in plain text.
//! 3. First failure is terminal. No retries, no partial responses.

pub mod access;
pub mod config;
pub mod error;
pub mod offer;
pub mod owid;
pub mod pipeline;
pub mod sid;
pub mod swift;
pub mod validate;
pub mod whitespace;

pub use error::{ErrorKind, Result, SwanError};
