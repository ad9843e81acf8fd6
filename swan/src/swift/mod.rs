//! # SWIFT Storage Network
//!
//! Everything the relay needs from the shared-storage network it sits in
//! front of: finding the access node, decrypting results blobs, and
//! composing the URLs that start storage operations.
//!
//! The relay never walks the storage chain itself. It asks the access node
//! for the first hop and hands that URL back to the publisher.

pub mod client;
pub mod composer;
pub mod discovery;
pub mod resolver;
pub mod results;
pub mod transport;

pub use client::{Decryptor, StorageOperationClient, SwiftClient};
pub use composer::{CompositeKey, QueryParams, StorageUrlComposer};
pub use discovery::{AccessNodeDiscovery, StaticDiscovery};
pub use resolver::AccessNodeResolver;
pub use results::{decode_results, encode_results, Pair, ResultSet};
pub use transport::{HttpGet, ReqwestTransport};
