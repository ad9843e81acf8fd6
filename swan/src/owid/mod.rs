//! # Open Web IDs
//!
//! Signed envelopes that bind a payload to a creator domain and a date.
//!
//! - **token**: the OWID itself: wire format, base64, verification.
//! - **creator**: signing identities and the registry that finds them.
//! - **encoder**: the "sign this value for that domain" step of the
//!   decode pipeline.

pub mod creator;
pub mod encoder;
pub mod token;

pub use creator::{Creator, CreatorRegistry, MemoryCreatorRegistry};
pub use encoder::OwidEncoder;
pub use token::{Owid, OWID_VERSION};
