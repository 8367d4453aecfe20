//! Auth-domain identifiers, the shared login secret, and session token models.

pub mod id;
pub mod shared_secret;
pub mod token;

pub use id::*;
pub use shared_secret::*;
pub use token::{record::*, secret::*};
