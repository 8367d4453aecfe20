//! Session token secrets and the records persisted for them.

pub mod record;
pub mod secret;
