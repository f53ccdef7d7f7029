//! Bearer token values and their redacting wrappers.

pub mod record;
pub mod secret;
