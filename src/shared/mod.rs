//! Shared types used across the feed's payloads.

pub mod scalar;
pub mod serde_util;

pub use scalar::Scalar;
