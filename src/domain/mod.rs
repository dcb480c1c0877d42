//! Domain layer types and invariants.

pub mod error;
pub mod newsletter;
pub mod social;
