//! Infrastructure adapters and runtime bootstrap.

pub mod content;
pub mod error;
pub mod http;
pub mod og_image;
pub mod resend;
pub mod telemetry;
