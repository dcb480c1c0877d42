//! Application services layer.

pub mod contacts;
pub mod error;
pub mod newsletter;
pub mod sitemap;
pub mod social_image;
pub mod token;
