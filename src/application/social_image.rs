//! Social preview images for pages shared on other sites.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use metrics::{counter, histogram};
use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::social::SocialCard;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("font data could not be loaded: {0}")]
    Font(String),
    #[error("card markup is invalid: {0}")]
    Markup(String),
    #[error("failed to allocate a {width}x{height} canvas")]
    Canvas { width: u32, height: u32 },
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("render task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum SocialImageError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Turns a card into encoded PNG bytes.
#[async_trait]
pub trait ImageRenderer: Send + Sync {
    async fn render(&self, card: &SocialCard) -> Result<Bytes, RenderError>;
}

#[derive(Clone)]
pub struct SocialImageService {
    renderer: Arc<dyn ImageRenderer>,
    origin: String,
}

impl SocialImageService {
    pub fn new(renderer: Arc<dyn ImageRenderer>, origin: impl Into<String>) -> Self {
        Self {
            renderer,
            origin: origin.into(),
        }
    }

    pub async fn render(
        &self,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Bytes, SocialImageError> {
        let card = SocialCard::from_params(self.origin.clone(), title, description)?;

        let started = Instant::now();
        match self.renderer.render(&card).await {
            Ok(png) => {
                histogram!("folio_social_image_render_ms")
                    .record(started.elapsed().as_secs_f64() * 1000.0);
                counter!("folio_social_image_rendered_total").increment(1);
                Ok(png)
            }
            Err(err) => {
                counter!("folio_social_image_failed_total").increment(1);
                Err(err.into())
            }
        }
    }
}
