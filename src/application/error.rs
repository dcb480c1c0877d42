use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        newsletter::SubscriptionError, sitemap::SitemapError, social_image::SocialImageError,
    },
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Diagnostic chain of a failed request, carried to the logging middleware in
/// the response extensions.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let messages = std::iter::successors(Some(error), |&err| err.source())
            .map(ToString::to_string)
            .collect();
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }
}

/// A failed request: the status and fixed public message go to the client,
/// the report goes to the logs.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: String,
    report: ErrorReport,
}

impl HttpError {
    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        error: &dyn StdError,
    ) -> Self {
        Self {
            status,
            public_message: public_message.into(),
            report: ErrorReport::from_error(source, status, error),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn public_message(&self) -> &str {
        &self.public_message
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        response.extensions_mut().insert(self.report);
        response
    }
}

impl From<SubscriptionError> for HttpError {
    fn from(error: SubscriptionError) -> Self {
        const SOURCE: &str = "application::newsletter";
        match &error {
            SubscriptionError::MissingToken => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "no token provided",
                &error,
            ),
            SubscriptionError::InvalidToken => {
                HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "wrong token", &error)
            }
            SubscriptionError::InvalidEmail(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "invalid email address",
                &error,
            ),
            // Lookup and creation failures share one public message.
            SubscriptionError::ContactStore(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "error verifying token",
                &error,
            ),
            SubscriptionError::Mailer(_) | SubscriptionError::Signing(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "error sending confirmation email",
                &error,
            ),
        }
    }
}

impl From<SocialImageError> for HttpError {
    fn from(error: SocialImageError) -> Self {
        const SOURCE: &str = "application::social_image";
        match &error {
            SocialImageError::Invalid(DomainError::MissingField { field }) => {
                HttpError::from_error(
                    SOURCE,
                    StatusCode::BAD_REQUEST,
                    format!("missing required parameter: {field}"),
                    &error,
                )
            }
            SocialImageError::Invalid(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "invalid image parameters",
                &error,
            ),
            SocialImageError::Render(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to generate image",
                &error,
            ),
        }
    }
}

impl From<SitemapError> for HttpError {
    fn from(error: SitemapError) -> Self {
        HttpError::from_error(
            "application::sitemap",
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to generate sitemap",
            &error,
        )
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
