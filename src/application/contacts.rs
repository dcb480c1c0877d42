//! Ports to the e-mail provider: the audience contact list and outbound mail.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::newsletter::{AudienceId, Contact, SubscriberEmail};

#[derive(Debug, Error)]
pub enum ContactStoreError {
    #[error("contact store request failed: {0}")]
    Transport(String),
    #[error("contact store responded with {status}: {body}")]
    Api { status: u16, body: String },
    #[error("contact store returned an unreadable body: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail request failed: {0}")]
    Transport(String),
    #[error("mail provider responded with {status}: {body}")]
    Api { status: u16, body: String },
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn get(
        &self,
        email: &SubscriberEmail,
        audience: &AudienceId,
    ) -> Result<Option<Contact>, ContactStoreError>;

    async fn create(
        &self,
        email: &SubscriberEmail,
        audience: &AudienceId,
    ) -> Result<Contact, ContactStoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationEmail {
    pub to: SubscriberEmail,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait ConfirmationMailer: Send + Sync {
    async fn send(&self, email: ConfirmationEmail) -> Result<(), MailerError>;
}
