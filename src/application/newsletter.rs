//! Newsletter double opt-in: issue confirmation links and confirm subscribers.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, instrument};
use url::Url;

use crate::application::contacts::{
    ConfirmationEmail, ConfirmationMailer, ContactStore, ContactStoreError, MailerError,
};
use crate::application::token::{TokenSigner, TokenSignerError};
use crate::domain::error::DomainError;
use crate::domain::newsletter::{AudienceId, SubscriberEmail};
use crate::util::markup::escape_markup;

pub const CONFIRM_PATH: &str = "/newsletter/confirm";

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("no token provided")]
    MissingToken,
    #[error("wrong token")]
    InvalidToken,
    #[error("invalid email address: {0}")]
    InvalidEmail(#[source] DomainError),
    #[error("contact store failure: {0}")]
    ContactStore(#[from] ContactStoreError),
    #[error("failed to send confirmation email: {0}")]
    Mailer(#[from] MailerError),
    #[error("failed to sign confirmation token: {0}")]
    Signing(#[from] TokenSignerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    AlreadySubscribed,
}

#[derive(Clone)]
pub struct NewsletterService {
    signer: TokenSigner,
    contacts: Arc<dyn ContactStore>,
    mailer: Arc<dyn ConfirmationMailer>,
    audience: AudienceId,
    public_url: Url,
    site_name: String,
}

impl NewsletterService {
    pub fn new(
        signer: TokenSigner,
        contacts: Arc<dyn ContactStore>,
        mailer: Arc<dyn ConfirmationMailer>,
        audience: AudienceId,
        public_url: Url,
        site_name: impl Into<String>,
    ) -> Self {
        Self {
            signer,
            contacts,
            mailer,
            audience,
            public_url,
            site_name: site_name.into(),
        }
    }

    /// Verify a confirmation token and add its address to the audience.
    #[instrument(name = "newsletter.confirm", skip_all)]
    pub async fn confirm(&self, token: Option<&str>) -> Result<ConfirmOutcome, SubscriptionError> {
        let result = self.confirm_inner(token).await;
        match &result {
            Ok(ConfirmOutcome::Confirmed) => {
                counter!("folio_newsletter_confirmed_total").increment(1)
            }
            Ok(ConfirmOutcome::AlreadySubscribed) => {
                counter!("folio_newsletter_already_subscribed_total").increment(1)
            }
            Err(_) => counter!("folio_newsletter_confirm_failed_total").increment(1),
        }
        result
    }

    async fn confirm_inner(
        &self,
        token: Option<&str>,
    ) -> Result<ConfirmOutcome, SubscriptionError> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(SubscriptionError::MissingToken)?;

        let email = self
            .signer
            .verify(token, OffsetDateTime::now_utc())
            .and_then(|raw| SubscriberEmail::parse(&raw).ok())
            .ok_or(SubscriptionError::InvalidToken)?;

        if self.contacts.get(&email, &self.audience).await?.is_some() {
            info!(
                target = "folio::newsletter",
                audience = %self.audience,
                "address already subscribed"
            );
            return Ok(ConfirmOutcome::AlreadySubscribed);
        }

        let contact = self.contacts.create(&email, &self.audience).await?;
        info!(
            target = "folio::newsletter",
            audience = %self.audience,
            contact_id = %contact.id,
            "subscription confirmed"
        );
        Ok(ConfirmOutcome::Confirmed)
    }

    /// Send a confirmation link to `raw_email`.
    #[instrument(name = "newsletter.subscribe", skip_all)]
    pub async fn subscribe(&self, raw_email: &str) -> Result<(), SubscriptionError> {
        let email = SubscriberEmail::parse(raw_email).map_err(SubscriptionError::InvalidEmail)?;
        counter!("folio_newsletter_subscribe_total").increment(1);

        let token = self.signer.sign(email.as_str(), OffsetDateTime::now_utc())?;
        let link = self.confirmation_link(&token);
        let message = self.confirmation_email(email, &link);

        self.mailer.send(message).await?;
        info!(target = "folio::newsletter", "confirmation email sent");
        Ok(())
    }

    pub fn confirmation_link(&self, token: &str) -> Url {
        confirmation_url(&self.public_url, token)
    }

    fn confirmation_email(&self, to: SubscriberEmail, link: &Url) -> ConfirmationEmail {
        let hours = self.signer.ttl().whole_hours();
        let subject = format!("Confirm your subscription to {}", self.site_name);
        let text = format!(
            "Thanks for subscribing to {site}!\n\n\
             Confirm your subscription by opening this link:\n{link}\n\n\
             The link expires in {hours} hours. If you did not ask to subscribe, ignore this email.\n",
            site = self.site_name,
        );
        let html = format!(
            "<p>Thanks for subscribing to {site}!</p>\
             <p><a href=\"{link}\">Confirm your subscription</a></p>\
             <p>The link expires in {hours} hours. If you did not ask to subscribe, ignore this email.</p>",
            site = escape_markup(&self.site_name),
            link = escape_markup(link.as_str()),
        );

        ConfirmationEmail {
            to,
            subject,
            html,
            text,
        }
    }
}

/// Absolute URL of the confirmation endpoint carrying `token`.
pub fn confirmation_url(public_url: &Url, token: &str) -> Url {
    let mut link = public_url.clone();
    link.set_path(CONFIRM_PATH);
    link.set_query(None);
    link.query_pairs_mut().append_pair("token", token);
    link
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use time::Duration;

    use crate::domain::newsletter::Contact;

    struct NoContacts;

    #[async_trait]
    impl ContactStore for NoContacts {
        async fn get(
            &self,
            _email: &SubscriberEmail,
            _audience: &AudienceId,
        ) -> Result<Option<Contact>, ContactStoreError> {
            Ok(None)
        }

        async fn create(
            &self,
            email: &SubscriberEmail,
            _audience: &AudienceId,
        ) -> Result<Contact, ContactStoreError> {
            Ok(Contact {
                id: "c_1".to_string(),
                email: email.to_string(),
                unsubscribed: false,
            })
        }
    }

    struct NullMailer;

    #[async_trait]
    impl ConfirmationMailer for NullMailer {
        async fn send(&self, _email: ConfirmationEmail) -> Result<(), MailerError> {
            Ok(())
        }
    }

    fn service(public_url: &str) -> NewsletterService {
        NewsletterService::new(
            TokenSigner::new(&[7u8; 32], Duration::hours(48)).unwrap(),
            Arc::new(NoContacts),
            Arc::new(NullMailer),
            AudienceId::new("aud").unwrap(),
            Url::parse(public_url).unwrap(),
            "Example <Blog>",
        )
    }

    #[test]
    fn confirmation_link_replaces_path_and_encodes_token() {
        let link = service("https://blog.example.com/some/page?x=1").confirmation_link("a+b.c");
        assert_eq!(
            link.as_str(),
            "https://blog.example.com/newsletter/confirm?token=a%2Bb.c"
        );
    }

    #[test]
    fn confirmation_email_mentions_link_and_ttl() {
        let svc = service("https://blog.example.com");
        let link = svc.confirmation_link("tok");
        let email = svc.confirmation_email(SubscriberEmail::parse("a@b.io").unwrap(), &link);
        assert!(email.text.contains(link.as_str()));
        assert!(email.text.contains("48 hours"));
        assert!(email.html.contains("Example &lt;Blog&gt;"));
        assert_eq!(email.subject, "Confirm your subscription to Example <Blog>");
    }

    #[tokio::test]
    async fn blank_token_counts_as_missing() {
        let err = service("https://blog.example.com")
            .confirm(Some("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::MissingToken));
    }
}
