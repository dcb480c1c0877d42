//! Resend REST adapter for audience contacts and transactional mail.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::application::contacts::{
    ConfirmationEmail, ConfirmationMailer, ContactStore, ContactStoreError, MailerError,
};
use crate::domain::newsletter::{AudienceId, Contact, SubscriberEmail};

use super::error::InfraError;

pub const DEFAULT_API_BASE: &str = "https://api.resend.com";

#[derive(Clone)]
pub struct ResendClient {
    client: Client,
    base: Url,
    api_key: String,
    from: String,
}

impl std::fmt::Debug for ResendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendClient")
            .field("base", &self.base.as_str())
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct CreateContactBody<'a> {
    email: &'a str,
    unsubscribed: bool,
}

#[derive(Debug, Deserialize)]
struct ContactBody {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    unsubscribed: bool,
}

#[derive(Debug, Deserialize)]
struct CreatedBody {
    id: String,
}

#[derive(Debug, Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

impl ResendClient {
    pub fn new(
        base: Url,
        api_key: impl Into<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        if base.cannot_be_a_base() {
            return Err(InfraError::configuration(format!(
                "`{base}` cannot be used as an API base url"
            )));
        }
        let client = Client::builder()
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            client,
            base,
            api_key: api_key.into(),
            from: from.into(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn error_body(response: Response) -> (u16, String) {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        (status, body)
    }
}

#[async_trait]
impl ContactStore for ResendClient {
    async fn get(
        &self,
        email: &SubscriberEmail,
        audience: &AudienceId,
    ) -> Result<Option<Contact>, ContactStoreError> {
        let url = self.endpoint(&["audiences", audience.as_str(), "contacts", email.as_str()]);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| ContactStoreError::Transport(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let (status, body) = Self::error_body(response).await;
            return Err(ContactStoreError::Api { status, body });
        }

        let body: ContactBody = response
            .json()
            .await
            .map_err(|err| ContactStoreError::Decode(err.to_string()))?;
        Ok(Some(Contact {
            id: body.id,
            email: body.email.unwrap_or_else(|| email.to_string()),
            unsubscribed: body.unsubscribed,
        }))
    }

    async fn create(
        &self,
        email: &SubscriberEmail,
        audience: &AudienceId,
    ) -> Result<Contact, ContactStoreError> {
        let url = self.endpoint(&["audiences", audience.as_str(), "contacts"]);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&CreateContactBody {
                email: email.as_str(),
                unsubscribed: false,
            })
            .send()
            .await
            .map_err(|err| ContactStoreError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            let (status, body) = Self::error_body(response).await;
            return Err(ContactStoreError::Api { status, body });
        }

        let body: CreatedBody = response
            .json()
            .await
            .map_err(|err| ContactStoreError::Decode(err.to_string()))?;
        Ok(Contact {
            id: body.id,
            email: email.to_string(),
            unsubscribed: false,
        })
    }
}

#[async_trait]
impl ConfirmationMailer for ResendClient {
    async fn send(&self, email: ConfirmationEmail) -> Result<(), MailerError> {
        let url = self.endpoint(&["emails"]);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&SendEmailBody {
                from: &self.from,
                to: [email.to.as_str()],
                subject: &email.subject,
                html: &email.html,
                text: &email.text,
            })
            .send()
            .await
            .map_err(|err| MailerError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            let (status, body) = Self::error_body(response).await;
            return Err(MailerError::Api { status, body });
        }
        Ok(())
    }
}
