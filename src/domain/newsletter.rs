//! Newsletter subscribers and the mailing-list audience they belong to.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use email_address::EmailAddress;
use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// A syntactically valid e-mail address, trimmed and with a lower-cased domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::missing("email"));
        }

        let parsed = EmailAddress::from_str(trimmed)
            .map_err(|err| DomainError::validation(format!("`{trimmed}` is not an e-mail: {err}")))?;

        let normalized = format!(
            "{}@{}",
            parsed.local_part(),
            parsed.domain().to_ascii_lowercase()
        );
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SubscriberEmail {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubscriberEmail {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SubscriberEmail> for String {
    fn from(value: SubscriberEmail) -> Self {
        value.0
    }
}

/// Identifier of the mailing list at the e-mail provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudienceId(String);

impl AudienceId {
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::missing("audience_id"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AudienceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A contact stored in an audience at the e-mail provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: String,
    pub email: String,
    pub unsubscribed: bool,
}
