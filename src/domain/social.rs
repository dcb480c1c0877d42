//! Social preview cards rendered for link unfurling.

use super::error::DomainError;

pub const TITLE_MAX_CHARS: usize = 70;
pub const DESCRIPTION_MAX_CHARS: usize = 200;

/// Content of one social preview image, already clamped to its display limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialCard {
    origin: String,
    title: String,
    description: String,
}

impl SocialCard {
    /// Build a card from raw query values; both fields are required.
    pub fn from_params(
        origin: impl Into<String>,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Self, DomainError> {
        let title = title.ok_or(DomainError::missing("title"))?;
        let description = description.ok_or(DomainError::missing("description"))?;

        Ok(Self {
            origin: origin.into(),
            title: truncate_chars(title, TITLE_MAX_CHARS),
            description: truncate_chars(description, DESCRIPTION_MAX_CHARS),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Keep at most `max` Unicode scalar values of `input`.
pub fn truncate_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}
