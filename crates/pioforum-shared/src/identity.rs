use serde::{Deserialize, Serialize};

use crate::constants::ANONYMOUS_DISPLAY_NAME;
use crate::types::UserId;

/// An end-user principal as reported by the auth provider.
///
/// The provider assigns `id`; this crate never mutates it. Display fields are
/// copied into profile records and message snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: UserId,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_anonymous: bool,
}

impl Identity {
    /// A named, signed-in identity.
    pub fn named(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            display_name: Some(display_name.into()),
            avatar_url: None,
            is_anonymous: false,
        }
    }

    /// An anonymous identity with no display fields.
    pub fn anonymous(id: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            display_name: None,
            avatar_url: None,
            is_anonymous: true,
        }
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// Name shown next to this identity's posts.
    pub fn display_label(&self) -> String {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ if self.is_anonymous => ANONYMOUS_DISPLAY_NAME.to_string(),
            _ => self.id.short().to_string(),
        }
    }
}
