use serde::{Deserialize, Serialize};

use super::{Identity, Profile};

/// The merged view of an authenticated user exposed to consumers.
///
/// Built from an [`Identity`] and, when available, the matching [`Profile`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl User {
    /// A user with no profile fields, used when the profile row is missing
    /// or could not be read.
    pub fn from_identity(identity: &Identity) -> Self {
        User {
            id: identity.id.clone(),
            email: identity.email.clone(),
            first_name: None,
            last_name: None,
        }
    }

    /// Merge the identity with its profile. The identity's email wins; the
    /// profile email is only used when the identity carries none.
    pub fn merge(identity: &Identity, profile: &Profile) -> Self {
        let email = if identity.email.is_empty() {
            profile.email.clone()
        } else {
            identity.email.clone()
        };
        User {
            id: identity.id.clone(),
            email,
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
        }
    }

    /// Name shown in greetings: first name, else the local part of the
    /// email, else "Guest".
    pub fn display_name(&self) -> String {
        if let Some(first) = self.first_name.as_deref().filter(|s| !s.is_empty()) {
            return first.to_string();
        }
        match self.email.split('@').next() {
            Some(local) if !local.is_empty() => local.to_string(),
            _ => "Guest".to_string(),
        }
    }
}
