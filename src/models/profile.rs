use serde::{Deserialize, Serialize};

/// Extended profile fields kept in the profile store, keyed by subject id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// The row written once at sign-up time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<NewProfile> for Profile {
    fn from(new: NewProfile) -> Self {
        Profile {
            id: new.id,
            email: new.email,
            first_name: Some(new.first_name),
            last_name: Some(new.last_name),
        }
    }
}
