//! Checks the auth screens run before calling the session controller.

use serde::Deserialize;

/// A form that failed its local checks. The message is shown as is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FormError(pub &'static str);

const FILL_ALL_FIELDS: &str = "Please fill in all fields";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormError> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(FormError(FILL_ALL_FIELDS));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), FormError> {
        let fields = [
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.password,
            &self.confirm_password,
        ];
        if fields.iter().any(|field| field.is_empty()) {
            return Err(FormError(FILL_ALL_FIELDS));
        }
        if self.password != self.confirm_password {
            return Err(FormError("Passwords do not match"));
        }
        if self.password.chars().count() < 6 {
            return Err(FormError("Password must be at least 6 characters"));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ForgotPasswordForm {
    #[serde(default)]
    pub email: String,
}

impl ForgotPasswordForm {
    pub fn validate(&self) -> Result<(), FormError> {
        if self.email.is_empty() {
            return Err(FormError("Please enter your email address"));
        }
        Ok(())
    }
}
