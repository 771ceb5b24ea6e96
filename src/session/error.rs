/// Failures returned by session commands. The `Display` text is what the
/// user sees next to the form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The identity service refused the request; its message is shown as is.
    #[error("{0}")]
    Rejected(String),
    #[error("Failed to login. Please try again.")]
    LoginFailed,
    #[error("Failed to create account. Please try again.")]
    SignupFailed,
    /// The account exists but its profile row could not be written.
    #[error("Failed to create user profile.")]
    ProfileCreationFailed,
    #[error("Failed to send password reset email.")]
    PasswordResetFailed,
}

impl SessionError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, SessionError::Rejected(_))
    }
}
