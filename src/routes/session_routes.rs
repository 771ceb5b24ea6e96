//! Endpoints backing the auth screens and the root navigator.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::forms::{ForgotPasswordForm, LoginForm, SignupForm};
use crate::session::SessionError;
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// Registers session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(session))
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
}

/// Current session as the navigator sees it.
async fn session(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.session.state();
    let user = snapshot.user();
    Json(json!({
        "ready": snapshot.ready(),
        "phase": snapshot.phase(),
        "route": snapshot.route(),
        "user": user,
        "display_name": user.map(|u| u.display_name()),
    }))
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginForm>, JsonRejection>,
) -> Result<impl IntoResponse, HTTPError> {
    let form = read_form(body)?;
    form.validate()
        .map_err(|e| HTTPError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
    state
        .session
        .login(&form.email, &form.password)
        .await
        .map_err(|e| command_error(e, StatusCode::UNAUTHORIZED))?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupForm>, JsonRejection>,
) -> Result<impl IntoResponse, HTTPError> {
    let form = read_form(body)?;
    form.validate()
        .map_err(|e| HTTPError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
    state
        .session
        .signup(&form.email, &form.password, &form.first_name, &form.last_name)
        .await
        .map_err(|e| command_error(e, StatusCode::BAD_REQUEST))?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn logout(State(state): State<AppState>) -> StatusCode {
    state.session.logout().await;
    StatusCode::NO_CONTENT
}

async fn forgot_password(
    State(state): State<AppState>,
    body: Result<Json<ForgotPasswordForm>, JsonRejection>,
) -> Result<impl IntoResponse, HTTPError> {
    let form = read_form(body)?;
    form.validate()
        .map_err(|e| HTTPError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
    state
        .session
        .forgot_password(&form.email)
        .await
        .map_err(|e| command_error(e, StatusCode::BAD_REQUEST))?;
    Ok(Json(json!({
        "status": "ok",
        "message": "Please check your email for instructions to reset your password.",
    })))
}

fn read_form<T: DeserializeOwned>(body: Result<Json<T>, JsonRejection>) -> Result<T, HTTPError> {
    match body {
        Ok(Json(form)) => Ok(form),
        Err(rejection) => {
            debug!("rejected request body: {}", rejection);
            Err(HTTPError::new(StatusCode::BAD_REQUEST, rejection.body_text()))
        }
    }
}

/// Refusals get `rejected_status`; everything else means the upstream
/// service could not be used.
fn command_error(error: SessionError, rejected_status: StatusCode) -> HTTPError {
    let status = if error.is_rejection() {
        rejected_status
    } else {
        StatusCode::BAD_GATEWAY
    };
    HTTPError::new(status, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_statuses() {
        let rejected = command_error(
            SessionError::Rejected("Invalid login credentials".to_string()),
            StatusCode::UNAUTHORIZED,
        );
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

        let failed = command_error(SessionError::ProfileCreationFailed, StatusCode::BAD_REQUEST);
        assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);
    }
}
