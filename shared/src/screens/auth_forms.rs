use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use zeroize::Zeroize;

use super::{Ctx, Followup};
use crate::capabilities::ApiResponse;
use crate::config::{MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH};
use crate::error::{AppError, ValidationError};
use crate::event::Event;
use crate::model::{Credentials, RegisterResponse, TokenResponse};
use crate::session::Route;

const LOGIN_FAILED: &str = "Login failed. Please check your credentials.";
const REGISTER_FAILED: &str = "Registration failed. Email may already be in use.";

#[derive(Serialize, Deserialize, Clone)]
pub enum AuthEvent {
    EmailChanged(String),
    PasswordChanged(String),
    ConfirmPasswordChanged(String),
    SubmitLogin,
    SubmitRegister,

    #[serde(skip)]
    LoginCompleted(Box<ApiResponse<TokenResponse>>),
    #[serde(skip)]
    RegisterCompleted(Box<ApiResponse<RegisterResponse>>),
}

impl AuthEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EmailChanged(_) => "auth_email_changed",
            Self::PasswordChanged(_) => "auth_password_changed",
            Self::ConfirmPasswordChanged(_) => "auth_confirm_password_changed",
            Self::SubmitLogin => "auth_submit_login",
            Self::SubmitRegister => "auth_submit_register",
            Self::LoginCompleted(_) => "auth_login_completed",
            Self::RegisterCompleted(_) => "auth_register_completed",
        }
    }
}

impl fmt::Debug for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmailChanged(email) => f.debug_tuple("EmailChanged").field(email).finish(),
            Self::LoginCompleted(result) => f
                .debug_struct("LoginCompleted")
                .field("ok", &result.is_ok())
                .finish(),
            Self::RegisterCompleted(result) => f
                .debug_struct("RegisterCompleted")
                .field("ok", &result.is_ok())
                .finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// Login and register share one form. Passwords are wiped when the form is
/// dropped.
#[derive(Default)]
pub struct AuthFormState {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub is_submitting: bool,
}

impl fmt::Debug for AuthFormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthFormState")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("confirm_password", &"[REDACTED]")
            .field("is_submitting", &self.is_submitting)
            .finish()
    }
}

impl Drop for AuthFormState {
    fn drop(&mut self) {
        self.password.zeroize();
        self.confirm_password.zeroize();
    }
}

impl AuthFormState {
    fn login_credentials(&self) -> Result<Credentials, ValidationError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ValidationError::EmptyEmail);
        }
        if self.password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        Ok(Credentials {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }

    fn register_credentials(&self) -> Result<Credentials, ValidationError> {
        let credentials = self.login_credentials()?;
        if self.confirm_password.is_empty() {
            return Err(ValidationError::EmptyConfirmPassword);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        let length = self.password.chars().count();
        if length < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LENGTH,
            });
        }
        if length > MAX_PASSWORD_LENGTH {
            return Err(ValidationError::PasswordTooLong {
                max: MAX_PASSWORD_LENGTH,
            });
        }
        Ok(credentials)
    }
}

pub fn update(event: AuthEvent, state: &mut AuthFormState, ctx: &mut Ctx<'_>) -> Followup {
    match event {
        AuthEvent::EmailChanged(email) => state.email = email,
        AuthEvent::PasswordChanged(mut password) => {
            std::mem::swap(&mut state.password, &mut password);
            password.zeroize();
        }
        AuthEvent::ConfirmPasswordChanged(mut password) => {
            std::mem::swap(&mut state.confirm_password, &mut password);
            password.zeroize();
        }

        AuthEvent::SubmitLogin => {
            if state.is_submitting {
                return Followup::None;
            }
            let mut credentials = match state.login_credentials() {
                Ok(credentials) => credentials,
                Err(e) => {
                    ctx.fail(e);
                    return Followup::None;
                }
            };
            let sent = ctx.api.login(&credentials, |result| {
                Event::Auth(AuthEvent::LoginCompleted(Box::new(result)))
            });
            credentials.password.zeroize();
            match sent {
                Ok(()) => state.is_submitting = true,
                Err(e) => ctx.unsent("login", e),
            }
        }

        AuthEvent::SubmitRegister => {
            if state.is_submitting {
                return Followup::None;
            }
            let mut credentials = match state.register_credentials() {
                Ok(credentials) => credentials,
                Err(e) => {
                    ctx.fail(e);
                    return Followup::None;
                }
            };
            let sent = ctx.api.register(&credentials, |result| {
                Event::Auth(AuthEvent::RegisterCompleted(Box::new(result)))
            });
            credentials.password.zeroize();
            match sent {
                Ok(()) => state.is_submitting = true,
                Err(e) => ctx.unsent("register", e),
            }
        }

        AuthEvent::LoginCompleted(result) => {
            state.is_submitting = false;
            match *result {
                Ok(mut response) => match response.take_body() {
                    Some(token) if !token.access_token.trim().is_empty() => {
                        info!("login accepted");
                        ctx.feedback.clear_error();
                        return Followup::LoggedIn(SecretString::new(token.access_token));
                    }
                    _ => {
                        warn!("login response carried no token");
                        ctx.fail(AppError::validation(LOGIN_FAILED));
                    }
                },
                // A 401 here means bad credentials, not an expired session.
                Err(e) => {
                    warn!(error = %e, "login failed");
                    ctx.fail(AppError::from_http(&e, LOGIN_FAILED));
                }
            }
        }

        AuthEvent::RegisterCompleted(result) => {
            state.is_submitting = false;
            match *result {
                Ok(mut response) => {
                    let body = response.take_body().unwrap_or_default();
                    match body.access_token.filter(|t| !t.trim().is_empty()) {
                        Some(token) => {
                            info!("registration accepted with token");
                            ctx.feedback.clear_error();
                            return Followup::LoggedIn(SecretString::new(token));
                        }
                        None => {
                            info!("registration accepted, login required");
                            ctx.succeed("Registration successful! Please log in.");
                            return Followup::Navigate(Route::Login);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "registration failed");
                    ctx.fail(AppError::from_http(&e, REGISTER_FAILED));
                }
            }
        }
    }

    Followup::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(email: &str, password: &str, confirm: &str) -> AuthFormState {
        AuthFormState {
            email: email.into(),
            password: password.into(),
            confirm_password: confirm.into(),
            is_submitting: false,
        }
    }

    #[test]
    fn test_login_requires_both_fields() {
        assert_eq!(
            form(" ", "secret", "").login_credentials().unwrap_err(),
            ValidationError::EmptyEmail
        );
        assert_eq!(
            form("a@b.c", "", "").login_credentials().unwrap_err(),
            ValidationError::EmptyPassword
        );
        assert_eq!(form(" a@b.c ", "x", "").login_credentials().unwrap().email, "a@b.c");
    }

    #[test]
    fn test_register_rules() {
        assert_eq!(
            form("a@b.c", "secret1", "").register_credentials().unwrap_err(),
            ValidationError::EmptyConfirmPassword
        );
        assert_eq!(
            form("a@b.c", "secret1", "secret2").register_credentials().unwrap_err(),
            ValidationError::PasswordMismatch
        );
        assert_eq!(
            form("a@b.c", "abc", "abc").register_credentials().unwrap_err(),
            ValidationError::PasswordTooShort { min: 6 }
        );
        let long = "x".repeat(MAX_PASSWORD_LENGTH + 1);
        assert_eq!(
            form("a@b.c", &long, &long).register_credentials().unwrap_err(),
            ValidationError::PasswordTooLong { max: 72 }
        );
        assert!(form("a@b.c", "secret1", "secret1").register_credentials().is_ok());
    }

    #[test]
    fn test_short_password_message() {
        assert_eq!(
            ValidationError::PasswordTooShort { min: MIN_PASSWORD_LENGTH }.to_string(),
            "Password must be at least 6 characters long"
        );
    }

    #[test]
    fn test_debug_hides_passwords() {
        let state = form("a@b.c", "hunter22", "hunter22");
        assert!(!format!("{state:?}").contains("hunter22"));
        assert!(!format!("{:?}", AuthEvent::PasswordChanged("hunter22".into())).contains("hunter22"));
    }
}
