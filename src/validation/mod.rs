/// Form validation
///
/// Checks submitted credential fields against format and uniqueness rules.
/// Violations are collected, not short-circuited, so every error can be
/// reported back in a single response.
use crate::{account::AccountStore, error::AppResult};
use validator::ValidateEmail;

pub const MIN_PASSWORD_LEN: usize = 6;

/// A single user-visible validation failure
#[derive(Debug, Clone)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: &str) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }
}

/// Validate registration fields
///
/// Uniqueness checks go through the store; the UNIQUE constraints still back
/// them up against concurrent registrations.
pub async fn validate_registration(
    store: &AccountStore,
    email: &str,
    username: &str,
    full_name: &str,
    password: &str,
    password2: &str,
) -> AppResult<Vec<FieldError>> {
    let mut errors = Vec::new();

    if !email.validate_email() {
        errors.push(FieldError::new("email", "Please provide a valid email"));
    } else if store.email_exists(email).await? {
        errors.push(FieldError::new("email", "Email is taken"));
    }

    if username.is_empty() {
        errors.push(FieldError::new("username", "Username must be provided"));
    } else if store.username_exists(username).await? {
        errors.push(FieldError::new("username", "Username is taken"));
    }

    if full_name.is_empty() {
        errors.push(FieldError::new("name", "Full name must be provided"));
    }

    errors.extend(validate_new_password(password, password2));

    Ok(errors)
}

/// Validate a new password and its confirmation
///
/// Shared between registration and set-new-password; runs before any store
/// access so a rejected password never touches the account row.
pub fn validate_new_password(password: &str, password2: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 6 characters long",
        ));
    }

    if password != password2 {
        errors.push(FieldError::new("password2", "Passwords do not match"));
    }

    errors
}

/// Validate login field presence
pub fn validate_login(username: &str, password: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if username.is_empty() {
        errors.push(FieldError::new("username", "Username is required"));
    }

    if password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }

    errors
}
