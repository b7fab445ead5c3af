use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::AppError,
    users::{
        repo_types::{ProfilePatch, User},
        username::{MAX_USERNAME_LEN, MIN_USERNAME_LEN},
    },
};

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 30;
pub const MIN_PASSWORD_LEN: usize = 7;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), AppError> {
    if email.is_empty() {
        return Err(AppError::Validation("email is required".into()));
    }
    if !is_valid_email(email) {
        return Err(AppError::Validation("invalid email".into()));
    }
    Ok(())
}

fn check_password(field: &str, password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "{} must be at least {} characters",
            field, MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Request body for signup. Missing fields deserialize empty and fail validation.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct SignupRequest {
    pub firstname: String,
    pub lastname: String,
    pub username: Option<String>,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    pub fn normalize(&mut self) {
        self.firstname = self.firstname.trim().to_string();
        self.lastname = self.lastname.trim().to_string();
        self.email = normalize_email(&self.email);
        self.username = self
            .username
            .take()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
    }

    /// `username` is the final one, whether supplied or generated.
    pub fn validate(&self, username: &str) -> Result<(), AppError> {
        check_len("firstname", &self.firstname, MIN_NAME_LEN, MAX_NAME_LEN)?;
        check_len("lastname", &self.lastname, MIN_NAME_LEN, MAX_NAME_LEN)?;
        check_len("username", username, MIN_USERNAME_LEN, MAX_USERNAME_LEN)?;
        check_email(&self.email)?;
        check_password("password", &self.password)
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn normalize(&mut self) {
        self.email = normalize_email(&self.email);
    }

    pub fn validate(&self) -> Result<(), AppError> {
        check_email(&self.email)?;
        check_password("password", &self.password)
    }
}

/// Partial update; absent or empty fields are left unchanged.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UpdateProfileRequest {
    /// Validates the supplied fields and turns the request into a store patch.
    pub fn into_patch(self) -> Result<ProfilePatch, AppError> {
        let present = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let patch = ProfilePatch {
            firstname: present(self.firstname),
            lastname: present(self.lastname),
            username: present(self.username),
            email: present(self.email).map(|e| e.to_lowercase()),
        };

        if let Some(v) = &patch.firstname {
            check_len("firstname", v, MIN_NAME_LEN, MAX_NAME_LEN)?;
        }
        if let Some(v) = &patch.lastname {
            check_len("lastname", v, MIN_NAME_LEN, MAX_NAME_LEN)?;
        }
        if let Some(v) = &patch.username {
            check_len("username", v, MIN_USERNAME_LEN, MAX_USERNAME_LEN)?;
        }
        if let Some(v) = &patch.email {
            check_email(v)?;
        }
        Ok(patch)
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub password: String,
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.password.is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }
        check_password("new_password", &self.new_password)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub username: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            firstname: u.firstname,
            lastname: u.lastname,
            username: u.username,
            email: u.email,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}
