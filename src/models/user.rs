//! User model and the request bodies of the auth and users routes.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::errors::AppError;

/// A registered user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// bcrypt hash, never leaves the server
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A validated user ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Validated partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// Request body for `POST /api/v1/auth/sign-up`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl SignUpRequest {
    /// Validate and normalise the request, returning `(name, email)`.
    pub fn validate(&self) -> Result<(String, String), AppError> {
        let fields = ProfileFields::new(
            Some(&self.name),
            Some(&self.email),
            Some(&self.password),
        )
        .check()?;
        Ok((fields.name.unwrap_or_default(), fields.email.unwrap_or_default()))
    }
}

/// Request body for `POST /api/v1/auth/sign-in`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl SignInRequest {
    pub fn validate(&self) -> Result<String, AppError> {
        if self.password.is_empty() {
            return Err(AppError::Validation("Password is required".to_string()));
        }
        let fields = ProfileFields::new(None, Some(&self.email), None).check()?;
        Ok(fields.email.unwrap_or_default())
    }
}

/// Request body for `PUT /api/v1/users/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl UpdateUserRequest {
    /// Validate the provided fields, returning normalised `(name, email)`.
    pub fn validate(&self) -> Result<(Option<String>, Option<String>), AppError> {
        if self.name.is_none() && self.email.is_none() && self.password.is_none() {
            return Err(AppError::Validation(
                "At least one of name, email or password is required".to_string(),
            ));
        }

        let fields = ProfileFields::new(
            self.name.as_deref(),
            self.email.as_deref(),
            self.password.as_deref(),
        )
        .check()?;
        Ok((fields.name, fields.email))
    }
}

/// Token plus the user it was issued for.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Normalised profile fields. `None` skips the field.
#[derive(Debug, Default, Validate)]
struct ProfileFields {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"))]
    name: Option<String>,
    #[validate(email(message = "Please provide a valid email address"))]
    email: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: Option<String>,
}

impl ProfileFields {
    /// Trim names and e-mails, lower-case e-mails. Passwords are kept as sent.
    fn new(name: Option<&str>, email: Option<&str>, password: Option<&str>) -> Self {
        Self {
            name: name.map(|n| n.trim().to_string()),
            email: email.map(|e| e.trim().to_lowercase()),
            password: password.map(str::to_string),
        }
    }

    fn check(self) -> Result<Self, AppError> {
        self.validate().map_err(first_error)?;
        Ok(self)
    }
}

/// Report the first failing field in declaration order.
fn first_error(errors: ValidationErrors) -> AppError {
    let fields = errors.field_errors();
    let message = ["name", "email", "password"]
        .iter()
        .filter_map(|field| fields.get(*field))
        .flat_map(|errs| errs.iter())
        .find_map(|err| err.message.as_ref())
        .map(|msg| msg.to_string())
        .unwrap_or_else(|| "Invalid request".to_string());
    AppError::Validation(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_up(name: &str, email: &str, password: &str) -> SignUpRequest {
        SignUpRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_sign_up_normalizes() {
        let (name, email) = sign_up("  Ada Lovelace ", " Ada@Example.COM ", "secret1")
            .validate()
            .unwrap();
        assert_eq!(name, "Ada Lovelace");
        assert_eq!(email, "ada@example.com");
    }

    #[test]
    fn test_sign_up_rejects_bad_fields() {
        assert!(sign_up("A", "a@b.co", "secret1").validate().is_err());
        assert!(sign_up("Ada", "not-an-email", "secret1").validate().is_err());
        assert!(sign_up("Ada", "a@b.co", "short").validate().is_err());
        assert!(sign_up(&"x".repeat(51), "a@b.co", "secret1").validate().is_err());
    }

    #[test]
    fn test_first_failing_field_is_reported() {
        let err = sign_up("A", "not-an-email", "short").validate().unwrap_err();
        assert_eq!(err.message(), "Name must be between 2 and 50 characters");

        let err = sign_up("Ada", "not-an-email", "short").validate().unwrap_err();
        assert_eq!(err.message(), "Please provide a valid email address");

        let err = sign_up("Ada", "a@b.co", "short").validate().unwrap_err();
        assert_eq!(err.message(), "Password must be at least 6 characters");
    }

    #[test]
    fn test_sign_in_normalizes_email() {
        let req = SignInRequest {
            email: " Grace@Example.com".into(),
            password: "x".into(),
        };
        assert_eq!(req.validate().unwrap(), "grace@example.com");
    }

    #[test]
    fn test_update_requires_some_field() {
        let err = UpdateUserRequest::default().validate().unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_update_validates_only_present_fields() {
        let req = UpdateUserRequest {
            name: Some(" Grace ".into()),
            ..Default::default()
        };
        let (name, email) = req.validate().unwrap();
        assert_eq!(name.as_deref(), Some("Grace"));
        assert!(email.is_none());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: "1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "$2b$04$hash".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["createdAt"], "2026-01-01T00:00:00Z");
    }
}
