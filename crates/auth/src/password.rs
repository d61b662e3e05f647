//! Password-change form rules.
//!
//! Verification of the current password and the change itself happen at the
//! auth provider; this module only decides whether a request is worth sending.

use serde::Deserialize;

use proventory_core::ValidationErrors;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub fn validate_password_change(change: &PasswordChange) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let new = change.new_password.as_str();

    errors.check(change.current_password.is_empty(), "current_password", "is required");
    errors.check(
        new.chars().count() < MIN_PASSWORD_LEN,
        "new_password",
        "must be at least 8 characters",
    );
    errors.check(
        !new.chars().any(|c| c.is_alphabetic()),
        "new_password",
        "must contain a letter",
    );
    errors.check(
        !new.chars().any(|c| c.is_ascii_digit()),
        "new_password",
        "must contain a digit",
    );
    errors.check(
        !change.current_password.is_empty() && new == change.current_password,
        "new_password",
        "must differ from the current password",
    );
    errors.check(
        change.confirm_password != new,
        "confirm_password",
        "does not match the new password",
    );

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(current: &str, new: &str, confirm: &str) -> PasswordChange {
        PasswordChange {
            current_password: current.to_string(),
            new_password: new.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn accepts_strong_matching_password() {
        assert!(validate_password_change(&change("old-pass1", "n3w-secret", "n3w-secret")).is_ok());
    }

    #[test]
    fn reports_every_failing_rule() {
        let errors = validate_password_change(&change("", "short", "shorter")).unwrap_err();
        assert!(errors.field("current_password").is_some());
        let new = errors.field("new_password").unwrap();
        assert!(new.iter().any(|m| m.contains("8 characters")));
        assert!(new.iter().any(|m| m.contains("digit")));
        assert!(errors.field("confirm_password").is_some());
    }

    #[test]
    fn rejects_reusing_current_password() {
        let errors = validate_password_change(&change("same-pass1", "same-pass1", "same-pass1")).unwrap_err();
        assert_eq!(errors.field("new_password").unwrap(), ["must differ from the current password"]);
    }
}
