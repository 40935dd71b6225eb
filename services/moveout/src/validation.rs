//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Mail address is required".to_string());
    }

    if email.len() > 254 {
        return Err("Mail address must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid mail address format".to_string());
    }

    Ok(())
}

/// Validate password against the account policy
///
/// At least 8 characters with at least one lowercase letter, one uppercase
/// letter, and one digit.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < 8 {
        return Err("Password too short. Must be at least 8 characters.".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !(has_lower && has_upper && has_digit) {
        return Err(
            "Password must contain at least one lowercase letter, one uppercase letter, and one number."
                .to_string(),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_password() {
        assert!(validate_password("Passw0rd1").is_ok());
        assert!(validate_password("aB3aB3aB3").is_ok());
    }

    #[test]
    fn test_password_too_short() {
        assert!(validate_password("Ab1").is_err());
        assert!(validate_password("Abcdef1").is_err());
    }

    #[test]
    fn test_password_missing_classes() {
        assert!(validate_password("alllowercase1").is_err());
        assert!(validate_password("ALLUPPERCASE1").is_err());
        assert!(validate_password("NoDigitsHere").is_err());
        assert!(validate_password("").is_err());
    }

    #[test]
    fn test_password_with_symbols_is_accepted() {
        // Symbols are allowed, just not required
        assert!(validate_password("Passw0rd!").is_ok());
    }

    #[test]
    fn test_valid_email() {
        assert!(validate_email("a@x.com").is_ok());
        assert!(validate_email("user.name+tag@example.co.uk").is_ok());
    }

    #[test]
    fn test_invalid_email() {
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@tld").is_err());
    }
}
