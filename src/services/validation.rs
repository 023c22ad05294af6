//! Field validators shared by the services
//!
//! Every validator returns `ServiceError::Validation` with a message naming
//! the offending field.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{ServiceError, ServiceResult};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 72;
pub const SKU_MIN: usize = 3;
pub const SKU_MAX: usize = 50;

// Literal patterns; compilation cannot fail at runtime.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url pattern is valid"));

pub fn validate_email(email: &str) -> ServiceResult<()> {
    if email.trim().is_empty() {
        return Err(ServiceError::validation("email is required"));
    }
    if email.len() > 255 || !EMAIL_RE.is_match(email) {
        return Err(ServiceError::validation("email must be a valid email address"));
    }
    Ok(())
}

/// 3-50 characters of `[A-Za-z0-9_]`
pub fn validate_username(username: &str) -> ServiceResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(ServiceError::validation(format!(
            "username must be between {} and {} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ServiceError::validation(
            "username may only contain letters, digits and underscores",
        ));
    }
    Ok(())
}

/// 8-72 characters with at least one letter and one digit
pub fn validate_password(password: &str) -> ServiceResult<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(ServiceError::validation(format!(
            "password must be between {} and {} characters",
            PASSWORD_MIN, PASSWORD_MAX
        )));
    }
    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(ServiceError::validation(
            "password must contain at least one letter and one digit",
        ));
    }
    Ok(())
}

/// Check the trimmed character count of `value` against `min..=max`
pub fn validate_length(field: &str, value: &str, min: usize, max: usize) -> ServiceResult<()> {
    let len = value.trim().chars().count();
    if len < min {
        return Err(if min == 1 {
            ServiceError::validation(format!("{} is required", field))
        } else {
            ServiceError::validation(format!("{} must be at least {} characters", field, min))
        });
    }
    if len > max {
        return Err(ServiceError::validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Optional text field: absent or blank is fine, otherwise at most `max`
pub fn validate_optional_length(field: &str, value: Option<&str>, max: usize) -> ServiceResult<()> {
    match value {
        Some(v) => validate_length(field, v, 0, max),
        None => Ok(()),
    }
}

pub fn validate_url(field: &str, url: &str) -> ServiceResult<()> {
    if url.len() > 500 || !URL_RE.is_match(url) {
        return Err(ServiceError::validation(format!(
            "{} must be an http(s) URL",
            field
        )));
    }
    Ok(())
}

/// Lower-case ASCII letters, digits and single inner hyphens
pub fn validate_slug(slug: &str) -> ServiceResult<()> {
    let well_formed = !slug.is_empty()
        && slug.len() <= 255
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !well_formed {
        return Err(ServiceError::validation(
            "slug may only contain lower-case letters, digits and single hyphens",
        ));
    }
    Ok(())
}

/// Upper-case and check a SKU: 3-50 characters of `[A-Z0-9-]`
pub fn normalize_sku(sku: &str) -> ServiceResult<String> {
    let sku = sku.trim().to_ascii_uppercase();
    let len = sku.chars().count();
    if !(SKU_MIN..=SKU_MAX).contains(&len)
        || !sku.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ServiceError::validation(format!(
            "sku must be {}-{} characters of A-Z, 0-9 and '-'",
            SKU_MIN, SKU_MAX
        )));
    }
    Ok(sku)
}

/// Use the given slug when non-blank, otherwise derive one from `source`
pub fn resolve_slug(given: Option<&str>, source: &str) -> ServiceResult<String> {
    let slug = match given.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.to_string(),
        None => generate_slug(source),
    };
    if slug.is_empty() {
        return Err(ServiceError::validation(
            "slug could not be generated; provide one explicitly",
        ));
    }
    validate_slug(&slug)?;
    Ok(slug)
}

/// Trim an optional text field, treating blank as absent
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Generate a URL-friendly slug from text.
///
/// ASCII letters and digits are kept (lower-cased), every other run of
/// characters becomes a single hyphen, and leading/trailing hyphens are
/// dropped. May return an empty string for text without ASCII alphanumerics.
pub fn generate_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("first.last+tag@mail.example.org").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@host").is_err());
        assert!(validate_email("user name@example.com").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("bob").is_ok());
        assert!(validate_username("Alice_99").is_ok());

        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(51)).is_err());
        assert!(validate_username("bad-name").is_err());
        assert!(validate_username("spaced name").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("abcdefg1").is_ok());

        assert!(validate_password("short1").is_err());
        assert!(validate_password("lettersonly").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password(&format!("a1{}", "x".repeat(71))).is_err());
    }

    #[test]
    fn test_validate_length() {
        assert!(validate_length("title", "Hello", 1, 200).is_ok());
        assert!(validate_length("title", "   ", 1, 200).is_err());
        assert!(validate_length("title", &"x".repeat(201), 1, 200).is_err());

        let err = validate_length("title", "", 1, 200).unwrap_err();
        assert!(err.to_string().contains("title is required"));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("featured_image", "https://cdn.example.com/a.png").is_ok());
        assert!(validate_url("featured_image", "ftp://example.com/a.png").is_err());
        assert!(validate_url("featured_image", "not a url").is_err());
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("hello-world-2").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("Hello").is_err());
        assert!(validate_slug("-lead").is_err());
        assert!(validate_slug("double--hyphen").is_err());
    }

    #[test]
    fn test_normalize_sku() {
        assert_eq!(normalize_sku(" wid-01 ").unwrap(), "WID-01");
        assert!(normalize_sku("ab").is_err());
        assert!(normalize_sku("WID_01").is_err());
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("  Rust & Axum: 101!  "), "rust-axum-101");
        assert_eq!(generate_slug("already-a-slug"), "already-a-slug");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[test]
    fn test_resolve_slug() {
        assert_eq!(resolve_slug(None, "Hello World").unwrap(), "hello-world");
        assert_eq!(resolve_slug(Some("  "), "Hello World").unwrap(), "hello-world");
        assert_eq!(resolve_slug(Some("custom-1"), "Hello World").unwrap(), "custom-1");
        assert!(resolve_slug(None, "???").is_err());
        assert!(resolve_slug(Some("Bad Slug"), "x").is_err());
    }

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional(Some("  hi ".to_string())).as_deref(), Some("hi"));
        assert!(normalize_optional(Some("   ".to_string())).is_none());
        assert!(normalize_optional(None).is_none());
    }

    proptest! {
        #[test]
        fn prop_generated_slug_is_valid_or_empty(text in "\\PC{0,80}") {
            let slug = generate_slug(&text);
            prop_assert!(slug.is_empty() || validate_slug(&slug).is_ok(), "bad slug {:?}", slug);
        }

        #[test]
        fn prop_generate_slug_is_idempotent(text in "[A-Za-z0-9 _.-]{0,60}") {
            let once = generate_slug(&text);
            prop_assert_eq!(generate_slug(&once), once);
        }

        #[test]
        fn prop_valid_usernames_accepted(name in "[A-Za-z0-9_]{3,50}") {
            prop_assert!(validate_username(&name).is_ok());
        }

        #[test]
        fn prop_password_with_letter_and_digit_accepted(body in "[a-z]{7,71}", digit in 0u8..10) {
            let password = format!("{}{}", body, digit);
            prop_assert!(validate_password(&password).is_ok());
        }
    }
}
