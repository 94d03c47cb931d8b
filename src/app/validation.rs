use crate::error::{Result, StoreError};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$")
        .expect("email pattern compiles")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9+\-() ]+$").expect("phone pattern compiles"));

/// Trim and lowercase, then check the shape.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if email.len() > 254 || !EMAIL_RE.is_match(&email) {
        return Err(StoreError::validation("A valid email address is required"));
    }
    Ok(email)
}

pub fn check_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if !(8..=128).contains(&len) {
        return Err(StoreError::validation("Password must be 8 to 128 characters"));
    }
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(StoreError::validation(
            "Password must contain at least one letter and one digit",
        ));
    }
    Ok(())
}

/// Trim and check the length in characters. Returns the trimmed value.
pub fn text_len(field: &str, value: &str, min: usize, max: usize) -> Result<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(if min <= 1 && len == 0 {
            StoreError::validation(format!("{field} is required"))
        } else {
            StoreError::validation(format!("{field} must be {min} to {max} characters"))
        });
    }
    Ok(trimmed.to_string())
}

pub fn name(value: &str) -> Result<String> {
    text_len("Name", value, 1, 100)
}

/// Empty input clears the phone number.
pub fn phone(value: Option<&str>) -> Result<Option<String>> {
    match value.map(str::trim).filter(|p| !p.is_empty()) {
        None => Ok(None),
        Some(p) if p.chars().count() <= 30 && PHONE_RE.is_match(p) => Ok(Some(p.to_string())),
        Some(_) => Err(StoreError::validation(
            "Phone may contain up to 30 digits, spaces and + - ( )",
        )),
    }
}

/// Lowercase ASCII alphanumerics with single dashes between runs.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Kim@Example.COM ").unwrap(), "kim@example.com");
        assert!(normalize_email("kim@").is_err());
        assert!(normalize_email("kim@example").is_err());
        assert!(normalize_email("kim example@x.com").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(check_password("abcdefg1").is_ok());
        assert!(check_password("short1").is_err());
        assert!(check_password("allletters").is_err());
        assert!(check_password("12345678").is_err());
        assert!(check_password(&format!("a1{}", "x".repeat(127))).is_err());
    }

    #[test]
    fn test_text_len_trims() {
        assert_eq!(text_len("Title", "  Great  ", 1, 10).unwrap(), "Great");
        assert!(text_len("Title", "   ", 1, 10).is_err());
        assert!(text_len("Body", "too short", 10, 100).is_err());
    }

    #[test]
    fn test_phone() {
        assert_eq!(phone(Some(" +1 (555) 010-2000 ")).unwrap().as_deref(), Some("+1 (555) 010-2000"));
        assert_eq!(phone(Some("")).unwrap(), None);
        assert!(phone(Some("call me")).is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Curl Defining Cream (8 oz)"), "curl-defining-cream-8-oz");
        assert_eq!(slugify("  --Shea & Argan!! "), "shea-argan");
        assert_eq!(slugify("Crème brûlée"), "cr-me-br-l-e");
        assert_eq!(slugify("!!!"), "");
    }
}
