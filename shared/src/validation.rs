//! Input validation functions
//!
//! Validators return `Err(message)` with a client-facing message.

/// Maximum accepted password length (argon2 input is bounded)
pub const MAX_PASSWORD_LEN: usize = 128;
/// Maximum caption length
pub const MAX_CAPTION_LEN: usize = 2200;

/// True when the value is absent or only whitespace
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Fail when any of the values is blank
pub fn require_all(values: &[Option<&str>]) -> Result<(), String> {
    if values.iter().any(|v| is_blank(*v)) {
        return Err("All fields are required".to_string());
    }
    Ok(())
}

/// Canonical (stored) form of a username
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Validate an already normalized username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username cannot be empty".to_string());
    }
    if username.len() > 30 {
        return Err("Username must be at most 30 characters".to_string());
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c);
    if !username.chars().all(allowed) {
        return Err(
            "Username may only contain letters, digits, '.', '_' and '-'".to_string(),
        );
    }
    Ok(())
}

/// Validate a password before hashing
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.trim().is_empty() {
        return Err("Password cannot be empty".to_string());
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err("Password too long".to_string());
    }
    Ok(())
}

/// Validate an optional caption
pub fn validate_caption(caption: Option<&str>) -> Result<(), String> {
    match caption {
        Some(c) if c.chars().count() > MAX_CAPTION_LEN => {
            Err(format!("Caption must be at most {} characters", MAX_CAPTION_LEN))
        }
        _ => Ok(()),
    }
}
