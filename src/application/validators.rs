use validator::ValidateEmail;

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_TEXT_LEN: usize = 5_000;
pub const MAX_DETAIL_FIELDS: usize = 20;

/// Validates that the input looks like a valid email address
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

/// Non-blank after trimming and at most `max` characters.
pub fn is_valid_text(value: &str, max: usize) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.chars().count() <= max
}

/// Detail keys are short snake_case identifiers, e.g. `expertise_areas`.
pub fn is_valid_detail_key(key: &str) -> bool {
    if key.is_empty() || key.len() > 50 {
        return false;
    }
    let mut chars = key.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    first_ok && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
