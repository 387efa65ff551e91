use anyhow::{Result, anyhow};

/// Short codes are 3-32 characters of `[A-Za-z0-9_-]`, case sensitive.
pub fn is_valid_short_code(code: &str) -> bool {
    if code.len() < 3 || code.len() > 32 {
        return false;
    }
    code.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn validate_username(username: &str) -> Result<()> {
    if username.len() < 3 || username.len() > 50 {
        return Err(anyhow!("Username must be 3-50 characters long"));
    }
    Ok(())
}

/// Light-weight shape check only; deliverability is not our problem.
pub fn validate_email(email: &str) -> Result<()> {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(anyhow!("Invalid email address"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < 6 {
        return Err(anyhow!("Password must be at least 6 characters long"));
    }
    Ok(())
}

pub fn validate_file_size(size: usize, max_size: usize) -> Result<()> {
    if size > max_size {
        return Err(anyhow!(
            "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
            size,
            max_size,
            max_size / 1024 / 1024
        ));
    }
    Ok(())
}

/// Validates MIME type against the configured allowlist. An empty allowlist
/// accepts everything.
pub fn validate_mime_type(content_type: &str, allowed: &[String]) -> Result<()> {
    if allowed.is_empty() {
        return Ok(());
    }

    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    if allowed.iter().any(|a| a == &normalized) {
        return Ok(());
    }

    Err(anyhow!("MIME type '{}' is not allowed", content_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_code_pattern() {
        assert!(is_valid_short_code("abc"));
        assert!(is_valid_short_code("my-link_42"));
        assert!(is_valid_short_code("A1_-"));
        assert!(is_valid_short_code(&"x".repeat(32)));

        assert!(!is_valid_short_code(""));
        assert!(!is_valid_short_code("ab"));
        assert!(!is_valid_short_code(&"x".repeat(33)));
        assert!(!is_valid_short_code("has space"));
        assert!(!is_valid_short_code("Ünïcode"));
        assert!(!is_valid_short_code("slash/"));
        assert!(!is_valid_short_code("dot."));
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("bob").is_ok());
        assert!(validate_username(&"u".repeat(50)).is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"u".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@missing.local").is_err());
        assert!(validate_email("x@nodot").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(100, 100).is_ok());
        assert!(validate_file_size(101, 100).is_err());
    }

    #[test]
    fn test_validate_mime_type() {
        let allowed = vec!["image/png".to_string(), "application/pdf".to_string()];
        assert!(validate_mime_type("image/png", &allowed).is_ok());
        assert!(validate_mime_type("IMAGE/PNG; charset=binary", &allowed).is_ok());
        assert!(validate_mime_type("text/html", &allowed).is_err());
        // Empty allowlist accepts anything
        assert!(validate_mime_type("text/html", &[]).is_ok());
    }
}
