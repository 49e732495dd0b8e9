use crate::error::{MailError, Result};

/// Basic email validation
///
/// Accepts a bare address or the display form `Name <user@example.com>`.
pub fn validate_email(email: &str) -> Result<()> {
    let address = extract_address(email);

    if address.is_empty() {
        return Err(MailError::InvalidEmail("Email is empty".to_string()));
    }

    if !address.contains('@') {
        return Err(MailError::InvalidEmail(format!(
            "{} must contain @",
            email
        )));
    }

    let parts: Vec<&str> = address.split('@').collect();
    if parts.len() != 2 {
        return Err(MailError::InvalidEmail(format!("{} is not a valid email address", email)));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(MailError::InvalidEmail(format!(
            "{}: email parts cannot be empty",
            email
        )));
    }

    if local.chars().any(char::is_whitespace) || domain.chars().any(char::is_whitespace) {
        return Err(MailError::InvalidEmail(format!(
            "{}: address cannot contain whitespace",
            email
        )));
    }

    if !domain.contains('.') && domain != "localhost" {
        return Err(MailError::InvalidEmail(format!(
            "{}: domain must contain a dot",
            email
        )));
    }

    Ok(())
}

/// Return the bare address of `Name <addr>`, or the trimmed input otherwise
pub fn extract_address(email: &str) -> &str {
    let email = email.trim();
    match (email.rfind('<'), email.ends_with('>')) {
        (Some(start), true) => email[start + 1..email.len() - 1].trim(),
        _ => email,
    }
}

/// Validate every address of a recipient list
pub fn parse_emails<I, S>(emails: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    emails
        .into_iter()
        .map(Into::into)
        .map(|email| validate_email(&email).map(|_| email))
        .collect()
}
