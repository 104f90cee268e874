//! Login identifiers: an Indian mobile number or an email address.

use std::fmt;

use crate::AuthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Normalised to +91 followed by ten digits.
    Phone(String),
    /// Normalised to lowercase.
    Email(String),
}

impl Identifier {
    /// Parse free-form user input into a canonical identifier.
    ///
    /// Anything containing `@` is treated as an email; everything else
    /// must be a ten-digit Indian mobile number, with an optional `+91`
    /// or leading `0` and embedded spaces or dashes tolerated.
    pub fn parse(input: &str) -> Result<Self, AuthError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AuthError::InvalidIdentifier(
                "identifier must not be empty".into(),
            ));
        }

        if trimmed.contains('@') {
            return Self::parse_email(trimmed);
        }
        Self::parse_phone(trimmed)
    }

    fn parse_email(input: &str) -> Result<Self, AuthError> {
        let email = input.to_lowercase();
        let mut parts = email.splitn(2, '@');
        let local = parts.next().unwrap_or_default();
        let domain = parts.next().unwrap_or_default();

        if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.len() > 255 {
            return Err(AuthError::InvalidIdentifier(format!(
                "not a valid email address: {input}"
            )));
        }
        Ok(Identifier::Email(email))
    }

    fn parse_phone(input: &str) -> Result<Self, AuthError> {
        let digits: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        let digits = digits
            .strip_prefix("+91")
            .or_else(|| digits.strip_prefix("91").filter(|rest| rest.len() == 10))
            .or_else(|| digits.strip_prefix('0'))
            .unwrap_or(&digits);

        let valid = digits.len() == 10
            && digits.chars().all(|c| c.is_ascii_digit())
            && matches!(digits.chars().next(), Some('6'..='9'));

        if !valid {
            return Err(AuthError::InvalidIdentifier(format!(
                "not a valid Indian mobile number: {input}"
            )));
        }
        Ok(Identifier::Phone(format!("+91{digits}")))
    }

    /// Stable key used to track OTP state per identifier.
    pub fn canonical(&self) -> String {
        match self {
            Identifier::Phone(value) => format!("phone:{value}"),
            Identifier::Email(value) => format!("email:{value}"),
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Identifier::Phone(value) | Identifier::Email(value) => value,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}
