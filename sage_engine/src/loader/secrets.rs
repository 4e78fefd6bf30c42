//! Resolves `{{NAME}}` placeholders in configuration values against the
//! external secrets provider, which by `spec.md` §6 convention is simply
//! the process environment.

use std::borrow::Cow;

/// The full string must be a single `{{NAME}}` placeholder, or it is
/// returned unchanged — partial interpolation is not part of the secrets
/// grammar (`spec.md` §6 calls these "the textual form `{{NAME}}`").
pub fn resolve(value: &str) -> Result<Cow<'_, str>, SecretError> {
    let Some(name) = extract_placeholder(value) else {
        return Ok(Cow::Borrowed(value));
    };
    std::env::var(name)
        .map(Cow::Owned)
        .map_err(|_| SecretError::Unresolved(name.to_owned()))
}

fn extract_placeholder(value: &str) -> Option<&str> {
    let inner = value.strip_prefix("{{")?.strip_suffix("}}")?;
    let name = inner.trim();
    if name.is_empty() || name != inner {
        return None;
    }
    Some(name)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("secret '{0}' is not set in the environment")]
    Unresolved(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_placeholder_values_pass_through() {
        assert_eq!(resolve("literal").unwrap(), "literal");
    }

    #[test]
    fn resolves_from_environment() {
        std::env::set_var("SAGE_TEST_SECRET_X", "s3cr3t");
        assert_eq!(resolve("{{SAGE_TEST_SECRET_X}}").unwrap(), "s3cr3t");
        std::env::remove_var("SAGE_TEST_SECRET_X");
    }

    #[test]
    fn unresolved_secret_is_an_error() {
        std::env::remove_var("SAGE_TEST_SECRET_MISSING");
        assert_eq!(
            resolve("{{SAGE_TEST_SECRET_MISSING}}"),
            Err(SecretError::Unresolved("SAGE_TEST_SECRET_MISSING".to_owned()))
        );
    }
}
