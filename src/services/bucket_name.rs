//! Bucket name rules shared by every bucket route.
//!
//! A valid name is 3–63 characters drawn from lowercase ASCII letters,
//! digits and hyphens. Names the server generates obey the same rule.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::bucket_service::BucketError;

pub const BUCKET_NAME_MIN_LEN: usize = 3;
pub const BUCKET_NAME_MAX_LEN: usize = 63;
const DEFAULT_NAME_PREFIX: &str = "bucket";

/// A bucket name that has passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BucketName(String);

impl BucketName {
    /// Validate `name` and wrap it.
    pub fn parse(name: &str) -> Result<Self, BucketError> {
        validate(name)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check length and character set of a candidate bucket name.
pub fn validate(name: &str) -> Result<(), BucketError> {
    let len = name.chars().count();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(BucketError::InvalidBucketName {
            name: name.to_string(),
            reason: format!(
                "must be between {BUCKET_NAME_MIN_LEN} and {BUCKET_NAME_MAX_LEN} characters"
            ),
        });
    }

    if !name.chars().all(is_allowed_char) {
        return Err(BucketError::InvalidBucketName {
            name: name.to_string(),
            reason: "allowed characters are lowercase letters, digits, and hyphens".into(),
        });
    }

    Ok(())
}

/// Produce a fresh name of the form `bucket-<utc timestamp>-<random hex>`.
///
/// Uniqueness is best effort; a collision surfaces as a conflict from the
/// provider's create call.
pub fn generate_default() -> BucketName {
    let suffix = Uuid::new_v4().simple().to_string();
    let raw = format!(
        "{DEFAULT_NAME_PREFIX}-{}-{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        &suffix[..8]
    );
    BucketName(sanitize(&raw))
}

fn is_allowed_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '-')
}

/// Lowercase, drop disallowed characters, clamp to the valid length range.
fn sanitize(raw: &str) -> String {
    let mut cleaned: String = raw
        .to_ascii_lowercase()
        .chars()
        .filter(|c| is_allowed_char(*c))
        .take(BUCKET_NAME_MAX_LEN)
        .collect();
    while cleaned.len() < BUCKET_NAME_MIN_LEN {
        cleaned.push('0');
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_long_and_uppercase_names() {
        assert!(validate("ab").is_err());
        assert!(validate(&"a".repeat(64)).is_err());
        assert!(validate("My-Bucket").is_err());
        assert!(validate("my_bucket").is_err());
        assert!(validate("my.bucket").is_err());
        assert!(validate("").is_err());
    }

    #[test]
    fn accepts_boundary_lengths() {
        assert!(validate("my-bucket-1").is_ok());
        assert!(validate("abc").is_ok());
        assert!(validate(&"a".repeat(63)).is_ok());
        assert!(validate("---").is_ok());
    }

    #[test]
    fn non_ascii_letters_are_rejected() {
        assert!(validate("bücket").is_err());
    }

    #[test]
    fn invalid_name_error_carries_name_and_reason() {
        match validate("ab") {
            Err(BucketError::InvalidBucketName { name, reason }) => {
                assert_eq!(name, "ab");
                assert!(reason.contains("between 3 and 63"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn generated_names_always_validate() {
        for _ in 0..256 {
            let name = generate_default();
            assert!(validate(name.as_str()).is_ok(), "{name} failed validation");
            assert!(name.as_str().starts_with("bucket-"));
        }
    }

    #[test]
    fn generated_names_differ() {
        assert_ne!(generate_default(), generate_default());
    }

    #[test]
    fn sanitize_clamps_to_valid_shape() {
        assert_eq!(sanitize("A_b"), "ab0");
        assert_eq!(sanitize(&"x".repeat(80)).len(), BUCKET_NAME_MAX_LEN);
        assert!(validate(&sanitize("Weird.Name!!")).is_ok());
    }
}
