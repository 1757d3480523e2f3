use std::fmt;

use rand::{Rng, distr::Alphanumeric};
use zeroize::Zeroizing;

/// A user name and its plaintext password.
///
/// The password is wiped from memory when the pair is dropped and never shows up in `Debug`
/// output.
#[derive(Clone)]
pub struct CredentialPair {
    username: String,
    password: Zeroizing<String>,
}

impl CredentialPair {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    /// Generates a random alphanumeric password of `password_length` characters for `username`.
    pub fn generate(username: &str, password_length: usize) -> Self {
        let password: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(password_length)
            .map(char::from)
            .collect();

        Self::new(username, password)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(8)]
    #[case(12)]
    #[case(64)]
    fn generated_password_has_requested_length(#[case] length: usize) {
        let credentials = CredentialPair::generate("che-user", length);

        assert_eq!(credentials.username(), "che-user");
        assert_eq!(credentials.password().len(), length);
        assert!(
            credentials
                .password()
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        );
    }

    #[test]
    fn generated_passwords_differ() {
        let first = CredentialPair::generate("che-user", 12);
        let second = CredentialPair::generate("che-user", 12);

        assert_ne!(first.password(), second.password());
    }

    #[test]
    fn debug_output_redacts_the_password() {
        let credentials = CredentialPair::new("che-user", "s3cr3t-value");
        let debug = format!("{credentials:?}");

        assert!(debug.contains("che-user"));
        assert!(!debug.contains("s3cr3t-value"));
    }
}
