use snafu::{Snafu, ensure};

use crate::constants::{
    CONFIG_NAMESPACE, DEFAULT_PASSWORD_LENGTH, DISPLAY_SECRET_NAME, HASH_COMMAND,
    HTPASSWD_SECRET_NAME, IDENTITY_PROVIDER_NAME, INITIAL_USER_NAME, MIN_PASSWORD_LENGTH,
    OAUTH_SINGLETON_NAME,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("the {field} must not be empty"))]
    EmptyIdentifier { field: &'static str },

    #[snafu(display(
        "the password length {length} is below the minimum of {MIN_PASSWORD_LENGTH} characters"
    ))]
    PasswordTooShort { length: usize },
}

/// Names and policies used when provisioning the initial user.
///
/// The defaults match what the OpenShift OAuth server and the console expect, overriding them is
/// mostly useful for tests and for running several provisioners side by side.
#[cfg_attr(
    feature = "clap",
    derive(clap::Args),
    command(next_help_heading = "Initial User Options")
)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitialUserConfig {
    /// Name of the Secret holding the plaintext credentials in the target namespace.
    #[cfg_attr(feature = "clap", arg(long, env, default_value = DISPLAY_SECRET_NAME))]
    pub display_secret_name: String,

    /// Name of the Secret holding the htpasswd file.
    #[cfg_attr(feature = "clap", arg(long, env, default_value = HTPASSWD_SECRET_NAME))]
    pub htpasswd_secret_name: String,

    /// Namespace of the htpasswd Secret, the OAuth server only reads secrets from there.
    #[cfg_attr(feature = "clap", arg(long, env, default_value = CONFIG_NAMESPACE))]
    pub config_namespace: String,

    /// Name of the HTPasswd identity provider registered in the OAuth configuration.
    #[cfg_attr(feature = "clap", arg(long, env, default_value = IDENTITY_PROVIDER_NAME))]
    pub identity_provider_name: String,

    /// Name of the initial user.
    #[cfg_attr(feature = "clap", arg(long, env, default_value = INITIAL_USER_NAME))]
    pub user_name: String,

    /// Name of the cluster-scoped OAuth configuration.
    #[cfg_attr(feature = "clap", arg(long, env, default_value = OAUTH_SINGLETON_NAME))]
    pub oauth_name: String,

    /// Executable used to hash the generated password.
    #[cfg_attr(feature = "clap", arg(long, env, default_value = HASH_COMMAND))]
    pub hash_command: String,

    /// Number of characters of the generated password.
    #[cfg_attr(feature = "clap", arg(long, env, default_value_t = DEFAULT_PASSWORD_LENGTH))]
    pub password_length: usize,
}

impl Default for InitialUserConfig {
    fn default() -> Self {
        Self {
            display_secret_name: DISPLAY_SECRET_NAME.to_owned(),
            htpasswd_secret_name: HTPASSWD_SECRET_NAME.to_owned(),
            config_namespace: CONFIG_NAMESPACE.to_owned(),
            identity_provider_name: IDENTITY_PROVIDER_NAME.to_owned(),
            user_name: INITIAL_USER_NAME.to_owned(),
            oauth_name: OAUTH_SINGLETON_NAME.to_owned(),
            hash_command: HASH_COMMAND.to_owned(),
            password_length: DEFAULT_PASSWORD_LENGTH,
        }
    }
}

impl InitialUserConfig {
    pub fn validate(&self) -> Result<()> {
        let identifiers = [
            ("display secret name", &self.display_secret_name),
            ("htpasswd secret name", &self.htpasswd_secret_name),
            ("config namespace", &self.config_namespace),
            ("identity provider name", &self.identity_provider_name),
            ("user name", &self.user_name),
            ("OAuth name", &self.oauth_name),
            ("hash command", &self.hash_command),
        ];

        for (field, value) in identifiers {
            ensure!(!value.trim().is_empty(), EmptyIdentifierSnafu { field });
        }

        ensure!(
            self.password_length >= MIN_PASSWORD_LENGTH,
            PasswordTooShortSnafu {
                length: self.password_length
            }
        );

        Ok(())
    }

    /// Name of the [`Identity`](crate::openshift::Identity) linking the initial user to the
    /// identity provider.
    pub fn identity_name(&self) -> String {
        crate::openshift::identity_name(&self.identity_provider_name, &self.user_name)
    }
}
