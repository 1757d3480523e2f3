/// Name of the Secret holding the plaintext credentials in the target namespace.
pub const DISPLAY_SECRET_NAME: &str = "openshift-oauth-user-credentials";

/// Name of the Secret holding the htpasswd file consumed by the OAuth server.
pub const HTPASSWD_SECRET_NAME: &str = "htpasswd-eclipse-che";

/// Namespace in which the OAuth server looks up secrets referenced by identity providers.
pub const CONFIG_NAMESPACE: &str = "openshift-config";

pub const IDENTITY_PROVIDER_NAME: &str = "htpasswd-eclipse-che";
pub const INITIAL_USER_NAME: &str = "che-user";

/// The OAuth configuration is a singleton, there is exactly one object with this name.
pub const OAUTH_SINGLETON_NAME: &str = "cluster";

pub const HASH_COMMAND: &str = "htpasswd";

/// `-n` prints to stdout instead of updating a file, `-b` takes the password from the command
/// line and `-B` selects bcrypt.
pub const HASH_COMMAND_FLAGS: &str = "-nbB";

pub const DISPLAY_SECRET_USER_KEY: &str = "user";
pub const DISPLAY_SECRET_PASSWORD_KEY: &str = "password";

/// Key inside the htpasswd Secret, fixed by the OAuth server.
pub const HTPASSWD_SECRET_KEY: &str = "htpasswd";

pub const DEFAULT_PASSWORD_LENGTH: usize = 12;
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const FIELD_MANAGER: &str = "initial-user-provisioner";

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
