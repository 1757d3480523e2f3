//! Creates or deletes the initial htpasswd user of an OpenShift cluster.
//!
//! Both subcommands are idempotent. Conflicting writes to the OAuth configuration are retried with
//! a fresh copy of the object.

use clap::{Parser, Subcommand};
use initial_user_provisioner::{
    InitialUserConfig, InitialUserProvisioner,
    client::{KubeStore, ObjectStore as _, StoreError},
    command::ProcessRunner,
    constants::FIELD_MANAGER,
    initial_user, kube,
    openshift::OAuth,
};
use snafu::{ResultExt as _, Snafu};

use crate::retry::{RetryConfig, RetryOptions, retry_with_backoff};

mod logging;
mod retry;

const APP_NAME: &str = "initial-user-ctl";
const LOG_ENV_VAR: &str = "INITIAL_USER_LOG";

type Provisioner = InitialUserProvisioner<KubeStore, ProcessRunner>;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to create Kubernetes client"))]
    CreateClient { source: kube::Error },

    #[snafu(display("failed to set up the provisioner"))]
    CreateProvisioner { source: initial_user::Error },

    #[snafu(display("failed to read the OAuth configuration"))]
    ReadOAuth { source: StoreError },

    #[snafu(display("failed to create the initial user in namespace {namespace:?}"))]
    CreateInitialUser {
        source: initial_user::Error,
        namespace: String,
    },

    #[snafu(display("failed to delete the initial user of namespace {namespace:?}"))]
    DeleteInitialUser {
        source: initial_user::Error,
        namespace: String,
    },
}

impl Error {
    fn is_conflict(&self) -> bool {
        match self {
            Self::ReadOAuth { source } => source.is_conflict(),
            Self::CreateInitialUser { source, .. } | Self::DeleteInitialUser { source, .. } => {
                source.is_conflict()
            }
            Self::InitializeLogging { .. }
            | Self::CreateClient { .. }
            | Self::CreateProvisioner { .. } => false,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = APP_NAME, author, version, about)]
struct Opts {
    #[command(subcommand)]
    command: Command,

    /// Field manager used for all writes to the cluster.
    #[arg(long, env, default_value = FIELD_MANAGER)]
    field_manager: String,

    #[command(flatten)]
    initial_user: InitialUserConfig,

    #[command(flatten)]
    retry: RetryOptions,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Creates the credentials Secret, the htpasswd Secret and the identity provider.
    Create {
        /// Namespace receiving the Secret with the plaintext credentials.
        #[arg(long)]
        namespace: String,
    },

    /// Removes everything belonging to the initial user, including its User and Identity.
    Delete {
        /// Namespace holding the Secret with the plaintext credentials.
        #[arg(long)]
        namespace: String,
    },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let opts = Opts::parse();
    logging::initialize_logging(LOG_ENV_VAR, APP_NAME).context(InitializeLoggingSnafu)?;

    let client = kube::Client::try_default()
        .await
        .context(CreateClientSnafu)?;
    let store = KubeStore::new(client, Some(opts.field_manager));
    let provisioner = InitialUserProvisioner::new(store, ProcessRunner, opts.initial_user)
        .context(CreateProvisionerSnafu)?;
    let retry_config = RetryConfig::from(&opts.retry);

    match opts.command {
        Command::Create { namespace } => {
            retry_with_backoff(
                &retry_config,
                "create initial user",
                Error::is_conflict,
                || create(&provisioner, &namespace),
            )
            .await
        }
        Command::Delete { namespace } => {
            retry_with_backoff(
                &retry_config,
                "delete initial user",
                Error::is_conflict,
                || delete(&provisioner, &namespace),
            )
            .await
        }
    }
}

/// Reads the OAuth configuration on every attempt, so a retry after a conflict works on the
/// current version.
async fn create(provisioner: &Provisioner, namespace: &str) -> Result<(), Error> {
    let oauth: OAuth = provisioner
        .store()
        .get(&provisioner.config().oauth_name, None)
        .await
        .context(ReadOAuthSnafu)?;

    provisioner
        .create_initial_user(namespace, &oauth)
        .await
        .context(CreateInitialUserSnafu { namespace })
}

async fn delete(provisioner: &Provisioner, namespace: &str) -> Result<(), Error> {
    provisioner
        .delete_initial_user(namespace)
        .await
        .context(DeleteInitialUserSnafu { namespace })
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;
    use rstest::rstest;

    use super::*;

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }

    #[rstest]
    #[case(
        &["initial-user-ctl", "create", "--namespace", "che"],
        Command::Create { namespace: "che".to_owned() }
    )]
    #[case(
        &["initial-user-ctl", "delete", "--namespace", "eclipse-che"],
        Command::Delete { namespace: "eclipse-che".to_owned() }
    )]
    fn parses_subcommands(#[case] args: &[&str], #[case] expected: Command) {
        let opts = Opts::try_parse_from(args).expect("arguments must parse");

        assert_eq!(opts.command, expected);
        assert_eq!(opts.field_manager, FIELD_MANAGER);
        assert_eq!(opts.initial_user, InitialUserConfig::default());
    }

    #[test]
    fn overrides_initial_user_options() {
        let opts = Opts::try_parse_from([
            "initial-user-ctl",
            "--user-name",
            "admin",
            "--password-length",
            "32",
            "--retry-max-attempts",
            "0",
            "create",
            "--namespace",
            "che",
        ])
        .expect("arguments must parse");

        assert_eq!(opts.initial_user.user_name, "admin");
        assert_eq!(opts.initial_user.password_length, 32);
        assert_eq!(opts.retry.retry_max_attempts, 0);
    }

    #[test]
    fn missing_namespace_is_rejected() {
        assert!(Opts::try_parse_from(["initial-user-ctl", "create"]).is_err());
    }
}
