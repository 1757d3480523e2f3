//! Creation and removal of the initial htpasswd user.
//!
//! Every step only acts if the cluster is not yet in the desired state, so both operations can
//! be repeated after a partial failure. Nothing is retried internally: a conflict on the OAuth
//! singleton is returned to the caller, which has to read it again and start over.

use std::collections::BTreeMap;

use k8s_openapi::{
    ByteString, api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use snafu::{ResultExt as _, Snafu};
use tracing::{debug, info, instrument, warn};

use crate::{
    client::{ObjectKey, ObjectStore, StoreError, StoreResource},
    command::{self, CommandRunner},
    config::{self, InitialUserConfig},
    constants::{
        DISPLAY_SECRET_PASSWORD_KEY, DISPLAY_SECRET_USER_KEY, FIELD_MANAGER, HASH_COMMAND_FLAGS,
        HTPASSWD_SECRET_KEY, MANAGED_BY_LABEL,
    },
    credentials::CredentialPair,
    htpasswd::{self, HtpasswdEntry, HtpasswdFile},
    openshift::{Identity, IdentityProvider, OAuth, User},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid initial user configuration"))]
    InvalidConfig { source: config::Error },

    #[snafu(display("failed to hash the password of the initial user"))]
    HashPassword { source: command::Error },

    #[snafu(display("failed to parse the password hash of the initial user"))]
    ParseHashLine { source: htpasswd::Error },

    #[snafu(display("failed to ensure the initial user credentials secret exists"))]
    EnsureDisplaySecret { source: StoreError },

    #[snafu(display("failed to ensure the htpasswd secret exists"))]
    EnsureHtpasswdSecret { source: StoreError },

    #[snafu(display("failed to read the OAuth configuration"))]
    ReadOAuth { source: StoreError },

    #[snafu(display("failed to update the identity providers of the OAuth configuration"))]
    UpdateOAuth { source: StoreError },

    #[snafu(display("failed to delete the initial user credentials secret"))]
    DeleteDisplaySecret { source: StoreError },

    #[snafu(display("failed to delete the htpasswd secret"))]
    DeleteHtpasswdSecret { source: StoreError },

    #[snafu(display("failed to delete the identity of the initial user"))]
    DeleteIdentity { source: StoreError },

    #[snafu(display("failed to delete the initial user"))]
    DeleteUser { source: StoreError },
}

impl Error {
    /// The failed step ran into a concurrent modification, reading the objects again and
    /// retrying the whole operation will resolve it.
    pub fn is_conflict(&self) -> bool {
        self.store_error().is_some_and(StoreError::is_conflict)
    }

    fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::EnsureDisplaySecret { source }
            | Self::EnsureHtpasswdSecret { source }
            | Self::ReadOAuth { source }
            | Self::UpdateOAuth { source }
            | Self::DeleteDisplaySecret { source }
            | Self::DeleteHtpasswdSecret { source }
            | Self::DeleteIdentity { source }
            | Self::DeleteUser { source } => Some(source),
            Self::InvalidConfig { .. } | Self::HashPassword { .. } | Self::ParseHashLine { .. } => {
                None
            }
        }
    }
}

/// Provisions and removes the initial user.
///
/// The provisioner holds no state besides its capabilities and configuration, everything else is
/// read from the cluster on each call.
pub struct InitialUserProvisioner<S, R> {
    store: S,
    runner: R,
    config: InitialUserConfig,
}

impl<S, R> InitialUserProvisioner<S, R>
where
    S: ObjectStore,
    R: CommandRunner,
{
    pub fn new(store: S, runner: R, config: InitialUserConfig) -> Result<Self> {
        config.validate().context(InvalidConfigSnafu)?;

        Ok(Self {
            store,
            runner,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn config(&self) -> &InitialUserConfig {
        &self.config
    }

    /// Creates the initial user in `namespace`.
    ///
    /// `oauth` has to be the current state of the OAuth singleton. If the identity provider must
    /// be added and `oauth` is outdated, a conflict is returned (see [`Error::is_conflict`]).
    ///
    /// The password is hashed on every call, but existing secrets are never overwritten. If the
    /// hasher fails, no object is touched at all.
    #[instrument(skip(self, oauth))]
    pub async fn create_initial_user(&self, namespace: &str, oauth: &OAuth) -> Result<()> {
        let credentials =
            CredentialPair::generate(&self.config.user_name, self.config.password_length);
        let entry = self.hash_password(&credentials).await?;

        self.ensure_display_secret(namespace, &credentials)
            .await
            .context(EnsureDisplaySecretSnafu)?;
        self.ensure_htpasswd_secret(entry)
            .await
            .context(EnsureHtpasswdSecretSnafu)?;
        self.ensure_identity_provider(oauth)
            .await
            .context(UpdateOAuthSnafu)?;

        Ok(())
    }

    /// Removes everything [`Self::create_initial_user`] created as well as the User and Identity
    /// the OAuth server created on first login.
    ///
    /// Objects which are already gone are skipped. The identity provider is removed last, so the
    /// OAuth configuration never references a Secret that doesn't exist while the provider is
    /// still usable.
    #[instrument(skip(self))]
    pub async fn delete_initial_user(&self, namespace: &str) -> Result<()> {
        let config = &self.config;

        self.delete_if_present::<Secret>(&config.display_secret_name, Some(namespace))
            .await
            .context(DeleteDisplaySecretSnafu)?;
        self.delete_if_present::<Secret>(
            &config.htpasswd_secret_name,
            Some(&config.config_namespace),
        )
        .await
        .context(DeleteHtpasswdSecretSnafu)?;
        self.delete_if_present::<Identity>(&config.identity_name(), None)
            .await
            .context(DeleteIdentitySnafu)?;
        self.delete_if_present::<User>(&config.user_name, None)
            .await
            .context(DeleteUserSnafu)?;

        self.remove_identity_provider().await
    }

    async fn hash_password(&self, credentials: &CredentialPair) -> Result<HtpasswdEntry> {
        let output = self
            .runner
            .run(
                &self.config.hash_command,
                &[
                    HASH_COMMAND_FLAGS,
                    credentials.username(),
                    credentials.password(),
                ],
            )
            .await
            .context(HashPasswordSnafu)?;

        let entry = HtpasswdEntry::from_command_output(&output.stdout).context(ParseHashLineSnafu)?;
        if entry.username() != credentials.username() {
            warn!(
                expected = credentials.username(),
                actual = entry.username(),
                "the hasher returned an entry for a different user"
            );
        }

        Ok(entry)
    }

    async fn ensure_display_secret(
        &self,
        namespace: &str,
        credentials: &CredentialPair,
    ) -> Result<(), StoreError> {
        let data = BTreeMap::from([
            (
                DISPLAY_SECRET_USER_KEY.to_owned(),
                ByteString(credentials.username().as_bytes().to_vec()),
            ),
            (
                DISPLAY_SECRET_PASSWORD_KEY.to_owned(),
                ByteString(credentials.password().as_bytes().to_vec()),
            ),
        ]);

        self.ensure_secret(&self.config.display_secret_name, namespace, data)
            .await
    }

    async fn ensure_htpasswd_secret(&self, entry: HtpasswdEntry) -> Result<(), StoreError> {
        // An existing file is left alone, only a missing one is created with our single entry.
        let file: HtpasswdFile = [entry].into_iter().collect();
        let data = BTreeMap::from([(
            HTPASSWD_SECRET_KEY.to_owned(),
            ByteString(file.render().into_bytes()),
        )]);

        self.ensure_secret(
            &self.config.htpasswd_secret_name,
            &self.config.config_namespace,
            data,
        )
        .await
    }

    /// Creates the Secret unless it already exists.
    async fn ensure_secret(
        &self,
        name: &str,
        namespace: &str,
        data: BTreeMap<String, ByteString>,
    ) -> Result<(), StoreError> {
        let key = ObjectKey::new::<Secret>(name, Some(namespace));

        if self
            .store
            .get_opt::<Secret>(name, Some(namespace))
            .await?
            .is_some()
        {
            debug!(secret = %key, "secret already exists, leaving it untouched");
            return Ok(());
        }

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some(namespace.to_owned()),
                labels: Some(BTreeMap::from([(
                    MANAGED_BY_LABEL.to_owned(),
                    FIELD_MANAGER.to_owned(),
                )])),
                ..ObjectMeta::default()
            },
            type_: Some("Opaque".to_owned()),
            data: Some(data),
            ..Secret::default()
        };

        match self.store.create(&secret).await {
            Ok(_) => {
                info!(secret = %key, "created secret");
                Ok(())
            }
            // Someone else created it between our read and write, which is just as good.
            Err(StoreError::AlreadyExists { .. }) => {
                debug!(secret = %key, "secret has been created concurrently");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn ensure_identity_provider(&self, oauth: &OAuth) -> Result<(), StoreError> {
        let provider_name = &self.config.identity_provider_name;

        if oauth.find_identity_provider(provider_name).is_some() {
            debug!(provider = %provider_name, "identity provider already registered");
            return Ok(());
        }

        let mut oauth = oauth.clone();
        oauth.add_identity_provider(IdentityProvider::htpasswd(
            provider_name,
            &self.config.htpasswd_secret_name,
        ));
        self.store.update(&oauth).await?;

        info!(provider = %provider_name, "registered identity provider");
        Ok(())
    }

    async fn remove_identity_provider(&self) -> Result<()> {
        let provider_name = &self.config.identity_provider_name;

        let Some(mut oauth) = self
            .store
            .get_opt::<OAuth>(&self.config.oauth_name, None)
            .await
            .context(ReadOAuthSnafu)?
        else {
            debug!(oauth = %self.config.oauth_name, "OAuth configuration does not exist");
            return Ok(());
        };

        // Writing an unchanged object would only risk conflicts with unrelated edits.
        if !oauth.remove_identity_provider(provider_name) {
            debug!(provider = %provider_name, "identity provider not registered");
            return Ok(());
        }

        self.store.update(&oauth).await.context(UpdateOAuthSnafu)?;

        info!(provider = %provider_name, "removed identity provider");
        Ok(())
    }

    async fn delete_if_present<K: StoreResource>(
        &self,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<(), StoreError> {
        let key = ObjectKey::new::<K>(name, namespace);

        if self
            .store
            .delete_ignore_not_found::<K>(name, namespace)
            .await?
        {
            info!(object = %key, "deleted");
        } else {
            debug!(object = %key, "already absent");
        }

        Ok(())
    }
}
