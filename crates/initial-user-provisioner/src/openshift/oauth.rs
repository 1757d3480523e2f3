use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::object_meta;

pub const HTPASSWD_PROVIDER_TYPE: &str = "HTPasswd";

/// Users are mapped by claiming an existing User, the OAuth server refuses to log in a user whose
/// name is already bound to another identity.
pub const MAPPING_METHOD_CLAIM: &str = "claim";

/// The cluster-wide OAuth server configuration (`config.openshift.io/v1`, kind `OAuth`).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct OAuth {
    #[serde(flatten)]
    pub types: Option<TypeMeta>,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: OAuthSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

cluster_scoped_resource!(OAuth, group = "config.openshift.io", version = "v1", plural = "oauths");

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthSpec {
    /// Ordered list of identity providers, including the ones not managed by us.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identity_providers: Vec<IdentityProvider>,

    /// Token configuration, templates and everything else we don't touch.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A single entry of [`OAuthSpec::identity_providers`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProvider {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_method: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub htpasswd: Option<HtpasswdIdentityProvider>,

    /// Configuration of the other provider types (`github`, `ldap`, `openID`, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HtpasswdIdentityProvider {
    pub file_data: SecretNameReference,
}

/// Reference to a Secret in the `openshift-config` namespace.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SecretNameReference {
    pub name: String,
}

impl OAuth {
    pub fn new(name: &str) -> Self {
        Self {
            types: Some(TypeMeta {
                api_version: <Self as k8s_openapi::Resource>::API_VERSION.to_owned(),
                kind: <Self as k8s_openapi::Resource>::KIND.to_owned(),
            }),
            metadata: object_meta(name),
            ..Self::default()
        }
    }

    pub fn with_identity_providers(
        mut self,
        identity_providers: impl IntoIterator<Item = IdentityProvider>,
    ) -> Self {
        self.spec.identity_providers = identity_providers.into_iter().collect();
        self
    }

    pub fn identity_providers(&self) -> &[IdentityProvider] {
        &self.spec.identity_providers
    }

    pub fn find_identity_provider(&self, name: &str) -> Option<&IdentityProvider> {
        self.spec
            .identity_providers
            .iter()
            .find(|provider| provider.name == name)
    }

    /// Appends `provider` unless a provider with the same name is already registered.
    ///
    /// Returns whether the list was changed.
    pub fn add_identity_provider(&mut self, provider: IdentityProvider) -> bool {
        if self.find_identity_provider(&provider.name).is_some() {
            return false;
        }

        self.spec.identity_providers.push(provider);
        true
    }

    /// Removes every provider called `name` while keeping the order of the remaining ones.
    ///
    /// Returns whether the list was changed.
    pub fn remove_identity_provider(&mut self, name: &str) -> bool {
        let before = self.spec.identity_providers.len();
        self.spec
            .identity_providers
            .retain(|provider| provider.name != name);
        self.spec.identity_providers.len() != before
    }
}

impl IdentityProvider {
    /// An HTPasswd provider reading its password file from the Secret `secret_name` in the
    /// `openshift-config` namespace.
    pub fn htpasswd(name: &str, secret_name: &str) -> Self {
        Self {
            name: name.to_owned(),
            mapping_method: Some(MAPPING_METHOD_CLAIM.to_owned()),
            type_: Some(HTPASSWD_PROVIDER_TYPE.to_owned()),
            htpasswd: Some(HtpasswdIdentityProvider {
                file_data: SecretNameReference {
                    name: secret_name.to_owned(),
                },
            }),
            extra: BTreeMap::new(),
        }
    }

    pub fn is_htpasswd(&self) -> bool {
        self.type_.as_deref() == Some(HTPASSWD_PROVIDER_TYPE)
    }

    /// Name of the Secret holding the password file, if this is an HTPasswd provider.
    pub fn htpasswd_secret_name(&self) -> Option<&str> {
        self.htpasswd
            .as_ref()
            .map(|htpasswd| htpasswd.file_data.name.as_str())
    }
}
