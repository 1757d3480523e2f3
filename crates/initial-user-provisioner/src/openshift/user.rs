use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::ObjectReference, apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::core::TypeMeta;
use serde::{Deserialize, Serialize};

use super::{identity_name, object_meta};

/// A user known to the OAuth server (`user.openshift.io/v1`, kind `User`).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(flatten)]
    pub types: Option<TypeMeta>,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    /// Names of the [`Identity`] objects mapped to this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identities: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

cluster_scoped_resource!(User, group = "user.openshift.io", version = "v1", plural = "users");

/// The binding between an identity provider account and a [`User`]
/// (`user.openshift.io/v1`, kind `Identity`).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(flatten)]
    pub types: Option<TypeMeta>,

    #[serde(default)]
    pub metadata: ObjectMeta,

    pub provider_name: String,

    pub provider_user_name: String,

    #[serde(default)]
    pub user: ObjectReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<BTreeMap<String, String>>,
}

cluster_scoped_resource!(
    Identity,
    group = "user.openshift.io",
    version = "v1",
    plural = "identities"
);

impl User {
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
}

impl Identity {
    /// An identity of `provider_user_name` on `provider_name`, mapped to the user of the same name.
    pub fn new(provider_name: &str, provider_user_name: &str) -> Self {
        Self {
            types: Some(TypeMeta {
                api_version: <Self as k8s_openapi::Resource>::API_VERSION.to_owned(),
                kind: <Self as k8s_openapi::Resource>::KIND.to_owned(),
            }),
            metadata: object_meta(&identity_name(provider_name, provider_user_name)),
            provider_name: provider_name.to_owned(),
            provider_user_name: provider_user_name.to_owned(),
            user: ObjectReference {
                name: Some(provider_user_name.to_owned()),
                ..ObjectReference::default()
            },
            extra: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use kube::{Resource, ResourceExt};
    use serde_json::json;

    use super::*;

    #[test]
    fn identity_is_named_after_provider_and_user() {
        let identity = Identity::new("htpasswd-eclipse-che", "che-user");

        assert_eq!(identity.name_any(), "htpasswd-eclipse-che:che-user");
        assert_eq!(identity.user.name.as_deref(), Some("che-user"));
    }

    #[test]
    fn resources_use_the_openshift_api_groups() {
        assert_eq!(User::kind(&()), "User");
        assert_eq!(User::api_version(&()), "user.openshift.io/v1");
        assert_eq!(Identity::plural(&()), "identities");
    }

    #[test]
    fn user_deserializes_from_the_api() {
        let user: User = serde_json::from_value(json!({
            "apiVersion": "user.openshift.io/v1",
            "kind": "User",
            "metadata": { "name": "che-user", "uid": "1234" },
            "identities": ["htpasswd-eclipse-che:che-user"],
            "groups": null
        }))
        .expect("User must deserialize");

        assert_eq!(user.name_any(), "che-user");
        assert_eq!(
            user.identities.as_deref(),
            Some(["htpasswd-eclipse-che:che-user".to_owned()].as_slice())
        );
        assert_eq!(user.groups, None);
    }
}
