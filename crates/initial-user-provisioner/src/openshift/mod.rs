//! Models of the OpenShift objects touched by the provisioner.
//!
//! Only the fields the provisioner reads or writes are typed. Everything else is kept in
//! flattened maps so that a read-modify-write cycle never drops data owned by someone else.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Implements the [`k8s_openapi`] resource traits for a cluster-scoped OpenShift type, which in
/// turn makes it a [`kube::Resource`].
macro_rules! cluster_scoped_resource {
    ($ty:ident, group = $group:literal, version = $version:literal, plural = $plural:literal) => {
        impl k8s_openapi::Resource for $ty {
            type Scope = k8s_openapi::ClusterResourceScope;

            const API_VERSION: &'static str = concat!($group, "/", $version);
            const GROUP: &'static str = $group;
            const KIND: &'static str = stringify!($ty);
            const URL_PATH_SEGMENT: &'static str = $plural;
            const VERSION: &'static str = $version;
        }

        impl k8s_openapi::Metadata for $ty {
            type Ty = ObjectMeta;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }
        }
    };
}

mod oauth;
mod user;

pub use oauth::*;
pub use user::*;

/// Identities are named after the identity provider and the user name on that provider.
pub fn identity_name(provider_name: &str, provider_user_name: &str) -> String {
    format!("{provider_name}:{provider_user_name}")
}

fn object_meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_owned()),
        ..ObjectMeta::default()
    }
}
