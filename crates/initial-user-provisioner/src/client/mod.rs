//! Access to the cluster objects managed by the provisioner.
//!
//! [`ObjectStore`] is the capability the provisioner is written against. [`KubeStore`] talks to
//! the Kubernetes API, [`InMemoryStore`] keeps everything in memory and is meant for tests.

use std::fmt::{self, Debug, Display};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, Resource};
use serde::{Serialize, de::DeserializeOwned};
use snafu::Snafu;

use crate::openshift::{Identity, OAuth, User};

mod kubernetes;
mod memory;

pub use kubernetes::KubeStore;
pub use memory::InMemoryStore;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Identifies a single object, used to give errors and logs some context.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObjectKey {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new<K: StoreResource>(name: &str, namespace: Option<&str>) -> Self {
        Self {
            kind: K::kind(&()).into_owned(),
            namespace: namespace.map(str::to_owned),
            name: name.to_owned(),
        }
    }

    pub fn from_resource<K: StoreResource>(resource: &K) -> Self {
        let meta = resource.meta();
        Self {
            kind: K::kind(&()).into_owned(),
            namespace: meta.namespace.clone(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{} {namespace}/{}", self.kind, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("{key} not found"))]
    NotFound { key: ObjectKey },

    #[snafu(display("{key} already exists"))]
    AlreadyExists { key: ObjectKey },

    /// The object was modified since it has been read, the caller has to read it again.
    #[snafu(display("{key} has been modified concurrently"))]
    Conflict { key: ObjectKey },

    #[snafu(display("request for {key} failed"))]
    Request { source: kube::Error, key: ObjectKey },

    #[snafu(display("failed to convert {key}"))]
    Convert {
        source: serde_json::Error,
        key: ObjectKey,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// An object kind the [`ObjectStore`] can handle.
pub trait StoreResource:
    Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Serialize + Send + Sync + 'static
{
    /// Returns an [`Api`] which is either namespaced or not, depending on the scope of the kind.
    ///
    /// Cluster-scoped kinds ignore `namespace`, namespaced kinds fall back to the namespace of
    /// the client config when it is `None`.
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;
}

impl StoreResource for Secret {
    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        match namespace {
            Some(namespace) => Api::namespaced(client, namespace),
            None => Api::default_namespaced(client),
        }
    }
}

macro_rules! cluster_scoped_store_resource {
    ($($ty:ty),+) => {
        $(
            impl StoreResource for $ty {
                fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
                    Api::all(client)
                }
            }
        )+
    };
}

cluster_scoped_store_resource!(OAuth, User, Identity);

/// Typed get/create/update/delete access to cluster objects.
///
/// Implementations must report missing objects as [`StoreError::NotFound`] and stale updates as
/// [`StoreError::Conflict`]. Conflicts are never retried here, the caller owns the retry policy.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get<K: StoreResource>(&self, name: &str, namespace: Option<&str>) -> Result<K>;

    /// Creates `resource` in the namespace set in its metadata.
    async fn create<K: StoreResource>(&self, resource: &K) -> Result<K>;

    /// Replaces `resource`. If its metadata carries a resource version, the update is rejected
    /// with [`StoreError::Conflict`] when the stored object has a different one.
    async fn update<K: StoreResource>(&self, resource: &K) -> Result<K>;

    async fn delete<K: StoreResource>(&self, name: &str, namespace: Option<&str>) -> Result<()>;

    /// Like [`ObjectStore::get`], but returns `None` if the object doesn't exist.
    async fn get_opt<K: StoreResource>(
        &self,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Option<K>> {
        match self.get(name, namespace).await {
            Ok(resource) => Ok(Some(resource)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Like [`ObjectStore::delete`], but treats a missing object as success.
    ///
    /// Returns whether an object was actually deleted.
    async fn delete_ignore_not_found<K: StoreResource>(
        &self,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<bool> {
        match self.delete::<K>(name, namespace).await {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }
}
