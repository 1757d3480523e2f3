use std::str::FromStr;

use async_trait::async_trait;
use kube::{
    Client,
    api::{DeleteParams, PostParams},
};
use strum::EnumString;
use tracing::trace;

use super::{ObjectKey, ObjectStore, Result, StoreError, StoreResource};

/// An [`ObjectStore`] backed by the Kubernetes API.
///
/// It wraps an underlying [`kube::Client`] and sets the field manager on every write.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    post_params: PostParams,
    delete_params: DeleteParams,
}

impl KubeStore {
    pub fn new(client: Client, field_manager: Option<String>) -> Self {
        Self {
            client,
            post_params: PostParams {
                field_manager,
                ..PostParams::default()
            },
            delete_params: DeleteParams::default(),
        }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoreResource>(&self, name: &str, namespace: Option<&str>) -> Result<K> {
        let key = ObjectKey::new::<K>(name, namespace);
        trace!(%key, "get");

        K::api(self.client.clone(), namespace)
            .get(name)
            .await
            .map_err(|error| classify(key, error))
    }

    async fn create<K: StoreResource>(&self, resource: &K) -> Result<K> {
        let key = ObjectKey::from_resource(resource);
        trace!(%key, "create");

        K::api(self.client.clone(), key.namespace.as_deref())
            .create(&self.post_params, resource)
            .await
            .map_err(|error| classify(key, error))
    }

    async fn update<K: StoreResource>(&self, resource: &K) -> Result<K> {
        let key = ObjectKey::from_resource(resource);
        let name = key.name.clone();
        trace!(%key, "replace");

        K::api(self.client.clone(), key.namespace.as_deref())
            .replace(&name, &self.post_params, resource)
            .await
            .map_err(|error| classify(key, error))
    }

    async fn delete<K: StoreResource>(&self, name: &str, namespace: Option<&str>) -> Result<()> {
        let key = ObjectKey::new::<K>(name, namespace);
        trace!(%key, "delete");

        // Some delete endpoints return the object and others a Status, we don't need either.
        K::api(self.client.clone(), namespace)
            .delete(name, &self.delete_params)
            .await
            .map(|_| ())
            .map_err(|error| classify(key, error))
    }
}

/// The API status reasons the store distinguishes.
#[derive(Debug, EnumString, Eq, PartialEq)]
enum StatusReason {
    /// The requested object does not exist.
    /// Status code 404
    NotFound,

    /// The object being created already exists.
    /// Status code 409
    AlreadyExists,

    /// The update was rejected because the resource version is outdated.
    /// Status code 409
    Conflict,
}

impl StatusReason {
    /// Prefers the machine readable reason and falls back to the HTTP status code, some
    /// aggregated API servers leave the reason empty.
    fn from_response(code: u16, reason: &str) -> Option<Self> {
        Self::from_str(reason).ok().or(match code {
            404 => Some(Self::NotFound),
            409 => Some(Self::Conflict),
            _ => None,
        })
    }
}

fn classify(key: ObjectKey, error: kube::Error) -> StoreError {
    let reason = match &error {
        kube::Error::Api(response) => StatusReason::from_response(response.code, &response.reason),
        _ => None,
    };

    match reason {
        Some(StatusReason::NotFound) => StoreError::NotFound { key },
        Some(StatusReason::AlreadyExists) => StoreError::AlreadyExists { key },
        Some(StatusReason::Conflict) => StoreError::Conflict { key },
        None => StoreError::Request { source: error, key },
    }
}
