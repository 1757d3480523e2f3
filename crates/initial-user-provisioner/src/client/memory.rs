use std::{
    collections::BTreeMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use serde_json::Value;
use snafu::{OptionExt as _, ResultExt as _, ensure};

use super::{
    AlreadyExistsSnafu, ConflictSnafu, ConvertSnafu, NotFoundSnafu, ObjectKey, ObjectStore,
    Result, StoreResource,
};

/// An [`ObjectStore`] keeping objects as JSON in memory.
///
/// It mimics the parts of the API server the provisioner relies on: resource versions are bumped
/// on every write and updates carrying a stale resource version are rejected. Every successful
/// write is counted, see [`InMemoryStore::mutations`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: Mutex<BTreeMap<ObjectKey, Value>>,
    resource_version: AtomicU64,
    mutations: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains<K: StoreResource>(&self, name: &str, namespace: Option<&str>) -> bool {
        self.objects()
            .contains_key(&ObjectKey::new::<K>(name, namespace))
    }

    /// Number of stored objects of all kinds.
    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }

    /// Number of successful creates, updates and deletes so far.
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<ObjectKey, Value>> {
        // The map is never left in an inconsistent state, so a poisoned lock is still usable.
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_resource_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get<K: StoreResource>(&self, name: &str, namespace: Option<&str>) -> Result<K> {
        let key = ObjectKey::new::<K>(name, namespace);
        let value = self
            .objects()
            .get(&key)
            .cloned()
            .with_context(|| NotFoundSnafu { key: key.clone() })?;

        from_value(&key, value)
    }

    async fn create<K: StoreResource>(&self, resource: &K) -> Result<K> {
        let key = ObjectKey::from_resource(resource);
        let mut objects = self.objects();
        ensure!(!objects.contains_key(&key), AlreadyExistsSnafu { key });

        let mut stored = resource.clone();
        stored.meta_mut().resource_version = Some(self.next_resource_version());
        objects.insert(key.clone(), to_value(&key, &stored)?);
        self.record_mutation();

        Ok(stored)
    }

    async fn update<K: StoreResource>(&self, resource: &K) -> Result<K> {
        let key = ObjectKey::from_resource(resource);
        let mut objects = self.objects();
        let current_version = objects
            .get(&key)
            .with_context(|| NotFoundSnafu { key: key.clone() })?
            .pointer("/metadata/resourceVersion")
            .and_then(Value::as_str)
            .map(str::to_owned);

        if let Some(version) = resource.meta().resource_version.as_deref() {
            ensure!(
                current_version.as_deref() == Some(version),
                ConflictSnafu { key }
            );
        }

        let mut stored = resource.clone();
        stored.meta_mut().resource_version = Some(self.next_resource_version());
        objects.insert(key.clone(), to_value(&key, &stored)?);
        self.record_mutation();

        Ok(stored)
    }

    async fn delete<K: StoreResource>(&self, name: &str, namespace: Option<&str>) -> Result<()> {
        let key = ObjectKey::new::<K>(name, namespace);
        self.objects()
            .remove(&key)
            .with_context(|| NotFoundSnafu { key })?;
        self.record_mutation();

        Ok(())
    }
}

fn to_value<K: StoreResource>(key: &ObjectKey, resource: &K) -> Result<Value> {
    serde_json::to_value(resource).with_context(|_| ConvertSnafu { key: key.clone() })
}

fn from_value<K: StoreResource>(key: &ObjectKey, value: Value) -> Result<K> {
    serde_json::from_value(value).with_context(|_| ConvertSnafu { key: key.clone() })
}

#[cfg(test)]
mod tests {
    use k8s_openapi::{api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::ObjectMeta};
    use kube::ResourceExt;

    use super::*;
    use crate::{
        client::StoreError,
        openshift::{IdentityProvider, OAuth},
    };

    fn secret(name: &str, namespace: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some(namespace.to_owned()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        }
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = InMemoryStore::new();

        let created = store
            .create(&secret("creds", "default"))
            .await
            .expect("create must succeed");
        let fetched: Secret = store
            .get("creds", Some("default"))
            .await
            .expect("get must succeed");

        assert_eq!(created, fetched);
        assert_eq!(fetched.resource_version().as_deref(), Some("1"));
        assert!(store.contains::<Secret>("creds", Some("default")));
        assert!(!store.contains::<Secret>("creds", Some("other")));
        assert_eq!(store.mutations(), 1);
    }

    #[tokio::test]
    async fn create_twice_reports_already_exists() {
        let store = InMemoryStore::new();
        store
            .create(&secret("creds", "default"))
            .await
            .expect("first create must succeed");

        let error = store
            .create(&secret("creds", "default"))
            .await
            .expect_err("second create must fail");

        assert!(matches!(error, StoreError::AlreadyExists { .. }));
        assert_eq!(store.mutations(), 1);
    }

    #[tokio::test]
    async fn stale_update_is_a_conflict() {
        let store = InMemoryStore::new();
        let stale = store
            .create(&OAuth::new("cluster"))
            .await
            .expect("create must succeed");

        let fresh = stale
            .clone()
            .with_identity_providers([IdentityProvider::htpasswd("a", "a")]);
        store.update(&fresh).await.expect("first update must succeed");

        let error = store
            .update(&stale.with_identity_providers([IdentityProvider::htpasswd("b", "b")]))
            .await
            .expect_err("update with the old resource version must fail");

        assert!(error.is_conflict());
        let stored: OAuth = store.get("cluster", None).await.expect("get must succeed");
        assert_eq!(stored.identity_providers(), [IdentityProvider::htpasswd("a", "a")]);
    }

    #[tokio::test]
    async fn update_without_resource_version_overwrites() {
        let store = InMemoryStore::new();
        store
            .create(&OAuth::new("cluster"))
            .await
            .expect("create must succeed");

        let updated = store
            .update(&OAuth::new("cluster"))
            .await
            .expect("unconditional update must succeed");

        assert_eq!(updated.resource_version().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn missing_objects_are_not_found() {
        let store = InMemoryStore::new();

        let error = store
            .get::<Secret>("creds", Some("default"))
            .await
            .expect_err("get must fail");
        assert!(error.is_not_found());

        let error = store
            .update(&OAuth::new("cluster"))
            .await
            .expect_err("update must fail");
        assert!(error.is_not_found());

        assert_eq!(
            store
                .get_opt::<Secret>("creds", Some("default"))
                .await
                .expect("get_opt must succeed"),
            None
        );
        assert!(
            !store
                .delete_ignore_not_found::<Secret>("creds", Some("default"))
                .await
                .expect("delete must succeed")
        );
        assert_eq!(store.mutations(), 0);
    }

    #[tokio::test]
    async fn delete_removes_the_object() {
        let store = InMemoryStore::new();
        store
            .create(&secret("creds", "default"))
            .await
            .expect("create must succeed");

        assert!(
            store
                .delete_ignore_not_found::<Secret>("creds", Some("default"))
                .await
                .expect("delete must succeed")
        );
        assert!(store.is_empty());
    }
}
