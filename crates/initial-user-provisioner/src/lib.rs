//! Lifecycle management of the bootstrap administrative user of an OpenShift cluster.
//!
//! The bootstrap user is one logical account spread over several cluster objects:
//!
//! - a Secret in the target namespace holding the plaintext credentials,
//! - a Secret in the `openshift-config` namespace holding the htpasswd file,
//! - an HTPasswd identity provider entry inside the cluster-scoped [`OAuth`](openshift::OAuth)
//!   singleton,
//! - the [`User`](openshift::User) and [`Identity`](openshift::Identity) created by the OAuth
//!   server on first login.
//!
//! [`InitialUserProvisioner`] creates and removes these objects idempotently. Access to the
//! cluster goes through the [`ObjectStore`](client::ObjectStore) capability and password hashing
//! through the [`CommandRunner`](command::CommandRunner) capability, so both can be replaced in
//! tests.
//!
//! ## Crate Features
//!
//! - `clap` derives [`clap::Args`] for [`InitialUserConfig`].

pub mod client;
pub mod command;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod htpasswd;
pub mod initial_user;
pub mod openshift;

pub use config::InitialUserConfig;
pub use initial_user::InitialUserProvisioner;

// External re-exports
pub use k8s_openapi;
pub use kube;
