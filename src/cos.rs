//! IBM Cloud Object Storage transfers: single objects and the TKE workspace archive.

pub mod archive;
mod client;
mod config;
mod error;
pub mod transfer;
mod workspace;

pub use client::CosClient;
pub use config::{CosConfig, DEFAULT_IAM_ENDPOINT, normalize_endpoint};
pub use error::CosError;
pub use workspace::TkeWorkspace;

use async_trait::async_trait;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, CosError>;
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), CosError>;
}

#[cfg(test)]
pub(crate) use memory::MemoryStore;

#[cfg(test)]
mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{CosError, ObjectStore};

    #[derive(Default)]
    pub(crate) struct MemoryStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        fail_puts: bool,
    }

    impl MemoryStore {
        pub(crate) fn failing_puts() -> Self {
            Self {
                fail_puts: true,
                ..Self::default()
            }
        }

        pub(crate) fn insert(&self, key: &str, body: Vec<u8>) {
            self.objects
                .lock()
                .expect("poisoned store lock")
                .insert(key.to_string(), body);
        }

        pub(crate) fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.objects
                .lock()
                .expect("poisoned store lock")
                .get(key)
                .cloned()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn get_object(&self, key: &str) -> Result<Vec<u8>, CosError> {
            self.get(key).ok_or_else(|| CosError::NotFound {
                key: key.to_string(),
            })
        }

        async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), CosError> {
            if self.fail_puts {
                return Err(CosError::Api {
                    status: 503,
                    message: "SlowDown".to_string(),
                });
            }
            self.insert(key, body);
            Ok(())
        }
    }
}
