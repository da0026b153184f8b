use async_trait::async_trait;

use super::CacheBackend;
use crate::error::{BackendError, BackendResult};

/// Backend used when no Redis URL is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

#[async_trait]
impl CacheBackend for NullBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn ping(&self) -> BackendResult<()> {
        Err(BackendError::NotConfigured)
    }

    async fn get(&self, _key: &str) -> BackendResult<Option<String>> {
        Err(BackendError::NotConfigured)
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl_secs: u64) -> BackendResult<()> {
        Err(BackendError::NotConfigured)
    }

    async fn delete(&self, _keys: &[String]) -> BackendResult<()> {
        Err(BackendError::NotConfigured)
    }

    async fn scan(
        &self,
        _cursor: u64,
        _pattern: &str,
        _count: usize,
    ) -> BackendResult<(u64, Vec<String>)> {
        Err(BackendError::NotConfigured)
    }

    async fn flush(&self) -> BackendResult<()> {
        Err(BackendError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[test]
    fn null_backend_refuses_every_command() {
        let backend = NullBackend;
        assert!(!backend.is_configured());
        block_on(async {
            assert!(matches!(backend.ping().await, Err(BackendError::NotConfigured)));
            assert!(matches!(backend.get("student:1").await, Err(BackendError::NotConfigured)));
            assert!(backend.set_ex("student:1", "1", 60).await.is_err());
            assert!(backend.scan(0, "student:*", 100).await.is_err());
        });
    }
}
