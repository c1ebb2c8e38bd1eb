//! The worker-id capability consumed by the runner.
//!
//! Implemented in-process by [`LeaseEngine`] and remotely by
//! [`HttpGenerator`](crate::client::HttpGenerator), so the runner never knows
//! which transport it is talking through.

use std::sync::Arc;

use async_trait::async_trait;

use crate::lease::{LeaseEngine, LeaseError, LeaseRecord};

#[async_trait]
pub trait Generator: Send + Sync {
    /// Lease a new worker id.
    async fn acquire(&self) -> Result<LeaseRecord, LeaseError>;

    /// Extend the expiry of a held id.
    async fn renew(&self, id: i64) -> Result<LeaseRecord, LeaseError>;

    /// Give a held id back to the pool.
    async fn release(&self, id: i64) -> Result<(), LeaseError>;
}

#[async_trait]
impl Generator for LeaseEngine {
    async fn acquire(&self) -> Result<LeaseRecord, LeaseError> {
        LeaseEngine::acquire(self)
    }

    async fn renew(&self, id: i64) -> Result<LeaseRecord, LeaseError> {
        LeaseEngine::renew(self, id)
    }

    async fn release(&self, id: i64) -> Result<(), LeaseError> {
        LeaseEngine::release(self, id)
    }
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    async fn acquire(&self) -> Result<LeaseRecord, LeaseError> {
        (**self).acquire().await
    }

    async fn renew(&self, id: i64) -> Result<LeaseRecord, LeaseError> {
        (**self).renew(id).await
    }

    async fn release(&self, id: i64) -> Result<(), LeaseError> {
        (**self).release(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::EngineConfig;

    #[tokio::test]
    async fn engine_satisfies_generator() {
        let generator: Arc<dyn Generator> = Arc::new(LeaseEngine::new(EngineConfig::default()));

        let record = generator.acquire().await.unwrap();
        let renewed = generator.renew(record.id.into()).await.unwrap();
        assert_eq!(renewed.id, record.id);
        assert!(renewed.expire_at >= record.expire_at);

        generator.release(record.id.into()).await.unwrap();
        assert_eq!(
            generator.release(record.id.into()).await,
            Err(LeaseError::InvalidLease)
        );
    }
}
