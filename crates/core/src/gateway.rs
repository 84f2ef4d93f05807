use async_trait::async_trait;
use thiserror::Error;

use crate::domain::draft::{InteractionPatch, NewInteraction};
use crate::domain::interaction::{Interaction, InteractionId};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no interaction found with id {0}")]
    NotFound(InteractionId),
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Narrow persistence interface the pipeline depends on. Implementations own
/// durability and transaction isolation for concurrent requests.
#[async_trait]
pub trait InteractionGateway: Send + Sync {
    async fn create(&self, record: NewInteraction) -> Result<Interaction, GatewayError>;

    /// Apply a partial update. Fields absent from the patch must be left
    /// untouched on the stored record.
    async fn update(
        &self,
        id: InteractionId,
        patch: InteractionPatch,
    ) -> Result<Interaction, GatewayError>;

    async fn find_by_id(&self, id: InteractionId) -> Result<Option<Interaction>, GatewayError>;

    /// Case-insensitive substring search over HCP names.
    async fn find_by_hcp_name(&self, query: &str) -> Result<Vec<Interaction>, GatewayError>;

    /// Most recently created record, if any.
    async fn most_recent(&self) -> Result<Option<Interaction>, GatewayError>;

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Interaction>, GatewayError>;
}
