use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;

use replog_core::domain::draft::{InteractionPatch, NewInteraction};
use replog_core::domain::interaction::{Interaction, InteractionId};
use replog_core::gateway::{GatewayError, InteractionGateway};

/// In-memory gateway for agent and server tests. Mirrors the SQL
/// repository's id assignment and partial-update semantics.
#[derive(Default)]
pub struct InMemoryInteractionRepository {
    records: RwLock<Vec<Interaction>>,
    next_id: AtomicI64,
}

#[async_trait::async_trait]
impl InteractionGateway for InMemoryInteractionRepository {
    async fn create(&self, record: NewInteraction) -> Result<Interaction, GatewayError> {
        let id = InteractionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let interaction = Interaction {
            id,
            hcp_name: record.hcp_name,
            attendees: record.attendees,
            date: record.date,
            time: record.time,
            interaction_type: record.interaction_type,
            topics: record.topics,
            materials_distributed: record.materials_distributed,
            outcome: record.outcome,
            follow_up: record.follow_up,
            summary: record.summary,
            created_at: Utc::now(),
            updated_at: None,
        };

        let mut records = self.records.write().await;
        records.push(interaction.clone());
        Ok(interaction)
    }

    async fn update(
        &self,
        id: InteractionId,
        patch: InteractionPatch,
    ) -> Result<Interaction, GatewayError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(GatewayError::NotFound(id))?;

        if let Some(hcp_name) = patch.hcp_name {
            record.hcp_name = hcp_name;
        }
        if let Some(attendees) = patch.attendees {
            record.attendees = Some(attendees);
        }
        if let Some(date) = patch.date {
            record.date = date;
        }
        if let Some(time) = patch.time {
            record.time = Some(time);
        }
        if let Some(interaction_type) = patch.interaction_type {
            record.interaction_type = interaction_type;
        }
        if let Some(topics) = patch.topics {
            record.topics = Some(topics);
        }
        if let Some(materials) = patch.materials_distributed {
            record.materials_distributed = Some(materials);
        }
        if let Some(outcome) = patch.outcome {
            record.outcome = outcome;
        }
        if let Some(follow_up) = patch.follow_up {
            record.follow_up = Some(follow_up);
        }
        if let Some(summary) = patch.summary {
            record.summary = Some(summary);
        }
        record.updated_at = Some(Utc::now());

        Ok(record.clone())
    }

    async fn find_by_id(&self, id: InteractionId) -> Result<Option<Interaction>, GatewayError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|record| record.id == id).cloned())
    }

    async fn find_by_hcp_name(&self, query: &str) -> Result<Vec<Interaction>, GatewayError> {
        let needle = query.trim().to_lowercase();
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|record| record.hcp_name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn most_recent(&self) -> Result<Option<Interaction>, GatewayError> {
        let records = self.records.read().await;
        Ok(records.iter().max_by_key(|record| record.id.0).cloned())
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Interaction>, GatewayError> {
        let records = self.records.read().await;
        Ok(records.iter().skip(offset as usize).take(limit as usize).cloned().collect())
    }
}
