use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use replog_core::domain::draft::{InteractionPatch, NewInteraction};
use replog_core::domain::interaction::{Interaction, InteractionId};
use replog_core::gateway::{GatewayError, InteractionGateway};

use crate::DbPool;

pub struct SqlInteractionRepository {
    pool: DbPool,
}

impl SqlInteractionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn storage(error: sqlx::Error) -> GatewayError {
    GatewayError::Storage(error.to_string())
}

fn decode(error: impl std::fmt::Display) -> GatewayError {
    GatewayError::Storage(format!("decode error: {error}"))
}

fn row_to_interaction(row: &sqlx::sqlite::SqliteRow) -> Result<Interaction, GatewayError> {
    let id: i64 = row.try_get("id").map_err(decode)?;
    let hcp_name: String = row.try_get("hcp_name").map_err(decode)?;
    let attendees: Option<String> = row.try_get("attendees").map_err(decode)?;
    let date_str: String = row.try_get("date").map_err(decode)?;
    let time: Option<String> = row.try_get("time").map_err(decode)?;
    let interaction_type_str: String = row.try_get("interaction_type").map_err(decode)?;
    let topics: Option<String> = row.try_get("topics").map_err(decode)?;
    let materials_distributed: Option<String> =
        row.try_get("materials_distributed").map_err(decode)?;
    let outcomes_str: String = row.try_get("outcomes").map_err(decode)?;
    let follow_up: Option<String> = row.try_get("follow_up").map_err(decode)?;
    let summary: Option<String> = row.try_get("summary").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;
    let updated_at_str: Option<String> = row.try_get("updated_at").map_err(decode)?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(decode)?;
    let interaction_type = interaction_type_str.parse().map_err(decode)?;
    let outcome = outcomes_str.parse().map_err(decode)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = updated_at_str
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(Interaction {
        id: InteractionId(id),
        hcp_name,
        attendees,
        date,
        time,
        interaction_type,
        topics,
        materials_distributed,
        outcome,
        follow_up,
        summary,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl InteractionGateway for SqlInteractionRepository {
    async fn create(&self, record: NewInteraction) -> Result<Interaction, GatewayError> {
        let result = sqlx::query(
            "INSERT INTO hcp_interaction (hcp_name, attendees, date, time, interaction_type,
                                          topics, materials_distributed, outcomes, follow_up,
                                          summary, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.hcp_name)
        .bind(&record.attendees)
        .bind(record.date.format("%Y-%m-%d").to_string())
        .bind(&record.time)
        .bind(record.interaction_type.as_str())
        .bind(&record.topics)
        .bind(&record.materials_distributed)
        .bind(record.outcome.as_str())
        .bind(&record.follow_up)
        .bind(&record.summary)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        let id = InteractionId(result.last_insert_rowid());
        self.find_by_id(id).await?.ok_or(GatewayError::NotFound(id))
    }

    async fn update(
        &self,
        id: InteractionId,
        patch: InteractionPatch,
    ) -> Result<Interaction, GatewayError> {
        if patch.is_empty() {
            return self.find_by_id(id).await?.ok_or(GatewayError::NotFound(id));
        }

        let mut assignments: Vec<&'static str> = Vec::new();
        if patch.hcp_name.is_some() {
            assignments.push("hcp_name = ?");
        }
        if patch.attendees.is_some() {
            assignments.push("attendees = ?");
        }
        if patch.date.is_some() {
            assignments.push("date = ?");
        }
        if patch.time.is_some() {
            assignments.push("time = ?");
        }
        if patch.interaction_type.is_some() {
            assignments.push("interaction_type = ?");
        }
        if patch.topics.is_some() {
            assignments.push("topics = ?");
        }
        if patch.materials_distributed.is_some() {
            assignments.push("materials_distributed = ?");
        }
        if patch.outcome.is_some() {
            assignments.push("outcomes = ?");
        }
        if patch.follow_up.is_some() {
            assignments.push("follow_up = ?");
        }
        if patch.summary.is_some() {
            assignments.push("summary = ?");
        }
        assignments.push("updated_at = ?");

        let sql = format!(
            "UPDATE hcp_interaction SET {} WHERE id = ?",
            assignments.join(", ")
        );

        let mut query = sqlx::query(&sql);
        if let Some(value) = &patch.hcp_name {
            query = query.bind(value);
        }
        if let Some(value) = &patch.attendees {
            query = query.bind(value);
        }
        if let Some(value) = patch.date {
            query = query.bind(value.format("%Y-%m-%d").to_string());
        }
        if let Some(value) = &patch.time {
            query = query.bind(value);
        }
        if let Some(value) = patch.interaction_type {
            query = query.bind(value.as_str());
        }
        if let Some(value) = &patch.topics {
            query = query.bind(value);
        }
        if let Some(value) = &patch.materials_distributed {
            query = query.bind(value);
        }
        if let Some(value) = patch.outcome {
            query = query.bind(value.as_str());
        }
        if let Some(value) = &patch.follow_up {
            query = query.bind(value);
        }
        if let Some(value) = &patch.summary {
            query = query.bind(value);
        }
        query = query.bind(Utc::now().to_rfc3339());

        let result = query.bind(id.0).execute(&self.pool).await.map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::NotFound(id));
        }

        self.find_by_id(id).await?.ok_or(GatewayError::NotFound(id))
    }

    async fn find_by_id(&self, id: InteractionId) -> Result<Option<Interaction>, GatewayError> {
        let row = sqlx::query(
            "SELECT id, hcp_name, attendees, date, time, interaction_type, topics,
                    materials_distributed, outcomes, follow_up, summary, created_at, updated_at
             FROM hcp_interaction WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        match row {
            Some(ref row) => Ok(Some(row_to_interaction(row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_hcp_name(&self, query: &str) -> Result<Vec<Interaction>, GatewayError> {
        let pattern = format!("%{}%", query.trim().to_lowercase());
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, hcp_name, attendees, date, time, interaction_type, topics,
                    materials_distributed, outcomes, follow_up, summary, created_at, updated_at
             FROM hcp_interaction
             WHERE LOWER(hcp_name) LIKE ?
             ORDER BY id ASC",
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(row_to_interaction).collect()
    }

    async fn most_recent(&self) -> Result<Option<Interaction>, GatewayError> {
        let row = sqlx::query(
            "SELECT id, hcp_name, attendees, date, time, interaction_type, topics,
                    materials_distributed, outcomes, follow_up, summary, created_at, updated_at
             FROM hcp_interaction ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        match row {
            Some(ref row) => Ok(Some(row_to_interaction(row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Interaction>, GatewayError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, hcp_name, attendees, date, time, interaction_type, topics,
                    materials_distributed, outcomes, follow_up, summary, created_at, updated_at
             FROM hcp_interaction ORDER BY id ASC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(row_to_interaction).collect()
    }
}
