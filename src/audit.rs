//! Append-only audit trail. Every state-changing action writes exactly one
//! row here, inside the same transaction as the mutation it documents: if
//! the transaction aborts, neither the mutation nor the audit row persists.

use sqlx::{Postgres, Transaction};

/// Bounded field→value snapshot. Callers record only the fields relevant to
/// the action, never full entity dumps.
#[derive(Debug, Clone, Default)]
pub struct Snapshot(serde_json::Map<String, serde_json::Value>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn into_value(self) -> serde_json::Value {
        serde_json::Value::Object(self.0)
    }
}

/// Appends one audit row within the caller's open transaction. An error here
/// must abort the whole unit of work.
pub async fn record(
    tx: &mut Transaction<'_, Postgres>,
    actor_user_id: i64,
    action: &str,
    entity: &str,
    entity_id: Option<i64>,
    before: Option<Snapshot>,
    after: Option<Snapshot>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (actor_user_id, action, entity, entity_id, before, after)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(actor_user_id)
    .bind(action)
    .bind(entity)
    .bind(entity_id)
    .bind(before.map(Snapshot::into_value))
    .bind(after.map(Snapshot::into_value))
    .execute(&mut **tx)
    .await?;

    tracing::info!(actor_user_id, action, entity, ?entity_id, "audit entry recorded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_collects_only_named_fields() {
        let snap = Snapshot::new()
            .field("status", "pending")
            .field("approved_by", 42)
            .into_value();
        let obj = snap.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["status"], "pending");
        assert_eq!(obj["approved_by"], 42);
    }
}
