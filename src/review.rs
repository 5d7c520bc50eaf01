//! Admin review workflow: listing pending items, applying one-way decisions
//! and resolutions, and read-only statistics. Every entry point checks the
//! actor's permissions before touching storage; the storage layer enforces
//! transition legality and writes the audit row in the same transaction.

use crate::auth::{self, Permission};
use crate::config::AppConfig;
use crate::db::models::{Complaint, Request, RequestStats, RequestStatus};
use crate::db::Database;
use crate::error::BotError;

/// Pending views are capped to keep a single chat message readable.
pub const PENDING_PAGE_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn outcome(self) -> RequestStatus {
        match self {
            Decision::Approve => RequestStatus::Approved,
            Decision::Reject => RequestStatus::Rejected,
        }
    }
}

/// Newest-first pending requests, capped at [`PENDING_PAGE_LIMIT`].
pub async fn list_pending_requests(
    db: &Database,
    config: &AppConfig,
    actor_telegram_id: i64,
) -> Result<Vec<Request>, BotError> {
    auth::require(db, config, actor_telegram_id, Permission::ApproveTx).await?;
    db.list_pending_requests(PENDING_PAGE_LIMIT).await
}

pub async fn list_pending_complaints(
    db: &Database,
    config: &AppConfig,
    actor_telegram_id: i64,
) -> Result<Vec<Complaint>, BotError> {
    auth::require(db, config, actor_telegram_id, Permission::ManageUsers).await?;
    db.list_pending_complaints(PENDING_PAGE_LIMIT).await
}

/// Applies a terminal decision to a pending request. Fails with
/// `PermissionDenied` before any storage mutation; `NotFound` and
/// `InvalidTransition` come from the locked row check inside the
/// transaction, so a race between two admins resolves to exactly one
/// winner and one audit entry.
pub async fn decide(
    db: &Database,
    config: &AppConfig,
    actor_telegram_id: i64,
    request_id: i64,
    decision: Decision,
    notes: Option<&str>,
) -> Result<Request, BotError> {
    auth::require(db, config, actor_telegram_id, Permission::ApproveTx).await?;

    let actor = db
        .get_user_by_telegram_id(actor_telegram_id)
        .await?
        .ok_or(BotError::NotFound("actor"))?;

    let updated = db
        .decide_request(actor.id, request_id, decision.outcome(), notes)
        .await?;
    tracing::info!(
        request_id,
        outcome = updated.status.as_str(),
        actor = actor_telegram_id,
        "request decided"
    );
    Ok(updated)
}

pub async fn resolve_complaint(
    db: &Database,
    config: &AppConfig,
    actor_telegram_id: i64,
    complaint_id: i64,
    reply: &str,
) -> Result<Complaint, BotError> {
    auth::require(db, config, actor_telegram_id, Permission::ManageUsers).await?;

    let actor = db
        .get_user_by_telegram_id(actor_telegram_id)
        .await?
        .ok_or(BotError::NotFound("actor"))?;

    let updated = db.resolve_complaint(actor.id, complaint_id, reply).await?;
    tracing::info!(complaint_id, actor = actor_telegram_id, "complaint resolved");
    Ok(updated)
}

/// Read-only aggregation; empty tables yield zeros, never an error.
pub async fn stats(
    db: &Database,
    config: &AppConfig,
    actor_telegram_id: i64,
) -> Result<RequestStats, BotError> {
    auth::require(db, config, actor_telegram_id, Permission::Reports).await?;
    db.request_stats().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_map_to_terminal_statuses() {
        assert_eq!(Decision::Approve.outcome(), RequestStatus::Approved);
        assert_eq!(Decision::Reject.outcome(), RequestStatus::Rejected);
        assert!(Decision::Approve.outcome().is_terminal());
        assert!(Decision::Reject.outcome().is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
    }
}
