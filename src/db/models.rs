use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Deposit,
    Withdraw,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::Deposit => "deposit",
            RequestType::Withdraw => "withdraw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Approved and rejected are terminal; only pending records may move.
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComplaintStatus {
    Pending,
    Resolved,
}

impl ComplaintStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "pending",
            ComplaintStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub customer_code: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub language: String,
    pub currency: String,
    pub is_registered: bool,
    pub is_admin: bool,
    pub is_temporary_admin: bool,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn lang(&self) -> crate::i18n::Lang {
        crate::i18n::Lang::from_code(&self.language)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name_ar: String,
    pub name_en: String,
    pub default_currency: String,
    pub is_active: bool,
    pub metadata: Option<serde_json::Value>,
    pub withdraw_source: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn display_name(&self, lang: crate::i18n::Lang) -> &str {
        match lang {
            crate::i18n::Lang::Ar => &self.name_ar,
            crate::i18n::Lang::En => &self.name_en,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: i64,
    pub company_id: i64,
    pub name_ar: String,
    pub name_en: String,
    pub kind: String,
    pub fields_schema: Option<serde_json::Value>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl PaymentMethod {
    pub fn display_name(&self, lang: crate::i18n::Lang) -> &str {
        match lang {
            crate::i18n::Lang::Ar => &self.name_ar,
            crate::i18n::Lang::En => &self.name_en,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Request {
    pub id: i64,
    pub user_id: i64,
    pub company_id: i64,
    pub payment_method_id: i64,
    pub request_type: RequestType,
    pub amount: Decimal,
    pub currency: String,
    pub reference: Option<String>,
    pub destination: Option<String>,
    pub status: RequestStatus,
    pub admin_notes: Option<String>,
    pub approved_by: Option<i64>,
    pub client_token: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Complaint {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub status: ComplaintStatus,
    pub admin_reply: Option<String>,
    pub resolved_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub permissions: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub actor_user_id: i64,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<i64>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate view over the requests table. Empty tables yield zeros.
#[derive(Debug, Clone, Default)]
pub struct RequestStats {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub deposit_total: Decimal,
    pub withdraw_total: Decimal,
}
