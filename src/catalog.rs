//! Catalog administration: the companies and payment methods users pick
//! from when filing a request. Creation is gated on `ManagePayments` and
//! audited like every other mutation. Command arguments arrive as one
//! pipe-separated line; the parsers are pure so bad input never reaches
//! storage.

use crate::auth::{self, Permission};
use crate::config::AppConfig;
use crate::db::models::{Company, PaymentMethod};
use crate::db::Database;
use crate::error::BotError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanySpec {
    pub name_ar: String,
    pub name_en: String,
    /// Falls back to the configured default currency when omitted.
    pub currency: Option<String>,
}

/// Parses `<name_ar> | <name_en> [| currency]`.
pub fn parse_company_spec(input: &str) -> Option<CompanySpec> {
    let mut parts = input.split('|').map(str::trim);
    let name_ar = parts.next().filter(|s| !s.is_empty())?.to_string();
    let name_en = parts.next().filter(|s| !s.is_empty())?.to_string();
    let currency = parts.next().filter(|s| !s.is_empty()).map(str::to_uppercase);
    if parts.next().is_some() {
        return None;
    }
    Some(CompanySpec { name_ar, name_en, currency })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    pub company_id: i64,
    pub name_ar: String,
    pub name_en: String,
    /// bank / crypto / wallet and the like; free-form, defaults to "bank".
    pub kind: String,
}

/// Parses `<company id> | <name_ar> | <name_en> [| kind]`.
pub fn parse_method_spec(input: &str) -> Option<MethodSpec> {
    let mut parts = input.split('|').map(str::trim);
    let company_id: i64 = parts.next()?.parse().ok()?;
    if company_id <= 0 {
        return None;
    }
    let name_ar = parts.next().filter(|s| !s.is_empty())?.to_string();
    let name_en = parts.next().filter(|s| !s.is_empty())?.to_string();
    let kind = parts
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "bank".to_string());
    if parts.next().is_some() {
        return None;
    }
    Some(MethodSpec { company_id, name_ar, name_en, kind })
}

pub async fn add_company(
    db: &Database,
    config: &AppConfig,
    actor_telegram_id: i64,
    spec: &CompanySpec,
) -> Result<Company, BotError> {
    auth::require(db, config, actor_telegram_id, Permission::ManagePayments).await?;

    let actor = db
        .get_user_by_telegram_id(actor_telegram_id)
        .await?
        .ok_or(BotError::NotFound("actor"))?;

    let currency = spec
        .currency
        .clone()
        .unwrap_or_else(|| config.default_currency.clone());
    let company = db
        .create_company(actor.id, &spec.name_ar, &spec.name_en, &currency)
        .await?;
    tracing::info!(company_id = company.id, actor = actor_telegram_id, "company created");
    Ok(company)
}

/// The target company must exist and be active; methods cannot be attached
/// to a retired company.
pub async fn add_payment_method(
    db: &Database,
    config: &AppConfig,
    actor_telegram_id: i64,
    spec: &MethodSpec,
) -> Result<PaymentMethod, BotError> {
    auth::require(db, config, actor_telegram_id, Permission::ManagePayments).await?;

    let actor = db
        .get_user_by_telegram_id(actor_telegram_id)
        .await?
        .ok_or(BotError::NotFound("actor"))?;
    db.get_active_company(spec.company_id)
        .await?
        .ok_or(BotError::NotFound("company"))?;

    let method = db
        .create_payment_method(
            actor.id,
            spec.company_id,
            &spec.name_ar,
            &spec.name_en,
            &spec.kind,
        )
        .await?;
    tracing::info!(method_id = method.id, actor = actor_telegram_id, "payment method created");
    Ok(method)
}

/// Admin view of the active catalog, with the ids needed by `/addmethod`.
pub async fn list_companies(
    db: &Database,
    config: &AppConfig,
    actor_telegram_id: i64,
) -> Result<Vec<Company>, BotError> {
    auth::require(db, config, actor_telegram_id, Permission::ManagePayments).await?;
    db.list_active_companies().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_spec_parses_names_and_optional_currency() {
        let spec = parse_company_spec("شركة ألف | Alpha Ltd").unwrap();
        assert_eq!(spec.name_ar, "شركة ألف");
        assert_eq!(spec.name_en, "Alpha Ltd");
        assert_eq!(spec.currency, None);

        let spec = parse_company_spec(" بيتا | Beta | usd ").unwrap();
        assert_eq!(spec.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn malformed_company_specs_are_rejected() {
        assert_eq!(parse_company_spec(""), None);
        assert_eq!(parse_company_spec("only one name"), None);
        assert_eq!(parse_company_spec(" | Beta"), None);
        assert_eq!(parse_company_spec("a | b | USD | extra"), None);
    }

    #[test]
    fn method_spec_parses_company_id_and_defaults_kind() {
        let spec = parse_method_spec("3 | تحويل بنكي | Bank transfer").unwrap();
        assert_eq!(spec.company_id, 3);
        assert_eq!(spec.kind, "bank");

        let spec = parse_method_spec("3 | محفظة | Wallet | WALLET").unwrap();
        assert_eq!(spec.kind, "wallet");
    }

    #[test]
    fn malformed_method_specs_are_rejected() {
        assert_eq!(parse_method_spec("x | a | b"), None);
        assert_eq!(parse_method_spec("0 | a | b"), None);
        assert_eq!(parse_method_spec("3 | | b"), None);
        assert_eq!(parse_method_spec("3 | a"), None);
    }
}
