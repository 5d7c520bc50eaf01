//! Conversational state machine for the multi-step collection flows:
//! deposit/withdraw requests, complaints, registration, and the two small
//! admin sub-flows (complaint reply, broadcast text).
//!
//! Contexts are ephemeral and live only in memory, keyed by telegram id.
//! They are destroyed on completion, cancellation or reset; starting a new
//! flow while one is mid-way overwrites the old draft (last-write-wins).

use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::models::RequestType;
use crate::error::ValidationError;
use crate::i18n::Lang;

pub const COMPLAINT_MIN_LEN: usize = 10;

/// Allowed fraction digits for an amount (currency scale).
const AMOUNT_MAX_SCALE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    SelectingCompany,
    SelectingPaymentMethod,
    EnteringAmount,
    EnteringReference,
    EnteringDestination,
    AwaitingConfirmation,
    EnteringComplaintText,
    EnteringName,
    EnteringPhone,
    ReplyingToComplaint { complaint_id: i64 },
    EnteringBroadcastText,
}

#[derive(Debug, Clone)]
pub struct RequestDraft {
    pub request_type: RequestType,
    pub currency: String,
    pub company_id: Option<i64>,
    pub payment_method_id: Option<i64>,
    pub amount: Option<Decimal>,
    pub reference: Option<String>,
    pub destination: Option<String>,
    /// Minted once on entering confirmation and reused on every confirm
    /// retry, so a double tap can never create two records.
    pub client_token: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct FlowContext {
    pub state: FlowState,
    pub lang: Lang,
    pub draft: Option<RequestDraft>,
    /// Name collected by the registration flow before the phone step.
    pub pending_name: Option<String>,
}

impl FlowContext {
    pub fn new_request(request_type: RequestType, currency: String, lang: Lang) -> Self {
        Self {
            state: FlowState::SelectingCompany,
            lang,
            draft: Some(RequestDraft {
                request_type,
                currency,
                company_id: None,
                payment_method_id: None,
                amount: None,
                reference: None,
                destination: None,
                client_token: None,
            }),
            pending_name: None,
        }
    }

    pub fn new_complaint(lang: Lang) -> Self {
        Self {
            state: FlowState::EnteringComplaintText,
            lang,
            draft: None,
            pending_name: None,
        }
    }

    pub fn new_registration(lang: Lang) -> Self {
        Self {
            state: FlowState::EnteringName,
            lang,
            draft: None,
            pending_name: None,
        }
    }

    pub fn new_complaint_reply(complaint_id: i64, lang: Lang) -> Self {
        Self {
            state: FlowState::ReplyingToComplaint { complaint_id },
            lang,
            draft: None,
            pending_name: None,
        }
    }

    pub fn new_broadcast(lang: Lang) -> Self {
        Self {
            state: FlowState::EnteringBroadcastText,
            lang,
            draft: None,
            pending_name: None,
        }
    }

    /// Records the selected company. The caller has already verified the
    /// company is active and has at least one active payment method.
    pub fn select_company(&mut self, company_id: i64) {
        if let Some(draft) = self.draft.as_mut() {
            draft.company_id = Some(company_id);
        }
        self.state = FlowState::SelectingPaymentMethod;
    }

    pub fn select_payment_method(&mut self, payment_method_id: i64) {
        if let Some(draft) = self.draft.as_mut() {
            draft.payment_method_id = Some(payment_method_id);
        }
        self.state = FlowState::EnteringAmount;
    }

    /// Validates and stores the amount. On rejection the state is unchanged
    /// and the caller re-prompts.
    pub fn enter_amount(
        &mut self,
        input: &str,
        bounds: &AmountBounds,
    ) -> Result<(), ValidationError> {
        let amount = parse_amount(input, bounds)?;
        let Some(draft) = self.draft.as_mut() else {
            return Err(ValidationError::AmountNotNumeric);
        };
        draft.amount = Some(amount);
        self.state = match draft.request_type {
            RequestType::Deposit => FlowState::EnteringReference,
            RequestType::Withdraw => FlowState::EnteringDestination,
        };
        Ok(())
    }

    /// Stores the deposit reference and moves to confirmation, minting the
    /// idempotency token.
    pub fn enter_reference(&mut self, input: &str) -> Result<(), ValidationError> {
        let text = non_empty_trimmed(input)?;
        if let Some(draft) = self.draft.as_mut() {
            draft.reference = Some(text);
        }
        self.enter_confirmation();
        Ok(())
    }

    pub fn enter_destination(&mut self, input: &str) -> Result<(), ValidationError> {
        let text = non_empty_trimmed(input)?;
        if let Some(draft) = self.draft.as_mut() {
            draft.destination = Some(text);
        }
        self.enter_confirmation();
        Ok(())
    }

    fn enter_confirmation(&mut self) {
        if let Some(draft) = self.draft.as_mut() {
            draft.client_token.get_or_insert_with(Uuid::new_v4);
        }
        self.state = FlowState::AwaitingConfirmation;
    }
}

pub fn validate_complaint_text(input: &str) -> Result<String, ValidationError> {
    let text = non_empty_trimmed(input)?;
    if text.chars().count() < COMPLAINT_MIN_LEN {
        return Err(ValidationError::ComplaintTooShort);
    }
    Ok(text)
}

/// Shared by every free-text step that stores what the user typed (name,
/// phone, reference, destination, complaint).
pub fn non_empty_trimmed(input: &str) -> Result<String, ValidationError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(text.to_string())
}

#[derive(Debug, Clone)]
pub struct AmountBounds {
    pub min: Decimal,
    pub max: Decimal,
}

/// Parses a user-typed amount into a fixed-point decimal within bounds.
/// Each failure mode is a distinct error class so the re-prompt can say
/// what was wrong.
pub fn parse_amount(input: &str, bounds: &AmountBounds) -> Result<Decimal, ValidationError> {
    let amount: Decimal = input
        .trim()
        .parse()
        .map_err(|_| ValidationError::AmountNotNumeric)?;
    if amount.scale() > AMOUNT_MAX_SCALE {
        return Err(ValidationError::AmountScale);
    }
    if amount <= Decimal::ZERO {
        return Err(ValidationError::AmountNotPositive);
    }
    if amount < bounds.min || amount > bounds.max {
        return Err(ValidationError::AmountOutOfRange);
    }
    Ok(amount)
}

/// In-memory context store, one slot per telegram id. Events for different
/// users never interact; events for the same user arrive in order, so
/// fetch-mutate-store has no interleaving to worry about.
#[derive(Debug, Default)]
pub struct FlowStore {
    contexts: DashMap<i64, FlowContext>,
}

impl FlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) a flow for the user, overwriting any draft in
    /// progress.
    pub fn start(&self, telegram_id: i64, ctx: FlowContext) {
        self.contexts.insert(telegram_id, ctx);
    }

    pub fn get(&self, telegram_id: i64) -> Option<FlowContext> {
        self.contexts.get(&telegram_id).map(|c| c.clone())
    }

    pub fn put(&self, telegram_id: i64, ctx: FlowContext) {
        self.contexts.insert(telegram_id, ctx);
    }

    /// Discards the context. Returns whether anything was in progress.
    pub fn clear(&self, telegram_id: i64) -> bool {
        self.contexts.remove(&telegram_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> AmountBounds {
        AmountBounds {
            min: "1.00".parse().unwrap(),
            max: "1000000.00".parse().unwrap(),
        }
    }

    #[test]
    fn amounts_within_bounds_are_accepted() {
        for input in ["1", "1.00", "150.00", "999999.99", "1000000.00", "  42.5 "] {
            assert!(parse_amount(input, &bounds()).is_ok(), "rejected {input}");
        }
    }

    #[test]
    fn bad_amounts_are_rejected_with_distinct_classes() {
        let b = bounds();
        assert_eq!(parse_amount("abc", &b), Err(ValidationError::AmountNotNumeric));
        assert_eq!(parse_amount("", &b), Err(ValidationError::AmountNotNumeric));
        assert_eq!(parse_amount("0", &b), Err(ValidationError::AmountNotPositive));
        assert_eq!(parse_amount("-5", &b), Err(ValidationError::AmountNotPositive));
        assert_eq!(parse_amount("0.50", &b), Err(ValidationError::AmountOutOfRange));
        assert_eq!(
            parse_amount("1000000.01", &b),
            Err(ValidationError::AmountOutOfRange)
        );
        assert_eq!(parse_amount("1.005", &b), Err(ValidationError::AmountScale));
    }

    #[test]
    fn deposit_flow_walks_to_confirmation() {
        let mut ctx = FlowContext::new_request(RequestType::Deposit, "SAR".into(), Lang::En);
        assert_eq!(ctx.state, FlowState::SelectingCompany);

        ctx.select_company(3);
        assert_eq!(ctx.state, FlowState::SelectingPaymentMethod);

        ctx.select_payment_method(7);
        assert_eq!(ctx.state, FlowState::EnteringAmount);

        ctx.enter_amount("150.00", &bounds()).unwrap();
        assert_eq!(ctx.state, FlowState::EnteringReference);

        ctx.enter_reference("ref-1").unwrap();
        assert_eq!(ctx.state, FlowState::AwaitingConfirmation);

        let draft = ctx.draft.as_ref().unwrap();
        assert_eq!(draft.company_id, Some(3));
        assert_eq!(draft.payment_method_id, Some(7));
        assert_eq!(draft.amount, Some("150.00".parse().unwrap()));
        assert_eq!(draft.reference.as_deref(), Some("ref-1"));
        assert!(draft.client_token.is_some());
    }

    #[test]
    fn withdraw_flow_asks_for_destination() {
        let mut ctx = FlowContext::new_request(RequestType::Withdraw, "SAR".into(), Lang::Ar);
        ctx.select_company(1);
        ctx.select_payment_method(2);
        ctx.enter_amount("25", &bounds()).unwrap();
        assert_eq!(ctx.state, FlowState::EnteringDestination);

        ctx.enter_destination("  addr-9  ").unwrap();
        assert_eq!(ctx.state, FlowState::AwaitingConfirmation);
        assert_eq!(ctx.draft.unwrap().destination.as_deref(), Some("addr-9"));
    }

    #[test]
    fn rejected_amount_leaves_state_unchanged() {
        let mut ctx = FlowContext::new_request(RequestType::Deposit, "SAR".into(), Lang::En);
        ctx.select_company(1);
        ctx.select_payment_method(2);

        assert!(ctx.enter_amount("0", &bounds()).is_err());
        assert_eq!(ctx.state, FlowState::EnteringAmount);
        assert!(ctx.draft.as_ref().unwrap().amount.is_none());
    }

    #[test]
    fn token_is_minted_once_and_stable_across_retries() {
        let mut ctx = FlowContext::new_request(RequestType::Deposit, "SAR".into(), Lang::En);
        ctx.select_company(1);
        ctx.select_payment_method(2);
        ctx.enter_amount("10", &bounds()).unwrap();
        ctx.enter_reference("ref").unwrap();

        let first = ctx.draft.as_ref().unwrap().client_token.unwrap();
        // A failed commit keeps the context; re-entering confirmation (e.g.
        // after the user edits the reference) must not remint.
        ctx.enter_reference("ref-2").unwrap();
        let second = ctx.draft.as_ref().unwrap().client_token.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn complaint_text_enforces_minimum_length() {
        assert_eq!(validate_complaint_text("   "), Err(ValidationError::EmptyText));
        assert_eq!(
            validate_complaint_text("too short"),
            Err(ValidationError::ComplaintTooShort)
        );
        assert_eq!(
            validate_complaint_text("  this is long enough  ").unwrap(),
            "this is long enough"
        );
    }

    #[test]
    fn contact_fields_reject_blank_input() {
        assert_eq!(non_empty_trimmed(""), Err(ValidationError::EmptyText));
        assert_eq!(non_empty_trimmed("   "), Err(ValidationError::EmptyText));
        assert_eq!(non_empty_trimmed(" 0501234567 ").unwrap(), "0501234567");
    }

    #[test]
    fn starting_a_new_flow_overwrites_the_old_draft() {
        let store = FlowStore::new();
        store.start(1, FlowContext::new_request(RequestType::Deposit, "SAR".into(), Lang::En));
        store.start(1, FlowContext::new_complaint(Lang::En));

        assert_eq!(store.get(1).unwrap().state, FlowState::EnteringComplaintText);
        assert!(store.clear(1));
        assert!(!store.clear(1));
        assert!(store.get(1).is_none());
    }
}
