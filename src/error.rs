use crate::auth::Permission;
use crate::i18n::Lang;

/// Rejected user input. Recovered locally: the flow re-prompts the same
/// state, nothing is persisted and no audit entry is written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("amount is not a number")]
    AmountNotNumeric,
    #[error("amount must be positive")]
    AmountNotPositive,
    #[error("amount outside configured bounds")]
    AmountOutOfRange,
    #[error("amount has more fraction digits than the currency allows")]
    AmountScale,
    #[error("text must not be empty")]
    EmptyText,
    #[error("complaint text shorter than the minimum length")]
    ComplaintTooShort,
}

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("permission denied: {0:?} required")]
    PermissionDenied(Permission),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Re-deciding a record that already reached a terminal status.
    #[error("invalid transition: record is already '{0}'")]
    InvalidTransition(String),

    #[error("policy violation: {0}")]
    PolicyViolation(&'static str),

    #[error("storage failure")]
    Storage(#[from] sqlx::Error),
}

impl BotError {
    /// Short bilingual line surfaced to the actor. Internal details stay in
    /// the logs.
    pub fn user_message(&self, lang: Lang) -> String {
        use crate::i18n::Msg;
        match self {
            BotError::Validation(v) => crate::i18n::validation_message(v, lang),
            BotError::PermissionDenied(_) => Msg::Unauthorized.render(lang),
            BotError::NotFound(_) => Msg::NotFound.render(lang),
            BotError::InvalidTransition(_) => Msg::AlreadyDecided.render(lang),
            BotError::PolicyViolation(_) => Msg::PolicyViolation.render(lang),
            BotError::Storage(_) => Msg::GenericError.render(lang),
        }
    }
}
