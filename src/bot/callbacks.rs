//! Inline-button dispatch. Callback data is a small prefixed string
//! protocol; see `keyboards` for the producers.

use std::sync::Arc;

use teloxide::prelude::*;

use crate::auth::{self, Permission};
use crate::bot::{handlers, keyboards, notify_super_admins, AppState};
use crate::db::models::{RequestStatus, User};
use crate::db::NewRequest;
use crate::flow::{FlowContext, FlowState};
use crate::i18n::{self, Lang, Msg};
use crate::review::{self, Decision};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> HandlerResult {
    let telegram_id = q.from.id.0 as i64;
    let Some(data) = q.data.clone() else {
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    };
    let Some(chat_id) = q.message.as_ref().map(|m| m.chat().id) else {
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    };

    // Stop the spinner before doing any work.
    bot.answer_callback_query(&q.id).await?;

    let user = match state
        .current_user(telegram_id, Some(q.from.full_name().as_str()))
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("failed to resolve user {telegram_id}: {e}");
            return Ok(());
        }
    };
    let lang = user.lang();

    match data.as_str() {
        "cancel" => {
            let cancelled = state.flows.clear(telegram_id);
            let reply = if cancelled { Msg::Cancelled } else { Msg::NothingToCancel };
            bot.send_message(chat_id, reply.render(lang)).await?;
        }

        "confirm:no" => {
            state.flows.clear(telegram_id);
            bot.send_message(chat_id, Msg::Cancelled.render(lang)).await?;
        }

        "confirm:yes" => {
            confirm_request(&bot, chat_id, &user, &state).await?;
        }

        "adm:requests" => {
            show_pending_requests(&bot, chat_id, telegram_id, &state, lang).await?;
        }

        "adm:complaints" => {
            show_pending_complaints(&bot, chat_id, telegram_id, &state, lang).await?;
        }

        "adm:stats" => {
            match review::stats(&state.db, &state.config, telegram_id).await {
                Ok(stats) => {
                    let text = Msg::Stats {
                        pending: stats.pending,
                        approved: stats.approved,
                        rejected: stats.rejected,
                        deposit_total: stats.deposit_total,
                        withdraw_total: stats.withdraw_total,
                    }
                    .render(lang);
                    bot.send_message(chat_id, text).await?;
                }
                Err(e) => handlers::report_error(&bot, chat_id, e, lang).await?,
            }
        }

        "adm:broadcast" => {
            match auth::require(&state.db, &state.config, telegram_id, Permission::Broadcast).await
            {
                Ok(()) => {
                    state.flows.start(telegram_id, FlowContext::new_broadcast(lang));
                    bot.send_message(chat_id, Msg::EnterBroadcastText.render(lang)).await?;
                }
                Err(e) => handlers::report_error(&bot, chat_id, e, lang).await?,
            }
        }

        "adm:queue" => {
            let text = Msg::BroadcastStatus {
                depth: state.broadcast.queue_depth(),
                busy: state.broadcast.is_busy(),
            }
            .render(lang);
            bot.send_message(chat_id, text).await?;
        }

        other => {
            if let Some(id) = parse_suffix(other, "lang:") {
                change_language(&bot, chat_id, &user, &state, id).await?;
            } else if let Some(id) = parse_id(other, "company:") {
                select_company(&bot, chat_id, telegram_id, &state, lang, id).await?;
            } else if let Some(id) = parse_id(other, "method:") {
                select_method(&bot, chat_id, telegram_id, &state, lang, id).await?;
            } else if let Some(id) = parse_id(other, "req:approve:") {
                decide_request(&bot, chat_id, telegram_id, &state, lang, id, Decision::Approve)
                    .await?;
            } else if let Some(id) = parse_id(other, "req:reject:") {
                decide_request(&bot, chat_id, telegram_id, &state, lang, id, Decision::Reject)
                    .await?;
            } else if let Some(id) = parse_id(other, "comp:resolve:") {
                start_complaint_reply(&bot, chat_id, telegram_id, &state, lang, id).await?;
            } else {
                tracing::debug!(data = other, "unknown callback data");
            }
        }
    }

    Ok(())
}

fn parse_suffix<'a>(data: &'a str, prefix: &str) -> Option<&'a str> {
    data.strip_prefix(prefix)
}

fn parse_id(data: &str, prefix: &str) -> Option<i64> {
    data.strip_prefix(prefix)?.parse().ok()
}

async fn change_language(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    state: &AppState,
    code: &str,
) -> HandlerResult {
    let lang = Lang::from_code(code);
    match state.db.set_language(user, lang.code()).await {
        Ok(_) => {
            bot.send_message(chat_id, Msg::LanguageChanged.render(lang)).await?;
        }
        Err(e) => {
            tracing::error!("language change failed: {e}");
            bot.send_message(chat_id, Msg::GenericError.render(user.lang())).await?;
        }
    }
    Ok(())
}

async fn select_company(
    bot: &Bot,
    chat_id: ChatId,
    telegram_id: i64,
    state: &AppState,
    lang: Lang,
    company_id: i64,
) -> HandlerResult {
    let Some(mut ctx) = state.flows.get(telegram_id) else {
        return Ok(());
    };
    if ctx.state != FlowState::SelectingCompany {
        return Ok(());
    }

    // The company must still be active; the keyboard may be stale.
    if state.db.get_active_company(company_id).await?.is_none() {
        bot.send_message(chat_id, Msg::NotFound.render(lang)).await?;
        return Ok(());
    }

    let methods = state.db.active_payment_methods(company_id).await?;
    if methods.is_empty() {
        state.flows.clear(telegram_id);
        bot.send_message(chat_id, Msg::NoPaymentMethods.render(lang)).await?;
        return Ok(());
    }

    ctx.select_company(company_id);
    state.flows.put(telegram_id, ctx);

    bot.send_message(chat_id, Msg::SelectPaymentMethod.render(lang))
        .reply_markup(keyboards::payment_methods(&methods, lang))
        .await?;
    Ok(())
}

async fn select_method(
    bot: &Bot,
    chat_id: ChatId,
    telegram_id: i64,
    state: &AppState,
    lang: Lang,
    method_id: i64,
) -> HandlerResult {
    let Some(mut ctx) = state.flows.get(telegram_id) else {
        return Ok(());
    };
    if ctx.state != FlowState::SelectingPaymentMethod {
        return Ok(());
    }
    let Some(company_id) = ctx.draft.as_ref().and_then(|d| d.company_id) else {
        return Ok(());
    };

    if state
        .db
        .get_active_payment_method(method_id, company_id)
        .await?
        .is_none()
    {
        bot.send_message(chat_id, Msg::NotFound.render(lang)).await?;
        return Ok(());
    }

    ctx.select_payment_method(method_id);
    state.flows.put(telegram_id, ctx);

    bot.send_message(chat_id, Msg::EnterAmount.render(lang)).await?;
    Ok(())
}

/// Commits the confirmed draft. The client token minted when the draft
/// entered confirmation makes a double tap on the button insert exactly
/// one row; a storage failure keeps the context so the user can retry.
async fn confirm_request(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    state: &AppState,
) -> HandlerResult {
    let lang = user.lang();
    let Some(ctx) = state.flows.get(user.telegram_id) else {
        bot.send_message(chat_id, Msg::NothingToCancel.render(lang)).await?;
        return Ok(());
    };
    if ctx.state != FlowState::AwaitingConfirmation {
        return Ok(());
    }

    let new = match build_new_request(user, &ctx) {
        Some(new) => new,
        None => {
            state.flows.clear(user.telegram_id);
            bot.send_message(chat_id, Msg::GenericError.render(lang)).await?;
            return Ok(());
        }
    };

    match state.db.create_request_idempotent(&new).await {
        Ok((request, created)) => {
            state.flows.clear(user.telegram_id);
            bot.send_message(chat_id, Msg::RequestSubmitted.render(lang)).await?;
            if created {
                let note = format!(
                    "🆕 New {} request #{} from {} ({})\n💰 {} {}",
                    request.request_type.as_str(),
                    request.id,
                    user.name.as_deref().unwrap_or("-"),
                    user.customer_code,
                    request.amount,
                    request.currency
                );
                notify_super_admins(bot, &state.config, &note).await;
            }
        }
        Err(e) => {
            tracing::error!("request commit failed: {e}");
            bot.send_message(chat_id, Msg::GenericError.render(lang)).await?;
        }
    }
    Ok(())
}

fn build_new_request(user: &User, ctx: &FlowContext) -> Option<NewRequest> {
    let draft = ctx.draft.as_ref()?;
    Some(NewRequest {
        user_id: user.id,
        company_id: draft.company_id?,
        payment_method_id: draft.payment_method_id?,
        request_type: draft.request_type,
        amount: draft.amount?,
        currency: draft.currency.clone(),
        reference: draft.reference.clone(),
        destination: draft.destination.clone(),
        client_token: draft.client_token?,
    })
}

async fn show_pending_requests(
    bot: &Bot,
    chat_id: ChatId,
    telegram_id: i64,
    state: &AppState,
    lang: Lang,
) -> HandlerResult {
    let requests = match review::list_pending_requests(&state.db, &state.config, telegram_id).await
    {
        Ok(requests) => requests,
        Err(e) => return handlers::report_error(bot, chat_id, e, lang).await,
    };

    if requests.is_empty() {
        bot.send_message(chat_id, Msg::NoPendingRequests.render(lang)).await?;
        return Ok(());
    }

    for request in &requests {
        let line = format!(
            "#{} {} {} {} {}",
            request.id,
            i18n::request_kind_label(request.request_type, lang),
            request.amount,
            request.currency,
            request.created_at.format("%Y-%m-%d %H:%M"),
        );
        bot.send_message(chat_id, line)
            .reply_markup(keyboards::decide_request(request, lang))
            .await?;
    }
    Ok(())
}

async fn show_pending_complaints(
    bot: &Bot,
    chat_id: ChatId,
    telegram_id: i64,
    state: &AppState,
    lang: Lang,
) -> HandlerResult {
    let complaints =
        match review::list_pending_complaints(&state.db, &state.config, telegram_id).await {
            Ok(complaints) => complaints,
            Err(e) => return handlers::report_error(bot, chat_id, e, lang).await,
        };

    if complaints.is_empty() {
        bot.send_message(chat_id, Msg::NoPendingComplaints.render(lang)).await?;
        return Ok(());
    }

    for complaint in &complaints {
        let line = format!(
            "#{} ({})\n{}",
            complaint.id,
            complaint.created_at.format("%Y-%m-%d %H:%M"),
            complaint.text,
        );
        bot.send_message(chat_id, line)
            .reply_markup(keyboards::resolve_complaint(complaint, lang))
            .await?;
    }
    Ok(())
}

async fn decide_request(
    bot: &Bot,
    chat_id: ChatId,
    telegram_id: i64,
    state: &AppState,
    lang: Lang,
    request_id: i64,
    decision: Decision,
) -> HandlerResult {
    match review::decide(&state.db, &state.config, telegram_id, request_id, decision, None).await {
        Ok(request) => {
            bot.send_message(
                chat_id,
                Msg::RequestDecided {
                    id: request.id,
                    outcome: status_label(request.status, lang),
                }
                .render(lang),
            )
            .await?;
            notify_request_owner(bot, state, &request).await;
        }
        Err(e) => handlers::report_error(bot, chat_id, e, lang).await?,
    }
    Ok(())
}

async fn start_complaint_reply(
    bot: &Bot,
    chat_id: ChatId,
    telegram_id: i64,
    state: &AppState,
    lang: Lang,
    complaint_id: i64,
) -> HandlerResult {
    if let Err(e) =
        auth::require(&state.db, &state.config, telegram_id, Permission::ManageUsers).await
    {
        return handlers::report_error(bot, chat_id, e, lang).await;
    }

    state
        .flows
        .start(telegram_id, FlowContext::new_complaint_reply(complaint_id, lang));
    bot.send_message(chat_id, Msg::EnterComplaintReply.render(lang)).await?;
    Ok(())
}

async fn notify_request_owner(bot: &Bot, state: &AppState, request: &crate::db::models::Request) {
    let owner = match state.db.get_user_by_id(request.user_id).await {
        Ok(Some(owner)) => owner,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!("failed to load request owner: {e}");
            return;
        }
    };
    let text = Msg::YourRequestDecided {
        id: request.id,
        outcome: status_label(request.status, owner.lang()),
    }
    .render(owner.lang());
    if let Err(e) = bot.send_message(ChatId(owner.telegram_id), text).await {
        tracing::warn!("failed to notify request owner: {e}");
    }
}

fn status_label(status: RequestStatus, lang: Lang) -> &'static str {
    match (status, lang) {
        (RequestStatus::Pending, Lang::Ar) => "معلق",
        (RequestStatus::Pending, Lang::En) => "pending",
        (RequestStatus::Approved, Lang::Ar) => "مقبول",
        (RequestStatus::Approved, Lang::En) => "approved",
        (RequestStatus::Rejected, Lang::Ar) => "مرفوض",
        (RequestStatus::Rejected, Lang::En) => "rejected",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_ids_parse_with_their_prefixes() {
        assert_eq!(parse_id("company:42", "company:"), Some(42));
        assert_eq!(parse_id("req:approve:7", "req:approve:"), Some(7));
        assert_eq!(parse_id("req:approve:x", "req:approve:"), None);
        assert_eq!(parse_id("method:3", "company:"), None);
        assert_eq!(parse_suffix("lang:ar", "lang:"), Some("ar"));
    }
}
