//! Plain-message handler: routes free text into whichever conversational
//! flow the sender has in progress, and the flow-start helpers shared with
//! the command handler.

use std::sync::Arc;

use teloxide::prelude::*;

use crate::auth::{self, Permission};
use crate::bot::{keyboards, notify_super_admins, AppState};
use crate::broadcast::BroadcastJob;
use crate::db::models::{RequestType, User};
use crate::error::BotError;
use crate::flow::{self, AmountBounds, FlowContext, FlowState};
use crate::i18n::{self, Lang, Msg};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> HandlerResult {
    let telegram_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0);
    let full_name = msg.from.as_ref().map(|u| u.full_name());

    let Some(text) = msg.text() else {
        return Ok(());
    };

    let user = match state.current_user(telegram_id, full_name.as_deref()).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("failed to resolve user {telegram_id}: {e}");
            return Ok(());
        }
    };
    let lang = user.lang();

    // Main-menu reply buttons mirror the slash commands.
    match text {
        "إيداع" | "Deposit" => return start_request(&bot, &msg, &user, &state, RequestType::Deposit).await,
        "سحب" | "Withdraw" => return start_request(&bot, &msg, &user, &state, RequestType::Withdraw).await,
        "شكوى" | "Complaint" => return start_complaint(&bot, &msg, &user, &state).await,
        "إلغاء" | "Cancel" => {
            let cancelled = state.flows.clear(telegram_id);
            let reply = if cancelled { Msg::Cancelled } else { Msg::NothingToCancel };
            bot.send_message(msg.chat.id, reply.render(lang)).await?;
            return Ok(());
        }
        _ => {}
    }

    let Some(mut ctx) = state.flows.get(telegram_id) else {
        // Free text outside any flow is ignored.
        return Ok(());
    };

    match ctx.state {
        FlowState::EnteringAmount => {
            let bounds = AmountBounds {
                min: state.config.min_amount,
                max: state.config.max_amount,
            };
            match ctx.enter_amount(text, &bounds) {
                Ok(()) => {
                    let prompt = match ctx.state {
                        FlowState::EnteringDestination => Msg::EnterDestination,
                        _ => Msg::EnterReference,
                    };
                    state.flows.put(telegram_id, ctx);
                    bot.send_message(msg.chat.id, prompt.render(lang)).await?;
                }
                Err(e) => {
                    bot.send_message(msg.chat.id, i18n::validation_message(&e, lang))
                        .await?;
                }
            }
        }

        FlowState::EnteringReference => match ctx.enter_reference(text) {
            Ok(()) => {
                send_confirmation(&bot, &msg, &state, &ctx, lang).await?;
                state.flows.put(telegram_id, ctx);
            }
            Err(e) => {
                bot.send_message(msg.chat.id, i18n::validation_message(&e, lang))
                    .await?;
            }
        },

        FlowState::EnteringDestination => match ctx.enter_destination(text) {
            Ok(()) => {
                send_confirmation(&bot, &msg, &state, &ctx, lang).await?;
                state.flows.put(telegram_id, ctx);
            }
            Err(e) => {
                bot.send_message(msg.chat.id, i18n::validation_message(&e, lang))
                    .await?;
            }
        },

        FlowState::EnteringComplaintText => match flow::validate_complaint_text(text) {
            Ok(complaint_text) => match state.db.create_complaint(user.id, &complaint_text).await {
                Ok(complaint) => {
                    state.flows.clear(telegram_id);
                    bot.send_message(msg.chat.id, Msg::ComplaintSubmitted.render(lang))
                        .await?;
                    let note = format!(
                        "📢 New complaint #{} from {} ({})\n{}",
                        complaint.id,
                        user.name.as_deref().unwrap_or("-"),
                        user.customer_code,
                        complaint.text
                    );
                    notify_super_admins(&bot, &state.config, &note).await;
                }
                Err(e) => {
                    // Context stays so the user can try again.
                    tracing::error!("complaint commit failed: {e}");
                    bot.send_message(msg.chat.id, Msg::GenericError.render(lang))
                        .await?;
                }
            },
            Err(e) => {
                bot.send_message(msg.chat.id, i18n::validation_message(&e, lang))
                    .await?;
            }
        },

        FlowState::EnteringName => match flow::non_empty_trimmed(text) {
            Ok(name) => {
                ctx.pending_name = Some(name);
                ctx.state = FlowState::EnteringPhone;
                state.flows.put(telegram_id, ctx);
                bot.send_message(msg.chat.id, Msg::EnterPhone.render(lang)).await?;
            }
            Err(e) => {
                bot.send_message(msg.chat.id, i18n::validation_message(&e, lang))
                    .await?;
            }
        },

        FlowState::EnteringPhone => match flow::non_empty_trimmed(text) {
            Ok(phone) => {
                let name = ctx.pending_name.clone().unwrap_or_default();
                match state.db.complete_registration(telegram_id, &name, &phone).await {
                    Ok(_) => {
                        state.flows.clear(telegram_id);
                        bot.send_message(msg.chat.id, Msg::Registered.render(lang)).await?;
                    }
                    Err(e) => {
                        tracing::error!("registration failed for {telegram_id}: {e}");
                        bot.send_message(msg.chat.id, Msg::GenericError.render(lang))
                            .await?;
                    }
                }
            }
            Err(e) => {
                bot.send_message(msg.chat.id, i18n::validation_message(&e, lang))
                    .await?;
            }
        },

        FlowState::ReplyingToComplaint { complaint_id } => {
            match crate::review::resolve_complaint(&state.db, &state.config, telegram_id, complaint_id, text)
                .await
            {
                Ok(complaint) => {
                    state.flows.clear(telegram_id);
                    bot.send_message(msg.chat.id, Msg::ComplaintResolved { id: complaint.id }.render(lang))
                        .await?;
                    notify_complaint_owner(&bot, &state, &complaint).await;
                }
                Err(e) => {
                    state.flows.clear(telegram_id);
                    report_error(&bot, msg.chat.id, e, lang).await?;
                }
            }
        }

        FlowState::EnteringBroadcastText => {
            if let Err(e) =
                auth::require(&state.db, &state.config, telegram_id, Permission::Broadcast).await
            {
                state.flows.clear(telegram_id);
                report_error(&bot, msg.chat.id, e, lang).await?;
                return Ok(());
            }
            match state.db.registered_user_ids().await {
                Ok(recipients) => {
                    state.flows.clear(telegram_id);
                    let count = recipients.len();
                    state.broadcast.enqueue(BroadcastJob {
                        text: text.to_string(),
                        recipients,
                        notify: Some((msg.chat.id.0, lang)),
                    });
                    bot.send_message(msg.chat.id, Msg::BroadcastQueued { recipients: count }.render(lang))
                        .await?;
                }
                Err(e) => {
                    tracing::error!("failed to load broadcast recipients: {e}");
                    bot.send_message(msg.chat.id, Msg::GenericError.render(lang))
                        .await?;
                }
            }
        }

        // The selection and confirmation steps expect button taps; typing
        // just repeats the prompt.
        FlowState::SelectingCompany => {
            bot.send_message(msg.chat.id, Msg::SelectCompany.render(lang)).await?;
        }
        FlowState::SelectingPaymentMethod => {
            bot.send_message(msg.chat.id, Msg::SelectPaymentMethod.render(lang))
                .await?;
        }
        FlowState::AwaitingConfirmation => {
            send_confirmation(&bot, &msg, &state, &ctx, lang).await?;
        }
    }

    Ok(())
}

/// Starts a deposit/withdraw flow. Guests are redirected to the
/// registration offer before any context is created.
pub async fn start_request(
    bot: &Bot,
    msg: &Message,
    user: &User,
    state: &AppState,
    request_type: RequestType,
) -> HandlerResult {
    let lang = user.lang();

    if !user.is_registered {
        bot.send_message(msg.chat.id, Msg::RegisterOffer.render(lang)).await?;
        return Ok(());
    }

    let companies = match state.db.list_active_companies().await {
        Ok(companies) => companies,
        Err(e) => {
            tracing::error!("failed to list companies: {e}");
            bot.send_message(msg.chat.id, Msg::GenericError.render(lang)).await?;
            return Ok(());
        }
    };

    if companies.is_empty() {
        bot.send_message(msg.chat.id, Msg::NoCompanies.render(lang)).await?;
        return Ok(());
    }

    state.flows.start(
        user.telegram_id,
        FlowContext::new_request(request_type, user.currency.clone(), lang),
    );

    bot.send_message(msg.chat.id, Msg::SelectCompany.render(lang))
        .reply_markup(keyboards::companies(&companies, lang))
        .await?;
    Ok(())
}

pub async fn start_complaint(
    bot: &Bot,
    msg: &Message,
    user: &User,
    state: &AppState,
) -> HandlerResult {
    let lang = user.lang();

    if !user.is_registered {
        bot.send_message(msg.chat.id, Msg::RegisterOffer.render(lang)).await?;
        return Ok(());
    }

    state.flows.start(user.telegram_id, FlowContext::new_complaint(lang));
    bot.send_message(msg.chat.id, Msg::EnterComplaintText.render(lang)).await?;
    Ok(())
}

pub async fn start_registration(
    bot: &Bot,
    msg: &Message,
    user: &User,
    state: &AppState,
) -> HandlerResult {
    let lang = user.lang();

    if user.is_registered {
        bot.send_message(msg.chat.id, Msg::WelcomeBack.render(lang)).await?;
        return Ok(());
    }

    state.flows.start(user.telegram_id, FlowContext::new_registration(lang));
    bot.send_message(msg.chat.id, Msg::EnterName.render(lang)).await?;
    Ok(())
}

/// Admin panel entry: pending counters plus the action keyboard. Any actor
/// with at least one permission may open it; individual actions enforce
/// their own gates.
pub async fn show_admin_panel(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    state: &AppState,
) -> HandlerResult {
    let lang = user.lang();

    let perms = match auth::permissions_of(&state.db, &state.config, user.telegram_id).await {
        Ok(perms) => perms,
        Err(e) => {
            report_error(bot, chat_id, e, lang).await?;
            return Ok(());
        }
    };
    if perms.is_empty() {
        bot.send_message(chat_id, Msg::Unauthorized.render(lang)).await?;
        return Ok(());
    }

    let pending_requests = state.db.count_pending_requests().await.unwrap_or(0);
    let pending_complaints = state.db.count_pending_complaints().await.unwrap_or(0);

    bot.send_message(
        chat_id,
        Msg::AdminPanel {
            pending_requests,
            pending_complaints,
        }
        .render(lang),
    )
    .reply_markup(keyboards::admin_panel(lang))
    .await?;
    Ok(())
}

/// Renders the confirmation summary for the draft under construction.
async fn send_confirmation(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    ctx: &FlowContext,
    lang: Lang,
) -> HandlerResult {
    let Some(draft) = ctx.draft.as_ref() else {
        bot.send_message(msg.chat.id, Msg::GenericError.render(lang)).await?;
        return Ok(());
    };

    let company_name = match draft.company_id {
        Some(id) => state
            .db
            .get_active_company(id)
            .await
            .ok()
            .flatten()
            .map(|c| c.display_name(lang).to_string()),
        None => None,
    };
    let method_name = match (draft.payment_method_id, draft.company_id) {
        (Some(id), Some(company_id)) => state
            .db
            .get_active_payment_method(id, company_id)
            .await
            .ok()
            .flatten()
            .map(|m| m.display_name(lang).to_string()),
        _ => None,
    };

    let text = Msg::ConfirmRequest {
        kind: i18n::request_kind_label(draft.request_type, lang),
        company: company_name.as_deref().unwrap_or("-"),
        method: method_name.as_deref().unwrap_or("-"),
        amount: draft.amount.unwrap_or_default(),
        currency: &draft.currency,
    }
    .render(lang);

    bot.send_message(msg.chat.id, text)
        .reply_markup(keyboards::confirm(lang))
        .await?;
    Ok(())
}

pub async fn notify_complaint_owner(
    bot: &Bot,
    state: &AppState,
    complaint: &crate::db::models::Complaint,
) {
    let Ok(Some(owner)) = state.db.get_user_by_id(complaint.user_id).await else {
        return;
    };
    let text = Msg::YourComplaintReply {
        id: complaint.id,
        reply: complaint.admin_reply.as_deref().unwrap_or("-"),
    }
    .render(owner.lang());
    if let Err(e) = bot.send_message(ChatId(owner.telegram_id), text).await {
        tracing::warn!("failed to notify complaint owner: {e}");
    }
}

pub async fn report_error(bot: &Bot, chat_id: ChatId, err: BotError, lang: Lang) -> HandlerResult {
    if matches!(err, BotError::Storage(_)) {
        tracing::error!("storage failure: {err}");
    } else {
        tracing::debug!("refused action: {err}");
    }
    bot.send_message(chat_id, err.user_message(lang)).await?;
    Ok(())
}
