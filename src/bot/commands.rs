use std::sync::Arc;
use teloxide::macros::BotCommands;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands as _;

use crate::bot::{handlers, keyboards, AppState};
use crate::i18n::Msg;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum BotCommand {
    #[command(description = "Start / restart the bot")]
    Start,
    #[command(description = "Complete your registration")]
    Register,
    #[command(description = "Submit a deposit request")]
    Deposit,
    #[command(description = "Submit a withdrawal request")]
    Withdraw,
    #[command(description = "Submit a complaint")]
    Complaint,
    #[command(description = "Show your account info")]
    Account,
    #[command(description = "Change language")]
    Language,
    #[command(description = "Change currency, e.g. /currency USD")]
    Currency(String),
    #[command(description = "Cancel the current action")]
    Cancel,
    #[command(description = "Open the admin panel")]
    Admin,
    #[command(description = "Add a company: /addcompany <name ar> | <name en> [| currency]")]
    AddCompany(String),
    #[command(description = "Add a payment method: /addmethod <company id> | <name ar> | <name en> [| kind]")]
    AddMethod(String),
    #[command(description = "List active companies with their ids")]
    Companies,
    #[command(description = "Grant admin rights: /grantadmin <telegram id> [temp]")]
    GrantAdmin(String),
    #[command(description = "Revoke admin rights: /revokeadmin <telegram id>")]
    RevokeAdmin(String),
    #[command(description = "Assign a role: /assignrole <telegram id> <role name>")]
    AssignRole(String),
    #[command(description = "Show a request's audit trail: /history <request id>")]
    History(String),
    #[command(description = "Show help")]
    Help,
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: BotCommand,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let telegram_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0);
    let full_name = msg.from.as_ref().map(|u| u.full_name());

    let user = match state.current_user(telegram_id, full_name.as_deref()).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("failed to resolve user {telegram_id}: {e}");
            bot.send_message(msg.chat.id, Msg::GenericError.render(state.config.default_language))
                .await?;
            return Ok(());
        }
    };
    let lang = user.lang();

    match cmd {
        BotCommand::Start => {
            let greeting = if user.created_at == user.updated_at {
                Msg::Welcome
            } else {
                Msg::WelcomeBack
            };
            bot.send_message(msg.chat.id, greeting.render(lang)).await?;
            bot.send_message(msg.chat.id, Msg::CustomerCode(&user.customer_code).render(lang))
                .await?;
            if !user.is_registered {
                bot.send_message(msg.chat.id, Msg::RegisterOffer.render(lang))
                    .await?;
            }
        }

        BotCommand::Register => {
            handlers::start_registration(&bot, &msg, &user, &state).await?;
        }

        BotCommand::Deposit => {
            handlers::start_request(&bot, &msg, &user, &state, crate::db::models::RequestType::Deposit)
                .await?;
        }

        BotCommand::Withdraw => {
            handlers::start_request(&bot, &msg, &user, &state, crate::db::models::RequestType::Withdraw)
                .await?;
        }

        BotCommand::Complaint => {
            handlers::start_complaint(&bot, &msg, &user, &state).await?;
        }

        BotCommand::Account => {
            let text = Msg::AccountInfo {
                name: user.name.as_deref().unwrap_or("-"),
                phone: user.phone.as_deref().unwrap_or("-"),
                customer_code: &user.customer_code,
                currency: &user.currency,
            }
            .render(lang);
            bot.send_message(msg.chat.id, text).await?;
        }

        BotCommand::Language => {
            bot.send_message(msg.chat.id, Msg::ChooseLanguage.render(lang))
                .reply_markup(keyboards::language_picker())
                .await?;
        }

        BotCommand::Currency(code) => {
            let code = code.trim().to_uppercase();
            if code.is_empty() || code.len() > 5 {
                bot.send_message(
                    msg.chat.id,
                    crate::i18n::validation_message(&crate::error::ValidationError::EmptyText, lang),
                )
                .await?;
            } else {
                match state.db.set_currency(&user, &code).await {
                    Ok(_) => {
                        bot.send_message(msg.chat.id, Msg::CurrencyChanged.render(lang)).await?;
                    }
                    Err(e) => {
                        tracing::error!("currency change failed: {e}");
                        bot.send_message(msg.chat.id, Msg::GenericError.render(lang)).await?;
                    }
                }
            }
        }

        BotCommand::Cancel => {
            let cancelled = state.flows.clear(telegram_id);
            let reply = if cancelled { Msg::Cancelled } else { Msg::NothingToCancel };
            bot.send_message(msg.chat.id, reply.render(lang)).await?;
        }

        BotCommand::Admin => {
            handlers::show_admin_panel(&bot, msg.chat.id, &user, &state).await?;
        }

        BotCommand::AddCompany(arg) => {
            let Some(spec) = crate::catalog::parse_company_spec(&arg) else {
                bot.send_message(msg.chat.id, Msg::AddCompanyUsage.render(lang)).await?;
                return Ok(());
            };
            match crate::catalog::add_company(&state.db, &state.config, telegram_id, &spec).await {
                Ok(company) => {
                    bot.send_message(
                        msg.chat.id,
                        Msg::CompanyAdded { id: company.id, name: company.display_name(lang) }
                            .render(lang),
                    )
                    .await?;
                }
                Err(e) => handlers::report_error(&bot, msg.chat.id, e, lang).await?,
            }
        }

        BotCommand::AddMethod(arg) => {
            let Some(spec) = crate::catalog::parse_method_spec(&arg) else {
                bot.send_message(msg.chat.id, Msg::AddMethodUsage.render(lang)).await?;
                return Ok(());
            };
            match crate::catalog::add_payment_method(&state.db, &state.config, telegram_id, &spec)
                .await
            {
                Ok(method) => {
                    bot.send_message(
                        msg.chat.id,
                        Msg::MethodAdded { id: method.id, name: method.display_name(lang) }
                            .render(lang),
                    )
                    .await?;
                }
                Err(e) => handlers::report_error(&bot, msg.chat.id, e, lang).await?,
            }
        }

        BotCommand::Companies => {
            match crate::catalog::list_companies(&state.db, &state.config, telegram_id).await {
                Ok(companies) if companies.is_empty() => {
                    bot.send_message(msg.chat.id, Msg::NoCompanies.render(lang)).await?;
                }
                Ok(companies) => {
                    let mut lines = String::new();
                    for company in &companies {
                        lines.push_str(&format!(
                            "#{} {} / {} ({})\n",
                            company.id, company.name_ar, company.name_en, company.default_currency,
                        ));
                    }
                    bot.send_message(msg.chat.id, lines).await?;
                }
                Err(e) => handlers::report_error(&bot, msg.chat.id, e, lang).await?,
            }
        }

        BotCommand::GrantAdmin(arg) => {
            let Some((target_id, temporary)) = parse_grant_args(&arg) else {
                bot.send_message(msg.chat.id, Msg::EnterAdminUserId.render(lang)).await?;
                return Ok(());
            };
            match crate::auth::grant_admin(&state.db, &state.config, telegram_id, target_id, temporary)
                .await
            {
                Ok(target) => {
                    bot.send_message(
                        msg.chat.id,
                        Msg::AdminGranted { telegram_id: target.telegram_id }.render(lang),
                    )
                    .await?;
                }
                Err(crate::error::BotError::PolicyViolation("target user is not registered")) => {
                    bot.send_message(msg.chat.id, Msg::UserNotRegistered.render(lang)).await?;
                }
                Err(e) => handlers::report_error(&bot, msg.chat.id, e, lang).await?,
            }
        }

        BotCommand::RevokeAdmin(arg) => {
            let Some(target_id) = parse_telegram_id(&arg) else {
                bot.send_message(msg.chat.id, Msg::EnterAdminUserId.render(lang)).await?;
                return Ok(());
            };
            match crate::auth::revoke_admin(&state.db, &state.config, telegram_id, target_id).await
            {
                Ok(target) => {
                    bot.send_message(
                        msg.chat.id,
                        Msg::AdminRevoked { telegram_id: target.telegram_id }.render(lang),
                    )
                    .await?;
                }
                Err(e) => handlers::report_error(&bot, msg.chat.id, e, lang).await?,
            }
        }

        BotCommand::AssignRole(arg) => {
            let arg = arg.trim();
            let (id_part, role_name) = arg.split_once(' ').unwrap_or((arg, ""));
            let (Some(target_id), role_name) = (parse_telegram_id(id_part), role_name.trim())
            else {
                bot.send_message(msg.chat.id, Msg::EnterAdminUserId.render(lang)).await?;
                return Ok(());
            };
            if role_name.is_empty() {
                bot.send_message(msg.chat.id, Msg::EnterAdminUserId.render(lang)).await?;
                return Ok(());
            }
            match crate::auth::assign_role_to_admin(
                &state.db,
                &state.config,
                telegram_id,
                target_id,
                role_name,
            )
            .await
            {
                Ok(()) => {
                    bot.send_message(
                        msg.chat.id,
                        Msg::RoleAssigned { telegram_id: target_id, role: role_name }.render(lang),
                    )
                    .await?;
                }
                Err(e) => handlers::report_error(&bot, msg.chat.id, e, lang).await?,
            }
        }

        BotCommand::History(arg) => {
            let Ok(request_id) = arg.trim().parse::<i64>() else {
                bot.send_message(msg.chat.id, Msg::NotFound.render(lang)).await?;
                return Ok(());
            };
            match crate::auth::require(
                &state.db,
                &state.config,
                telegram_id,
                crate::auth::Permission::Reports,
            )
            .await
            {
                Ok(()) => {
                    let Some(request) = state.db.get_request(request_id).await? else {
                        bot.send_message(msg.chat.id, Msg::NotFound.render(lang)).await?;
                        return Ok(());
                    };
                    let entries = state.db.audit_trail("request", request_id).await?;
                    let mut lines = format!(
                        "🧾 #{} {} {} {} [{}]\n",
                        request.id,
                        request.request_type.as_str(),
                        request.amount,
                        request.currency,
                        request.status.as_str(),
                    );
                    for entry in &entries {
                        lines.push_str(&format!(
                            "{} {} (actor {})\n",
                            entry.created_at.format("%Y-%m-%d %H:%M"),
                            entry.action,
                            entry.actor_user_id,
                        ));
                    }
                    bot.send_message(msg.chat.id, lines).await?;
                }
                Err(e) => handlers::report_error(&bot, msg.chat.id, e, lang).await?,
            }
        }

        BotCommand::Help => {
            bot.send_message(msg.chat.id, BotCommand::descriptions().to_string())
                .await?;
        }
    }

    Ok(())
}

fn parse_telegram_id(arg: &str) -> Option<i64> {
    let id: i64 = arg.trim().parse().ok()?;
    (id > 0).then_some(id)
}

/// `<telegram id> [temp]`; the flag makes the grant temporary.
fn parse_grant_args(arg: &str) -> Option<(i64, bool)> {
    let arg = arg.trim();
    let (id_part, flag) = arg.split_once(' ').unwrap_or((arg, ""));
    let id = parse_telegram_id(id_part)?;
    let temporary = match flag.trim() {
        "" => false,
        "temp" | "temporary" => true,
        _ => return None,
    };
    Some((id, temporary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telegram_id_argument_must_be_a_positive_integer() {
        assert_eq!(parse_telegram_id(" 123456 "), Some(123456));
        assert_eq!(parse_telegram_id(""), None);
        assert_eq!(parse_telegram_id("abc"), None);
        assert_eq!(parse_telegram_id("-5"), None);
    }

    #[test]
    fn grant_arguments_support_the_temporary_flag() {
        assert_eq!(parse_grant_args("123456"), Some((123456, false)));
        assert_eq!(parse_grant_args("123456 temp"), Some((123456, true)));
        assert_eq!(parse_grant_args("123456 temporary"), Some((123456, true)));
        assert_eq!(parse_grant_args("123456 nonsense"), None);
        assert_eq!(parse_grant_args("temp"), None);
    }
}
