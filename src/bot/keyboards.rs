//! Inline keyboard builders. Callback data formats are the contract with
//! `callbacks::handle_callback`.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::db::models::{Company, Complaint, PaymentMethod, Request};
use crate::i18n::Lang;

pub fn companies(companies: &[Company], lang: Lang) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = companies
        .iter()
        .map(|c| {
            vec![InlineKeyboardButton::callback(
                c.display_name(lang).to_string(),
                format!("company:{}", c.id),
            )]
        })
        .collect();
    rows.push(vec![cancel_button(lang)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn payment_methods(methods: &[PaymentMethod], lang: Lang) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = methods
        .iter()
        .map(|m| {
            vec![InlineKeyboardButton::callback(
                m.display_name(lang).to_string(),
                format!("method:{}", m.id),
            )]
        })
        .collect();
    rows.push(vec![cancel_button(lang)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn confirm(lang: Lang) -> InlineKeyboardMarkup {
    let (yes, no) = match lang {
        Lang::Ar => ("✅ تأكيد", "❌ إلغاء"),
        Lang::En => ("✅ Confirm", "❌ Cancel"),
    };
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(yes, "confirm:yes"),
        InlineKeyboardButton::callback(no, "confirm:no"),
    ]])
}

pub fn admin_panel(lang: Lang) -> InlineKeyboardMarkup {
    let ar = matches!(lang, Lang::Ar);
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(
                if ar { "📋 الطلبات المعلقة" } else { "📋 Pending requests" },
                "adm:requests",
            ),
            InlineKeyboardButton::callback(
                if ar { "📢 الشكاوى المعلقة" } else { "📢 Pending complaints" },
                "adm:complaints",
            ),
        ],
        vec![
            InlineKeyboardButton::callback(
                if ar { "📊 الإحصائيات" } else { "📊 Statistics" },
                "adm:stats",
            ),
            InlineKeyboardButton::callback(
                if ar { "📤 بث رسالة" } else { "📤 Broadcast" },
                "adm:broadcast",
            ),
        ],
        vec![InlineKeyboardButton::callback(
            if ar { "⏳ حالة قائمة البث" } else { "⏳ Queue status" },
            "adm:queue",
        )],
    ])
}

/// Approve/reject pair under each pending request line.
pub fn decide_request(request: &Request, lang: Lang) -> InlineKeyboardMarkup {
    let (approve, reject) = match lang {
        Lang::Ar => ("✅ قبول", "❌ رفض"),
        Lang::En => ("✅ Approve", "❌ Reject"),
    };
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(approve, format!("req:approve:{}", request.id)),
        InlineKeyboardButton::callback(reject, format!("req:reject:{}", request.id)),
    ]])
}

pub fn resolve_complaint(complaint: &Complaint, lang: Lang) -> InlineKeyboardMarkup {
    let label = match lang {
        Lang::Ar => "✉️ الرد والحل",
        Lang::En => "✉️ Reply & resolve",
    };
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        label,
        format!("comp:resolve:{}", complaint.id),
    )]])
}

pub fn language_picker() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("العربية", "lang:ar"),
        InlineKeyboardButton::callback("English", "lang:en"),
    ]])
}

fn cancel_button(lang: Lang) -> InlineKeyboardButton {
    let label = match lang {
        Lang::Ar => "❌ إلغاء",
        Lang::En => "❌ Cancel",
    };
    InlineKeyboardButton::callback(label, "cancel")
}
