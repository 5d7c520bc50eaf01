//! Static bilingual message table. Every user-facing branch goes through
//! [`Msg`] so no handler ever builds raw reply text inline.

use crate::error::ValidationError;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Ar,
    En,
}

impl Lang {
    pub fn from_code(code: &str) -> Self {
        match code {
            "en" => Lang::En,
            _ => Lang::Ar,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Lang::Ar => "ar",
            Lang::En => "en",
        }
    }
}

pub enum Msg<'a> {
    Welcome,
    WelcomeBack,
    CustomerCode(&'a str),
    RegisterOffer,
    EnterName,
    EnterPhone,
    Registered,
    AccountInfo {
        name: &'a str,
        phone: &'a str,
        customer_code: &'a str,
        currency: &'a str,
    },
    SelectCompany,
    NoCompanies,
    SelectPaymentMethod,
    NoPaymentMethods,
    EnterAmount,
    EnterReference,
    EnterDestination,
    ConfirmRequest {
        kind: &'a str,
        company: &'a str,
        method: &'a str,
        amount: Decimal,
        currency: &'a str,
    },
    RequestSubmitted,
    EnterComplaintText,
    ComplaintSubmitted,
    Cancelled,
    NothingToCancel,
    ChooseLanguage,
    LanguageChanged,
    CurrencyChanged,
    Unauthorized,
    NotFound,
    AlreadyDecided,
    PolicyViolation,
    GenericError,
    AdminPanel {
        pending_requests: i64,
        pending_complaints: i64,
    },
    NoPendingRequests,
    NoPendingComplaints,
    RequestDecided {
        id: i64,
        outcome: &'a str,
    },
    YourRequestDecided {
        id: i64,
        outcome: &'a str,
    },
    ComplaintResolved {
        id: i64,
    },
    YourComplaintReply {
        id: i64,
        reply: &'a str,
    },
    EnterComplaintReply,
    EnterBroadcastText,
    BroadcastQueued {
        recipients: usize,
    },
    BroadcastFinished {
        sent: usize,
        failed: usize,
    },
    BroadcastStatus {
        depth: usize,
        busy: bool,
    },
    AdminGranted {
        telegram_id: i64,
    },
    AdminRevoked {
        telegram_id: i64,
    },
    RoleAssigned {
        telegram_id: i64,
        role: &'a str,
    },
    CompanyAdded {
        id: i64,
        name: &'a str,
    },
    MethodAdded {
        id: i64,
        name: &'a str,
    },
    AddCompanyUsage,
    AddMethodUsage,
    EnterAdminUserId,
    UserNotRegistered,
    Stats {
        pending: i64,
        approved: i64,
        rejected: i64,
        deposit_total: Decimal,
        withdraw_total: Decimal,
    },
}

impl Msg<'_> {
    pub fn render(&self, lang: Lang) -> String {
        let ar = matches!(lang, Lang::Ar);
        match self {
            Msg::Welcome => if ar {
                "مرحباً بك! استخدم الأزرار أدناه للبدء.".into()
            } else {
                "Welcome! Use the buttons below to get started.".into()
            },
            Msg::WelcomeBack => if ar {
                "مرحباً بعودتك!".into()
            } else {
                "Welcome back!".into()
            },
            Msg::CustomerCode(code) => if ar {
                format!("🪪 رمز العميل الخاص بك: {code}")
            } else {
                format!("🪪 Your customer code: {code}")
            },
            Msg::RegisterOffer => if ar {
                "يجب إكمال التسجيل أولاً. أرسل /register للبدء.".into()
            } else {
                "You need to complete registration first. Send /register to begin.".into()
            },
            Msg::EnterName => if ar {
                "أدخل اسمك الكامل:".into()
            } else {
                "Enter your full name:".into()
            },
            Msg::EnterPhone => if ar {
                "أدخل رقم هاتفك:".into()
            } else {
                "Enter your phone number:".into()
            },
            Msg::Registered => if ar {
                "✅ تم التسجيل بنجاح!".into()
            } else {
                "✅ Registration complete!".into()
            },
            Msg::AccountInfo { name, phone, customer_code, currency } => if ar {
                format!("👤 الاسم: {name}\n📞 الهاتف: {phone}\n🪪 رمز العميل: {customer_code}\n💱 العملة: {currency}")
            } else {
                format!("👤 Name: {name}\n📞 Phone: {phone}\n🪪 Customer code: {customer_code}\n💱 Currency: {currency}")
            },
            Msg::SelectCompany => if ar {
                "اختر الشركة:".into()
            } else {
                "Select a company:".into()
            },
            Msg::NoCompanies => if ar {
                "لا توجد شركات متاحة حالياً".into()
            } else {
                "No companies available currently".into()
            },
            Msg::SelectPaymentMethod => if ar {
                "اختر طريقة الدفع:".into()
            } else {
                "Select a payment method:".into()
            },
            Msg::NoPaymentMethods => if ar {
                "لا توجد طرق دفع متاحة لهذه الشركة".into()
            } else {
                "No payment methods available for this company".into()
            },
            Msg::EnterAmount => if ar {
                "أدخل المبلغ:".into()
            } else {
                "Enter the amount:".into()
            },
            Msg::EnterReference => if ar {
                "أدخل مرجع العملية:".into()
            } else {
                "Enter the transaction reference:".into()
            },
            Msg::EnterDestination => if ar {
                "أدخل عنوان السحب:".into()
            } else {
                "Enter the withdrawal destination:".into()
            },
            Msg::ConfirmRequest { kind, company, method, amount, currency } => if ar {
                format!("📋 النوع: {kind}\n🏢 الشركة: {company}\n💳 الطريقة: {method}\n💰 المبلغ: {amount} {currency}\n\nهل تريد التأكيد؟")
            } else {
                format!("📋 Type: {kind}\n🏢 Company: {company}\n💳 Method: {method}\n💰 Amount: {amount} {currency}\n\nConfirm?")
            },
            Msg::RequestSubmitted => if ar {
                "✅ تم إرسال طلبك وهو الآن قيد المراجعة.".into()
            } else {
                "✅ Your request was submitted and is pending review.".into()
            },
            Msg::EnterComplaintText => if ar {
                "اكتب نص الشكوى (10 أحرف على الأقل):".into()
            } else {
                "Write your complaint (at least 10 characters):".into()
            },
            Msg::ComplaintSubmitted => if ar {
                "✅ تم إرسال الشكوى.".into()
            } else {
                "✅ Complaint submitted.".into()
            },
            Msg::Cancelled => if ar {
                "تم الإلغاء.".into()
            } else {
                "Cancelled.".into()
            },
            Msg::NothingToCancel => if ar {
                "لا يوجد إجراء جارٍ.".into()
            } else {
                "Nothing in progress.".into()
            },
            Msg::ChooseLanguage => if ar {
                "اختر اللغة:".into()
            } else {
                "Choose a language:".into()
            },
            Msg::LanguageChanged => if ar {
                "تم تغيير اللغة.".into()
            } else {
                "Language updated.".into()
            },
            Msg::CurrencyChanged => if ar {
                "تم تغيير العملة.".into()
            } else {
                "Currency updated.".into()
            },
            Msg::Unauthorized => if ar {
                "⛔ غير مصرح لك بهذا الإجراء.".into()
            } else {
                "⛔ You are not authorized for this action.".into()
            },
            Msg::NotFound => if ar {
                "العنصر المطلوب غير موجود.".into()
            } else {
                "The requested item was not found.".into()
            },
            Msg::AlreadyDecided => if ar {
                "تم البت في هذا الطلب مسبقاً.".into()
            } else {
                "This item has already been decided.".into()
            },
            Msg::PolicyViolation => if ar {
                "لا تسمح السياسة بهذا الإجراء.".into()
            } else {
                "Policy does not allow this action.".into()
            },
            Msg::GenericError => if ar {
                "حدث خطأ، حاول مرة أخرى.".into()
            } else {
                "Something went wrong, please try again.".into()
            },
            Msg::AdminPanel { pending_requests, pending_complaints } => if ar {
                format!("🔐 لوحة الإدارة\n\n📋 طلبات معلقة: {pending_requests}\n📢 شكاوى معلقة: {pending_complaints}")
            } else {
                format!("🔐 Admin Panel\n\n📋 Pending requests: {pending_requests}\n📢 Pending complaints: {pending_complaints}")
            },
            Msg::NoPendingRequests => if ar {
                "لا توجد طلبات معلقة".into()
            } else {
                "No pending requests".into()
            },
            Msg::NoPendingComplaints => if ar {
                "لا توجد شكاوى معلقة".into()
            } else {
                "No pending complaints".into()
            },
            Msg::RequestDecided { id, outcome } => if ar {
                format!("تم البت في الطلب #{id}: {outcome}")
            } else {
                format!("Request #{id} decided: {outcome}")
            },
            Msg::YourRequestDecided { id, outcome } => if ar {
                format!("🔔 طلبك #{id} أصبح: {outcome}")
            } else {
                format!("🔔 Your request #{id} is now: {outcome}")
            },
            Msg::ComplaintResolved { id } => if ar {
                format!("تم حل الشكوى #{id}")
            } else {
                format!("Complaint #{id} resolved")
            },
            Msg::YourComplaintReply { id, reply } => if ar {
                format!("🔔 رد على شكواك #{id}:\n{reply}")
            } else {
                format!("🔔 Reply to your complaint #{id}:\n{reply}")
            },
            Msg::EnterComplaintReply => if ar {
                "اكتب الرد على الشكوى:".into()
            } else {
                "Write the reply to this complaint:".into()
            },
            Msg::EnterBroadcastText => if ar {
                "اكتب نص الرسالة الجماعية:".into()
            } else {
                "Write the broadcast message:".into()
            },
            Msg::BroadcastQueued { recipients } => if ar {
                format!("📤 تمت جدولة البث إلى {recipients} مستخدم")
            } else {
                format!("📤 Broadcast queued for {recipients} users")
            },
            Msg::BroadcastFinished { sent, failed } => if ar {
                format!("📤 اكتمل البث: {sent} نجاح، {failed} فشل")
            } else {
                format!("📤 Broadcast finished: {sent} sent, {failed} failed")
            },
            Msg::BroadcastStatus { depth, busy } => if ar {
                format!("قائمة البث: {depth} بانتظار، مشغول: {}", if *busy { "نعم" } else { "لا" })
            } else {
                format!("Broadcast queue: {depth} waiting, busy: {busy}")
            },
            Msg::AdminGranted { telegram_id } => if ar {
                format!("✅ تم منح صلاحيات المشرف للمستخدم {telegram_id}")
            } else {
                format!("✅ Admin granted to user {telegram_id}")
            },
            Msg::AdminRevoked { telegram_id } => if ar {
                format!("✅ تم سحب صلاحيات المشرف من المستخدم {telegram_id}")
            } else {
                format!("✅ Admin revoked from user {telegram_id}")
            },
            Msg::RoleAssigned { telegram_id, role } => if ar {
                format!("✅ تم إسناد الدور \"{role}\" للمستخدم {telegram_id}")
            } else {
                format!("✅ Role \"{role}\" assigned to user {telegram_id}")
            },
            Msg::CompanyAdded { id, name } => if ar {
                format!("✅ تمت إضافة الشركة #{id}: {name}")
            } else {
                format!("✅ Company #{id} added: {name}")
            },
            Msg::MethodAdded { id, name } => if ar {
                format!("✅ تمت إضافة طريقة الدفع #{id}: {name}")
            } else {
                format!("✅ Payment method #{id} added: {name}")
            },
            Msg::AddCompanyUsage => if ar {
                "الصيغة: /addcompany الاسم بالعربية | name in English | عملة اختيارية".into()
            } else {
                "Usage: /addcompany <name in Arabic> | <name in English> [| currency]".into()
            },
            Msg::AddMethodUsage => if ar {
                "الصيغة: /addmethod رقم الشركة | الاسم بالعربية | name in English | نوع اختياري".into()
            } else {
                "Usage: /addmethod <company id> | <name in Arabic> | <name in English> [| kind]".into()
            },
            Msg::EnterAdminUserId => if ar {
                "أدخل معرف تيليجرام للمستخدم:".into()
            } else {
                "Enter the user's Telegram id:".into()
            },
            Msg::UserNotRegistered => if ar {
                "المستخدم غير مسجل.".into()
            } else {
                "That user is not registered.".into()
            },
            Msg::Stats { pending, approved, rejected, deposit_total, withdraw_total } => if ar {
                format!("📊 الإحصائيات\n\nمعلق: {pending}\nمقبول: {approved}\nمرفوض: {rejected}\n\nإجمالي الإيداعات: {deposit_total}\nإجمالي السحوبات: {withdraw_total}")
            } else {
                format!("📊 Statistics\n\nPending: {pending}\nApproved: {approved}\nRejected: {rejected}\n\nDeposits total: {deposit_total}\nWithdrawals total: {withdraw_total}")
            },
        }
    }
}

pub fn request_kind_label(kind: crate::db::models::RequestType, lang: Lang) -> &'static str {
    use crate::db::models::RequestType;
    match (kind, lang) {
        (RequestType::Deposit, Lang::Ar) => "إيداع",
        (RequestType::Deposit, Lang::En) => "Deposit",
        (RequestType::Withdraw, Lang::Ar) => "سحب",
        (RequestType::Withdraw, Lang::En) => "Withdraw",
    }
}

pub fn validation_message(err: &ValidationError, lang: Lang) -> String {
    let ar = matches!(lang, Lang::Ar);
    match err {
        ValidationError::AmountNotNumeric => if ar {
            "المبلغ غير صالح، أدخل رقماً.".into()
        } else {
            "That is not a valid number.".into()
        },
        ValidationError::AmountNotPositive => if ar {
            "يجب أن يكون المبلغ أكبر من صفر.".into()
        } else {
            "The amount must be greater than zero.".into()
        },
        ValidationError::AmountOutOfRange => if ar {
            "المبلغ خارج الحدود المسموح بها.".into()
        } else {
            "The amount is outside the allowed range.".into()
        },
        ValidationError::AmountScale => if ar {
            "عدد الخانات العشرية كبير جداً.".into()
        } else {
            "Too many decimal places.".into()
        },
        ValidationError::EmptyText => if ar {
            "النص لا يمكن أن يكون فارغاً.".into()
        } else {
            "The text must not be empty.".into()
        },
        ValidationError::ComplaintTooShort => if ar {
            "نص الشكوى قصير جداً (10 أحرف على الأقل).".into()
        } else {
            "The complaint is too short (at least 10 characters).".into()
        },
    }
}
