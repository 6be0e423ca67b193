//! User-facing copy of the guided dialogs.

use crate::flow::session::ComposeKind;
use crate::models::Role;

/// Reply-keyboard label that ends image collection. Matched exactly.
pub const DONE_LABEL: &str = "Готово";

pub const ASK_ASSETS: &str = "Отлично! Теперь прикрепите изображения или нажмите \"Готово\".";
pub const ASSET_ADDED: &str = "Изображение добавлено. Прикрепите еще или нажмите \"Готово\".";
pub const ONLY_ASSETS: &str = "Пожалуйста, прикрепите изображение или нажмите \"Готово\". Другие типы сообщений здесь не поддерживаются.";
pub const TEXT_EXPECTED: &str = "Пожалуйста, отправьте текст сообщением.";
pub const CONFIRM_EXPECTED: &str = "Нажмите «Да, отправить» или «Отменить» под предпросмотром.";
pub const SUBMIT_BUTTON: &str = "✅ Да, отправить";
pub const CANCEL_BUTTON: &str = "❌ Отменить";

pub const WELCOME: &str = "Добро пожаловать! Вы...";
pub const DESIGNER_BUTTON: &str = "Я Дизайнер";
pub const SUPPLIER_BUTTON: &str = "Я Поставщик";
pub const ASK_CONTACT: &str =
    "Теперь, пожалуйста, введите вашу контактную информацию (например, телефон или email):";

pub fn ask_text(kind: ComposeKind) -> &'static str {
    match kind {
        ComposeKind::Request => "Введите текст вашей заявки:",
        ComposeKind::Response => "Введите текст вашего отклика:",
    }
}

pub fn missing_text(kind: ComposeKind) -> &'static str {
    match kind {
        ComposeKind::Request => "Произошла ошибка. Текст заявки не найден. Попробуйте снова.",
        ComposeKind::Response => "Произошла ошибка. Текст отклика не найден. Попробуйте снова.",
    }
}

pub fn preview_intro(kind: ComposeKind) -> &'static str {
    match kind {
        ComposeKind::Request => {
            "Так будет выглядеть ваша заявка для поставщиков. Посмотрите, все ли верно."
        }
        ComposeKind::Response => {
            "Так будет выглядеть ваш отклик для дизайнера. Посмотрите, все ли верно."
        }
    }
}

pub fn confirm_question(kind: ComposeKind) -> &'static str {
    match kind {
        ComposeKind::Request => "Отправить заявку?",
        ComposeKind::Response => "Отправить отклик?",
    }
}

pub fn creating(kind: ComposeKind) -> &'static str {
    match kind {
        ComposeKind::Request => "Создаем вашу заявку...",
        ComposeKind::Response => "Создаем ваш отклик...",
    }
}

pub fn cancelled(kind: ComposeKind) -> &'static str {
    match kind {
        ComposeKind::Request => "Создание заявки отменено.",
        ComposeKind::Response => "Создание отклика отменено.",
    }
}

pub fn role_name(role: Role) -> &'static str {
    match role {
        Role::Designer => "Дизайнер",
        Role::Supplier => "Поставщик",
        Role::Pending => "На рассмотрении",
    }
}

pub fn role_chosen(role: Role) -> String {
    format!("Вы выбрали: {}.", role_name(role))
}

pub fn onboarding_done(role: Role) -> String {
    format!(
        "Спасибо! Ваша роль '{}' и контактные данные отправлены на подтверждение.",
        role_name(role)
    )
}
