//! Chat copy and keyboards for top-level commands.

use crate::errors::AppError;
use crate::models::User;
use crate::telegram::{KeyboardButton, ReplyMarkup};

pub const CREATE_REQUEST_LABEL: &str = "Создать новую заявку";

pub const WELCOME_DESIGNER: &str = "Добро пожаловать, Дизайнер!";
pub const WELCOME_SUPPLIER: &str = "Добро пожаловать, Поставщик!";
pub const ROLE_PENDING: &str = "Ваша роль на рассмотрении.";
pub const LEFT_FLOW: &str = "Вы покинули текущий сценарий.";
pub const NO_SESSION_HINT: &str = "Чтобы начать, введите /start";
pub const UNKNOWN_COMMAND: &str = "Неизвестная команда. Введите /start";

pub const DESIGNERS_ONLY: &str = "Эта функция доступна только для подтвержденных дизайнеров.";
pub const SUPPLIERS_ONLY: &str = "Эта функция доступна только для подтвержденных поставщиков.";
pub const NOT_OWNER: &str =
    "Вы не являетесь дизайнером этой заявки и не можете выбрать поставщика.";
pub const ALREADY_DECIDED: &str = "Поставщик для этой заявки уже выбран.";
pub const REQUEST_NOT_FOUND: &str = "Заявка не найдена.";
pub const REQUEST_NOT_OPEN: &str = "Эта заявка уже закрыта.";
pub const RESPONSE_NOT_FOUND: &str = "Отклик не найден.";

pub const REQUEST_SUBMITTED: &str = "Ваша заявка создана и отправлена поставщикам.";
pub const RESPONSE_SUBMITTED: &str = "Ваш отклик отправлен дизайнеру.";
pub const SUBMIT_FAILED: &str =
    "Не удалось загрузить изображения или сохранить данные. Попробуйте отправить еще раз.";
pub const GENERIC_ERROR: &str = "Произошла ошибка. Попробуйте позже.";

pub const ACTIVATION_NOTICE: &str = "Ваша роль подтверждена! Можете начинать работу. Введите /start";

pub fn designer_keyboard(web_app_url: &str, user: &User) -> ReplyMarkup {
    ReplyMarkup::Keyboard {
        rows: vec![
            vec![KeyboardButton::text(CREATE_REQUEST_LABEL)],
            vec![KeyboardButton::web_app(
                "Мои заявки",
                format!("{web_app_url}/requests?user_id={}&role=designer", user.id),
            )],
        ],
        one_time: false,
    }
}

pub fn supplier_keyboard(web_app_url: &str, user: &User) -> ReplyMarkup {
    let chat = user
        .external_chat_id
        .map(|id| id.to_string())
        .unwrap_or_default();
    ReplyMarkup::Keyboard {
        rows: vec![
            vec![KeyboardButton::web_app(
                "Открытые заявки",
                format!("{web_app_url}/open-requests?chat_id={chat}"),
            )],
            vec![KeyboardButton::web_app(
                "Мои ответы",
                format!("{web_app_url}/responses?user_id={}&role=supplier", user.id),
            )],
        ],
        one_time: false,
    }
}

/// Text of the choose message once a supplier has been picked.
pub fn chosen_suffix(original: Option<&str>, supplier: &User) -> String {
    let line = format!("✅ Выбран поставщик: {}", supplier.contact_or_placeholder());
    match original {
        Some(text) if !text.is_empty() => format!("{text}\n\n{line}"),
        _ => line,
    }
}

/// Chat-facing explanation of a domain error raised while submitting.
pub fn user_message(err: &AppError) -> &'static str {
    match err {
        AppError::Conflict(_) => "Заявка уже закрыта, или вы уже откликнулись на нее.",
        AppError::NotFound(_) => REQUEST_NOT_FOUND,
        AppError::Forbidden(_) => "У вас нет прав на это действие.",
        AppError::Validation(_) => "Текст не может быть пустым.",
        _ => GENERIC_ERROR,
    }
}

/// Errors the user can act on; everything else is infrastructure.
pub fn is_domain_error(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Conflict(_)
            | AppError::NotFound(_)
            | AppError::Forbidden(_)
            | AppError::Validation(_)
    )
}
