//! Notification copy sent on lifecycle events.

use crate::models::{Request, User};

pub const RESPOND_BUTTON: &str = "Откликнуться";
pub const CHOOSE_BUTTON: &str = "Выбрать этого поставщика";

pub fn new_request(request: &Request) -> String {
    format!("Новая заявка:\n\n{}", request.details_text)
}

pub fn new_response(response_text: &str, supplier: &User) -> String {
    let notes = supplier
        .notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("Нет");
    format!(
        "Новый отклик на вашу заявку!\n\nОтклик: {response_text}\n\nЗаметки поставщика: {notes}"
    )
}

pub fn chosen_for_designer(request: &Request, supplier: &User) -> String {
    format!(
        "Вы выбрали поставщика для заявки \"{}\".\nКонтакты: {}",
        request.details_text,
        supplier.contact_or_placeholder()
    )
}

pub fn chosen_for_supplier(request: &Request, designer: &User) -> String {
    format!(
        "Вас выбрали для заявки \"{}\"!\nКонтакты дизайнера: {}",
        request.details_text,
        designer.contact_or_placeholder()
    )
}

pub fn not_chosen(request: &Request) -> String {
    format!(
        "Дизайнер выбрал другого поставщика для заявки \"{}\". Спасибо за ваш отклик!",
        request.details_text
    )
}
