//! User-facing texts. Everything the bot says lives here.

use super::reply::{Button, Reply};
use super::state::{Order, Selection};
use crate::dialogue::event::RESTART_DATA;
use crate::error::ValidationError;
use crate::pricing::catalog::{MATERIAL_PREFIX, SUBTYPE_PREFIX};
use crate::pricing::{Material, Price, PricingTable, format_decimal};

/// Which numeric answer is being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Width,
    Height,
    Quantity,
}

pub const PLEASE_START: &str = "Пожалуйста, начните с команды /start";
pub const CALCULATION_DONE: &str = "Расчет завершен. Начните новый расчет командой /start";
pub const USE_BUTTONS: &str = "👆 Пожалуйста, выберите вариант с помощью кнопок.";
pub const STALE_BUTTON: &str = "⚠️ Этот выбор уже сделан.";
pub const CALCULATION_FAILED: &str =
    "⚠️ Не удалось выполнить расчет. Начните заново командой /start";

/// Welcome text with one button per material.
pub fn choose_material(table: &PricingTable) -> Reply {
    let buttons = table
        .materials()
        .iter()
        .map(|m| Button::new(&m.label, format!("{MATERIAL_PREFIX}{}", m.key)))
        .collect();
    Reply::text(
        "👋 <b>Привет! Я помогу рассчитать стоимость заказа.</b>\n\nВыберите материал:",
    )
    .with_buttons(buttons)
}

/// Subtype menu for a material that has them.
pub fn choose_subtype(material: &Material) -> Reply {
    let buttons = material
        .subtypes()
        .iter()
        .map(|s| Button::new(&s.label, format!("{SUBTYPE_PREFIX}{}", s.key)))
        .collect();
    Reply::text(format!(
        "🖌️ <b>Выбран материал:</b> {}\n\nВыберите вариант:",
        escape_html(&material.label)
    ))
    .with_buttons(buttons)
}

/// Confirmation of the material choice followed by the width prompt.
pub fn material_chosen(display_name: &str) -> Reply {
    Reply::text(format!(
        "🖌️ <b>Выбран материал:</b> {}\n\n{}",
        escape_html(display_name),
        field_prompt(Field::Width)
    ))
}

pub fn field_prompt(field: Field) -> &'static str {
    match field {
        Field::Width => "Введите ширину в метрах:",
        Field::Height => "📏 Введите высоту в метрах:",
        Field::Quantity => "🔢 Введите количество:",
    }
}

pub fn ask(field: Field) -> Reply {
    Reply::text(field_prompt(field))
}

/// Rejection naming the violated constraint, then the same prompt again.
pub fn invalid_input(field: Field, err: &ValidationError) -> Reply {
    let (subject, must, unit) = match field {
        Field::Width => ("Ширина", "должна", "м"),
        Field::Height => ("Высота", "должна", "м"),
        Field::Quantity => ("Количество", "должно", "шт."),
    };

    let problem = match err {
        ValidationError::NotANumber { .. } => {
            "❌ Ошибка! Пожалуйста, введите корректное число.".to_string()
        }
        ValidationError::NotAnInteger { .. } => {
            "❌ Ошибка! Количество должно быть целым числом.".to_string()
        }
        ValidationError::BelowMinimum { min, .. } => format!(
            "❌ {subject} {must} быть не меньше {} {unit}",
            format_decimal(*min)
        ),
        ValidationError::AboveMaximum { max, .. } => format!(
            "❌ {subject} {must} быть не больше {} {unit}",
            format_decimal(*max)
        ),
    };

    Reply::text(format!("{problem}\n\n{}", field_prompt(field)))
}

/// Final receipt with the restart button.
pub fn receipt(material_name: &str, order: &Order, price: &Price) -> Reply {
    Reply::text(format!(
        "📊 <b>Итоговый расчет</b>\n\n\
         🎨 Материал: {}\n\
         📏 Размер: {}м × {}м\n\
         🔢 Количество: {} шт.\n\n\
         💵 <b>Стоимость: {} руб.</b>",
        escape_html(material_name),
        format_decimal(order.width),
        format_decimal(order.height),
        order.quantity,
        price
    ))
    .with_buttons(vec![restart_button()])
}

/// Answer to free text after the receipt.
pub fn calculation_done() -> Reply {
    Reply::text(CALCULATION_DONE).with_buttons(vec![restart_button()])
}

pub fn please_start() -> Reply {
    Reply::text(PLEASE_START)
}

pub fn calculation_failed() -> Reply {
    Reply::text(CALCULATION_FAILED)
}

pub fn restart_button() -> Button {
    Button::new("🔄 Новый расчет", RESTART_DATA)
}

/// Human-readable name of a selection, falling back to the raw key.
pub fn selection_name(table: &PricingTable, selection: &Selection) -> String {
    table
        .material(&selection.material)
        .map(|m| m.display_name(selection.subtype.as_deref()))
        .unwrap_or_else(|| selection.material.clone())
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
