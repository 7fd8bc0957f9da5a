//! CSV rendering of the admin order export.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::aggregates::Order;

const BOM: &str = "\u{feff}";

/// Column headers in the language of the admin UI.
const HEADERS: [&str; 10] = [
    "מזהה הזמנה",
    "תאריך הזמנה",
    "תאריך השלמה",
    "שם לקוח",
    "טלפון לקוח",
    "כתובת למשלוח",
    "מחיר סה\"כ",
    "סטטוס",
    "הערות",
    "סיכום מוצרים",
];

pub fn file_name(today: NaiveDate) -> String {
    format!("orders_export_{}.csv", today.format("%Y-%m-%d"))
}

/// UTF-8 with a byte-order mark so spreadsheet tools pick the right encoding.
pub fn render_csv(orders: &[Order]) -> String {
    let mut out = String::from(BOM);
    push_row(&mut out, HEADERS.iter().map(|h| h.to_string()));
    for order in orders {
        push_row(
            &mut out,
            [
                order.id().to_string(),
                day(order.order_date()),
                day(order.completion_date()),
                order.user_name().to_string(),
                order.user_phone().to_string(),
                order.delivery_address().to_string(),
                order.total_price().normalize().to_string(),
                order.status().to_string(),
                order.note().unwrap_or_default().to_string(),
                products_summary(order),
            ],
        );
    }
    out
}

/// `name (xN) [option]` per line, joined with `; `.
pub fn products_summary(order: &Order) -> String {
    order
        .products()
        .iter()
        .map(|line| match &line.selected_serving_option {
            Some(option) => format!("{} (x{}) [{}]", line.name, line.quantity, option),
            None => format!("{} (x{})", line.name, line.quantity),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn day(at: DateTime<Utc>) -> String { at.format("%Y-%m-%d").to_string() }

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let row: Vec<String> = fields.into_iter().map(|f| quote(&f)).collect();
    out.push_str(&row.join(","));
    out.push_str("\r\n");
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
