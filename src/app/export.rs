//! RFC 4180 CSV for back-office exports.

use crate::db::ts;
use crate::types::{format_decimal, Order, Subscriber};

/// Accumulates CRLF-terminated rows.
#[derive(Debug, Default)]
pub struct CsvWriter {
    out: String,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut first = true;
        for field in fields {
            if !first {
                self.out.push(',');
            }
            first = false;
            push_field(&mut self.out, field.as_ref());
        }
        self.out.push_str("\r\n");
    }

    pub fn finish(self) -> String {
        self.out
    }
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

pub const ORDER_HEADER: [&str; 10] = [
    "order_number",
    "created_at",
    "email",
    "status",
    "items",
    "subtotal",
    "shipping",
    "tax",
    "total",
    "payment_reference",
];

pub fn orders_csv(orders: &[Order]) -> String {
    let mut csv = CsvWriter::new();
    csv.row(ORDER_HEADER);
    for order in orders {
        let items = order
            .items
            .iter()
            .map(|i| format!("{} x {}", i.quantity, i.product_name))
            .collect::<Vec<_>>()
            .join("; ");
        csv.row([
            order.order_number.clone(),
            ts(&order.created_at),
            order.email.clone(),
            order.status.to_string(),
            items,
            format_decimal(order.subtotal_cents),
            format_decimal(order.shipping_cents),
            format_decimal(order.tax_cents),
            format_decimal(order.total_cents),
            order.payment_reference.clone().unwrap_or_default(),
        ]);
    }
    csv.finish()
}

pub fn subscribers_csv(subscribers: &[Subscriber]) -> String {
    let mut csv = CsvWriter::new();
    csv.row(["email", "active", "subscribed_at", "unsubscribed_at"]);
    for s in subscribers {
        csv.row([
            s.email.clone(),
            s.active.to_string(),
            ts(&s.subscribed_at),
            s.unsubscribed_at.as_ref().map(ts).unwrap_or_default(),
        ]);
    }
    csv.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_fields_are_quoted_when_needed() {
        let mut csv = CsvWriter::new();
        csv.row(["plain", "has,comma", "say \"hi\"", "two\nlines"]);
        assert_eq!(
            csv.finish(),
            "plain,\"has,comma\",\"say \"\"hi\"\"\",\"two\nlines\"\r\n"
        );
    }

    #[test]
    fn test_subscribers_csv() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let csv = subscribers_csv(&[Subscriber {
            id: "s1".into(),
            email: "a@example.com".into(),
            unsubscribe_token: "t".into(),
            active: true,
            subscribed_at: at,
            unsubscribed_at: None,
        }]);
        assert_eq!(
            csv,
            "email,active,subscribed_at,unsubscribed_at\r\n\
             a@example.com,true,2024-03-01T12:00:00.000000Z,\r\n"
        );
    }

    #[test]
    fn test_empty_orders_csv_has_header() {
        assert_eq!(
            orders_csv(&[]),
            "order_number,created_at,email,status,items,subtotal,shipping,tax,total,payment_reference\r\n"
        );
    }
}
