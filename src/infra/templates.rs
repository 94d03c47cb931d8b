//! Plain-text and HTML bodies for customer email.

use super::mailer::Email;
use crate::order_status::OrderStatus;
use crate::types::{format_money, Order, ShippingAddress};

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn paragraphs_html(text: &str) -> String {
    text.split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p.trim()).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn address_lines(address: &ShippingAddress) -> Vec<String> {
    let mut lines = vec![address.recipient.clone(), address.line1.clone()];
    if let Some(line2) = &address.line2 {
        lines.push(line2.clone());
    }
    let mut city = address.city.clone();
    if let Some(region) = &address.region {
        city.push_str(", ");
        city.push_str(region);
    }
    city.push(' ');
    city.push_str(&address.postal_code);
    lines.push(city);
    lines.push(address.country.clone());
    lines
}

pub fn order_confirmation(order: &Order) -> Email {
    let mut text = format!(
        "Thank you for your order!\n\nOrder {} has been paid and is being prepared.\n\n",
        order.order_number
    );
    let mut rows = String::new();
    for item in &order.items {
        text.push_str(&format!(
            "  {} x {} @ {} = {}\n",
            item.quantity,
            item.product_name,
            format_money(item.unit_price_cents),
            format_money(item.line_total_cents)
        ));
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&item.product_name),
            item.quantity,
            format_money(item.line_total_cents)
        ));
    }
    let totals = [
        ("Subtotal", order.subtotal_cents),
        ("Shipping", order.shipping_cents),
        ("Tax", order.tax_cents),
        ("Total", order.total_cents),
    ];
    text.push('\n');
    let mut totals_html = String::new();
    for (label, cents) in totals {
        text.push_str(&format!("{label}: {}\n", format_money(cents)));
        totals_html.push_str(&format!(
            "<tr><td colspan=\"2\">{label}</td><td>{}</td></tr>",
            format_money(cents)
        ));
    }
    let address = address_lines(&order.shipping_address);
    text.push_str("\nShipping to:\n");
    for line in &address {
        text.push_str(&format!("  {line}\n"));
    }
    let address_html = address
        .iter()
        .map(|l| escape_html(l))
        .collect::<Vec<_>>()
        .join("<br>");

    let html = format!(
        "<h1>Thank you for your order!</h1>\
         <p>Order <strong>{}</strong> has been paid and is being prepared.</p>\
         <table>{rows}{totals_html}</table>\
         <h2>Shipping to</h2><p>{address_html}</p>",
        escape_html(&order.order_number)
    );
    Email {
        to: order.email.clone(),
        subject: format!("Order {} confirmed", order.order_number),
        text,
        html,
    }
}

/// `None` for statuses customers are not told about.
pub fn order_status_update(order: &Order) -> Option<Email> {
    let number = &order.order_number;
    let (subject, message) = match order.status {
        OrderStatus::Shipped => {
            let tracking = match &order.tracking_number {
                Some(t) => format!(" Your tracking number is {t}."),
                None => String::new(),
            };
            (
                format!("Order {number} has shipped"),
                format!("Good news! Order {number} is on its way.{tracking}"),
            )
        }
        OrderStatus::Delivered => (
            format!("Order {number} was delivered"),
            format!("Order {number} has been delivered. We hope you love it, and we'd welcome a review."),
        ),
        OrderStatus::Cancelled => (
            format!("Order {number} was cancelled"),
            format!("Order {number} has been cancelled. If you were charged, the payment will be returned."),
        ),
        OrderStatus::Refunded => (
            format!("Order {number} was refunded"),
            format!(
                "A refund of {} for order {number} has been issued.",
                format_money(order.total_cents)
            ),
        ),
        _ => return None,
    };
    Some(Email {
        to: order.email.clone(),
        subject,
        html: paragraphs_html(&message),
        text: message,
    })
}

pub fn newsletter_welcome(email: &str, unsubscribe_url: &str) -> Email {
    let text = format!(
        "Welcome to the Tresses newsletter!\n\nYou'll hear about new products and care tips first.\n\n\
         Unsubscribe: {unsubscribe_url}"
    );
    Email {
        to: email.to_string(),
        subject: "Welcome to Tresses".to_string(),
        html: format!(
            "<h1>Welcome to the Tresses newsletter!</h1>\
             <p>You'll hear about new products and care tips first.</p>\
             <p><a href=\"{0}\">Unsubscribe</a></p>",
            escape_html(unsubscribe_url)
        ),
        text,
    }
}

pub fn campaign(email: &str, subject: &str, body: &str, unsubscribe_url: &str) -> Email {
    Email {
        to: email.to_string(),
        subject: subject.to_string(),
        text: format!("{body}\n\nUnsubscribe: {unsubscribe_url}"),
        html: format!(
            "{}\n<p><a href=\"{}\">Unsubscribe</a></p>",
            paragraphs_html(body),
            escape_html(unsubscribe_url)
        ),
    }
}

pub fn complaint_response(email: &str, subject: &str, response: &str) -> Email {
    let text = format!("Regarding your message \"{subject}\":\n\n{response}");
    Email {
        to: email.to_string(),
        subject: format!("Re: {subject}"),
        html: paragraphs_html(&text),
        text,
    }
}
