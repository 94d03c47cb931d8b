use super::{export, validation};
use crate::crypto::random_token;
use crate::error::{Result, StoreError};
use crate::infra::mailer::send_logged;
use crate::infra::templates;
use crate::state::AppState;
use crate::types::{Page, PageRequest, Subscriber};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CampaignResult {
    pub sent: usize,
    pub failed: usize,
}

fn unsubscribe_url(state: &AppState, token: &str) -> String {
    format!(
        "{}/api/newsletter/unsubscribe?token={}",
        state.config.server.public_url.trim_end_matches('/'),
        token
    )
}

/// Idempotent for active subscribers: no second welcome email.
pub async fn subscribe(state: &AppState, email: &str) -> Result<Subscriber> {
    let email = validation::normalize_email(email)?;
    let subscriber = match state.db.find_subscriber_by_email(&email)? {
        Some(existing) if existing.active => return Ok(existing),
        Some(existing) => {
            state.db.set_subscriber_active(&existing.id, true)?;
            info!("Reactivated newsletter subscriber {}", existing.id);
            state
                .db
                .find_subscriber_by_email(&email)?
                .ok_or_else(|| StoreError::not_found("Subscriber"))?
        }
        None => {
            let subscriber = state.db.insert_subscriber(&email, &random_token())?;
            info!("New newsletter subscriber {}", subscriber.id);
            subscriber
        }
    };
    let welcome = templates::newsletter_welcome(
        &subscriber.email,
        &unsubscribe_url(state, &subscriber.unsubscribe_token),
    );
    send_logged(state.mailer.as_ref(), &welcome).await;
    Ok(subscriber)
}

pub fn unsubscribe(state: &AppState, token: &str) -> Result<()> {
    let subscriber = state
        .db
        .find_subscriber_by_token(token.trim())?
        .ok_or_else(|| StoreError::not_found("Subscription"))?;
    if subscriber.active {
        state.db.set_subscriber_active(&subscriber.id, false)?;
        info!("Newsletter subscriber {} unsubscribed", subscriber.id);
    }
    Ok(())
}

pub fn list_subscribers(state: &AppState, active: Option<bool>, page: PageRequest) -> Result<Page<Subscriber>> {
    let (subscribers, total) = state.db.list_subscribers(active, page)?;
    Ok(page.wrap(subscribers, total))
}

pub fn export_subscribers_csv(state: &AppState) -> Result<String> {
    Ok(export::subscribers_csv(&state.db.all_subscribers(false)?))
}

/// Emails every active subscriber one at a time; failures are counted, not fatal.
pub async fn send_campaign(state: &AppState, subject: &str, body: &str) -> Result<CampaignResult> {
    let subject = validation::text_len("Subject", subject, 1, 200)?;
    let body = validation::text_len("Body", body, 1, 50_000)?;
    let subscribers = state.db.all_subscribers(true)?;
    let mut result = CampaignResult { sent: 0, failed: 0 };
    for subscriber in &subscribers {
        let email = templates::campaign(
            &subscriber.email,
            &subject,
            &body,
            &unsubscribe_url(state, &subscriber.unsubscribe_token),
        );
        if send_logged(state.mailer.as_ref(), &email).await {
            result.sent += 1;
        } else {
            result.failed += 1;
        }
    }
    info!(
        "Campaign '{}' sent to {} subscriber(s), {} failed",
        subject, result.sent, result.failed
    );
    Ok(result)
}
