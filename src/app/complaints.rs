use super::validation::{normalize_email, text_len};
use crate::db::complaints::NewComplaint;
use crate::error::{Result, StoreError};
use crate::infra::mailer::send_logged;
use crate::infra::templates;
use crate::state::AppState;
use crate::types::{Complaint, ComplaintStatus, NotificationKind, Page, PageRequest, User};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComplaintInput {
    pub email: Option<String>,
    pub order_id: Option<String>,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComplaintUpdate {
    pub status: Option<ComplaintStatus>,
    pub admin_response: Option<String>,
}

pub async fn submit(state: &AppState, user: Option<&User>, input: &ComplaintInput) -> Result<Complaint> {
    let subject = text_len("Subject", &input.subject, 3, 150)?;
    let message = text_len("Message", &input.message, 10, 5000)?;
    let email = match user {
        Some(user) => user.email.clone(),
        None => normalize_email(input.email.as_deref().unwrap_or_default())?,
    };
    let order_id = input.order_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
    if let Some(order_id) = order_id {
        let owned = match user {
            Some(user) => state
                .db
                .get_order(order_id)?
                .is_some_and(|o| o.user_id.as_deref() == Some(user.id.as_str())),
            None => false,
        };
        if !owned {
            return Err(StoreError::not_found("Order"));
        }
    }

    let complaint = state.db.insert_complaint(&NewComplaint {
        user_id: user.map(|u| u.id.as_str()),
        email: &email,
        order_id,
        subject: &subject,
        message: &message,
    })?;
    info!("Complaint {} received", complaint.id);
    state
        .notifier
        .publish_logged(
            NotificationKind::ComplaintReceived,
            format!("New complaint: {}", complaint.subject),
            format!("From {}", complaint.email),
            Some(format!("/admin/complaints/{}", complaint.id)),
        )
        .await;
    Ok(complaint)
}

pub fn list_mine(state: &AppState, user: &User) -> Result<Vec<Complaint>> {
    state.db.complaints_for_user(&user.id)
}

pub fn list(state: &AppState, status: Option<ComplaintStatus>, page: PageRequest) -> Result<Page<Complaint>> {
    let (complaints, total) = state.db.list_complaints(status, page)?;
    Ok(page.wrap(complaints, total))
}

pub fn get(state: &AppState, id: &str) -> Result<Complaint> {
    state
        .db
        .get_complaint(id)?
        .ok_or_else(|| StoreError::not_found("Complaint"))
}

/// Any status may follow any other. A new response is emailed to the complainant.
pub async fn update(state: &AppState, id: &str, update: &ComplaintUpdate) -> Result<Complaint> {
    let response = match update.admin_response.as_deref() {
        Some(r) => Some(text_len("Response", r, 1, 5000)?),
        None => None,
    };
    if update.status.is_none() && response.is_none() {
        return Err(StoreError::validation("Nothing to update"));
    }
    let complaint = state
        .db
        .update_complaint(id, update.status, response.as_deref())?
        .ok_or_else(|| StoreError::not_found("Complaint"))?;
    if let Some(response) = &response {
        let email = templates::complaint_response(&complaint.email, &complaint.subject, response);
        send_logged(state.mailer.as_ref(), &email).await;
    }
    Ok(complaint)
}
