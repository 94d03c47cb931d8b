use super::validation::text_len;
use crate::error::{Result, StoreError};
use crate::state::AppState;
use crate::types::{Address, AddressInput};

fn optional_len(field: &str, value: &Option<String>, max: usize) -> Result<()> {
    match value.as_deref().map(str::trim) {
        Some(v) if v.chars().count() > max => Err(StoreError::validation(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

pub fn validate(input: &AddressInput) -> Result<()> {
    text_len("Recipient", &input.recipient, 1, 100)?;
    text_len("Address line 1", &input.line1, 1, 200)?;
    text_len("City", &input.city, 1, 100)?;
    text_len("Postal code", &input.postal_code, 1, 20)?;
    text_len("Country", &input.country, 1, 60)?;
    optional_len("Label", &input.label, 50)?;
    optional_len("Address line 2", &input.line2, 200)?;
    optional_len("Region", &input.region, 100)?;
    super::validation::phone(input.phone.as_deref())?;
    Ok(())
}

pub fn list(state: &AppState, user_id: &str) -> Result<Vec<Address>> {
    state.db.list_addresses(user_id)
}

pub fn create(state: &AppState, user_id: &str, input: &AddressInput) -> Result<Address> {
    validate(input)?;
    state.db.insert_address(user_id, input)
}

pub fn update(state: &AppState, user_id: &str, id: &str, input: &AddressInput) -> Result<Address> {
    validate(input)?;
    state
        .db
        .update_address(user_id, id, input)?
        .ok_or_else(|| StoreError::not_found("Address"))
}

pub fn delete(state: &AppState, user_id: &str, id: &str) -> Result<()> {
    if !state.db.delete_address(user_id, id)? {
        return Err(StoreError::not_found("Address"));
    }
    Ok(())
}

pub fn set_default(state: &AppState, user_id: &str, id: &str) -> Result<Vec<Address>> {
    if !state.db.set_default_address(user_id, id)? {
        return Err(StoreError::not_found("Address"));
    }
    state.db.list_addresses(user_id)
}
