pub mod account;
pub mod admin;
pub mod extract;
pub mod middleware;
pub mod public;
pub mod shop;
pub mod storefront;

use crate::types::PageRequest;
use serde::Deserialize;

/// `?page=&per_page=` on list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}
