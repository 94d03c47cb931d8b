use super::validation::slugify;
use crate::db::products::{ProductFilter, ProductSort};
use crate::error::{Result, StoreError};
use crate::state::AppState;
use crate::types::{Category, Page, PageRequest, ProductDetail, ProductListing};
use serde::Deserialize;
use tracing::debug;

/// Query-string form of a storefront search.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub hair_type: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    #[serde(default)]
    pub in_stock: bool,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductQuery {
    pub fn filter(&self) -> ProductFilter {
        ProductFilter {
            q: self.q.clone(),
            category: self.category.clone(),
            hair_type: self.hair_type.clone(),
            min_price_cents: self.min_price,
            max_price_cents: self.max_price,
            in_stock_only: self.in_stock,
            include_inactive: false,
            sort: self.sort,
        }
    }

    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

pub fn list_products(state: &AppState, query: &ProductQuery) -> Result<Page<ProductListing>> {
    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        if min > max {
            return Err(StoreError::validation("min_price cannot exceed max_price"));
        }
    }
    let page = query.page();
    let (items, total) = state.db.list_products(&query.filter(), page)?;
    Ok(page.wrap(items, total))
}

/// Counts a view on every successful lookup.
pub fn get_product(state: &AppState, slug: &str) -> Result<ProductDetail> {
    let product = state
        .db
        .get_product_by_slug(slug)?
        .filter(|p| p.active)
        .ok_or_else(|| StoreError::not_found("Product"))?;
    state.db.increment_product_views(&product.id)?;
    let rating = state.db.rating_summary(&product.id)?;
    debug!("Product {} viewed", product.slug);
    Ok(ProductDetail { product, rating })
}

pub fn categories(state: &AppState) -> Result<Vec<Category>> {
    state.db.categories()
}

/// Slug for `name` that no product uses yet, adding `-2`, `-3`, ... as needed.
pub fn unique_slug(state: &AppState, name: &str) -> Result<String> {
    let base = match slugify(name) {
        s if s.is_empty() => "product".to_string(),
        s => s,
    };
    if !state.db.slug_exists(&base)? {
        return Ok(base);
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !state.db.slug_exists(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}
