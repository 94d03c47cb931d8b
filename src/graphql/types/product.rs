use super::Review;
use crate::graphql::schema::GraphQLContext;
use crate::types::{
    format_money, Category as StoreCategory, PageRequest, Product as StoreProduct,
    RatingSummary as StoreRatingSummary,
};
use async_graphql::{Context, FieldResult, Object, SimpleObject, ID};
use chrono::{DateTime, Utc};

/// GraphQL representation of a catalog product
#[derive(Clone)]
pub struct Product {
    pub inner: StoreProduct,
}

impl From<StoreProduct> for Product {
    fn from(product: StoreProduct) -> Self {
        Self { inner: product }
    }
}

#[Object]
impl Product {
    async fn id(&self) -> ID {
        ID(self.inner.id.clone())
    }

    /// URL-safe identifier used in storefront links
    async fn slug(&self) -> &str {
        &self.inner.slug
    }

    async fn name(&self) -> &str {
        &self.inner.name
    }

    async fn description(&self) -> &str {
        &self.inner.description
    }

    async fn category(&self) -> &str {
        &self.inner.category
    }

    /// Hair types the product is made for, e.g. "curly"
    async fn hair_types(&self) -> Vec<String> {
        self.inner.hair_types.clone()
    }

    async fn price_cents(&self) -> i64 {
        self.inner.price_cents
    }

    /// Price formatted for display, e.g. "$12.99"
    async fn price(&self) -> String {
        format_money(self.inner.price_cents)
    }

    /// Original price when the product is on sale
    async fn compare_at_cents(&self) -> Option<i64> {
        self.inner.compare_at_cents
    }

    async fn in_stock(&self) -> bool {
        self.inner.stock > 0
    }

    async fn stock(&self) -> i64 {
        self.inner.stock
    }

    async fn image_url(&self) -> Option<&str> {
        self.inner.image_url.as_deref()
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Aggregate of all reviews
    async fn rating(&self, ctx: &Context<'_>) -> FieldResult<RatingSummary> {
        let context = ctx.data::<GraphQLContext>()?;
        let summary = context.state.db.rating_summary(&self.inner.id)?;
        Ok(summary.into())
    }

    /// Reviews, newest first
    async fn reviews(
        &self,
        ctx: &Context<'_>,
        page: Option<i32>,
        per_page: Option<i32>,
    ) -> FieldResult<Vec<Review>> {
        let context = ctx.data::<GraphQLContext>()?;
        let page = PageRequest::new(
            page.map(|p| p.max(1) as u32),
            per_page.map(|p| p.max(1) as u32),
        );
        let (reviews, _) = context.state.db.list_reviews(&self.inner.id, page)?;
        Ok(reviews.into_iter().map(Review::from).collect())
    }
}

#[derive(SimpleObject)]
pub struct RatingSummary {
    /// Mean rating rounded to one decimal, 0 when unreviewed
    pub average: f64,
    pub count: i64,
    /// Review counts for 1 through 5 stars
    pub distribution: Vec<i64>,
}

impl From<StoreRatingSummary> for RatingSummary {
    fn from(summary: StoreRatingSummary) -> Self {
        Self {
            average: summary.average,
            count: summary.count,
            distribution: summary.distribution.to_vec(),
        }
    }
}

#[derive(SimpleObject)]
pub struct Category {
    pub name: String,
    pub product_count: i64,
}

impl From<StoreCategory> for Category {
    fn from(category: StoreCategory) -> Self {
        Self {
            name: category.name,
            product_count: category.product_count,
        }
    }
}
