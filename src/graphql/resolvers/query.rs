use crate::db::products::ProductFilter;
use crate::graphql::schema::GraphQLContext;
use crate::graphql::types::{Category, Product};
use crate::types::PageRequest;
use async_graphql::{Context, FieldResult, Object};

/// Root query object for GraphQL
pub struct Query;

#[Object]
impl Query {
    /// Active products, newest first
    async fn products(
        &self,
        ctx: &Context<'_>,
        search: Option<String>,
        category: Option<String>,
        hair_type: Option<String>,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> FieldResult<Vec<Product>> {
        let context = ctx.data::<GraphQLContext>()?;
        let filter = ProductFilter {
            q: search,
            category,
            hair_type,
            ..Default::default()
        };
        let limit = limit
            .map(|l| l.clamp(1, PageRequest::MAX_PER_PAGE as i32))
            .unwrap_or(PageRequest::DEFAULT_PER_PAGE as i32);
        let offset = offset.unwrap_or(0).max(0);

        let (listings, _) =
            context
                .state
                .db
                .list_products_window(&filter, limit as i64, offset as i64)?;
        Ok(listings.into_iter().map(|l| l.product.into()).collect())
    }

    /// A single active product by slug. Does not count as a storefront view.
    async fn product(&self, ctx: &Context<'_>, slug: String) -> FieldResult<Option<Product>> {
        let context = ctx.data::<GraphQLContext>()?;
        let product = context.state.db.get_product_by_slug(&slug)?;
        Ok(product.filter(|p| p.active).map(Product::from))
    }

    /// Categories that have active products
    async fn categories(&self, ctx: &Context<'_>) -> FieldResult<Vec<Category>> {
        let context = ctx.data::<GraphQLContext>()?;
        let categories = context.state.db.categories()?;
        Ok(categories.into_iter().map(Category::from).collect())
    }
}
