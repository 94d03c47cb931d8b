use crate::types::Review as StoreReview;
use async_graphql::{Object, ID};
use chrono::{DateTime, Utc};

/// A customer review of a product
#[derive(Clone)]
pub struct Review {
    pub inner: StoreReview,
}

impl From<StoreReview> for Review {
    fn from(review: StoreReview) -> Self {
        Self { inner: review }
    }
}

#[Object]
impl Review {
    async fn id(&self) -> ID {
        ID(self.inner.id.clone())
    }

    /// Display name of the reviewer
    async fn author_name(&self) -> &str {
        &self.inner.author_name
    }

    /// Stars from 1 to 5
    async fn rating(&self) -> i64 {
        self.inner.rating
    }

    async fn title(&self) -> &str {
        &self.inner.title
    }

    async fn body(&self) -> &str {
        &self.inner.body
    }

    /// Whether the reviewer bought the product
    async fn verified_purchase(&self) -> bool {
        self.inner.verified_purchase
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }
}
