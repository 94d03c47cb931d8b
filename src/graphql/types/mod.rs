pub mod product;
pub mod review;

pub use product::{Category, Product, RatingSummary};
pub use review::Review;
