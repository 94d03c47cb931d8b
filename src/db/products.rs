use super::{get_ts, like_pattern, new_id, placeholders, ts, Database};
use crate::error::{Result, StoreError};
use crate::types::{Category, PageRequest, Product, ProductListing, RatingSummary};
use chrono::Utc;
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension, Row};
use serde::Deserialize;

pub(crate) const PRODUCT_COLUMNS: &str = "p.id, p.slug, p.name, p.description, p.category, p.hair_types, \
     p.price_cents, p.compare_at_cents, p.stock, p.image_url, p.active, p.created_at, p.updated_at";

/// Number of columns in [`PRODUCT_COLUMNS`].
pub(crate) const PRODUCT_COLUMN_COUNT: usize = 13;

pub(crate) fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let hair_types: String = row.get(5)?;
    Ok(Product {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        hair_types: decode_hair_types(&hair_types),
        price_cents: row.get(6)?,
        compare_at_cents: row.get(7)?,
        stock: row.get(8)?,
        image_url: row.get(9)?,
        active: row.get(10)?,
        created_at: get_ts(row, 11)?,
        updated_at: get_ts(row, 12)?,
    })
}

/// Hair types are stored as `,curly,coily,` so a single `LIKE '%,curly,%'`
/// matches whole entries only.
pub(crate) fn encode_hair_types(types: &[String]) -> String {
    let cleaned: Vec<String> = types
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty() && !t.contains(','))
        .collect();
    if cleaned.is_empty() {
        String::new()
    } else {
        format!(",{},", cleaned.join(","))
    }
}

fn decode_hair_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
    Rating,
    Popular,
}

impl ProductSort {
    fn order_by(&self) -> &'static str {
        match self {
            ProductSort::Newest => "p.created_at DESC, p.id",
            ProductSort::PriceAsc => "p.price_cents ASC, p.name COLLATE NOCASE",
            ProductSort::PriceDesc => "p.price_cents DESC, p.name COLLATE NOCASE",
            ProductSort::Name => "p.name COLLATE NOCASE ASC, p.id",
            ProductSort::Rating => "rating_average DESC, rating_count DESC, p.name COLLATE NOCASE",
            ProductSort::Popular => "COALESCE(v.views, 0) DESC, p.name COLLATE NOCASE",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub q: Option<String>,
    pub category: Option<String>,
    pub hair_type: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    pub in_stock_only: bool,
    /// Storefront listings hide inactive products; the back office sees all.
    pub include_inactive: bool,
    pub sort: ProductSort,
}

impl ProductFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values = Vec::new();
        if !self.include_inactive {
            clauses.push("p.active = 1");
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            clauses.push(
                "(LOWER(p.name) LIKE ? ESCAPE '\\' OR LOWER(p.description) LIKE ? ESCAPE '\\')",
            );
            let pattern = like_pattern(q);
            values.push(Value::Text(pattern.clone()));
            values.push(Value::Text(pattern));
        }
        if let Some(category) = self.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            clauses.push("p.category = ? COLLATE NOCASE");
            values.push(Value::Text(category.to_string()));
        }
        if let Some(hair_type) = self.hair_type.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
            clauses.push("p.hair_types LIKE ? ESCAPE '\\'");
            values.push(Value::Text(like_pattern(&format!(",{hair_type},"))));
        }
        if let Some(min) = self.min_price_cents {
            clauses.push("p.price_cents >= ?");
            values.push(Value::Integer(min));
        }
        if let Some(max) = self.max_price_cents {
            clauses.push("p.price_cents <= ?");
            values.push(Value::Integer(max));
        }
        if self.in_stock_only {
            clauses.push("p.stock > 0");
        }
        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        (sql, values)
    }
}

/// Fields for a new catalog entry. The slug is chosen by the caller.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub hair_types: Vec<String>,
    pub price_cents: i64,
    pub compare_at_cents: Option<i64>,
    pub stock: i64,
    pub image_url: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductBulkAction {
    Activate,
    Deactivate,
    Delete,
}

impl Database {
    pub fn insert_product(&self, new: &NewProduct) -> Result<Product> {
        let now = Utc::now();
        let product = Product {
            id: new_id(),
            slug: new.slug.clone(),
            name: new.name.clone(),
            description: new.description.clone(),
            category: new.category.clone(),
            hair_types: decode_hair_types(&encode_hair_types(&new.hair_types)),
            price_cents: new.price_cents,
            compare_at_cents: new.compare_at_cents,
            stock: new.stock,
            image_url: new.image_url.clone(),
            active: new.active,
            created_at: now,
            updated_at: now,
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO products (id, slug, name, description, category, hair_types, price_cents,
                                   compare_at_cents, stock, image_url, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                product.id,
                product.slug,
                product.name,
                product.description,
                product.category,
                encode_hair_types(&product.hair_types),
                product.price_cents,
                product.compare_at_cents,
                product.stock,
                product.image_url,
                product.active,
                ts(&now),
            ],
        )?;
        Ok(product)
    }

    pub fn slug_exists(&self, slug: &str) -> Result<bool> {
        let conn = self.conn()?;
        let exists = conn
            .query_row("SELECT 1 FROM products WHERE slug = ?1", params![slug], |_| Ok(()))
            .optional()?
            .is_some();
        Ok(exists)
    }

    pub fn get_product(&self, id: &str) -> Result<Option<Product>> {
        let conn = self.conn()?;
        let product = conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ?1"),
                params![id],
                product_from_row,
            )
            .optional()?;
        Ok(product)
    }

    pub fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let conn = self.conn()?;
        let product = conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.slug = ?1"),
                params![slug],
                product_from_row,
            )
            .optional()?;
        Ok(product)
    }

    /// Persist every editable field of `product` and bump `updated_at`.
    pub fn save_product(&self, product: &Product) -> Result<Product> {
        let now = Utc::now();
        {
            let conn = self.conn()?;
            let changed = conn.execute(
                "UPDATE products SET name = ?2, description = ?3, category = ?4, hair_types = ?5,
                        price_cents = ?6, compare_at_cents = ?7, stock = ?8, image_url = ?9,
                        active = ?10, updated_at = ?11
                 WHERE id = ?1",
                params![
                    product.id,
                    product.name,
                    product.description,
                    product.category,
                    encode_hair_types(&product.hair_types),
                    product.price_cents,
                    product.compare_at_cents,
                    product.stock,
                    product.image_url,
                    product.active,
                    ts(&now),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("Product"));
            }
        }
        self.get_product(&product.id)?
            .ok_or_else(|| StoreError::not_found("Product"))
    }

    pub fn delete_product(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM products WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Change stock by `delta`. The result may not go below zero.
    pub fn adjust_stock(&self, id: &str, delta: i64) -> Result<Product> {
        {
            let conn = self.conn()?;
            let current: Option<i64> = conn
                .query_row("SELECT stock FROM products WHERE id = ?1", params![id], |row| row.get(0))
                .optional()?;
            let current = current.ok_or_else(|| StoreError::not_found("Product"))?;
            let next = current
                .checked_add(delta)
                .ok_or_else(|| StoreError::validation("Stock adjustment overflows"))?;
            if next < 0 {
                return Err(StoreError::validation(format!(
                    "Stock cannot go below zero (currently {current})"
                )));
            }
            conn.execute(
                "UPDATE products SET stock = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, next, ts(&Utc::now())],
            )?;
        }
        self.get_product(id)?.ok_or_else(|| StoreError::not_found("Product"))
    }

    /// Apply one action to many products in a single transaction.
    /// Returns how many rows were affected.
    pub fn bulk_product_action(&self, ids: &[String], action: ProductBulkAction) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let in_list = placeholders(ids.len());
        let affected = match action {
            ProductBulkAction::Activate | ProductBulkAction::Deactivate => {
                let active = action == ProductBulkAction::Activate;
                let mut values: Vec<Value> = vec![
                    Value::Integer(active as i64),
                    Value::Text(ts(&Utc::now())),
                ];
                values.extend(ids.iter().cloned().map(Value::Text));
                tx.execute(
                    &format!("UPDATE products SET active = ?, updated_at = ? WHERE id IN ({in_list})"),
                    params_from_iter(values.iter()),
                )?
            }
            ProductBulkAction::Delete => tx.execute(
                &format!("DELETE FROM products WHERE id IN ({in_list})"),
                params_from_iter(ids.iter()),
            )?,
        };
        tx.commit()?;
        Ok(affected)
    }

    pub fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> Result<(Vec<ProductListing>, i64)> {
        self.list_products_window(filter, page.limit(), page.offset())
    }

    /// Like [`Database::list_products`] but with a raw limit and offset.
    pub fn list_products_window(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ProductListing>, i64)> {
        let (where_sql, mut values) = filter.where_clause();
        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM products p {where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        values.push(Value::Integer(limit));
        values.push(Value::Integer(offset));
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS},
                    COALESCE(r.rating_average, 0.0) AS rating_average,
                    COALESCE(r.rating_count, 0) AS rating_count
             FROM products p
             LEFT JOIN (SELECT product_id, AVG(rating) AS rating_average, COUNT(*) AS rating_count
                        FROM reviews GROUP BY product_id) r ON r.product_id = p.id
             LEFT JOIN product_views v ON v.product_id = p.id
             {where_sql}
             ORDER BY {}
             LIMIT ? OFFSET ?",
            filter.sort.order_by()
        );
        let mut stmt = conn.prepare(&sql)?;
        let listings = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let average: f64 = row.get(PRODUCT_COLUMN_COUNT)?;
                Ok(ProductListing {
                    product: product_from_row(row)?,
                    rating_average: round_one_decimal(average),
                    rating_count: row.get(PRODUCT_COLUMN_COUNT + 1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((listings, total))
    }

    /// Categories with at least one active product, by name.
    pub fn categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) FROM products WHERE active = 1
             GROUP BY category ORDER BY category COLLATE NOCASE",
        )?;
        let categories = stmt
            .query_map([], |row| {
                Ok(Category {
                    name: row.get(0)?,
                    product_count: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    pub fn rating_summary(&self, product_id: &str) -> Result<RatingSummary> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT rating, COUNT(*) FROM reviews WHERE product_id = ?1 GROUP BY rating")?;
        let rows = stmt
            .query_map(params![product_id], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut summary = RatingSummary::default();
        let mut weighted = 0i64;
        for (rating, count) in rows {
            if (1..=5).contains(&rating) {
                summary.distribution[(rating - 1) as usize] = count;
                summary.count += count;
                weighted += rating * count;
            }
        }
        if summary.count > 0 {
            summary.average = round_one_decimal(weighted as f64 / summary.count as f64);
        }
        Ok(summary)
    }

    pub fn increment_product_views(&self, product_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO product_views (product_id, views) VALUES (?1, 1)
             ON CONFLICT(product_id) DO UPDATE SET views = views + 1",
            params![product_id],
        )?;
        Ok(())
    }

    pub fn product_views(&self, product_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let views = conn
            .query_row(
                "SELECT views FROM product_views WHERE product_id = ?1",
                params![product_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(views.unwrap_or(0))
    }

    /// Active products at or below the threshold, lowest stock first.
    pub fn low_stock_products(&self, threshold: i64) -> Result<Vec<Product>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p
             WHERE p.active = 1 AND p.stock <= ?1 ORDER BY p.stock ASC, p.name COLLATE NOCASE"
        ))?;
        let products = stmt
            .query_map(params![threshold], product_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }
}

pub(crate) fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(slug: &str, price: i64, category: &str, hair: &[&str]) -> NewProduct {
        NewProduct {
            slug: slug.to_string(),
            name: slug.replace('-', " "),
            description: format!("About {slug}"),
            category: category.to_string(),
            hair_types: hair.iter().map(|h| h.to_string()).collect(),
            price_cents: price,
            compare_at_cents: None,
            stock: 10,
            image_url: None,
            active: true,
        }
    }

    #[test]
    fn test_hair_type_filter_matches_whole_entries() {
        let db = Database::open_in_memory().unwrap();
        db.insert_product(&new_product("curl-cream", 1800, "Styling", &["Curly", "coily"]))
            .unwrap();
        db.insert_product(&new_product("wavy-spray", 1200, "Styling", &["wavy"]))
            .unwrap();

        let filter = ProductFilter {
            hair_type: Some("curly".into()),
            ..Default::default()
        };
        let (items, total) = db.list_products(&filter, PageRequest::default()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].product.slug, "curl-cream");
        assert_eq!(items[0].product.hair_types, vec!["curly", "coily"]);

        let filter = ProductFilter {
            hair_type: Some("curl".into()),
            ..Default::default()
        };
        let (_, total) = db.list_products(&filter, PageRequest::default()).unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn test_hair_type_wildcards_match_literally() {
        let db = Database::open_in_memory().unwrap();
        db.insert_product(&new_product("curl-cream", 1800, "Styling", &["curly"]))
            .unwrap();
        db.insert_product(&new_product("plain-gel", 900, "Styling", &["a"]))
            .unwrap();

        for wildcard in ["%", "_", "curl_", "c%"] {
            let filter = ProductFilter {
                hair_type: Some(wildcard.into()),
                ..Default::default()
            };
            let (_, total) = db.list_products(&filter, PageRequest::default()).unwrap();
            assert_eq!(total, 0, "hair_type {wildcard:?} should match nothing");
        }
    }

    #[test]
    fn test_price_sort_and_bounds() {
        let db = Database::open_in_memory().unwrap();
        db.insert_product(&new_product("a", 3000, "Care", &[])).unwrap();
        db.insert_product(&new_product("b", 1000, "Care", &[])).unwrap();
        db.insert_product(&new_product("c", 2000, "Care", &[])).unwrap();

        let filter = ProductFilter {
            sort: ProductSort::PriceAsc,
            max_price_cents: Some(2500),
            ..Default::default()
        };
        let (items, total) = db.list_products(&filter, PageRequest::default()).unwrap();
        assert_eq!(total, 2);
        let slugs: Vec<_> = items.iter().map(|l| l.product.slug.as_str()).collect();
        assert_eq!(slugs, vec!["b", "c"]);
    }

    #[test]
    fn test_adjust_stock_refuses_negative() {
        let db = Database::open_in_memory().unwrap();
        let product = db.insert_product(&new_product("gel", 900, "Styling", &[])).unwrap();
        assert_eq!(db.adjust_stock(&product.id, -4).unwrap().stock, 6);
        assert!(matches!(
            db.adjust_stock(&product.id, -7),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_bulk_deactivate_hides_from_storefront() {
        let db = Database::open_in_memory().unwrap();
        let a = db.insert_product(&new_product("a", 100, "Care", &[])).unwrap();
        let b = db.insert_product(&new_product("b", 100, "Care", &[])).unwrap();
        let affected = db
            .bulk_product_action(&[a.id.clone(), b.id.clone()], ProductBulkAction::Deactivate)
            .unwrap();
        assert_eq!(affected, 2);
        let (_, total) = db
            .list_products(&ProductFilter::default(), PageRequest::default())
            .unwrap();
        assert_eq!(total, 0);
        assert!(db.categories().unwrap().is_empty());
    }
}
