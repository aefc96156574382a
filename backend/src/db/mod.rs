use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::*;

const PRODUCT_COLUMNS: &str = "id, api_id, title, description, category, brand, price, \
     discount_percentage, rating, stock, sku, weight, dimensions, warranty_information, \
     shipping_information, availability_status, reviews, return_policy, \
     minimum_order_quantity, meta, images, thumbnail, tags, created_at, updated_at";

// ── Reads ─────────────────────────────────────────────────────────────────────

pub async fn fetch_products(
    pool: &PgPool,
    filters: &ProductFilters,
) -> AppResult<Paginated<Product>> {
    let pattern = filters.search_pattern();

    let sql = format!(
        r#"
        SELECT {PRODUCT_COLUMNS}
        FROM products
        WHERE ($1::text IS NULL OR category = $1)
          AND ($2::text IS NULL OR title ILIKE $2 OR description ILIKE $2 OR brand ILIKE $2)
        ORDER BY created_at DESC, api_id ASC
        LIMIT $3 OFFSET $4
        "#
    );
    let products = sqlx::query_as::<_, Product>(&sql)
        .bind(filters.category.as_deref())
        .bind(pattern.as_deref())
        .bind(filters.per_page())
        .bind(filters.offset())
        .fetch_all(pool)
        .await?;

    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM products
        WHERE ($1::text IS NULL OR category = $1)
          AND ($2::text IS NULL OR title ILIKE $2 OR description ILIKE $2 OR brand ILIKE $2)
        "#,
    )
    .bind(filters.category.as_deref())
    .bind(pattern.as_deref())
    .fetch_one(pool)
    .await?;

    Ok(Paginated::new(products, filters, total))
}

pub async fn fetch_product_by_id(pool: &PgPool, id: Uuid) -> AppResult<Product> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
    sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

pub async fn fetch_categories(pool: &PgPool) -> AppResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT category FROM products WHERE category IS NOT NULL ORDER BY category",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}

pub async fn fetch_stats(pool: &PgPool) -> AppResult<ProductStats> {
    let stats = sqlx::query_as::<_, ProductStats>(
        r#"
        SELECT COUNT(*)                                   AS total_products,
               COUNT(DISTINCT category)                   AS total_categories,
               COUNT(DISTINCT brand)                      AS total_brands,
               AVG(price)                                 AS average_price,
               AVG(rating)                                AS average_rating,
               SUM(stock)::bigint                         AS total_stock,
               COUNT(*) FILTER (WHERE stock = 0)          AS out_of_stock
        FROM products
        "#,
    )
    .fetch_one(pool)
    .await?;
    Ok(stats)
}

pub async fn count_products(pool: &PgPool) -> AppResult<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

// ── Upsert ───────────────────────────────────────────────────────────────────

/// Insert or overwrite the row for `product.api_id`.
///
/// On conflict every catalog field is replaced; `id` and `created_at` of
/// the existing row are kept and `updated_at` is bumped.
pub async fn upsert_product(pool: &PgPool, product: &Product) -> AppResult<Product> {
    let sql = format!(
        r#"
        INSERT INTO products (
            id, api_id, title, description, category, brand, price, discount_percentage,
            rating, stock, sku, weight, dimensions, warranty_information, shipping_information,
            availability_status, reviews, return_policy, minimum_order_quantity, meta, images,
            thumbnail, tags
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23)
        ON CONFLICT (api_id) DO UPDATE
        SET title                  = EXCLUDED.title,
            description            = EXCLUDED.description,
            category               = EXCLUDED.category,
            brand                  = EXCLUDED.brand,
            price                  = EXCLUDED.price,
            discount_percentage    = EXCLUDED.discount_percentage,
            rating                 = EXCLUDED.rating,
            stock                  = EXCLUDED.stock,
            sku                    = EXCLUDED.sku,
            weight                 = EXCLUDED.weight,
            dimensions             = EXCLUDED.dimensions,
            warranty_information   = EXCLUDED.warranty_information,
            shipping_information   = EXCLUDED.shipping_information,
            availability_status    = EXCLUDED.availability_status,
            reviews                = EXCLUDED.reviews,
            return_policy          = EXCLUDED.return_policy,
            minimum_order_quantity = EXCLUDED.minimum_order_quantity,
            meta                   = EXCLUDED.meta,
            images                 = EXCLUDED.images,
            thumbnail              = EXCLUDED.thumbnail,
            tags                   = EXCLUDED.tags,
            updated_at             = NOW()
        RETURNING {PRODUCT_COLUMNS}
        "#
    );

    let stored = sqlx::query_as::<_, Product>(&sql)
        .bind(product.id)
        .bind(product.api_id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(product.price)
        .bind(product.discount_percentage)
        .bind(product.rating)
        .bind(product.stock)
        .bind(&product.sku)
        .bind(product.weight)
        .bind(&product.dimensions)
        .bind(&product.warranty_information)
        .bind(&product.shipping_information)
        .bind(&product.availability_status)
        .bind(&product.reviews)
        .bind(&product.return_policy)
        .bind(product.minimum_order_quantity)
        .bind(&product.meta)
        .bind(&product.images)
        .bind(&product.thumbnail)
        .bind(&product.tags)
        .fetch_one(pool)
        .await?;

    Ok(stored)
}
