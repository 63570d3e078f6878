use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use common::{
    Cart, CartItem, Money, Order, OrderDraft, OrderId, OrderLineSnapshot, OrderStatus,
    PaymentStatus, Product, ProductId, UserId,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Page, PageRequest, Result, StoreError,
    store::{CartStore, InventoryStore, OrderRepository, Placement, StatusTransition},
};

const PRODUCT_COLUMNS: &str = "id, name, images, price_cents, stock, is_active, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, customer_id, shipping_address, payment_method, total_price_cents, \
     payment_status, status, paid_at, idempotency_key, created_at, updated_at";

/// PostgreSQL-backed store.
///
/// Placement and cancellation each run in a single transaction. Stock is
/// only ever changed by conditional `UPDATE` statements, so concurrent
/// transactions serialize on the product rows they share and nothing else.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

/// Timestamps are truncated to the column precision so returned records
/// match what a later read produces.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn to_db_int(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::InvalidRecord(format!("value {value} exceeds column range")))
}

fn from_db_int(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidRecord(format!("negative {column}: {value}")))
}

fn from_db_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: std::str::FromStr<Err = common::ParseEnumError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e: common::ParseEnumError| StoreError::InvalidRecord(e.to_string()))
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            images: row.try_get("images")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: from_db_int(row.try_get("stock")?, "stock")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLineSnapshot> {
        Ok(OrderLineSnapshot {
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            name: row.try_get("name")?,
            image: row.try_get("image")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity: from_db_int(row.try_get("quantity")?, "quantity")?,
        })
    }

    fn row_to_order(row: &PgRow, lines: Vec<OrderLineSnapshot>) -> Result<Order> {
        let shipping_address: serde_json::Value = row.try_get("shipping_address")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: UserId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            lines,
            shipping_address: serde_json::from_value(shipping_address)?,
            payment_method: parse_column(row, "payment_method")?,
            total_price: Money::from_cents(row.try_get("total_price_cents")?),
            payment_status: parse_column(row, "payment_status")?,
            status: parse_column(row, "status")?,
            paid_at: row.try_get("paid_at")?,
            idempotency_key: row.try_get("idempotency_key")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Attaches line snapshots to order rows, preserving row order.
    async fn hydrate_orders(conn: &mut PgConnection, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let line_rows = sqlx::query(
            r#"
            SELECT order_id, product_id, name, image, unit_price_cents, quantity
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut lines: HashMap<Uuid, Vec<OrderLineSnapshot>> = HashMap::new();
        for row in &line_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            lines
                .entry(order_id)
                .or_default()
                .push(Self::row_to_line(row)?);
        }

        rows.iter()
            .zip(ids)
            .map(|(row, id)| Self::row_to_order(row, lines.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn fetch_order(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Self::hydrate_orders(conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn ensure_cart(conn: &mut PgConnection, customer_id: UserId) -> Result<()> {
        sqlx::query("INSERT INTO carts (customer_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(customer_id.as_uuid())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Locks the cart row for the rest of the transaction and returns its version.
    ///
    /// Every cart writer takes this lock before touching `cart_items`, so
    /// cart edits and placement always lock rows in the same order.
    async fn lock_cart(conn: &mut PgConnection, customer_id: UserId) -> Result<u64> {
        Self::try_lock_cart(conn, customer_id)
            .await?
            .ok_or_else(|| StoreError::InvalidRecord(format!("no cart row for {customer_id}")))
    }

    /// Like [`Self::lock_cart`], but `None` when the customer has no cart yet.
    async fn try_lock_cart(conn: &mut PgConnection, customer_id: UserId) -> Result<Option<u64>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM carts WHERE customer_id = $1 FOR UPDATE")
                .bind(customer_id.as_uuid())
                .fetch_optional(&mut *conn)
                .await?;
        Ok(version.map(from_db_count))
    }

    async fn bump_cart_version(conn: &mut PgConnection, customer_id: UserId) -> Result<()> {
        sqlx::query("UPDATE carts SET version = version + 1 WHERE customer_id = $1")
            .bind(customer_id.as_uuid())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn load_cart(conn: &mut PgConnection, customer_id: UserId) -> Result<Cart> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM carts WHERE customer_id = $1")
                .bind(customer_id.as_uuid())
                .fetch_optional(&mut *conn)
                .await?;

        let Some(version) = version else {
            return Ok(Cart::new(customer_id));
        };

        let rows = sqlx::query(
            "SELECT product_id, quantity FROM cart_items WHERE customer_id = $1 ORDER BY position",
        )
        .bind(customer_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

        let items = rows
            .iter()
            .map(|row| {
                Ok(CartItem {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    quantity: from_db_int(row.try_get("quantity")?, "quantity")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Cart {
            customer_id,
            items,
            version: from_db_count(version),
        })
    }

    /// Explains why a conditional decrement matched no row.
    async fn decrement_failure(
        conn: &mut PgConnection,
        product_id: ProductId,
        requested: u32,
    ) -> Result<StoreError> {
        let row = sqlx::query("SELECT name, stock, is_active FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;

        let Some(row) = row else {
            return Ok(StoreError::ProductUnavailable(product_id));
        };
        if !row.try_get::<bool, _>("is_active")? {
            return Ok(StoreError::ProductUnavailable(product_id));
        }
        Ok(StoreError::InsufficientStock {
            product_id,
            name: row.try_get("name")?,
            requested,
            available: from_db_int(row.try_get("stock")?, "stock")?,
        })
    }
}

#[async_trait]
impl InventoryStore for PostgresStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn upsert_product(&self, product: Product) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, images, price_cents, stock, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                images = EXCLUDED.images,
                price_cents = EXCLUDED.price_cents,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.images)
        .bind(product.price.cents())
        .bind(to_db_int(product.stock)?)
        .bind(product.is_active)
        .bind(now())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(&row)
    }

    async fn deactivate_product(&self, id: ProductId) -> Result<Product> {
        let row = sqlx::query(&format!(
            "UPDATE products SET is_active = FALSE, updated_at = $2 WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::ProductNotFound(id))?;

        Self::row_to_product(&row)
    }

    async fn conditional_decrement_stock(&self, id: ProductId, quantity: u32) -> Result<u32> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products SET stock = stock - $2, updated_at = $3
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(id.as_uuid())
        .bind(to_db_int(quantity)?)
        .bind(now())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(remaining) = remaining {
            return from_db_int(remaining, "stock");
        }

        let row = sqlx::query("SELECT name, stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Err(StoreError::InsufficientStock {
                product_id: id,
                name: row.try_get("name")?,
                requested: quantity,
                available: from_db_int(row.try_get("stock")?, "stock")?,
            }),
            None => Err(StoreError::ProductNotFound(id)),
        }
    }

    async fn increment_stock(&self, id: ProductId, quantity: u32) -> Result<u32> {
        let stock: i32 = sqlx::query_scalar(
            "UPDATE products SET stock = stock + $2, updated_at = $3 WHERE id = $1 RETURNING stock",
        )
        .bind(id.as_uuid())
        .bind(to_db_int(quantity)?)
        .bind(now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::ProductNotFound(id))?;

        from_db_int(stock, "stock")
    }

    async fn product_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(from_db_count(count))
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_cart(&self, customer_id: UserId) -> Result<Cart> {
        let mut conn = self.pool.acquire().await?;
        Self::load_cart(&mut conn, customer_id).await
    }

    async fn add_cart_item(
        &self,
        customer_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        let mut tx = self.pool.begin().await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
                .bind(product_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            return Err(StoreError::ProductNotFound(product_id));
        }

        Self::ensure_cart(&mut tx, customer_id).await?;
        Self::lock_cart(&mut tx, customer_id).await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (customer_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (customer_id, product_id) DO UPDATE SET
                quantity = LEAST(cart_items.quantity::BIGINT + EXCLUDED.quantity, 2147483647)::INTEGER
            "#,
        )
        .bind(customer_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(to_db_int(quantity)?)
        .execute(&mut *tx)
        .await?;

        Self::bump_cart_version(&mut tx, customer_id).await?;
        let cart = Self::load_cart(&mut tx, customer_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn remove_cart_item(&self, customer_id: UserId, product_id: ProductId) -> Result<Cart> {
        let mut tx = self.pool.begin().await?;
        if Self::try_lock_cart(&mut tx, customer_id).await?.is_none() {
            return Ok(Cart::new(customer_id));
        }

        let removed = sqlx::query("DELETE FROM cart_items WHERE customer_id = $1 AND product_id = $2")
            .bind(customer_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() > 0 {
            Self::bump_cart_version(&mut tx, customer_id).await?;
        }

        let cart = Self::load_cart(&mut tx, customer_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn set_cart_item_quantity(
        &self,
        customer_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        let mut tx = self.pool.begin().await?;
        if Self::try_lock_cart(&mut tx, customer_id).await?.is_none() {
            return Err(StoreError::CartItemNotFound { product_id });
        }

        let updated = sqlx::query(
            "UPDATE cart_items SET quantity = $3 WHERE customer_id = $1 AND product_id = $2",
        )
        .bind(customer_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(to_db_int(quantity)?)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::CartItemNotFound { product_id });
        }

        Self::bump_cart_version(&mut tx, customer_id).await?;
        let cart = Self::load_cart(&mut tx, customer_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn register_customer(&self, customer_id: UserId) -> Result<()> {
        sqlx::query("INSERT INTO customers (id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(customer_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn customer_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        Ok(from_db_count(count))
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn create_order_atomic(
        &self,
        mut draft: OrderDraft,
        expected_cart_version: u64,
    ) -> Result<Placement> {
        let customer_id = draft.customer_id;

        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.pool.begin().await?;

        Self::ensure_cart(&mut tx, customer_id).await?;
        let cart_version = Self::lock_cart(&mut tx, customer_id).await?;

        if let Some(key) = &draft.idempotency_key {
            let existing: Option<Uuid> = sqlx::query_scalar(
                "SELECT id FROM orders WHERE customer_id = $1 AND idempotency_key = $2",
            )
            .bind(customer_id.as_uuid())
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(id) = existing {
                let order_id = OrderId::from_uuid(id);
                let order = Self::fetch_order(&mut tx, order_id)
                    .await?
                    .ok_or(StoreError::OrderNotFound(order_id))?;
                tx.commit().await?;
                return Ok(Placement::Replayed(order));
            }
        }

        if cart_version != expected_cart_version {
            return Err(StoreError::CartVersionConflict {
                customer_id,
                expected: expected_cart_version,
                actual: cart_version,
            });
        }

        let placed_at = now();
        for (product_id, requested) in draft.stock_requirements() {
            let updated = sqlx::query(&format!(
                r#"
                UPDATE products SET stock = stock - $2, updated_at = $3
                WHERE id = $1 AND stock >= $2 AND is_active
                RETURNING {PRODUCT_COLUMNS}
                "#
            ))
            .bind(product_id.as_uuid())
            .bind(to_db_int(requested)?)
            .bind(placed_at)
            .fetch_optional(&mut *tx)
            .await?;

            match updated {
                Some(row) => draft.recapture(&Self::row_to_product(&row)?),
                None => {
                    return Err(Self::decrement_failure(&mut tx, product_id, requested).await?);
                }
            }
        }

        let order = Order::place(OrderId::new(), draft, placed_at);

        sqlx::query(&format!(
            r#"
            INSERT INTO orders ({ORDER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#
        ))
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(serde_json::to_value(&order.shipping_address)?)
        .bind(order.payment_method.as_str())
        .bind(order.total_price.cents())
        .bind(order.payment_status.as_str())
        .bind(order.status.as_str())
        .bind(order.paid_at)
        .bind(&order.idempotency_key)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, line_no, product_id, name, image, unit_price_cents, quantity)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(i32::try_from(line_no).map_err(|_| {
                StoreError::InvalidRecord(format!("too many order lines: {line_no}"))
            })?)
            .bind(line.product_id.as_uuid())
            .bind(&line.name)
            .bind(&line.image)
            .bind(line.unit_price.cents())
            .bind(to_db_int(line.quantity)?)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE customer_id = $1")
            .bind(customer_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        Self::bump_cart_version(&mut tx, customer_id).await?;

        tx.commit().await?;

        tracing::debug!(order_id = %order.id, lines = order.lines.len(), "order committed");
        Ok(Placement::Created(order))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_order(&mut conn, id).await
    }

    async fn find_order_by_idempotency_key(
        &self,
        customer_id: UserId,
        key: &str,
    ) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE customer_id = $1 AND idempotency_key = $2",
        )
        .bind(customer_id.as_uuid())
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

        match existing {
            Some(id) => Self::fetch_order(&mut conn, OrderId::from_uuid(id)).await,
            None => Ok(None),
        }
    }

    async fn list_orders_for_customer(
        &self,
        customer_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Order>> {
        let mut conn = self.pool.acquire().await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE customer_id = $1")
            .bind(customer_id.as_uuid())
            .fetch_one(&mut *conn)
            .await?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE customer_id = $1
            ORDER BY seq DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(customer_id.as_uuid())
        .bind(i64::from(page.limit))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&mut *conn)
        .await?;

        Ok(Page {
            items: Self::hydrate_orders(&mut conn, rows).await?,
            total: from_db_count(total),
            request: page,
        })
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY seq DESC"))
            .fetch_all(&mut *conn)
            .await?;
        Self::hydrate_orders(&mut conn, rows).await
    }

    async fn transition_order_status(
        &self,
        id: OrderId,
        transition: StatusTransition,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::OrderNotFound(id))?;
        let current: OrderStatus = parse_column(&current, "status")?;

        if current != transition.expected {
            return Err(StoreError::StatusConflict {
                order_id: id,
                expected: transition.expected,
                actual: current,
            });
        }

        let changed_at = now();
        if transition.restore_inventory {
            let order = Self::fetch_order(&mut tx, id)
                .await?
                .ok_or(StoreError::OrderNotFound(id))?;

            for (&product_id, &quantity) in &order.stock_requirements() {
                let restored = sqlx::query(
                    "UPDATE products SET stock = stock + $2, updated_at = $3 WHERE id = $1",
                )
                .bind(product_id.as_uuid())
                .bind(to_db_int(quantity)?)
                .bind(changed_at)
                .execute(&mut *tx)
                .await?;

                if restored.rows_affected() == 0 {
                    return Err(StoreError::ProductNotFound(product_id));
                }
            }
        }

        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(transition.target.as_str())
            .bind(changed_at)
            .execute(&mut *tx)
            .await?;

        let order = Self::fetch_order(&mut tx, id)
            .await?
            .ok_or(StoreError::OrderNotFound(id))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn set_payment_status(&self, id: OrderId, status: PaymentStatus) -> Result<Order> {
        let mut conn = self.pool.acquire().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders SET
                payment_status = $2,
                paid_at = CASE WHEN $2 = 'Paid' THEN $3 ELSE paid_at END,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(now())
        .execute(&mut *conn)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(id));
        }

        Self::fetch_order(&mut conn, id)
            .await?
            .ok_or(StoreError::OrderNotFound(id))
    }

    async fn order_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(from_db_count(count))
    }

    async fn paid_revenue(&self) -> Result<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_price_cents), 0)::BIGINT FROM orders WHERE payment_status = 'Paid'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_cents(cents))
    }
}
