use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::entities::{order, order_item, product, Order, OrderItem};
use crate::errors::ServiceError;

/// Persistence for orders and their snapshotted line items. Creation-side
/// methods are generic over the connection so checkout can drive them
/// inside a single transaction.
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Inserts a pending order with a zero total. Items and the final
    /// total are attached afterwards, inside the same transaction.
    pub async fn create_pending<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Option<i64>,
    ) -> Result<order::Model, ServiceError> {
        let model = order::ActiveModel {
            user_id: Set(user_id),
            total_amount: Set(Decimal::ZERO),
            status: Set(order::STATUS_PENDING.to_string()),
            checkout_session_id: Set(None),
            payment_intent_id: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(model.insert(conn).await?)
    }

    /// Snapshots one cart line onto an order: product name and unit price
    /// are copied so later catalog edits cannot rewrite history. Returns
    /// the line total.
    pub async fn attach_item<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: i64,
        product: &product::Model,
        quantity: i64,
    ) -> Result<Decimal, ServiceError> {
        let item = order_item::ActiveModel {
            order_id: Set(order_id),
            product_id: Set(product.id),
            product_name: Set(product.name.clone()),
            quantity: Set(quantity as i32),
            unit_price: Set(product.price),
            ..Default::default()
        };
        item.insert(conn).await?;
        Ok(product.price * Decimal::from(quantity))
    }

    /// Writes the summed total onto the order.
    pub async fn finalize_total<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: i64,
        total: Decimal,
    ) -> Result<(), ServiceError> {
        Order::update_many()
            .col_expr(order::Column::TotalAmount, Expr::value(total))
            .filter(order::Column::Id.eq(order_id))
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Records the gateway session reference on an order after the
    /// session has been created.
    pub async fn store_session_ref(
        &self,
        order_id: i64,
        session_id: &str,
    ) -> Result<(), ServiceError> {
        Order::update_many()
            .col_expr(
                order::Column::CheckoutSessionId,
                Expr::value(Some(session_id.to_string())),
            )
            .filter(order::Column::Id.eq(order_id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Marks an order paid. The transition is a conditional update so
    /// duplicate confirmations (redirect plus webhook, or retried
    /// webhooks) collapse to a single winner. Returns whether this call
    /// performed the transition.
    pub async fn mark_paid(
        &self,
        order_id: i64,
        payment_intent: Option<&str>,
    ) -> Result<bool, ServiceError> {
        let result = Order::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(order::STATUS_PAID.to_string()),
            )
            .col_expr(
                order::Column::PaymentIntentId,
                Expr::value(payment_intent.map(str::to_string)),
            )
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.ne(order::STATUS_PAID))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            // Either already paid or missing; callers that care check first.
            return Ok(false);
        }
        info!(order_id, "Order marked paid");
        Ok(true)
    }

    /// Administrative status override. Unknown statuses are accepted but
    /// logged, matching how back-office tooling uses free-form states.
    pub async fn set_status(&self, order_id: i64, status: &str) -> Result<order::Model, ServiceError> {
        let existing = self.get(order_id).await?;
        if !order::KNOWN_STATUSES.contains(&status) {
            warn!(order_id, %status, "Setting order to unrecognized status");
        }

        let old_status = existing.status.clone();
        let mut active: order::ActiveModel = existing.into();
        active.status = Set(status.to_string());
        let updated = active.update(self.db.as_ref()).await?;
        info!(order_id, %old_status, new_status = %status, "Order status updated");
        Ok(updated)
    }

    pub async fn get(&self, order_id: i64) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    pub async fn items_for(&self, order_id: i64) -> Result<Vec<order_item::Model>, ServiceError> {
        OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// A user's order history, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<order::Model>, ServiceError> {
        Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
