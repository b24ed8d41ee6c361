use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status an order is created with.
pub const STATUS_PENDING: &str = "pending";
/// Status set by a confirmed payment; the only transition the checkout flow
/// performs itself. The admin back-office may write any other string.
pub const STATUS_PAID: &str = "paid";

/// Statuses the storefront itself knows about. Administrative overrides
/// outside this list are accepted but logged.
pub const KNOWN_STATUSES: &[&str] = &["pending", "paid", "shipped", "cancelled", "refunded"];

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Nullable: legacy and guest orders have no owning user.
    pub user_id: Option<i64>,
    pub total_amount: Decimal,
    pub status: String,
    /// Opaque reference to the gateway checkout session, once one exists.
    pub checkout_session_id: Option<String>,
    /// Payment-intent reference recorded by the winning `paid` transition.
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_paid(&self) -> bool {
        self.status == STATUS_PAID
    }
}
