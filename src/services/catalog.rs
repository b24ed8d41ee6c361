use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use std::sync::Arc;

use crate::entities::{product, Product};
use crate::errors::ServiceError;

const STOREFRONT_PAGE_SIZE: u64 = 24;

/// Read access to the product catalog.
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<product::Model>, ServiceError> {
        self.get_by_id_with(self.db.as_ref(), id).await
    }

    /// Lookup over a caller-supplied connection so checkout can resolve
    /// products inside its own transaction.
    pub async fn get_by_id_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i64,
    ) -> Result<Option<product::Model>, ServiceError> {
        Product::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<product::Model, ServiceError> {
        Product::find()
            .filter(product::Column::Slug.eq(slug))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product '{}' not found", slug)))
    }

    /// Storefront landing page: newest products first.
    pub async fn list_recent(&self) -> Result<Vec<product::Model>, ServiceError> {
        Product::find()
            .order_by_desc(product::Column::CreatedAt)
            .limit(STOREFRONT_PAGE_SIZE)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Case-insensitive substring search over name and description. Both
    /// sides are lowered so the behavior does not depend on the backend's
    /// LIKE collation.
    pub async fn search(&self, query: &str) -> Result<Vec<product::Model>, ServiceError> {
        let pattern = format!("%{}%", query.trim().to_lowercase());
        Product::find()
            .filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(product::Column::Name)))
                            .like(&pattern),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(product::Column::Description)))
                            .like(&pattern),
                    ),
            )
            .order_by_desc(product::Column::CreatedAt)
            .limit(STOREFRONT_PAGE_SIZE)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
