use async_trait::async_trait;

use crate::auth::models::AccessLevel;
use crate::db::items::{from_item, to_item, ItemAccess};
use crate::db::models::Authorization;
use crate::error::AppError;
use crate::store::client::string_item;

/// Repository trait for the user/page access relation.
///
/// This trait allows mocking the database layer in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    /// Create or overwrite the grant for (`user_id`, `page_id`).
    ///
    /// No range check is applied to `level`.
    async fn grant(&self, user_id: &str, page_id: &str, level: AccessLevel)
        -> Result<(), AppError>;

    /// Create or overwrite a full authorization record, owner included.
    async fn store(&self, authorization: &Authorization) -> Result<(), AppError>;

    /// Remove the grant for (`user_id`, `page_id`), if any.
    async fn revoke(&self, user_id: &str, page_id: &str) -> Result<(), AppError>;

    /// Find the grant for (`user_id`, `page_id`).
    ///
    /// `None` means there is no explicit grant; page-level visibility rules
    /// are the caller's business.
    async fn lookup(&self, user_id: &str, page_id: &str)
        -> Result<Option<Authorization>, AppError>;

    /// List every grant held by `user_id`.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Authorization>, AppError>;

    /// List every grant on `page_id`, across users.
    async fn list_for_page(&self, page_id: &str) -> Result<Vec<Authorization>, AppError>;
}

/// Authorization records kept in a table keyed by (`userid`, `pageid`).
pub struct ItemAuthorizationRepository {
    items: ItemAccess,
    table: String,
    page_index: String,
}

impl ItemAuthorizationRepository {
    pub fn new(items: ItemAccess, table: impl Into<String>, page_index: impl Into<String>) -> Self {
        Self {
            items,
            table: table.into(),
            page_index: page_index.into(),
        }
    }
}

#[async_trait]
impl AuthorizationRepository for ItemAuthorizationRepository {
    async fn grant(
        &self,
        user_id: &str,
        page_id: &str,
        level: AccessLevel,
    ) -> Result<(), AppError> {
        self.store(&Authorization::new(user_id, page_id, level)).await
    }

    async fn store(&self, authorization: &Authorization) -> Result<(), AppError> {
        self.items
            .add_item(&self.table, to_item(authorization)?)
            .await?;

        tracing::info!(
            "Granted {} on page '{}' to '{}'",
            authorization.level,
            authorization.page_id,
            authorization.user_id
        );
        Ok(())
    }

    async fn revoke(&self, user_id: &str, page_id: &str) -> Result<(), AppError> {
        self.items
            .remove_item(
                &self.table,
                &string_item(&[("userid", user_id), ("pageid", page_id)]),
            )
            .await
    }

    async fn lookup(
        &self,
        user_id: &str,
        page_id: &str,
    ) -> Result<Option<Authorization>, AppError> {
        self.items
            .retrieve_item(
                &self.table,
                &string_item(&[("userid", user_id), ("pageid", page_id)]),
            )
            .await?
            .map(from_item)
            .transpose()
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Authorization>, AppError> {
        let list = self
            .items
            .list_items(&self.table, &string_item(&[("userid", user_id)]))
            .await?;

        list.items.into_iter().map(from_item).collect()
    }

    async fn list_for_page(&self, page_id: &str) -> Result<Vec<Authorization>, AppError> {
        let list = self
            .items
            .list_items_by_index(
                &self.table,
                &self.page_index,
                &string_item(&[("pageid", page_id)]),
            )
            .await?;

        list.items.into_iter().map(from_item).collect()
    }
}
