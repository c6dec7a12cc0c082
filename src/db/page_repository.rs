use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde_json::{Map, Value};

use crate::auth::models::Permission;
use crate::db::authorization_repository::AuthorizationRepository;
use crate::db::items::{from_item, to_item, ItemAccess};
use crate::db::models::{EditPageRequest, Page, PUBLIC_OWNER};
use crate::error::AppError;
use crate::store::client::{string_item, Item};

/// Repository trait for page content.
#[async_trait]
pub trait PageRepository: Send + Sync {
    /// Store a new page under a fresh id and return that id.
    ///
    /// Does not create the owner's authorization record.
    async fn create(
        &self,
        owner_id: &str,
        title: &str,
        text: &str,
        is_private: bool,
    ) -> Result<String, AppError>;

    /// Delete the page. Authorization records are left alone.
    async fn remove(&self, owner_id: &str, page_id: &str) -> Result<(), AppError>;

    /// Apply every present field of `changes` in a single write.
    async fn update(
        &self,
        owner_id: &str,
        page_id: &str,
        changes: &EditPageRequest,
    ) -> Result<(), AppError>;

    /// Update title and/or text; `None` leaves the field as it is.
    async fn edit(
        &self,
        owner_id: &str,
        page_id: &str,
        title: Option<&str>,
        text: Option<&str>,
    ) -> Result<(), AppError> {
        let changes = EditPageRequest {
            title: title.map(str::to_string),
            text: text.map(str::to_string),
            is_private: None,
        };
        self.update(owner_id, page_id, &changes).await
    }

    /// Change whether the page needs an explicit grant to be read.
    async fn set_private(
        &self,
        owner_id: &str,
        page_id: &str,
        is_private: bool,
    ) -> Result<(), AppError> {
        let changes = EditPageRequest {
            is_private: Some(is_private),
            ..Default::default()
        };
        self.update(owner_id, page_id, &changes).await
    }

    /// Find a page by its full key.
    async fn retrieve(&self, owner_id: &str, page_id: &str) -> Result<Option<Page>, AppError>;

    /// List every page owned by `owner_id`.
    async fn list_owned(&self, owner_id: &str) -> Result<Vec<Page>, AppError>;

    /// List every page owned by the public sentinel.
    async fn list_public(&self) -> Result<Vec<Page>, AppError> {
        self.list_owned(PUBLIC_OWNER).await
    }

    /// List the pages `user_id` owns, all public pages, and the pages other
    /// users shared with `user_id` at a readable level. No duplicates.
    async fn list_visible_to(
        &self,
        user_id: &str,
        authorizations: &dyn AuthorizationRepository,
    ) -> Result<Vec<Page>, AppError>;
}

/// Pages kept in a table keyed by (`userid`, `pageid`).
pub struct ItemPageRepository {
    items: ItemAccess,
    table: String,
}

impl ItemPageRepository {
    pub fn new(items: ItemAccess, table: impl Into<String>) -> Self {
        Self {
            items,
            table: table.into(),
        }
    }
}

fn page_key(owner_id: &str, page_id: &str) -> Item {
    string_item(&[("userid", owner_id), ("pageid", page_id)])
}

#[async_trait]
impl PageRepository for ItemPageRepository {
    async fn create(
        &self,
        owner_id: &str,
        title: &str,
        text: &str,
        is_private: bool,
    ) -> Result<String, AppError> {
        let page = Page {
            owner_id: owner_id.to_string(),
            page_id: uuid::Uuid::now_v7().to_string(),
            title: title.to_string(),
            text: text.to_string(),
            is_private,
            created_at: Utc::now(),
        };

        self.items.add_item(&self.table, to_item(&page)?).await?;

        tracing::info!("Created page '{}' for '{}'", page.page_id, owner_id);
        Ok(page.page_id)
    }

    async fn remove(&self, owner_id: &str, page_id: &str) -> Result<(), AppError> {
        self.items
            .remove_item(&self.table, &page_key(owner_id, page_id))
            .await?;

        tracing::info!("Removed page '{}' of '{}'", page_id, owner_id);
        Ok(())
    }

    async fn update(
        &self,
        owner_id: &str,
        page_id: &str,
        changes: &EditPageRequest,
    ) -> Result<(), AppError> {
        let mut item = Map::new();
        item.insert(
            "title".to_string(),
            changes.title.as_deref().map_or(Value::Null, Value::from),
        );
        item.insert(
            "text".to_string(),
            changes.text.as_deref().map_or(Value::Null, Value::from),
        );
        item.insert(
            "private".to_string(),
            changes.is_private.map_or(Value::Null, Value::Bool),
        );

        self.items
            .edit_item(&self.table, &page_key(owner_id, page_id), &item)
            .await
    }

    async fn retrieve(&self, owner_id: &str, page_id: &str) -> Result<Option<Page>, AppError> {
        self.items
            .retrieve_item(&self.table, &page_key(owner_id, page_id))
            .await?
            .map(from_item)
            .transpose()
    }

    async fn list_owned(&self, owner_id: &str) -> Result<Vec<Page>, AppError> {
        let list = self
            .items
            .list_items(&self.table, &string_item(&[("userid", owner_id)]))
            .await?;

        list.items.into_iter().map(from_item).collect()
    }

    async fn list_visible_to(
        &self,
        user_id: &str,
        authorizations: &dyn AuthorizationRepository,
    ) -> Result<Vec<Page>, AppError> {
        let mut pages = self.list_owned(user_id).await?;
        if user_id != PUBLIC_OWNER {
            pages.extend(self.list_public().await?);
        }

        let mut seen: HashSet<(String, String)> = pages
            .iter()
            .map(|p| (p.owner_id.clone(), p.page_id.clone()))
            .collect();

        // Grants on pages owned by someone else, resolvable through `ownerid`
        let shared: Vec<(String, String)> = authorizations
            .list_for_user(user_id)
            .await?
            .into_iter()
            .filter(|a| a.level.permits(Permission::Read))
            .filter_map(|a| match a.owner_id {
                Some(owner_id) => Some((owner_id, a.page_id)),
                None => {
                    tracing::debug!(
                        "Skipping grant on '{}' for '{}': page owner unknown",
                        a.page_id,
                        user_id
                    );
                    None
                }
            })
            .filter(|key| seen.insert(key.clone()))
            .collect();

        let lookups = shared
            .iter()
            .map(|(owner_id, page_id)| self.retrieve(owner_id, page_id));

        for ((owner_id, page_id), result) in shared.iter().zip(join_all(lookups).await) {
            match result? {
                Some(page) => pages.push(page),
                None => tracing::debug!(
                    "Grant for '{}' points at missing page '{}' of '{}'",
                    user_id,
                    page_id,
                    owner_id
                ),
            }
        }

        Ok(pages)
    }
}
