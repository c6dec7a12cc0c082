#![allow(dead_code)]

use std::sync::Arc;

use folio::config::Settings;
use folio::db::authorization_repository::ItemAuthorizationRepository;
use folio::db::items::ItemAccess;
use folio::db::models::{CreatePageRequest, Page};
use folio::db::page_repository::ItemPageRepository;
use folio::store::client::StoreClient;
use folio::store::memory::MemoryStore;

/// An in-memory store with the pages and authorizations tables, plus the
/// repositories wired on top of it.
///
/// Every environment is isolated; nothing is shared between tests.
pub struct TestEnv {
    pub settings: Settings,
    pub store: Arc<dyn StoreClient>,
    pub items: ItemAccess,
    pub pages: ItemPageRepository,
    pub authorizations: ItemAuthorizationRepository,
}

impl TestEnv {
    pub fn start() -> Self {
        let settings = Settings::new("pages", "authorizations");
        let store: Arc<dyn StoreClient> = Arc::new(MemoryStore::for_settings(&settings));
        Self::with_store(settings, store)
    }

    /// Wire the repositories to an arbitrary store.
    pub fn with_store(settings: Settings, store: Arc<dyn StoreClient>) -> Self {
        let items = ItemAccess::new(store.clone());
        let pages = ItemPageRepository::new(items.clone(), &settings.page_table);
        let authorizations = ItemAuthorizationRepository::new(
            items.clone(),
            &settings.authorization_table,
            &settings.authorization_page_index,
        );

        Self {
            settings,
            store,
            items,
            pages,
            authorizations,
        }
    }

    /// Create a page through the workflow layer, owner grant included.
    pub async fn create_page(&self, caller: &str, title: &str, is_private: bool) -> Page {
        folio::api::pages::create_page(
            &self.pages,
            &self.authorizations,
            caller,
            CreatePageRequest {
                title: title.to_string(),
                text: format!("# {title}"),
                is_private,
                publish: false,
            },
        )
        .await
        .expect("Failed to create page")
    }
}

/// Sorted titles, for order-independent comparisons.
pub fn titles(pages: &[Page]) -> Vec<String> {
    let mut titles: Vec<String> = pages.iter().map(|p| p.title.clone()).collect();
    titles.sort();
    titles
}
