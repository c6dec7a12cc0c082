pub mod error;
pub mod config;
pub mod auth {
    pub mod models;
}
pub mod store {
    pub mod client;
    pub mod memory;
    #[cfg(feature = "aws")]
    pub mod dynamo;
}
pub mod db {
    pub mod items;
    pub mod models;
    pub mod authorization_repository;
    pub mod page_repository;
}
pub mod api {
    pub mod pages;
}
