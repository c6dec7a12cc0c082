#![cfg(feature = "aws")]

mod common;

use std::sync::Arc;

use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ScalarAttributeType,
};
use serde_json::{json, Value};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::dynamodb_local::DynamoDb;

use folio::api::pages;
use folio::auth::models::AccessLevel;
use folio::config::Settings;
use folio::db::authorization_repository::AuthorizationRepository;
use folio::db::models::PUBLIC_OWNER;
use folio::db::page_repository::PageRepository;
use folio::error::AppError;
use folio::store::client::{string_item, StoreClient};
use folio::store::dynamo::DynamoStore;

/// A DynamoDB Local container with both tables created.
///
/// The container is stopped when this is dropped.
struct DynamoEnv {
    _dynamo: ContainerAsync<DynamoDb>,
    env: common::TestEnv,
}

fn key_element(name: &str, key_type: KeyType) -> KeySchemaElement {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .expect("Invalid key schema")
}

fn string_attribute(name: &str) -> AttributeDefinition {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .expect("Invalid attribute definition")
}

async fn create_tables(client: &aws_sdk_dynamodb::Client, settings: &Settings) {
    client
        .create_table()
        .table_name(&settings.page_table)
        .attribute_definitions(string_attribute("userid"))
        .attribute_definitions(string_attribute("pageid"))
        .key_schema(key_element("userid", KeyType::Hash))
        .key_schema(key_element("pageid", KeyType::Range))
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await
        .expect("Failed to create pages table");

    let page_index = GlobalSecondaryIndex::builder()
        .index_name(&settings.authorization_page_index)
        .key_schema(key_element("pageid", KeyType::Hash))
        .key_schema(key_element("userid", KeyType::Range))
        .projection(
            Projection::builder()
                .projection_type(ProjectionType::All)
                .build(),
        )
        .build()
        .expect("Invalid index definition");

    client
        .create_table()
        .table_name(&settings.authorization_table)
        .attribute_definitions(string_attribute("userid"))
        .attribute_definitions(string_attribute("pageid"))
        .key_schema(key_element("userid", KeyType::Hash))
        .key_schema(key_element("pageid", KeyType::Range))
        .global_secondary_indexes(page_index)
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await
        .expect("Failed to create authorizations table");
}

impl DynamoEnv {
    async fn start() -> Self {
        let container = DynamoDb::default()
            .start()
            .await
            .expect("Failed to start DynamoDB Local container");
        let port = container
            .get_host_port_ipv4(8000)
            .await
            .expect("Failed to get DynamoDB port");

        // DynamoDB Local accepts any credentials, but the SDK insists on some
        unsafe {
            std::env::set_var("AWS_ACCESS_KEY_ID", "folio");
            std::env::set_var("AWS_SECRET_ACCESS_KEY", "folio");
        }

        let mut settings = Settings::new("pages", "authorizations");
        settings.region = "us-east-1".to_string();
        settings.endpoint = Some(format!("http://127.0.0.1:{}", port));

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()))
            .endpoint_url(format!("http://127.0.0.1:{}", port))
            .load()
            .await;
        create_tables(&aws_sdk_dynamodb::Client::new(&sdk_config), &settings).await;

        let store: Arc<dyn StoreClient> = Arc::new(DynamoStore::from_settings(&settings).await);
        Self {
            _dynamo: container,
            env: common::TestEnv::with_store(settings, store),
        }
    }
}

#[tokio::test]
async fn items_roundtrip_through_dynamodb() {
    let dynamo = DynamoEnv::start().await;
    let env = &dynamo.env;

    let record = json!({
        "userid": "U1",
        "pageid": "P1",
        "title": "Typed",
        "private": true,
        "views": 3,
        "tags": ["a", "b"],
        "meta": { "source": "import", "rating": 4.5 },
        "missing": null
    });
    let item = record.as_object().cloned().unwrap();
    env.items.add_item("pages", item.clone()).await.unwrap();

    let key = string_item(&[("userid", "U1"), ("pageid", "P1")]);
    let stored = env.items.retrieve_item("pages", &key).await.unwrap().unwrap();
    assert_eq!(Value::Object(stored), record);

    env.items
        .edit_item(
            "pages",
            &key,
            json!({ "title": "Edited", "views": null }).as_object().unwrap(),
        )
        .await
        .unwrap();
    let stored = env.items.retrieve_item("pages", &key).await.unwrap().unwrap();
    assert_eq!(stored["title"], "Edited");
    assert_eq!(stored["views"], 3);

    env.items.remove_item("pages", &key).await.unwrap();
    env.items.remove_item("pages", &key).await.unwrap();
    assert!(env.items.retrieve_item("pages", &key).await.unwrap().is_none());
}

#[tokio::test]
async fn edit_of_missing_item_is_not_found() {
    let dynamo = DynamoEnv::start().await;
    let env = &dynamo.env;

    let err = env
        .pages
        .edit("U1", "missing", Some("T"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(env.pages.retrieve("U1", "missing").await.unwrap().is_none());
}

#[tokio::test]
async fn grants_are_listed_by_user_and_page() {
    let dynamo = DynamoEnv::start().await;
    let env = &dynamo.env;

    env.authorizations.grant("U1", "P1", AccessLevel(0)).await.unwrap();
    env.authorizations.grant("U1", "P1", AccessLevel(1)).await.unwrap();
    env.authorizations.grant("U2", "P1", AccessLevel::READER).await.unwrap();
    env.authorizations.grant("U1", "P2", AccessLevel::OWNER).await.unwrap();

    let found = env.authorizations.lookup("U1", "P1").await.unwrap().unwrap();
    assert_eq!(found.level, AccessLevel::EDITOR);

    assert_eq!(env.authorizations.list_for_user("U1").await.unwrap().len(), 2);

    let on_page: Vec<String> = env
        .authorizations
        .list_for_page("P1")
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.user_id)
        .collect();
    assert_eq!(on_page, vec!["U1", "U2"]);
}

#[tokio::test]
async fn public_and_visible_listings() {
    let dynamo = DynamoEnv::start().await;
    let env = &dynamo.env;

    env.pages.create(PUBLIC_OWNER, "Public A", "", false).await.unwrap();
    env.pages.create(PUBLIC_OWNER, "Public B", "", false).await.unwrap();
    env.pages.create("U2", "Mine", "", false).await.unwrap();

    let public = env.pages.list_public().await.unwrap();
    assert_eq!(common::titles(&public), vec!["Public A", "Public B"]);

    let visible = env
        .pages
        .list_visible_to("U2", &env.authorizations)
        .await
        .unwrap();
    assert_eq!(common::titles(&visible), vec!["Mine", "Public A", "Public B"]);
}

#[tokio::test]
async fn delete_cascades_through_page_index() {
    let dynamo = DynamoEnv::start().await;
    let env = &dynamo.env;

    let page = env.create_page("alice", "Plans", true).await;
    pages::share_page(
        &env.pages,
        &env.authorizations,
        "alice",
        "alice",
        &page.page_id,
        "bob",
        AccessLevel::READER,
    )
    .await
    .unwrap();

    pages::delete_page(&env.pages, &env.authorizations, "alice", "alice", &page.page_id)
        .await
        .unwrap();

    assert!(env.pages.retrieve("alice", &page.page_id).await.unwrap().is_none());
    assert!(env.authorizations.lookup("bob", &page.page_id).await.unwrap().is_none());
    assert!(env.authorizations.lookup("alice", &page.page_id).await.unwrap().is_none());
}
