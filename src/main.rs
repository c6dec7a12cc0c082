use std::sync::Arc;

use clap::{Parser, Subcommand};

use folio::api::pages;
use folio::auth::models::AccessLevel;
use folio::config::Settings;
use folio::db::authorization_repository::ItemAuthorizationRepository;
use folio::db::items::ItemAccess;
use folio::db::models::{CreatePageRequest, EditPageRequest};
use folio::db::page_repository::ItemPageRepository;
use folio::store::dynamo::DynamoStore;

#[derive(Parser)]
#[command(name = "folio", version, about = "Manage pages and their sharing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a page owned by the caller
    Create {
        #[arg(long = "as")]
        caller: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        text: String,
        #[arg(long)]
        private: bool,
        /// Store the page as a public page
        #[arg(long, conflicts_with = "private")]
        publish: bool,
    },
    /// Print a page
    Show {
        /// Omit to view anonymously
        #[arg(long = "as")]
        caller: Option<String>,
        #[arg(long)]
        owner: String,
        page: String,
    },
    /// Change title, text or visibility
    Edit {
        #[arg(long = "as")]
        caller: String,
        #[arg(long)]
        owner: String,
        page: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        private: Option<bool>,
    },
    /// Delete a page and its grants
    Delete {
        #[arg(long = "as")]
        caller: String,
        #[arg(long)]
        owner: String,
        page: String,
    },
    /// Grant a user access to a page
    Share {
        #[arg(long = "as")]
        caller: String,
        #[arg(long)]
        owner: String,
        page: String,
        user: String,
        /// owner, editor, reader or a numeric level
        #[arg(long, default_value = "reader", value_parser = parse_level)]
        level: AccessLevel,
    },
    /// Revoke a user's access to a page
    Unshare {
        #[arg(long = "as")]
        caller: String,
        #[arg(long)]
        owner: String,
        page: String,
        user: String,
    },
    /// List the pages visible to the caller
    List {
        /// Omit to list public pages only
        #[arg(long = "as")]
        caller: Option<String>,
    },
}

fn parse_level(s: &str) -> Result<AccessLevel, String> {
    AccessLevel::from_str_ci(s).ok_or_else(|| format!("unknown access level '{s}'"))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    tracing::debug!(
        "Using tables '{}' and '{}' in {}",
        settings.page_table,
        settings.authorization_table,
        settings.region
    );

    let store = Arc::new(DynamoStore::from_settings(&settings).await);
    let items = ItemAccess::new(store);
    let page_repo = ItemPageRepository::new(items.clone(), &settings.page_table);
    let auth_repo = ItemAuthorizationRepository::new(
        items,
        &settings.authorization_table,
        &settings.authorization_page_index,
    );

    match cli.command {
        Command::Create {
            caller,
            title,
            text,
            private,
            publish,
        } => {
            let request = CreatePageRequest {
                title,
                text,
                is_private: private,
                publish,
            };
            let page = pages::create_page(&page_repo, &auth_repo, &caller, request).await?;
            print_json(&page)?;
        }
        Command::Show {
            caller,
            owner,
            page,
        } => {
            let page =
                pages::view_page(&page_repo, &auth_repo, caller.as_deref(), &owner, &page).await?;
            print_json(&page)?;
        }
        Command::Edit {
            caller,
            owner,
            page,
            title,
            text,
            private,
        } => {
            let request = EditPageRequest {
                title,
                text,
                is_private: private,
            };
            let page =
                pages::edit_page(&page_repo, &auth_repo, &caller, &owner, &page, request).await?;
            print_json(&page)?;
        }
        Command::Delete {
            caller,
            owner,
            page,
        } => {
            pages::delete_page(&page_repo, &auth_repo, &caller, &owner, &page).await?;
            print_json(&serde_json::json!({ "deleted": page }))?;
        }
        Command::Share {
            caller,
            owner,
            page,
            user,
            level,
        } => {
            let grant =
                pages::share_page(&page_repo, &auth_repo, &caller, &owner, &page, &user, level)
                    .await?;
            print_json(&grant)?;
        }
        Command::Unshare {
            caller,
            owner,
            page,
            user,
        } => {
            pages::unshare_page(&page_repo, &auth_repo, &caller, &owner, &page, &user).await?;
            print_json(&serde_json::json!({ "revoked": user, "page": page }))?;
        }
        Command::List { caller } => {
            let list = pages::list_pages(&page_repo, &auth_repo, caller.as_deref()).await?;
            print_json(&list)?;
        }
    }

    Ok(())
}
