use futures::future::join_all;

use crate::auth::models::{AccessLevel, Permission};
use crate::db::authorization_repository::AuthorizationRepository;
use crate::db::models::{Authorization, CreatePageRequest, EditPageRequest, Page, PUBLIC_OWNER};
use crate::db::page_repository::PageRepository;
use crate::error::AppError;

// Page workflows for request handlers, separated from any transport for
// testability. Mutating workflows require a signed-in caller; anonymous
// callers (`None`) can only view and list.

fn signed_in(caller: &str) -> Result<(), AppError> {
    if caller.is_empty() || caller == PUBLIC_OWNER {
        return Err(AppError::Auth("Sign-in required".into()));
    }
    Ok(())
}

async fn load_page(
    pages: &dyn PageRepository,
    owner_id: &str,
    page_id: &str,
) -> Result<Page, AppError> {
    pages
        .retrieve(owner_id, page_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Page '{}' not found", page_id)))
}

/// The caller's effective level on `page`.
///
/// The page's owner always holds `AccessLevel::OWNER`, with or without a
/// stored grant. Everyone else needs an authorization record. Anonymous
/// callers hold nothing.
pub async fn resolve_level(
    authorizations: &dyn AuthorizationRepository,
    caller: &str,
    page: &Page,
) -> Result<Option<AccessLevel>, AppError> {
    if signed_in(caller).is_err() {
        return Ok(None);
    }
    if caller == page.owner_id {
        return Ok(Some(AccessLevel::OWNER));
    }
    Ok(authorizations
        .lookup(caller, &page.page_id)
        .await?
        .map(|a| a.level))
}

/// Check `permission` against the caller's level and the page's default
/// visibility.
pub fn authorize(
    level: Option<AccessLevel>,
    page: &Page,
    permission: Permission,
) -> Result<(), AppError> {
    let granted = level.is_some_and(|l| l.permits(permission));
    let by_default = permission == Permission::Read && page.is_world_readable();

    if granted || by_default {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Not allowed to {} page '{}'",
            permission, page.page_id
        )))
    }
}

async fn check(
    authorizations: &dyn AuthorizationRepository,
    caller: &str,
    page: &Page,
    permission: Permission,
) -> Result<(), AppError> {
    let level = resolve_level(authorizations, caller, page).await?;
    authorize(level, page, permission)
}

/// Owner grants can only be changed by the page's owner, so one co-owner
/// cannot lock another out.
async fn protect_owner_grant(
    authorizations: &dyn AuthorizationRepository,
    caller: &str,
    page: &Page,
    grantee: &str,
) -> Result<(), AppError> {
    if caller == page.owner_id {
        return Ok(());
    }
    let current = authorizations.lookup(grantee, &page.page_id).await?;
    if current.is_some_and(|g| g.level == AccessLevel::OWNER) {
        return Err(AppError::Forbidden(format!(
            "Only the owner of page '{}' can change the grant of '{}'",
            page.page_id, grantee
        )));
    }
    Ok(())
}

/// Create a page for `caller` together with the caller's owner grant.
///
/// The two writes are not atomic: if the grant cannot be stored the page is
/// removed again and the grant's error is returned.
pub async fn create_page(
    pages: &dyn PageRepository,
    authorizations: &dyn AuthorizationRepository,
    caller: &str,
    request: CreatePageRequest,
) -> Result<Page, AppError> {
    signed_in(caller)?;

    if request.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title cannot be empty".into()));
    }
    if request.publish && request.is_private {
        return Err(AppError::BadRequest(
            "A published page cannot be private".into(),
        ));
    }

    let owner_id = if request.publish { PUBLIC_OWNER } else { caller };
    let page_id = pages
        .create(owner_id, &request.title, &request.text, request.is_private)
        .await?;

    let grant = Authorization::new(caller, page_id.as_str(), AccessLevel::OWNER).on_page_of(owner_id);
    if let Err(e) = authorizations.store(&grant).await {
        tracing::warn!("Owner grant on page '{page_id}' failed, removing the page: {e}");
        if let Err(cleanup) = pages.remove(owner_id, &page_id).await {
            tracing::error!("Failed to remove orphaned page '{page_id}' of '{owner_id}': {cleanup}");
        }
        return Err(e);
    }

    load_page(pages, owner_id, &page_id).await
}

/// Fetch a page the caller is allowed to read.
pub async fn view_page(
    pages: &dyn PageRepository,
    authorizations: &dyn AuthorizationRepository,
    caller: Option<&str>,
    owner_id: &str,
    page_id: &str,
) -> Result<Page, AppError> {
    let page = load_page(pages, owner_id, page_id).await?;

    let level = match caller {
        Some(caller) => resolve_level(authorizations, caller, &page).await?,
        None => None,
    };
    authorize(level, &page, Permission::Read)?;

    Ok(page)
}

/// Apply an edit and return the updated page.
///
/// Content changes need edit rights; changing visibility needs owner rights.
pub async fn edit_page(
    pages: &dyn PageRepository,
    authorizations: &dyn AuthorizationRepository,
    caller: &str,
    owner_id: &str,
    page_id: &str,
    request: EditPageRequest,
) -> Result<Page, AppError> {
    signed_in(caller)?;
    let page = load_page(pages, owner_id, page_id).await?;

    check(authorizations, caller, &page, Permission::Edit).await?;
    if request.is_private.is_some() {
        check(authorizations, caller, &page, Permission::Share).await?;
    }

    if request.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::BadRequest("Title cannot be empty".into()));
    }
    if page.is_public() && request.is_private == Some(true) {
        return Err(AppError::BadRequest(
            "A published page cannot be private".into(),
        ));
    }

    pages.update(owner_id, page_id, &request).await?;

    load_page(pages, owner_id, page_id).await
}

/// Delete a page and every authorization record on it.
///
/// Once the page itself is gone the delete counts as done; grants that
/// cannot be cleaned up are only logged.
pub async fn delete_page(
    pages: &dyn PageRepository,
    authorizations: &dyn AuthorizationRepository,
    caller: &str,
    owner_id: &str,
    page_id: &str,
) -> Result<(), AppError> {
    signed_in(caller)?;
    let page = load_page(pages, owner_id, page_id).await?;
    check(authorizations, caller, &page, Permission::Delete).await?;

    pages.remove(owner_id, page_id).await?;

    let grants = match authorizations.list_for_page(page_id).await {
        Ok(grants) => grants,
        Err(e) => {
            tracing::warn!("Could not list grants of deleted page '{page_id}': {e}");
            return Ok(());
        }
    };

    let revocations = grants
        .iter()
        .map(|grant| authorizations.revoke(&grant.user_id, &grant.page_id));

    let mut failed = 0;
    for (grant, result) in grants.iter().zip(join_all(revocations).await) {
        if let Err(e) = result {
            failed += 1;
            tracing::warn!(
                "Failed to revoke '{}' on deleted page '{}': {}",
                grant.user_id,
                page_id,
                e
            );
        }
    }

    tracing::info!(
        "Deleted page '{}' and {} of {} grants",
        page_id,
        grants.len() - failed,
        grants.len()
    );
    Ok(())
}

/// Give `grantee` `level` on a page. Only owners can share, never with
/// themselves, and only the page's owner can change another owner's grant.
pub async fn share_page(
    pages: &dyn PageRepository,
    authorizations: &dyn AuthorizationRepository,
    caller: &str,
    owner_id: &str,
    page_id: &str,
    grantee: &str,
    level: AccessLevel,
) -> Result<Authorization, AppError> {
    signed_in(caller)?;
    if grantee.is_empty() || grantee == PUBLIC_OWNER {
        return Err(AppError::BadRequest(format!(
            "Cannot share with '{}'",
            grantee
        )));
    }

    if grantee == caller {
        return Err(AppError::BadRequest("Cannot share a page with yourself".into()));
    }

    let page = load_page(pages, owner_id, page_id).await?;
    check(authorizations, caller, &page, Permission::Share).await?;

    protect_owner_grant(authorizations, caller, &page, grantee).await?;

    let grant = Authorization::new(grantee, page_id, level).on_page_of(owner_id);
    authorizations.store(&grant).await?;
    Ok(grant)
}

/// Remove `grantee`'s grant on a page. Only owners can unshare, and not
/// from themselves.
pub async fn unshare_page(
    pages: &dyn PageRepository,
    authorizations: &dyn AuthorizationRepository,
    caller: &str,
    owner_id: &str,
    page_id: &str,
    grantee: &str,
) -> Result<(), AppError> {
    signed_in(caller)?;
    if grantee == caller {
        return Err(AppError::BadRequest("Cannot unshare a page from yourself".into()));
    }

    let page = load_page(pages, owner_id, page_id).await?;
    check(authorizations, caller, &page, Permission::Share).await?;
    protect_owner_grant(authorizations, caller, &page, grantee).await?;

    authorizations.revoke(grantee, page_id).await
}

/// Pages to show the caller: public pages for anonymous callers, otherwise
/// everything visible to them.
pub async fn list_pages(
    pages: &dyn PageRepository,
    authorizations: &dyn AuthorizationRepository,
    caller: Option<&str>,
) -> Result<Vec<Page>, AppError> {
    match caller {
        None => pages.list_public().await,
        Some(caller) => {
            signed_in(caller)?;
            pages.list_visible_to(caller, authorizations).await
        }
    }
}
