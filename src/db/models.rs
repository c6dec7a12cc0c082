use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::models::AccessLevel;

/// Reserved owner id for pages visible to everyone.
pub const PUBLIC_OWNER: &str = "PUBLIC";

/// A user-authored markdown page stored in the pages table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// The creating user, or [`PUBLIC_OWNER`].
    #[serde(rename = "userid")]
    pub owner_id: String,
    /// Time-ordered unique id, assigned once at creation.
    #[serde(rename = "pageid")]
    pub page_id: String,
    pub title: String,
    /// Markdown source.
    pub text: String,
    /// Private pages are only readable through an explicit grant.
    #[serde(rename = "private", default)]
    pub is_private: bool,
    #[serde(rename = "created", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Page {
    pub fn is_public(&self) -> bool {
        self.owner_id == PUBLIC_OWNER
    }

    /// Readable by anyone without an explicit grant.
    pub fn is_world_readable(&self) -> bool {
        self.is_public() || !self.is_private
    }
}

/// A user's access level on one page, stored in the authorizations table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    #[serde(rename = "userid")]
    pub user_id: String,
    #[serde(rename = "pageid")]
    pub page_id: String,
    pub level: AccessLevel,
    /// Owner of the page, so shared pages can be found from the grant.
    #[serde(rename = "ownerid", default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

impl Authorization {
    pub fn new(user_id: impl Into<String>, page_id: impl Into<String>, level: AccessLevel) -> Self {
        Self {
            user_id: user_id.into(),
            page_id: page_id.into(),
            level,
            owner_id: None,
        }
    }

    pub fn on_page_of(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

/// The request payload for creating a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePageRequest {
    pub title: String,
    /// Raw Markdown content.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_private: bool,
    /// Store the page under the public sentinel instead of the caller.
    #[serde(default)]
    pub publish: bool,
}

/// The request payload for editing a page. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditPageRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_attribute_names() {
        let page = Page {
            owner_id: "U1".to_string(),
            page_id: "P1".to_string(),
            title: "My Title".to_string(),
            text: "# My Text".to_string(),
            is_private: true,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["userid"], "U1");
        assert_eq!(value["pageid"], "P1");
        assert_eq!(value["private"], true);
        assert!(value.get("created").is_some());

        let back: Page = serde_json::from_value(value).unwrap();
        assert_eq!(back, page);
    }

    #[test]
    fn test_page_defaults_for_legacy_records() {
        // Records written before visibility and timestamps existed
        let json = r###"{
            "userid": "USER-4",
            "pageid": "PAGE-4",
            "title": "Page Title",
            "text": "Page Text"
        }"###;

        let page: Page = serde_json::from_str(json).unwrap();
        assert_eq!(page.page_id, "PAGE-4");
        assert!(!page.is_private);
    }

    #[test]
    fn test_visibility() {
        let mut page: Page = serde_json::from_str(
            r#"{"userid": "PUBLIC", "pageid": "P", "title": "t", "text": "", "private": true}"#,
        )
        .unwrap();
        assert!(page.is_public());
        assert!(page.is_world_readable());

        page.owner_id = "U1".to_string();
        assert!(!page.is_world_readable());
        page.is_private = false;
        assert!(page.is_world_readable());
    }

    #[test]
    fn test_authorization_serialization() {
        let auth = Authorization::new("U1", "P1", AccessLevel::EDITOR);
        let value = serde_json::to_value(&auth).unwrap();
        assert_eq!(value, serde_json::json!({ "userid": "U1", "pageid": "P1", "level": 1 }));

        let shared = auth.on_page_of("U2");
        let value = serde_json::to_value(&shared).unwrap();
        assert_eq!(value["ownerid"], "U2");
        let back: Authorization = serde_json::from_value(value).unwrap();
        assert_eq!(back.owner_id.as_deref(), Some("U2"));
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreatePageRequest = serde_json::from_str(r#"{"title": "Hello"}"#).unwrap();
        assert_eq!(req.title, "Hello");
        assert!(req.text.is_empty());
        assert!(!req.is_private);
        assert!(!req.publish);
    }

    #[test]
    fn test_edit_request_partial() {
        let req: EditPageRequest = serde_json::from_str(r#"{"text": "New Text"}"#).unwrap();
        assert_eq!(req.title, None);
        assert_eq!(req.text.as_deref(), Some("New Text"));
        assert_eq!(req.is_private, None);
    }
}
