use serde::{Deserialize, Serialize};
use std::fmt;

/// Access tier of a user on one page.
///
/// Lower numbers carry more privilege: `0` is the owner, `1` an editor,
/// `2` a reader. Anything above `2` grants nothing, but any value can be
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessLevel(pub u32);

impl AccessLevel {
    /// Full control, including deleting and sharing the page.
    pub const OWNER: AccessLevel = AccessLevel(0);
    /// May change the page's content.
    pub const EDITOR: AccessLevel = AccessLevel(1);
    /// May read the page.
    pub const READER: AccessLevel = AccessLevel(2);

    /// Returns `true` if `self` is at least as privileged as `required`.
    pub fn has_access(&self, required: AccessLevel) -> bool {
        *self <= required
    }

    /// Returns `true` if this level may perform `permission`.
    pub fn permits(&self, permission: Permission) -> bool {
        self.has_access(permission.required_level())
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AccessLevel::OWNER => write!(f, "owner"),
            AccessLevel::EDITOR => write!(f, "editor"),
            AccessLevel::READER => write!(f, "reader"),
            AccessLevel(level) => write!(f, "level {}", level),
        }
    }
}

impl AccessLevel {
    /// Parse a level from a name (case-insensitive) or a plain number.
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "owner" => Some(AccessLevel::OWNER),
            "editor" => Some(AccessLevel::EDITOR),
            "reader" => Some(AccessLevel::READER),
            other => other.parse().ok().map(AccessLevel),
        }
    }
}

/// An action on a page guarded by an access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Read,
    Edit,
    Delete,
    Share,
}

impl Permission {
    /// The least privileged level allowed to perform this action.
    pub fn required_level(&self) -> AccessLevel {
        match self {
            Permission::Read => AccessLevel::READER,
            Permission::Edit => AccessLevel::EDITOR,
            Permission::Delete | Permission::Share => AccessLevel::OWNER,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => write!(f, "read"),
            Permission::Edit => write!(f, "edit"),
            Permission::Delete => write!(f, "delete"),
            Permission::Share => write!(f, "share"),
        }
    }
}
