use std::fmt;

use drive_core::File;

/// A unit of listing and recursion: one folder, or the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderScope {
    id: String,
    name: String,
}

impl FolderScope {
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// The whole-store sentinel. Listings under it carry no parent filter.
    pub fn root() -> Self {
        Self {
            id: String::new(),
            name: "root".to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.id.is_empty()
    }
}

impl fmt::Display for FolderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "store root")
        } else if self.name.is_empty() || self.name == self.id {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.name, self.id)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Folder,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub explicitly_trashed: bool,
}

impl RemoteItem {
    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }

    pub fn as_scope(&self) -> FolderScope {
        FolderScope::folder(self.id.clone(), self.name.clone())
    }
}

impl From<File> for RemoteItem {
    fn from(file: File) -> Self {
        let kind = if file.is_folder() {
            ItemKind::Folder
        } else {
            ItemKind::File
        };
        Self {
            id: file.id,
            name: file.name,
            kind,
            explicitly_trashed: file.explicitly_trashed,
        }
    }
}

/// One listing page. `next_token` is `None` on the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<RemoteItem>,
    pub next_token: Option<String>,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.next_token.as_deref().is_none_or(str::is_empty)
    }
}
