use serde::{Deserialize, Serialize};

/// A tenant. Owns accounts, boxes, roles, and the federation entities.
/// Immutable for the lifetime of any token it issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Root URL, always with a trailing slash (e.g. `https://unit.example/cell1/`).
    pub url: String,
    pub name: String,
    /// Owner subject URL, when the cell has one. Required for unit-user
    /// promotion (`p_owner=true`).
    pub owner: Option<String>,
}

impl Cell {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            owner: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}
