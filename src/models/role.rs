use serde::{Deserialize, Serialize};

use super::boxes::MAIN_BOX_NAME;

/// A role as resolved from the directory, identified by
/// (cell, box|None, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleRef {
    pub name: String,
    /// Box the role is scoped to; `None` means tenant-wide.
    pub box_name: Option<String>,
    /// Schema URL of the scoping box, when the box carries one. A
    /// schema-scoped role is addressed by the owning application's
    /// naming rather than the literal box name.
    pub box_schema: Option<String>,
}

impl RoleRef {
    pub fn unscoped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            box_name: None,
            box_schema: None,
        }
    }

    pub fn scoped(name: impl Into<String>, box_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            box_name: Some(box_name.into()),
            box_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.box_schema = Some(schema.into());
        self
    }

    /// Externally visible role instance URL:
    /// `{base}__role/{box}/{name}`, with `__` standing in for an
    /// unscoped (main-box) role. When the scoping box carries a schema
    /// URL the role is addressed under the schema cell's own naming.
    pub fn to_instance_url(&self, cell_url: &str) -> String {
        match (&self.box_schema, &self.box_name) {
            (Some(schema), _) => format!("{}__role/{}/{}", schema, MAIN_BOX_NAME, self.name),
            (None, Some(box_name)) => format!("{}__role/{}/{}", cell_url, box_name, self.name),
            (None, None) => format!("{}__role/{}/{}", cell_url, MAIN_BOX_NAME, self.name),
        }
    }

    /// Dedup key: box and role name. Schema does not participate, it is
    /// a presentation concern.
    pub fn dedup_key(&self) -> (Option<String>, String) {
        (self.box_name.clone(), self.name.clone())
    }
}
