use serde::{Deserialize, Serialize};

/// Placeholder name for the main (cell-root) box in role instance URLs.
pub const MAIN_BOX_NAME: &str = "__";

/// Client-authentication level a resource may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaLevel {
    None,
    Public,
    Confidential,
}

/// A box as read from the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxEntry {
    pub name: String,
    /// URL of the client application cell this box was installed from.
    pub schema_url: Option<String>,
}

impl BoxEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema_url: None,
        }
    }

    pub fn with_schema(mut self, schema_url: impl Into<String>) -> Self {
        self.schema_url = Some(schema_url.into());
        self
    }
}
