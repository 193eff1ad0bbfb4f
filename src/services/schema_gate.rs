//! Schema-level gating of resource access.
//!
//! A resource may require that the presenting token was issued to a
//! particular client application (the token's schema claim). The
//! required level is configured per resource and inherited from the
//! nearest ancestor with an explicit setting. Gate failures are policy
//! violations, deliberately distinct from token-validity errors: the
//! credential was fine, the client application was not.

use std::sync::Arc;

use crate::error::BrokerError;
use crate::models::SchemaLevel;
use crate::services::directory::Directory;
use crate::utils::uri::UnitUrlResolver;

/// Suffix marking a schema claim as confidential: the application
/// authenticated with its own secret rather than being merely named by
/// a `client_id`.
pub const CONFIDENTIAL_MARKER: &str = "#c";

/// Strip the confidential marker, returning the bare schema URL and
/// whether the marker was present.
pub fn split_confidential(schema: &str) -> (&str, bool) {
    match schema.strip_suffix(CONFIDENTIAL_MARKER) {
        Some(bare) => (bare, true),
        None => (schema, false),
    }
}

pub struct SchemaGate {
    directory: Arc<dyn Directory>,
    urls: UnitUrlResolver,
}

impl SchemaGate {
    pub fn new(directory: Arc<dyn Directory>, urls: UnitUrlResolver) -> Self {
        Self { directory, urls }
    }

    /// Effective level for a resource path (relative to the cell root):
    /// the path's own explicit setting, else the nearest ancestor's,
    /// else `None`.
    pub async fn required_level(
        &self,
        cell_url: &str,
        resource_path: &str,
    ) -> Result<SchemaLevel, BrokerError> {
        let cell = self.urls.normalize(cell_url);
        let mut segments: Vec<&str> = resource_path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        loop {
            let path = segments.join("/");
            if let Some(level) = self.directory.get_schema_level(&cell, &path).await? {
                return Ok(level);
            }
            if segments.pop().is_none() {
                return Ok(SchemaLevel::None);
            }
        }
    }

    /// Compare a token's schema claim against the level a resource
    /// requires, given the schema URL configured on the resource's box.
    pub fn check(
        &self,
        token_schema: Option<&str>,
        box_schema_url: Option<&str>,
        required: SchemaLevel,
    ) -> Result<(), BrokerError> {
        if required == SchemaLevel::None {
            return Ok(());
        }
        let Some(claimed) = token_schema.filter(|s| !s.is_empty()) else {
            return Err(BrokerError::SchemaRequired);
        };
        let Some(expected) = box_schema_url.filter(|s| !s.is_empty()) else {
            // The resource demands app authentication but its box names
            // no application; nothing can satisfy that.
            return Err(BrokerError::SchemaMismatch);
        };

        let (bare, confidential) = split_confidential(claimed);
        if !self.urls.urls_equal(bare, expected) {
            return Err(BrokerError::SchemaMismatch);
        }
        if required == SchemaLevel::Confidential && !confidential {
            return Err(BrokerError::InsufficientSchemaLevel);
        }
        Ok(())
    }

    /// Full gate for one resource access: resolve the box from the
    /// path's first segment, compute the required level, and check the
    /// token's claim against it.
    pub async fn authorize(
        &self,
        cell_url: &str,
        resource_path: &str,
        token_schema: Option<&str>,
    ) -> Result<(), BrokerError> {
        let required = self.required_level(cell_url, resource_path).await?;
        if required == SchemaLevel::None {
            return Ok(());
        }
        let cell = self.urls.normalize(cell_url);
        let box_name = resource_path
            .trim_matches('/')
            .split('/')
            .next()
            .unwrap_or("");
        let entry = self.directory.get_box(&cell, box_name).await?;
        self.check(
            token_schema,
            entry.as_ref().and_then(|b| b.schema_url.as_deref()),
            required,
        )
    }
}
