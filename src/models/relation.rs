use serde::{Deserialize, Serialize};

/// A registered reference to a foreign cell, the anchor of every
/// federation edge. Identified by id; the stored URL may use the
/// `personium-localunit:` alias for same-deployment cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtCellRef {
    pub id: String,
    pub url: String,
}

/// A named grouping entity linking ext-cells and ext-roles to local
/// roles. The join table of the trust graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRef {
    pub id: String,
    pub name: String,
}

/// A reference to a role in a foreign cell, expressed as that role's
/// instance URL. Hangs off a relation; grants its own linked local
/// roles to any principal already holding the foreign role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtRoleRef {
    pub id: String,
    pub role_url: String,
    pub relation_id: String,
}
