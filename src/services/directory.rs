//! Persistence collaborator seam.
//!
//! The broker never owns tenant metadata; it reads it through this
//! trait. Federation links are exposed as explicit read queries
//! returning reference lists, never as in-memory back-references.
//! `MemoryDirectory` is a complete in-process implementation used by
//! the test suite and by embedders that keep their directory elsewhere.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::BrokerError;
use crate::models::{Account, BoxEntry, Cell, ExtCellRef, ExtRoleRef, RelationRef, RoleRef, SchemaLevel};

/// Read interface over the external tenant directory. Keys are cell
/// root URLs in canonical (http, trailing-slash) form.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_cell(&self, cell_url: &str) -> Result<Option<Cell>, BrokerError>;

    async fn get_account(&self, cell_url: &str, name: &str)
        -> Result<Option<Account>, BrokerError>;

    /// Roles directly linked to an account in its home cell.
    async fn get_direct_roles(
        &self,
        cell_url: &str,
        account_name: &str,
    ) -> Result<Vec<RoleRef>, BrokerError>;

    /// Ext-cells in `cell_url` whose stored URL equals any of the given
    /// spellings of a foreign cell's URL.
    async fn get_ext_cells_matching(
        &self,
        cell_url: &str,
        url_variations: &[String],
    ) -> Result<Vec<ExtCellRef>, BrokerError>;

    async fn get_roles_for_ext_cell(
        &self,
        cell_url: &str,
        ext_cell_id: &str,
    ) -> Result<Vec<RoleRef>, BrokerError>;

    async fn get_relations_for_ext_cell(
        &self,
        cell_url: &str,
        ext_cell_id: &str,
    ) -> Result<Vec<RelationRef>, BrokerError>;

    async fn get_roles_for_relation(
        &self,
        cell_url: &str,
        relation_id: &str,
    ) -> Result<Vec<RoleRef>, BrokerError>;

    async fn get_ext_roles_for_relation(
        &self,
        cell_url: &str,
        relation_id: &str,
    ) -> Result<Vec<ExtRoleRef>, BrokerError>;

    async fn get_roles_for_ext_role(
        &self,
        cell_url: &str,
        ext_role_id: &str,
    ) -> Result<Vec<RoleRef>, BrokerError>;

    async fn get_box(
        &self,
        cell_url: &str,
        box_name: &str,
    ) -> Result<Option<BoxEntry>, BrokerError>;

    /// Explicit schema-level setting on exactly this resource path, if
    /// any. Ancestor inheritance is the schema gate's job.
    async fn get_schema_level(
        &self,
        cell_url: &str,
        resource_path: &str,
    ) -> Result<Option<SchemaLevel>, BrokerError>;

    /// Accounts allowed to represent the cell owner (`p_owner=true`).
    async fn owner_representative_accounts(
        &self,
        cell_url: &str,
    ) -> Result<Vec<String>, BrokerError>;

    /// Accounts exempted from auth-history recording.
    async fn accounts_not_recording_auth_history(
        &self,
        cell_url: &str,
    ) -> Result<Vec<String>, BrokerError>;
}

type CellKey = (String, String);

/// In-memory directory. Thread-safe; fixture setup goes through the
/// `add_*` methods.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    cells: DashMap<String, Cell>,
    accounts: DashMap<CellKey, Account>,
    direct_roles: DashMap<CellKey, Vec<RoleRef>>,
    ext_cells: DashMap<String, Vec<ExtCellRef>>,
    ext_cell_roles: DashMap<CellKey, Vec<RoleRef>>,
    ext_cell_relations: DashMap<CellKey, Vec<RelationRef>>,
    relation_roles: DashMap<CellKey, Vec<RoleRef>>,
    relation_ext_roles: DashMap<CellKey, Vec<ExtRoleRef>>,
    ext_role_roles: DashMap<CellKey, Vec<RoleRef>>,
    boxes: DashMap<CellKey, BoxEntry>,
    schema_levels: DashMap<CellKey, SchemaLevel>,
    owner_reps: DashMap<String, Vec<String>>,
    history_exempt: DashMap<String, Vec<String>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(cell: &str, item: &str) -> CellKey {
        (cell.to_string(), item.to_string())
    }

    pub fn add_cell(&self, cell: Cell) {
        self.cells.insert(cell.url.clone(), cell);
    }

    pub fn add_account(&self, cell_url: &str, account: Account) {
        self.accounts
            .insert(Self::key(cell_url, &account.name), account);
    }

    pub fn link_account_role(&self, cell_url: &str, account_name: &str, role: RoleRef) {
        self.direct_roles
            .entry(Self::key(cell_url, account_name))
            .or_default()
            .push(role);
    }

    pub fn add_ext_cell(&self, cell_url: &str, ext_cell: ExtCellRef) {
        self.ext_cells
            .entry(cell_url.to_string())
            .or_default()
            .push(ext_cell);
    }

    pub fn remove_ext_cell(&self, cell_url: &str, ext_cell_id: &str) {
        if let Some(mut list) = self.ext_cells.get_mut(cell_url) {
            list.retain(|e| e.id != ext_cell_id);
        }
    }

    pub fn link_ext_cell_role(&self, cell_url: &str, ext_cell_id: &str, role: RoleRef) {
        self.ext_cell_roles
            .entry(Self::key(cell_url, ext_cell_id))
            .or_default()
            .push(role);
    }

    pub fn link_ext_cell_relation(&self, cell_url: &str, ext_cell_id: &str, rel: RelationRef) {
        self.ext_cell_relations
            .entry(Self::key(cell_url, ext_cell_id))
            .or_default()
            .push(rel);
    }

    pub fn link_relation_role(&self, cell_url: &str, relation_id: &str, role: RoleRef) {
        self.relation_roles
            .entry(Self::key(cell_url, relation_id))
            .or_default()
            .push(role);
    }

    pub fn link_relation_ext_role(&self, cell_url: &str, ext_role: ExtRoleRef) {
        self.relation_ext_roles
            .entry(Self::key(cell_url, &ext_role.relation_id))
            .or_default()
            .push(ext_role);
    }

    pub fn link_ext_role_role(&self, cell_url: &str, ext_role_id: &str, role: RoleRef) {
        self.ext_role_roles
            .entry(Self::key(cell_url, ext_role_id))
            .or_default()
            .push(role);
    }

    pub fn add_box(&self, cell_url: &str, entry: BoxEntry) {
        self.boxes.insert(Self::key(cell_url, &entry.name), entry);
    }

    pub fn set_schema_level(&self, cell_url: &str, resource_path: &str, level: SchemaLevel) {
        self.schema_levels
            .insert(Self::key(cell_url, resource_path), level);
    }

    pub fn set_owner_representatives(&self, cell_url: &str, accounts: Vec<String>) {
        self.owner_reps.insert(cell_url.to_string(), accounts);
    }

    pub fn set_history_exempt_accounts(&self, cell_url: &str, accounts: Vec<String>) {
        self.history_exempt.insert(cell_url.to_string(), accounts);
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn get_cell(&self, cell_url: &str) -> Result<Option<Cell>, BrokerError> {
        Ok(self.cells.get(cell_url).map(|c| c.clone()))
    }

    async fn get_account(
        &self,
        cell_url: &str,
        name: &str,
    ) -> Result<Option<Account>, BrokerError> {
        Ok(self
            .accounts
            .get(&Self::key(cell_url, name))
            .map(|a| a.clone()))
    }

    async fn get_direct_roles(
        &self,
        cell_url: &str,
        account_name: &str,
    ) -> Result<Vec<RoleRef>, BrokerError> {
        Ok(self
            .direct_roles
            .get(&Self::key(cell_url, account_name))
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    async fn get_ext_cells_matching(
        &self,
        cell_url: &str,
        url_variations: &[String],
    ) -> Result<Vec<ExtCellRef>, BrokerError> {
        Ok(self
            .ext_cells
            .get(cell_url)
            .map(|list| {
                list.iter()
                    .filter(|e| url_variations.iter().any(|v| v == &e.url))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_roles_for_ext_cell(
        &self,
        cell_url: &str,
        ext_cell_id: &str,
    ) -> Result<Vec<RoleRef>, BrokerError> {
        Ok(self
            .ext_cell_roles
            .get(&Self::key(cell_url, ext_cell_id))
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    async fn get_relations_for_ext_cell(
        &self,
        cell_url: &str,
        ext_cell_id: &str,
    ) -> Result<Vec<RelationRef>, BrokerError> {
        Ok(self
            .ext_cell_relations
            .get(&Self::key(cell_url, ext_cell_id))
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    async fn get_roles_for_relation(
        &self,
        cell_url: &str,
        relation_id: &str,
    ) -> Result<Vec<RoleRef>, BrokerError> {
        Ok(self
            .relation_roles
            .get(&Self::key(cell_url, relation_id))
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    async fn get_ext_roles_for_relation(
        &self,
        cell_url: &str,
        relation_id: &str,
    ) -> Result<Vec<ExtRoleRef>, BrokerError> {
        Ok(self
            .relation_ext_roles
            .get(&Self::key(cell_url, relation_id))
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    async fn get_roles_for_ext_role(
        &self,
        cell_url: &str,
        ext_role_id: &str,
    ) -> Result<Vec<RoleRef>, BrokerError> {
        Ok(self
            .ext_role_roles
            .get(&Self::key(cell_url, ext_role_id))
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    async fn get_box(
        &self,
        cell_url: &str,
        box_name: &str,
    ) -> Result<Option<BoxEntry>, BrokerError> {
        Ok(self
            .boxes
            .get(&Self::key(cell_url, box_name))
            .map(|b| b.clone()))
    }

    async fn get_schema_level(
        &self,
        cell_url: &str,
        resource_path: &str,
    ) -> Result<Option<SchemaLevel>, BrokerError> {
        Ok(self
            .schema_levels
            .get(&Self::key(cell_url, resource_path))
            .map(|l| *l))
    }

    async fn owner_representative_accounts(
        &self,
        cell_url: &str,
    ) -> Result<Vec<String>, BrokerError> {
        Ok(self
            .owner_reps
            .get(cell_url)
            .map(|a| a.clone())
            .unwrap_or_default())
    }

    async fn accounts_not_recording_auth_history(
        &self,
        cell_url: &str,
    ) -> Result<Vec<String>, BrokerError> {
        Ok(self
            .history_exempt
            .get(cell_url)
            .map(|a| a.clone())
            .unwrap_or_default())
    }
}
