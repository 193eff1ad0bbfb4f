//! Trust-graph role resolution.
//!
//! Decides which roles a principal holds in a target cell. Local
//! principals get their directly linked roles. Foreign principals are
//! resolved through the target cell's registered federation edges:
//! ext-cell links, relations, and ext-role aliases. The walk is pure
//! read traversal; an empty result is an ordinary answer, not a fault.
//!
//! Chained federation (A to B to C) never copies roles forward: each
//! hop re-runs this resolution with the roles minted at the previous
//! hop as the presented set.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::BrokerError;
use crate::models::RoleRef;
use crate::services::directory::Directory;
use crate::utils::uri::UnitUrlResolver;

pub struct RoleResolver {
    directory: Arc<dyn Directory>,
    urls: UnitUrlResolver,
}

impl RoleResolver {
    pub fn new(directory: Arc<dyn Directory>, urls: UnitUrlResolver) -> Self {
        Self { directory, urls }
    }

    /// Resolve the roles `principal_subject` (whose home cell is
    /// `home_cell`, holding `presented_roles` there) is granted in
    /// `target_cell`. Deduplicated by (box, name), first-seen order.
    pub async fn resolve_roles(
        &self,
        home_cell: &str,
        principal_subject: &str,
        presented_roles: &[String],
        target_cell: &str,
    ) -> Result<Vec<RoleRef>, BrokerError> {
        if self.urls.urls_equal(home_cell, target_cell) {
            return self.direct_roles(home_cell, principal_subject).await;
        }
        self.federated_roles(home_cell, presented_roles, target_cell)
            .await
    }

    /// Role instance URLs for a resolved set, as minted into a token
    /// addressed by `cell_url`.
    pub fn role_urls(&self, roles: &[RoleRef], cell_url: &str) -> Vec<String> {
        let cell = self.urls.normalize(cell_url);
        roles.iter().map(|r| r.to_instance_url(&cell)).collect()
    }

    async fn direct_roles(
        &self,
        cell_url: &str,
        principal_subject: &str,
    ) -> Result<Vec<RoleRef>, BrokerError> {
        // Resident subjects read `{cell}#{account}`.
        let account = principal_subject
            .rsplit_once('#')
            .map(|(_, name)| name)
            .unwrap_or(principal_subject);
        let cell = self.urls.normalize(cell_url);
        let roles = self.directory.get_direct_roles(&cell, account).await?;
        Ok(dedup(roles))
    }

    async fn federated_roles(
        &self,
        home_cell: &str,
        presented_roles: &[String],
        target_cell: &str,
    ) -> Result<Vec<RoleRef>, BrokerError> {
        let target = self.urls.normalize(target_cell);
        let home_spellings = self.urls.variations(home_cell);
        let ext_cells = self
            .directory
            .get_ext_cells_matching(&target, &home_spellings)
            .await?;
        if ext_cells.is_empty() {
            debug!(home = %home_cell, target = %target, "no ext-cell registered, empty grant");
            return Ok(Vec::new());
        }

        let mut granted = Vec::new();
        for ext_cell in &ext_cells {
            granted.extend(
                self.directory
                    .get_roles_for_ext_cell(&target, &ext_cell.id)
                    .await?,
            );

            let relations = self
                .directory
                .get_relations_for_ext_cell(&target, &ext_cell.id)
                .await?;
            for relation in &relations {
                granted.extend(
                    self.directory
                        .get_roles_for_relation(&target, &relation.id)
                        .await?,
                );

                let ext_roles = self
                    .directory
                    .get_ext_roles_for_relation(&target, &relation.id)
                    .await?;
                for ext_role in &ext_roles {
                    let held = presented_roles
                        .iter()
                        .any(|presented| self.urls.urls_equal(presented, &ext_role.role_url));
                    if held {
                        granted.extend(
                            self.directory
                                .get_roles_for_ext_role(&target, &ext_role.id)
                                .await?,
                        );
                    }
                }
            }
        }
        Ok(dedup(granted))
    }
}

fn dedup(roles: Vec<RoleRef>) -> Vec<RoleRef> {
    let mut seen = HashSet::new();
    roles
        .into_iter()
        .filter(|r| seen.insert(r.dedup_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtCellRef, ExtRoleRef, RelationRef};
    use crate::services::directory::MemoryDirectory;

    const CELL_A: &str = "https://unit.example/cell-a/";
    const CELL_B: &str = "https://unit.example/cell-b/";
    const CELL_C: &str = "https://unit.example/cell-c/";

    fn resolver(directory: Arc<MemoryDirectory>) -> RoleResolver {
        RoleResolver::new(directory, UnitUrlResolver::new("https://unit.example/"))
    }

    #[tokio::test]
    async fn local_principal_gets_direct_roles() {
        let dir = Arc::new(MemoryDirectory::new());
        dir.link_account_role(CELL_A, "u", RoleRef::unscoped("r1"));
        dir.link_account_role(CELL_A, "u", RoleRef::scoped("r2", "box1"));

        let roles = resolver(dir)
            .resolve_roles(CELL_A, &format!("{CELL_A}#u"), &[], CELL_A)
            .await
            .unwrap();
        assert_eq!(
            roles,
            vec![RoleRef::unscoped("r1"), RoleRef::scoped("r2", "box1")]
        );
    }

    #[tokio::test]
    async fn relation_path_grants_the_linked_role() {
        let dir = Arc::new(MemoryDirectory::new());
        dir.add_ext_cell(
            CELL_B,
            ExtCellRef {
                id: "ec1".to_string(),
                url: CELL_A.to_string(),
            },
        );
        dir.link_ext_cell_relation(
            CELL_B,
            "ec1",
            RelationRef {
                id: "rel1".to_string(),
                name: "partner".to_string(),
            },
        );
        dir.link_relation_role(CELL_B, "rel1", RoleRef::unscoped("r2"));

        let dir2 = dir.clone();
        let roles = resolver(dir)
            .resolve_roles(CELL_A, &format!("{CELL_A}#u"), &[], CELL_B)
            .await
            .unwrap();
        assert_eq!(roles, vec![RoleRef::unscoped("r2")]);

        // Removing the ext-cell link yields the empty set, not an error.
        dir2.remove_ext_cell(CELL_B, "ec1");
        let roles = resolver(dir2)
            .resolve_roles(CELL_A, &format!("{CELL_A}#u"), &[], CELL_B)
            .await
            .unwrap();
        assert!(roles.is_empty());
    }

    #[tokio::test]
    async fn ext_cell_stored_as_localunit_alias_still_matches() {
        let dir = Arc::new(MemoryDirectory::new());
        dir.add_ext_cell(
            CELL_B,
            ExtCellRef {
                id: "ec1".to_string(),
                url: "personium-localunit:/cell-a/".to_string(),
            },
        );
        dir.link_ext_cell_role(CELL_B, "ec1", RoleRef::unscoped("guest"));

        let roles = resolver(dir)
            .resolve_roles(CELL_A, &format!("{CELL_A}#u"), &[], CELL_B)
            .await
            .unwrap();
        assert_eq!(roles, vec![RoleRef::unscoped("guest")]);
    }

    #[tokio::test]
    async fn ext_role_path_requires_the_presented_role() {
        let dir = Arc::new(MemoryDirectory::new());
        dir.add_ext_cell(
            CELL_B,
            ExtCellRef {
                id: "ec1".to_string(),
                url: CELL_A.to_string(),
            },
        );
        dir.link_ext_cell_relation(
            CELL_B,
            "ec1",
            RelationRef {
                id: "rel1".to_string(),
                name: "partner".to_string(),
            },
        );
        dir.link_relation_ext_role(
            CELL_B,
            ExtRoleRef {
                id: "er1".to_string(),
                role_url: format!("{CELL_A}__role/__/vip"),
                relation_id: "rel1".to_string(),
            },
        );
        dir.link_ext_role_role(CELL_B, "er1", RoleRef::unscoped("premium"));

        let r = resolver(dir);

        // Principal does not hold the aliased foreign role: nothing.
        let roles = r
            .resolve_roles(CELL_A, &format!("{CELL_A}#u"), &[], CELL_B)
            .await
            .unwrap();
        assert!(roles.is_empty());

        // Holding it unlocks the ext-role grant.
        let presented = vec![format!("{CELL_A}__role/__/vip")];
        let roles = r
            .resolve_roles(CELL_A, &format!("{CELL_A}#u"), &presented, CELL_B)
            .await
            .unwrap();
        assert_eq!(roles, vec![RoleRef::unscoped("premium")]);
    }

    #[tokio::test]
    async fn duplicate_grants_collapse_by_box_and_name() {
        let dir = Arc::new(MemoryDirectory::new());
        dir.add_ext_cell(
            CELL_B,
            ExtCellRef {
                id: "ec1".to_string(),
                url: CELL_A.to_string(),
            },
        );
        dir.link_ext_cell_role(CELL_B, "ec1", RoleRef::unscoped("r2"));
        dir.link_ext_cell_relation(
            CELL_B,
            "ec1",
            RelationRef {
                id: "rel1".to_string(),
                name: "partner".to_string(),
            },
        );
        dir.link_relation_role(CELL_B, "rel1", RoleRef::unscoped("r2"));
        dir.link_relation_role(CELL_B, "rel1", RoleRef::unscoped("r3"));

        let roles = resolver(dir)
            .resolve_roles(CELL_A, &format!("{CELL_A}#u"), &[], CELL_B)
            .await
            .unwrap();
        assert_eq!(roles, vec![RoleRef::unscoped("r2"), RoleRef::unscoped("r3")]);
    }

    #[tokio::test]
    async fn chained_federation_resolves_per_hop_not_by_union() {
        let dir = Arc::new(MemoryDirectory::new());

        // Hop 1: A's principal gets "b-role" at B via a relation.
        dir.add_ext_cell(
            CELL_B,
            ExtCellRef {
                id: "ec-a".to_string(),
                url: CELL_A.to_string(),
            },
        );
        dir.link_ext_cell_relation(
            CELL_B,
            "ec-a",
            RelationRef {
                id: "rel-ab".to_string(),
                name: "ab".to_string(),
            },
        );
        dir.link_relation_role(CELL_B, "rel-ab", RoleRef::unscoped("b-role"));

        // Hop 2: C grants "c-role" only to holders of B's "b-role".
        dir.add_ext_cell(
            CELL_C,
            ExtCellRef {
                id: "ec-b".to_string(),
                url: CELL_B.to_string(),
            },
        );
        dir.link_ext_cell_relation(
            CELL_C,
            "ec-b",
            RelationRef {
                id: "rel-bc".to_string(),
                name: "bc".to_string(),
            },
        );
        dir.link_relation_ext_role(
            CELL_C,
            ExtRoleRef {
                id: "er-b".to_string(),
                role_url: format!("{CELL_B}__role/__/b-role"),
                relation_id: "rel-bc".to_string(),
            },
        );
        dir.link_ext_role_role(CELL_C, "er-b", RoleRef::unscoped("c-role"));

        let r = resolver(dir);

        let hop1 = r
            .resolve_roles(CELL_A, &format!("{CELL_A}#u"), &[], CELL_B)
            .await
            .unwrap();
        let hop1_urls = r.role_urls(&hop1, CELL_B);
        assert_eq!(hop1_urls, vec![format!("{CELL_B}__role/__/b-role")]);

        // Second hop presents what B minted, not what A held.
        let hop2 = r
            .resolve_roles(CELL_B, &format!("{CELL_A}#u"), &hop1_urls, CELL_C)
            .await
            .unwrap();
        assert_eq!(hop2, vec![RoleRef::unscoped("c-role")]);

        // Skipping B's minting and presenting A's original (empty) set
        // at C yields nothing.
        let skipped = r
            .resolve_roles(CELL_B, &format!("{CELL_A}#u"), &[], CELL_C)
            .await
            .unwrap();
        assert!(skipped.is_empty());
    }
}
