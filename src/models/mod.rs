//! Read models for the auth-relevant slice of the directory entities.

mod account;
mod boxes;
mod cell;
mod relation;
mod role;

pub use account::{Account, AccountStatus, AccountType};
pub use boxes::{BoxEntry, SchemaLevel, MAIN_BOX_NAME};
pub use cell::Cell;
pub use relation::{ExtCellRef, ExtRoleRef, RelationRef};
pub use role::RoleRef;
