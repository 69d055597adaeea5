//! Permission resolution core.
//!
//! Effective access for a user combines two inputs:
//! - a static role -> permission table (closed enums, reference data), and
//! - per-user grant/revoke overrides written by administrators.
//!
//! Precedence: revoke override > grant override > role grant. The resolver is
//! pure and synchronous; loading a [`Principal`] from the store goes through
//! the [`PrincipalSource`] seam.

mod permission;
mod resolver;
mod role;
mod source;

pub use permission::{Action, Module, Permission};
pub use resolver::{EffectivePermission, OverrideKind, PermissionSource, Principal};
pub use role::Role;
pub use source::{DbPrincipalSource, PrincipalSource};
