//! dynrole - dynamic RBAC role composition
//!
//! Computes concrete Roles and ClusterRoles from declarative specifications
//! that inherit existing roles, add allow rules and subtract deny rules.
//! It exposes all modules for testing purposes.

pub mod errors;
pub mod rbac;
pub mod settings;
