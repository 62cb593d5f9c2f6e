//! Security module - access guard and audit logging
//!
//! This module provides:
//! - The operational flag and caller-role guard wrapping every operation
//! - Audit logging of guard denials and configuration changes

pub mod audit;
pub mod guard;

pub use audit::{AuditEvent, AuditLogger, AuditSeverity};
pub use guard::{AccessGuard, Role, RoleResolver};
