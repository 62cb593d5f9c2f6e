//! Access and operational guard
//!
//! A single composable precondition run at the top of every mutating
//! operation: the global operational flag first, then the caller's role.
//! Role membership for airlines and oracles lives in the ledger, so the
//! guard asks a [`RoleResolver`] instead of keeping its own copy.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AccessError, GovernanceError, Result};
use crate::security::audit::AuditLogger;
use crate::types::address::Address;
use crate::types::airline::AirlineStatus;

/// Roles a caller may be required to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Deployer of the ledger
    Owner,
    /// Internal component allowed to settle policies
    AuthorizedCaller,
    RegisteredAirline,
    FundedAirline,
    Oracle,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::AuthorizedCaller => write!(f, "authorized-caller"),
            Role::RegisteredAirline => write!(f, "registered-airline"),
            Role::FundedAirline => write!(f, "funded-airline"),
            Role::Oracle => write!(f, "oracle"),
        }
    }
}

/// Answers role questions from ledger state
pub trait RoleResolver {
    fn airline_status(&self, address: &Address) -> AirlineStatus;
    fn is_oracle(&self, address: &Address) -> bool;
}

/// Operational flag plus caller authorization
pub struct AccessGuard {
    owner: Address,
    operational: AtomicBool,
    authorized_callers: RwLock<HashSet<Address>>,
    audit: Arc<AuditLogger>,
}

impl AccessGuard {
    /// New guard, operational, with no authorized callers
    pub fn new(owner: Address, audit: Arc<AuditLogger>) -> Self {
        Self {
            owner,
            operational: AtomicBool::new(true),
            authorized_callers: RwLock::new(HashSet::new()),
            audit,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    pub fn is_operational(&self) -> bool {
        self.operational.load(Ordering::Acquire)
    }

    pub fn is_authorized_caller(&self, caller: &Address) -> bool {
        self.authorized_callers.read().contains(caller)
    }

    pub fn check_operational(&self) -> Result<()> {
        if self.is_operational() {
            Ok(())
        } else {
            Err(AccessError::NotOperational.into())
        }
    }

    /// Fail unless `caller` holds `role`
    pub fn check_caller_authorized(
        &self,
        caller: &Address,
        role: Role,
        resolver: &dyn RoleResolver,
    ) -> Result<()> {
        let allowed = match role {
            Role::Owner => *caller == self.owner,
            Role::AuthorizedCaller => self.is_authorized_caller(caller),
            Role::RegisteredAirline => resolver.airline_status(caller).is_registered(),
            Role::FundedAirline => {
                if resolver.airline_status(caller) != AirlineStatus::Funded {
                    self.audit
                        .log_authorization(caller, "guard", false, "airline not funded");
                    return Err(GovernanceError::NotFunded { airline: *caller }.into());
                }
                true
            }
            Role::Oracle => resolver.is_oracle(caller),
        };

        if allowed {
            debug!(caller = %caller, role = %role, "caller authorized");
            Ok(())
        } else {
            self.audit
                .log_authorization(caller, "guard", false, &format!("missing role {role}"));
            Err(AccessError::Unauthorized {
                caller: *caller,
                role,
            }
            .into())
        }
    }

    /// Operational check followed by the role check
    pub fn guard(&self, caller: &Address, role: Role, resolver: &dyn RoleResolver) -> Result<()> {
        if let Err(e) = self.check_operational() {
            self.audit
                .log_authorization(caller, "guard", false, "not operational");
            return Err(e);
        }
        self.check_caller_authorized(caller, role, resolver)
    }

    /// Owner-only; setting the current value again succeeds without change
    pub fn set_operating_status(&self, operational: bool, caller: &Address) -> Result<()> {
        self.require_owner(caller, "set_operating_status")?;

        let previous = self.operational.swap(operational, Ordering::AcqRel);
        if previous != operational {
            info!(operational, caller = %caller, "operating status changed");
            self.audit.log_config_change(
                caller,
                "operational",
                &previous.to_string(),
                &operational.to_string(),
            );
        }
        Ok(())
    }

    /// Owner-only: allow `contract` to call internal operations
    pub fn authorize_caller(&self, contract: Address, caller: &Address) -> Result<()> {
        self.require_owner(caller, "authorize_caller")?;
        if self.authorized_callers.write().insert(contract) {
            info!(contract = %contract, "caller authorized");
            self.audit
                .log_config_change(caller, "authorized_caller", "", &contract.to_string());
        }
        Ok(())
    }

    /// Owner-only: revoke a previously authorized caller
    pub fn deauthorize_caller(&self, contract: &Address, caller: &Address) -> Result<()> {
        self.require_owner(caller, "deauthorize_caller")?;
        if self.authorized_callers.write().remove(contract) {
            info!(contract = %contract, "caller deauthorized");
            self.audit
                .log_config_change(caller, "authorized_caller", &contract.to_string(), "");
        }
        Ok(())
    }

    fn require_owner(&self, caller: &Address, action: &str) -> Result<()> {
        if *caller == self.owner {
            return Ok(());
        }
        self.audit
            .log_authorization(caller, action, false, "owner only");
        Err(AccessError::Unauthorized {
            caller: *caller,
            role: Role::Owner,
        }
        .into())
    }
}
