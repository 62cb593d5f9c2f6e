//! Credit withdrawal
//!
//! Withdrawal follows check-effects-interactions: the credit balance is
//! zeroed and the treasury debited before the external transfer is awaited.
//! No lock is held across the transfer. A failed transfer puts both back.

use async_trait::async_trait;
use dashmap::DashMap;
use flightsurety_common::{Address, CreditError, InsuranceError, Result};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, instrument};

use crate::ledger::events::{amount, now};
use crate::ledger::LedgerEvent;

use super::book::PolicyManager;

/// External value transfer to a passenger
#[async_trait]
pub trait PayoutGateway: Send + Sync {
    /// Move `amount` to `to`; an error means nothing was transferred
    async fn transfer(&self, to: Address, amount: Decimal) -> std::result::Result<(), String>;
}

/// Gateway that records transfers in memory
#[derive(Default)]
pub struct InMemoryPayoutGateway {
    paid: DashMap<Address, Decimal>,
    fail_transfers: AtomicBool,
}

impl InMemoryPayoutGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total transferred to `to`
    pub fn paid_to(&self, to: &Address) -> Decimal {
        self.paid.get(to).map(|v| *v).unwrap_or(Decimal::ZERO)
    }

    /// Make subsequent transfers fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.fail_transfers.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PayoutGateway for InMemoryPayoutGateway {
    async fn transfer(&self, to: Address, amount: Decimal) -> std::result::Result<(), String> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err("transfer rejected".to_string());
        }
        *self.paid.entry(to).or_insert(Decimal::ZERO) += amount;
        Ok(())
    }
}

impl PolicyManager {
    /// Pay out the full credit balance of `passenger`
    #[instrument(skip_all, fields(passenger = %passenger))]
    pub async fn withdraw_credit(&self, passenger: Address) -> Result<Decimal> {
        self.ledger.check_operational()?;
        let state = self.ledger.state();

        // Effects: drain and debit while holding the account entry
        let payout = {
            let mut account = state
                .credits
                .get_mut(&passenger)
                .ok_or(CreditError::NoCredit { owner: passenger })?;
            let payout = account.drain()?;
            if let Err(e) = state.disburse(payout) {
                account.restore(payout)?;
                return Err(e.into());
            }
            payout
        };

        // Interaction
        if let Err(reason) = self.gateway.transfer(passenger, payout).await {
            error!(amount = %payout, reason = %reason, "Payout transfer failed, restoring credit");
            state.deposit(payout);
            if let Some(mut account) = state.credits.get_mut(&passenger) {
                account.restore(payout)?;
            }
            return Err(InsuranceError::TransferFailed {
                passenger,
                amount: payout,
                reason,
            }
            .into());
        }

        self.ledger.metrics().credits_withdrawn.inc();
        self.ledger.journal().append(LedgerEvent::CreditWithdrawn {
            passenger,
            amount: amount(payout),
            timestamp: now(),
        });
        info!(amount = %payout, "Credit withdrawn");
        Ok(payout)
    }
}
