use serde::Serialize;
use tracing::warn;

use super::domain::{Amount, InstitutionId, Principal};
use super::errors::AcceptanceError;
use super::events::AcceptanceEvent;
use super::ledger::AcceptanceLedger;
use super::repository::FundsTransfer;

/// Bookkeeping finalized for a distribution before any value leaves custody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionPlan {
    pub institution: InstitutionId,
    pub recipients: Vec<Principal>,
    pub share: Amount,
    pub remainder: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PayoutStatus {
    Paid,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payout {
    pub recipient: Principal,
    pub amount: Amount,
    #[serde(flatten)]
    pub status: PayoutStatus,
}

/// Result of paying out an institution's escrowed fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionReport {
    pub institution: InstitutionId,
    pub share: Amount,
    pub payouts: Vec<Payout>,
    /// Division remainder plus every share that could not be delivered.
    pub retained: Amount,
    /// Set when the payouts went out but their outcome could not be persisted yet; the
    /// undelivered amount is credited to the retained balance by the next commit.
    pub retention_pending: bool,
}

impl DistributionReport {
    pub fn paid_total(&self) -> Amount {
        self.total_where(|status| matches!(status, PayoutStatus::Paid))
    }

    pub fn failed_total(&self) -> Amount {
        self.total_where(|status| matches!(status, PayoutStatus::Failed { .. }))
    }

    fn total_where(&self, predicate: impl Fn(&PayoutStatus) -> bool) -> Amount {
        Amount(
            self.payouts
                .iter()
                .filter(|payout| predicate(&payout.status))
                .map(|payout| payout.amount.0)
                .sum(),
        )
    }
}

/// Splits a closed poll's escrowed fee among the members who cast a ballot.
pub struct FeeDistributor;

impl FeeDistributor {
    /// Effects half of a distribution: zero the escrow, mark it distributed, retain the
    /// remainder, and record the shares as in transit. Runs inside the ledger transaction.
    pub(crate) fn settle(
        ledger: &mut AcceptanceLedger,
        institution: InstitutionId,
    ) -> Result<DistributionPlan, AcceptanceError> {
        let recipients = ledger
            .polls
            .get(institution)
            .filter(|poll| poll.is_closed)
            .map(|poll| poll.voters())
            .ok_or(AcceptanceError::PollNotClosed)?;

        let released = ledger.escrow.release(institution)?;
        let (share, remainder) = released.split(recipients.len());
        ledger.escrow.retain(remainder)?;
        ledger
            .escrow
            .dispatch(institution, Amount(released.0 - remainder.0))?;

        Ok(DistributionPlan {
            institution,
            recipients,
            share,
            remainder,
        })
    }

    /// Record the payout outcome once every share has been attempted.
    pub(crate) fn confirm(
        ledger: &mut AcceptanceLedger,
        report: &DistributionReport,
    ) -> Result<(), AcceptanceError> {
        ledger
            .escrow
            .confirm_payout(report.institution, report.failed_total())
    }

    pub(crate) fn distributed_event(report: &DistributionReport) -> AcceptanceEvent {
        let (paid, failed): (Vec<&Payout>, Vec<&Payout>) = report
            .payouts
            .iter()
            .partition(|payout| matches!(payout.status, PayoutStatus::Paid));
        AcceptanceEvent::FeeDistributed {
            institution: report.institution,
            share: report.share,
            paid: paid.into_iter().map(|payout| payout.recipient.clone()).collect(),
            failed: failed
                .into_iter()
                .map(|payout| payout.recipient.clone())
                .collect(),
            retained: report.retained,
        }
    }

    /// Interaction half: deliver each share. Runs after the ledger commit and outside the
    /// ledger lock; individual failures are reported, never unwound.
    pub(crate) fn pay_out<T>(plan: DistributionPlan, transfers: &T) -> DistributionReport
    where
        T: FundsTransfer + ?Sized,
    {
        let mut retained = plan.remainder;
        let mut payouts = Vec::with_capacity(plan.recipients.len());

        for recipient in plan.recipients {
            if plan.share.is_zero() {
                break;
            }
            let status = match transfers.transfer(&recipient, plan.share) {
                Ok(()) => PayoutStatus::Paid,
                Err(error) => {
                    warn!(
                        institution = %plan.institution,
                        %recipient,
                        amount = %plan.share,
                        %error,
                        "fee share transfer failed; retaining share"
                    );
                    retained = Amount(retained.0.saturating_add(plan.share.0));
                    PayoutStatus::Failed {
                        reason: error.to_string(),
                    }
                }
            };
            payouts.push(Payout {
                recipient,
                amount: plan.share,
                status,
            });
        }

        DistributionReport {
            institution: plan.institution,
            share: plan.share,
            payouts,
            retained,
            retention_pending: false,
        }
    }
}
