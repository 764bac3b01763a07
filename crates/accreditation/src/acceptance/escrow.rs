use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Amount, InstitutionId, Principal};
use super::errors::AcceptanceError;

/// Fee payment on file for an institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub paid: bool,
    pub payer: Principal,
    pub amount_escrowed: Amount,
    pub distributed: bool,
    /// Shares handed to the payment rail whose outcome is not yet recorded.
    #[serde(default)]
    pub in_transit: Amount,
}

/// Custodies application fees until the institution's poll closes and pays out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEscrow {
    records: BTreeMap<InstitutionId, ApplicationRecord>,
    retained: Amount,
}

impl ApplicationEscrow {
    pub fn pay_fee(
        &mut self,
        institution: InstitutionId,
        payer: Principal,
        value: Amount,
    ) -> Result<&ApplicationRecord, AcceptanceError> {
        if self.is_paid(institution) {
            return Err(AcceptanceError::AlreadyPaid);
        }
        if value != Amount::application_fee() {
            return Err(AcceptanceError::InsufficientFee);
        }

        let record = self
            .records
            .entry(institution)
            .or_insert_with(|| ApplicationRecord {
                paid: false,
                payer: payer.clone(),
                amount_escrowed: Amount::ZERO,
                distributed: false,
                in_transit: Amount::ZERO,
            });
        record.paid = true;
        record.payer = payer;
        record.amount_escrowed = value;
        Ok(&*record)
    }

    pub fn is_paid(&self, institution: InstitutionId) -> bool {
        self.records
            .get(&institution)
            .map(|record| record.paid)
            .unwrap_or(false)
    }

    pub fn record(&self, institution: InstitutionId) -> Option<&ApplicationRecord> {
        self.records.get(&institution)
    }

    /// Escrowed balance still held for the institution.
    pub fn balance(&self, institution: InstitutionId) -> Amount {
        self.records
            .get(&institution)
            .map(|record| record.amount_escrowed)
            .unwrap_or(Amount::ZERO)
    }

    /// Funds the system keeps: division remainders and failed payouts.
    pub fn retained(&self) -> Amount {
        self.retained
    }

    /// Shares dispatched for the institution that still await confirmation.
    pub fn in_transit(&self, institution: InstitutionId) -> Amount {
        self.records
            .get(&institution)
            .map(|record| record.in_transit)
            .unwrap_or(Amount::ZERO)
    }

    /// Total value in custody across every institution plus retained funds, counting
    /// unconfirmed shares.
    pub fn total_custody(&self) -> Amount {
        self.records
            .values()
            .fold(self.retained, |total, record| {
                Amount(
                    total
                        .0
                        .saturating_add(record.amount_escrowed.0)
                        .saturating_add(record.in_transit.0),
                )
            })
    }

    /// Zero the institution's escrow and mark it distributed, returning the released amount.
    pub(crate) fn release(&mut self, institution: InstitutionId) -> Result<Amount, AcceptanceError> {
        let record = self
            .records
            .get_mut(&institution)
            .filter(|record| record.paid)
            .ok_or(AcceptanceError::NotPaid)?;
        if record.distributed {
            return Err(AcceptanceError::AlreadyDistributed);
        }

        let released = record.amount_escrowed;
        record.amount_escrowed = Amount::ZERO;
        record.distributed = true;
        Ok(released)
    }

    /// Mark `amount` as handed to the payment rail.
    pub(crate) fn dispatch(
        &mut self,
        institution: InstitutionId,
        amount: Amount,
    ) -> Result<(), AcceptanceError> {
        let record = self
            .records
            .get_mut(&institution)
            .ok_or(AcceptanceError::NotPaid)?;
        record.in_transit = amount;
        Ok(())
    }

    /// Record the payout outcome: clear the in-transit amount and keep what was not delivered.
    pub(crate) fn confirm_payout(
        &mut self,
        institution: InstitutionId,
        undelivered: Amount,
    ) -> Result<(), AcceptanceError> {
        let record = self
            .records
            .get_mut(&institution)
            .ok_or(AcceptanceError::NotPaid)?;
        record.in_transit = Amount::ZERO;
        self.retain(undelivered)
    }

    pub(crate) fn retain(&mut self, amount: Amount) -> Result<(), AcceptanceError> {
        self.retained = self
            .retained
            .checked_add(amount)
            .ok_or(AcceptanceError::BalanceOverflow)?;
        Ok(())
    }
}
