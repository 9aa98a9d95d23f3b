//! # Settlement Math
//!
//! Pure arithmetic behind every sale, purchase and payment: status
//! derivation, the sale payment split, overpayment allocation and the
//! correction rules. The engine crate performs the I/O; every number it
//! writes comes from here.
//!
//! ## Sale Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cash_tendered ─┐                                                       │
//! │                 ├─► total_payment ─┬─► applied = min(payment, total)    │
//! │  credit_used ───┘                  └─► excess  = max(0, payment-total)  │
//! │       ▲                                           │                     │
//! │       │ min(requested, credit_balance, total)     ▼                     │
//! │                                          plan_allocation(excess, ...)   │
//! │                                           ├─► oldest sale first         │
//! │                                           └─► leftover → credit balance │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Money Conservation
//! `cash + credit_used == applied + Σ allocations + credit_added` for every
//! plan produced here. The property tests at the bottom check it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::MAX_MONEY;
use crate::quantity::Quantity;
use crate::types::ObligationStatus;

// =============================================================================
// Status
// =============================================================================

/// Derives an obligation's status from what has been paid.
///
/// ```rust
/// use stockbook_core::money::Money;
/// use stockbook_core::settlement::derive_status;
/// use stockbook_core::types::ObligationStatus;
///
/// let total = Money::from_cents(20_000);
/// assert_eq!(derive_status(Money::zero(), total), ObligationStatus::Pending);
/// assert_eq!(derive_status(Money::from_cents(1), total), ObligationStatus::Partial);
/// assert_eq!(derive_status(total, total), ObligationStatus::Paid);
/// ```
pub fn derive_status(amount_paid: Money, total: Money) -> ObligationStatus {
    if amount_paid.is_zero() {
        ObligationStatus::Pending
    } else if amount_paid < total {
        ObligationStatus::Partial
    } else {
        ObligationStatus::Paid
    }
}

// =============================================================================
// Obligation Totals
// =============================================================================

/// The monetary state of a sale or purchase.
///
/// Only ever constructed through [`ObligationTotals::new`] or the revise
/// methods, so `balance` and `status` cannot drift from `total` and
/// `amount_paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ObligationTotals {
    pub total: Money,
    pub amount_paid: Money,
    pub balance: Money,
    pub status: ObligationStatus,
}

impl ObligationTotals {
    pub fn new(total: Money, amount_paid: Money) -> Self {
        ObligationTotals {
            total,
            amount_paid,
            balance: total - amount_paid,
            status: derive_status(amount_paid, total),
        }
    }

    /// Applies a payment, capped at the outstanding balance.
    ///
    /// Returns the updated totals, the applied amount and the excess that
    /// did not fit.
    pub fn apply_payment(&self, amount: Money) -> (ObligationTotals, Money, Money) {
        let outstanding = self.balance.non_negative();
        let applied = amount.min(outstanding);
        let excess = amount - applied;
        (
            ObligationTotals::new(self.total, self.amount_paid + applied),
            applied,
            excess,
        )
    }

    /// Recomputes the totals for a corrected total.
    ///
    /// `recorded` is Σ PaymentRecords for the obligation; a total below it
    /// would leave money recorded against nothing.
    pub fn revise_total(&self, new_total: Money, recorded: Money) -> CoreResult<ObligationTotals> {
        if new_total.is_negative() {
            return Err(CoreError::invalid_state("total cannot be negative"));
        }
        if new_total < recorded {
            return Err(CoreError::invalid_state(format!(
                "total {} is below the {} already paid",
                new_total, recorded
            )));
        }
        if self.amount_paid > new_total {
            return Err(CoreError::invalid_state(format!(
                "amount paid {} exceeds total {}",
                self.amount_paid, new_total
            )));
        }
        Ok(ObligationTotals::new(new_total, self.amount_paid))
    }

    /// Recomputes the totals for a corrected amount paid.
    ///
    /// Returns the new totals and the corrective payment that must be
    /// recorded (`new_amount_paid - recorded`, zero when already covered).
    pub fn revise_amount_paid(
        &self,
        new_amount_paid: Money,
        recorded: Money,
    ) -> CoreResult<(ObligationTotals, Money)> {
        if new_amount_paid > self.total {
            return Err(CoreError::invalid_state(format!(
                "amount paid {} exceeds total {}",
                new_amount_paid, self.total
            )));
        }
        if new_amount_paid < recorded {
            return Err(CoreError::invalid_state(format!(
                "amount paid {} is below the {} already recorded; payments cannot be removed",
                new_amount_paid, recorded
            )));
        }
        Ok((
            ObligationTotals::new(self.total, new_amount_paid),
            new_amount_paid - recorded,
        ))
    }

    /// `balance == total - amount_paid` and the status matches.
    pub fn is_consistent(&self) -> bool {
        !self.amount_paid.is_negative()
            && self.balance == self.total - self.amount_paid
            && self.status == derive_status(self.amount_paid, self.total)
    }
}

// =============================================================================
// Sale Payment Plan
// =============================================================================

/// How much store credit the caller wants to spend on a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreditRequest {
    pub use_credit: bool,
    /// Upper bound on the credit spent. `None` means "as much as available".
    pub cap: Option<Money>,
}

/// Result of splitting a sale's payment into applied, excess and credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalePaymentPlan {
    pub credit_used: Money,
    /// Portion of the cash that lands on this sale.
    pub cash_applied: Money,
    pub totals: ObligationTotals,
    /// Cash beyond the total; handed to the allocator.
    pub excess: Money,
}

impl SalePaymentPlan {
    pub fn applied(&self) -> Money {
        self.totals.amount_paid
    }
}

/// Plans the payment side of a new sale.
///
/// Credit is consumed first and never beyond the sale total, so any excess
/// is always cash.
pub fn plan_sale_payment(
    total: Money,
    cash_tendered: Money,
    credit: CreditRequest,
    credit_balance: Money,
) -> CoreResult<SalePaymentPlan> {
    if total.is_negative() {
        return Err(CoreError::invalid_state("sale total cannot be negative"));
    }
    if cash_tendered.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "cash_tendered".to_string(),
        }
        .into());
    }

    let credit_used = if credit.use_credit {
        let requested = credit.cap.unwrap_or(credit_balance).non_negative();
        requested.min(credit_balance.non_negative()).min(total)
    } else {
        Money::zero()
    };

    let total_payment = cash_tendered
        .checked_add(credit_used)
        .filter(|payment| *payment <= MAX_MONEY)
        .ok_or_else(|| out_of_range("cash_tendered"))?;
    let applied = total_payment.min(total);
    let excess = (total_payment - total).non_negative();

    Ok(SalePaymentPlan {
        credit_used,
        cash_applied: applied - credit_used,
        totals: ObligationTotals::new(total, applied),
        excess,
    })
}

// =============================================================================
// Allocation Plan
// =============================================================================

/// An open obligation competing for excess funds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutstandingBalance {
    pub obligation_id: String,
    pub balance: Money,
}

/// One slice of an excess payment landing on an older obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Allocation {
    pub obligation_id: String,
    pub amount: Money,
}

/// Where an excess payment goes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AllocationPlan {
    pub allocations: Vec<Allocation>,
    pub credit_added: Money,
}

impl AllocationPlan {
    pub fn allocated(&self) -> Money {
        self.allocations.iter().map(|a| a.amount).sum()
    }
}

/// Spreads `excess` over `outstanding` in the given order, oldest first.
///
/// Callers pass the obligations already sorted by supply date. Whatever
/// remains becomes store credit.
pub fn plan_allocation(excess: Money, outstanding: &[OutstandingBalance]) -> AllocationPlan {
    let mut remaining = excess.non_negative();
    let mut allocations = Vec::new();

    for open in outstanding {
        if !remaining.is_positive() {
            break;
        }
        if !open.balance.is_positive() {
            continue;
        }
        let payment = remaining.min(open.balance);
        allocations.push(Allocation {
            obligation_id: open.obligation_id.clone(),
            amount: payment,
        });
        remaining -= payment;
    }

    AllocationPlan {
        allocations,
        credit_added: remaining,
    }
}

// =============================================================================
// Lines & Codes
// =============================================================================

fn out_of_range(field: &str) -> CoreError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: MAX_MONEY.cents(),
    }
    .into()
}

/// `unit_price × quantity`, rounded to the cent. Fails when the product
/// leaves `0..=MAX_MONEY`.
pub fn line_total(unit_price: Money, quantity: Quantity) -> CoreResult<Money> {
    unit_price
        .checked_times(quantity)
        .filter(|total| *total <= MAX_MONEY)
        .ok_or_else(|| out_of_range("line_total"))
}

/// Sums line totals into an obligation total bounded by `MAX_MONEY`.
pub fn obligation_total<I>(line_totals: I) -> CoreResult<Money>
where
    I: IntoIterator<Item = Money>,
{
    Money::checked_sum(line_totals)
        .filter(|total| *total <= MAX_MONEY)
        .ok_or_else(|| out_of_range("total"))
}

/// Sums quantities per item, keeping first-seen order.
///
/// A sale listing the same product twice must be checked against stock
/// for the combined quantity.
pub fn aggregate_demand<'a, I>(lines: I) -> Vec<(String, Quantity)>
where
    I: IntoIterator<Item = (&'a str, Quantity)>,
{
    let mut demand: Vec<(String, Quantity)> = Vec::new();
    for (item_id, quantity) in lines {
        match demand.iter_mut().find(|(id, _)| id == item_id) {
            Some((_, q)) => *q += quantity,
            None => demand.push((item_id.to_string(), quantity)),
        }
    }
    demand
}

/// Formats a daily sequence code: `SAL-20261017-0007`.
pub fn sequence_code(prefix: &str, day: NaiveDate, value: i64) -> String {
    format!("{}-{}-{:04}", prefix, day.format("%Y%m%d"), value)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    fn open(id: &str, cents: i64) -> OutstandingBalance {
        OutstandingBalance {
            obligation_id: id.to_string(),
            balance: m(cents),
        }
    }

    #[test]
    fn test_status_table() {
        assert_eq!(derive_status(m(0), m(100)), ObligationStatus::Pending);
        assert_eq!(derive_status(m(50), m(100)), ObligationStatus::Partial);
        assert_eq!(derive_status(m(100), m(100)), ObligationStatus::Paid);
        assert_eq!(derive_status(m(0), m(0)), ObligationStatus::Pending);
    }

    #[test]
    fn test_cash_overpayment_plan() {
        // 2 × 100.00 paid with 250.00 cash
        let plan = plan_sale_payment(m(20_000), m(25_000), CreditRequest::default(), m(0)).unwrap();
        assert_eq!(plan.applied(), m(20_000));
        assert_eq!(plan.excess, m(5_000));
        assert_eq!(plan.totals.status, ObligationStatus::Paid);
        assert_eq!(plan.totals.balance, m(0));
    }

    #[test]
    fn test_credit_without_cap_uses_whole_balance() {
        let credit = CreditRequest {
            use_credit: true,
            cap: None,
        };
        let plan = plan_sale_payment(m(10_000), m(2_000), credit, m(3_000)).unwrap();
        assert_eq!(plan.credit_used, m(3_000));
        assert_eq!(plan.cash_applied, m(2_000));
        assert_eq!(plan.totals.balance, m(5_000));
        assert_eq!(plan.totals.status, ObligationStatus::Partial);
    }

    #[test]
    fn test_credit_never_exceeds_total() {
        let credit = CreditRequest {
            use_credit: true,
            cap: Some(m(50_000)),
        };
        let plan = plan_sale_payment(m(4_000), m(1_000), credit, m(9_000)).unwrap();
        assert_eq!(plan.credit_used, m(4_000));
        assert_eq!(plan.cash_applied, m(0));
        assert_eq!(plan.excess, m(1_000));
    }

    #[test]
    fn test_allocation_oldest_first_with_leftover_credit() {
        let plan = plan_allocation(m(15_000), &[open("s1", 6_000), open("s2", 5_000)]);
        assert_eq!(
            plan.allocations,
            vec![
                Allocation {
                    obligation_id: "s1".into(),
                    amount: m(6_000)
                },
                Allocation {
                    obligation_id: "s2".into(),
                    amount: m(5_000)
                },
            ]
        );
        assert_eq!(plan.credit_added, m(4_000));
    }

    #[test]
    fn test_allocation_partial_last_obligation() {
        let plan = plan_allocation(m(7_000), &[open("s1", 6_000), open("s2", 5_000)]);
        assert_eq!(plan.allocations[1].amount, m(1_000));
        assert_eq!(plan.credit_added, m(0));
    }

    #[test]
    fn test_revise_total_below_recorded_rejected() {
        let totals = ObligationTotals::new(m(10_000), m(4_000));
        assert!(matches!(
            totals.revise_total(m(3_000), m(4_000)),
            Err(CoreError::InvalidState { .. })
        ));
        let revised = totals.revise_total(m(4_000), m(4_000)).unwrap();
        assert_eq!(revised.status, ObligationStatus::Paid);
    }

    #[test]
    fn test_revise_amount_paid() {
        let totals = ObligationTotals::new(m(10_000), m(4_000));
        let (revised, corrective) = totals.revise_amount_paid(m(7_000), m(4_000)).unwrap();
        assert_eq!(corrective, m(3_000));
        assert_eq!(revised.balance, m(3_000));

        assert!(totals.revise_amount_paid(m(3_000), m(4_000)).is_err());
        assert!(totals.revise_amount_paid(m(10_001), m(4_000)).is_err());
    }

    #[test]
    fn test_apply_payment_returns_excess() {
        let totals = ObligationTotals::new(m(5_000), m(1_000));
        let (after, applied, excess) = totals.apply_payment(m(6_000));
        assert_eq!(applied, m(4_000));
        assert_eq!(excess, m(2_000));
        assert_eq!(after.status, ObligationStatus::Paid);
    }

    #[test]
    fn test_line_total_rejects_overflow() {
        assert_eq!(line_total(m(399), Quantity::from_milli(2_500)).unwrap(), m(998));

        // wraps to 2 cents in unchecked i64 arithmetic
        let err = line_total(m(6_148_914_691_236_517_206), Quantity::from_units(3)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "line_total"
        ));
        assert!(line_total(MAX_MONEY, Quantity::from_units(2)).is_err());
    }

    #[test]
    fn test_obligation_total_bounded() {
        assert_eq!(obligation_total([m(6_000), m(5_000)]).unwrap(), m(11_000));
        assert!(obligation_total([MAX_MONEY, m(1)]).is_err());
        assert!(obligation_total([m(i64::MAX), m(i64::MAX)]).is_err());
    }

    #[test]
    fn test_huge_cash_with_credit_is_rejected() {
        let credit = CreditRequest {
            use_credit: true,
            cap: None,
        };
        let err = plan_sale_payment(m(10_000), m(i64::MAX), credit, m(100)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "cash_tendered"
        ));
    }

    #[test]
    fn test_aggregate_demand_sums_repeats() {
        let demand = aggregate_demand(vec![
            ("A", Quantity::from_units(2)),
            ("B", Quantity::from_units(1)),
            ("A", Quantity::from_units(3)),
        ]);
        assert_eq!(
            demand,
            vec![
                ("A".to_string(), Quantity::from_units(5)),
                ("B".to_string(), Quantity::from_units(1)),
            ]
        );
    }

    #[test]
    fn test_sequence_code_format() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert_eq!(sequence_code("SAL", day, 7), "SAL-20261017-0007");
        assert_eq!(sequence_code("PUR", day, 12345), "PUR-20261017-12345");
    }

    proptest! {
        #[test]
        fn prop_allocation_conserves_money(
            excess in 0i64..10_000_000,
            balances in proptest::collection::vec(0i64..1_000_000, 0..8),
        ) {
            let outstanding: Vec<_> = balances
                .iter()
                .enumerate()
                .map(|(i, b)| open(&format!("s{}", i), *b))
                .collect();
            let plan = plan_allocation(m(excess), &outstanding);

            prop_assert_eq!(plan.allocated() + plan.credit_added, m(excess));
            prop_assert!(!plan.credit_added.is_negative());
            for alloc in &plan.allocations {
                let bal = outstanding
                    .iter()
                    .find(|o| o.obligation_id == alloc.obligation_id)
                    .map(|o| o.balance)
                    .unwrap();
                prop_assert!(alloc.amount.is_positive());
                prop_assert!(alloc.amount <= bal);
            }
        }

        #[test]
        fn prop_sale_plan_conserves_money(
            total in 0i64..1_000_000,
            cash in 0i64..2_000_000,
            credit_balance in 0i64..1_000_000,
            use_credit in any::<bool>(),
            cap in proptest::option::of(0i64..1_000_000),
        ) {
            let request = CreditRequest { use_credit, cap: cap.map(m) };
            let plan = plan_sale_payment(m(total), m(cash), request, m(credit_balance)).unwrap();

            prop_assert_eq!(m(cash) + plan.credit_used, plan.applied() + plan.excess);
            prop_assert!(plan.credit_used <= m(credit_balance));
            prop_assert!(plan.credit_used <= m(total));
            prop_assert!(!plan.totals.balance.is_negative());
            prop_assert!(plan.totals.is_consistent());
        }

        #[test]
        fn prop_status_is_pure(paid in 0i64..1_000_000, total in 0i64..1_000_000) {
            prop_assert_eq!(derive_status(m(paid), m(total)), derive_status(m(paid), m(total)));
            let totals = ObligationTotals::new(m(total), m(paid));
            prop_assert_eq!(totals.status == ObligationStatus::Paid, paid > 0 && paid >= total);
        }
    }
}
