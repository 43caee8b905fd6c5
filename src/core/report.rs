//! Monthly ledger report.
//!
//! Totals, alerts and fee groupings for one month, computed from the stored
//! transactions. All functions return structured data; formatting for display
//! lives in [`format_month_summary`].

use crate::{
    core::{month::MonthRef, transaction::get_transactions_for_month},
    entities::{TransactionKind, TransactionStatus, transaction},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::ConnectionTrait;

/// Planned versus settled amounts for one side of the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    /// Sum of every entry
    pub planned: f64,
    /// Sum of paid entries
    pub paid: f64,
}

impl Totals {
    fn add(&mut self, entry: &transaction::Model) {
        self.planned += entry.amount;
        if entry.status == TransactionStatus::Paid {
            self.paid += entry.amount;
        }
    }

    /// Amount still outstanding
    #[must_use]
    pub fn pending(&self) -> f64 {
        self.planned - self.paid
    }
}

/// Fees of a month split by payment situation relative to a reference day.
#[derive(Debug, Clone, Default)]
pub struct FeeGroups {
    /// Pending and due before the reference day
    pub overdue: Vec<transaction::Model>,
    /// Pending and due on the reference day
    pub due_today: Vec<transaction::Model>,
    /// Pending and due after the reference day
    pub upcoming: Vec<transaction::Model>,
    /// Already paid
    pub paid: Vec<transaction::Model>,
}

/// Summary of one month of the ledger.
#[derive(Debug, Clone)]
pub struct MonthSummary {
    /// Month summarised
    pub month_ref: MonthRef,
    /// Fees and extra income
    pub income: Totals,
    /// Fixed and variable expenses
    pub expenses: Totals,
    /// Pending entries due before the reference day
    pub overdue: Vec<transaction::Model>,
    /// Pending entries due on the reference day
    pub due_today: Vec<transaction::Model>,
    /// Fees grouped by situation
    pub fees: FeeGroups,
}

impl MonthSummary {
    /// Planned income minus planned expenses
    #[must_use]
    pub fn net_balance(&self) -> f64 {
        self.income.planned - self.expenses.planned
    }

    /// Received income minus paid expenses
    #[must_use]
    pub fn real_balance(&self) -> f64 {
        self.income.paid - self.expenses.paid
    }

    /// Sum of overdue amounts
    #[must_use]
    pub fn overdue_total(&self) -> f64 {
        self.overdue.iter().map(|t| t.amount).sum()
    }
}

/// Builds a summary from already loaded transactions.
#[must_use]
pub fn summarize(
    month_ref: MonthRef,
    transactions: Vec<transaction::Model>,
    today: NaiveDate,
) -> MonthSummary {
    let mut income = Totals::default();
    let mut expenses = Totals::default();
    let mut overdue = Vec::new();
    let mut due_today = Vec::new();
    let mut fees = FeeGroups::default();

    for entry in transactions {
        if entry.kind.is_income() {
            income.add(&entry);
        } else {
            expenses.add(&entry);
        }

        let pending = entry.status == TransactionStatus::Pending;
        if pending && entry.due_date < today {
            overdue.push(entry.clone());
        } else if pending && entry.due_date == today {
            due_today.push(entry.clone());
        }

        if entry.kind == TransactionKind::Fee {
            let group = match (pending, entry.due_date.cmp(&today)) {
                (false, _) => &mut fees.paid,
                (true, std::cmp::Ordering::Less) => &mut fees.overdue,
                (true, std::cmp::Ordering::Equal) => &mut fees.due_today,
                (true, std::cmp::Ordering::Greater) => &mut fees.upcoming,
            };
            group.push(entry);
        }
    }

    MonthSummary {
        month_ref,
        income,
        expenses,
        overdue,
        due_today,
        fees,
    }
}

/// Loads a month's transactions and summarises them relative to `today`.
pub async fn generate_month_summary<C>(
    db: &C,
    month_ref: MonthRef,
    today: NaiveDate,
) -> Result<MonthSummary>
where
    C: ConnectionTrait,
{
    let transactions = get_transactions_for_month(db, month_ref).await?;
    Ok(summarize(month_ref, transactions, today))
}

/// Formats a month summary into a human-readable report.
#[must_use]
pub fn format_month_summary(summary: &MonthSummary) -> String {
    use std::fmt::Write;

    let mut out = format!("Ledger - {}\n", summary.month_ref);
    let _ = writeln!(
        out,
        "  Income:   ${:.2} planned | ${:.2} received | ${:.2} pending",
        summary.income.planned,
        summary.income.paid,
        summary.income.pending()
    );
    let _ = writeln!(
        out,
        "  Expenses: ${:.2} planned | ${:.2} paid | ${:.2} pending",
        summary.expenses.planned,
        summary.expenses.paid,
        summary.expenses.pending()
    );
    let _ = writeln!(
        out,
        "  Balance:  ${:.2} projected | ${:.2} realised",
        summary.net_balance(),
        summary.real_balance()
    );

    if !summary.overdue.is_empty() {
        let _ = writeln!(
            out,
            "  {} items OVERDUE - total ${:.2}",
            summary.overdue.len(),
            summary.overdue_total()
        );
    }
    if !summary.due_today.is_empty() {
        let _ = writeln!(out, "  {} items due TODAY", summary.due_today.len());
    }
    out
}
