//! Transaction business logic - Manual ledger entries and payment.
//!
//! Staff record expenses and extra income by hand; fees and recurring
//! rollovers are produced by [`crate::core::automation`]. Every entry starts
//! `pending` except extra income, which is recorded already received.
//! Payment is a one-way transition guarded by [`mark_paid`].

use crate::{
    core::month::MonthRef,
    entities::{Transaction, TransactionKind, TransactionStatus, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Whether a manually entered expense is fixed or variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseKind {
    /// Recorded as `expense_fixed`
    Fixed,
    /// Recorded as `expense_variable`
    Variable,
}

impl ExpenseKind {
    const fn transaction_kind(self) -> TransactionKind {
        match self {
            Self::Fixed => TransactionKind::ExpenseFixed,
            Self::Variable => TransactionKind::ExpenseVariable,
        }
    }

    const fn category(self) -> &'static str {
        match self {
            Self::Fixed => "Fixed expense",
            Self::Variable => "Variable expense",
        }
    }
}

/// Rejects amounts that are negative, NaN or infinite.
pub(crate) fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(Error::validation("Description cannot be empty"));
    }
    Ok(())
}

/// Records an expense for `month_ref`. Recurring expenses are rolled into the
/// following month by the generator.
#[allow(clippy::too_many_arguments)]
#[instrument(skip(db, description), fields(month = %month_ref))]
pub async fn create_expense(
    db: &DatabaseConnection,
    month_ref: MonthRef,
    kind: ExpenseKind,
    description: String,
    amount: f64,
    due_date: NaiveDate,
    is_recurring: bool,
    now: DateTime<Utc>,
) -> Result<transaction::Model> {
    validate_amount(amount)?;
    validate_description(&description)?;

    let model = transaction::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        kind: Set(kind.transaction_kind()),
        category: Set(kind.category().to_string()),
        description: Set(description.trim().to_string()),
        amount: Set(amount),
        due_date: Set(due_date),
        payment_date: Set(None),
        status: Set(TransactionStatus::Pending),
        member_id: Set(None),
        month_ref: Set(month_ref.to_string()),
        is_recurring: Set(is_recurring),
        created_at: Set(now),
    };

    let result = model.insert(db).await?;
    info!(transaction_id = %result.id, "Recorded expense");
    Ok(result)
}

/// Records income outside member fees. The entry is created already paid,
/// with `now` as its payment date.
#[instrument(skip(db, description), fields(month = %month_ref))]
pub async fn create_extra_income(
    db: &DatabaseConnection,
    month_ref: MonthRef,
    description: String,
    amount: f64,
    received_on: NaiveDate,
    now: DateTime<Utc>,
) -> Result<transaction::Model> {
    validate_amount(amount)?;
    validate_description(&description)?;

    let model = transaction::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        kind: Set(TransactionKind::IncomeExtra),
        category: Set("Extra income".to_string()),
        description: Set(description.trim().to_string()),
        amount: Set(amount),
        due_date: Set(received_on),
        payment_date: Set(Some(now)),
        status: Set(TransactionStatus::Paid),
        member_id: Set(None),
        month_ref: Set(month_ref.to_string()),
        is_recurring: Set(false),
        created_at: Set(now),
    };

    let result = model.insert(db).await?;
    info!(transaction_id = %result.id, "Recorded extra income");
    Ok(result)
}

/// Retrieves a transaction by identifier.
pub async fn get_transaction_by_id<C>(
    db: &C,
    transaction_id: &str,
) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(transaction_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// All transactions of a month, ordered by due date.
pub async fn get_transactions_for_month<C>(
    db: &C,
    month_ref: MonthRef,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::MonthRef.eq(month_ref.to_string()))
        .order_by_asc(transaction::Column::DueDate)
        .order_by_asc(transaction::Column::Description)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks a pending transaction as paid at `payment_time`.
///
/// # Errors
/// `NotFound` if the id does not resolve, `InvalidState` if the transaction
/// is already paid.
#[instrument(skip(db))]
pub async fn mark_paid(
    db: &DatabaseConnection,
    transaction_id: &str,
    payment_time: DateTime<Utc>,
) -> Result<transaction::Model> {
    let existing = get_transaction_by_id(db, transaction_id)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))?;

    if existing.status == TransactionStatus::Paid {
        warn!("Refusing to pay an already paid transaction");
        return Err(Error::InvalidState {
            message: format!("Transaction {transaction_id} is already paid"),
        });
    }

    // Conditional update so a concurrent payment cannot be overwritten
    let result = Transaction::update_many()
        .col_expr(
            transaction::Column::Status,
            Expr::value(TransactionStatus::Paid),
        )
        .col_expr(
            transaction::Column::PaymentDate,
            Expr::value(payment_time),
        )
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::InvalidState {
            message: format!("Transaction {transaction_id} was paid concurrently"),
        });
    }

    info!("Transaction marked paid");
    get_transaction_by_id(db, transaction_id)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))
}

/// Deletes a transaction.
///
/// # Errors
/// `NotFound` if the id does not resolve.
#[instrument(skip(db))]
pub async fn delete_transaction(
    db: &DatabaseConnection,
    transaction_id: &str,
) -> Result<transaction::Model> {
    let existing = get_transaction_by_id(db, transaction_id)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))?;

    Transaction::delete_by_id(transaction_id.to_string())
        .exec(db)
        .await?;
    info!("Transaction deleted");
    Ok(existing)
}
