//! Transaction entity - One entry of the financial ledger.
//!
//! A transaction is a fee due from a member, a fixed or variable expense, or an
//! extra income item. Every transaction belongs to exactly one `month_ref`
//! (`YYYY-MM`) and moves from `pending` to `paid` at most once.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Closed set of ledger entry kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Monthly fee owed by a member
    #[sea_orm(string_value = "fee")]
    Fee,
    /// Fixed expense such as rent, usually recurring
    #[sea_orm(string_value = "expense_fixed")]
    ExpenseFixed,
    /// One-off or variable expense
    #[sea_orm(string_value = "expense_variable")]
    ExpenseVariable,
    /// Income outside member fees
    #[sea_orm(string_value = "income_extra")]
    IncomeExtra,
}

impl TransactionKind {
    /// Fees and extra income count as income; everything else is an expense.
    #[must_use]
    pub const fn is_income(self) -> bool {
        matches!(self, Self::Fee | Self::IncomeExtra)
    }
}

/// Payment status. The only transition is `Pending -> Paid`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Not yet settled
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Settled; `payment_date` is set
    #[sea_orm(string_value = "paid")]
    Paid,
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Generated UUID, or a deterministic key for automated entries
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Kind of ledger entry
    pub kind: TransactionKind,
    /// Free-text grouping label (e.g. "Monthly fee")
    pub category: String,
    /// Human-readable description, also used to match recurring expenses
    pub description: String,
    /// Non-negative amount
    pub amount: f64,
    /// Date the entry is due
    pub due_date: Date,
    /// When the entry was paid, absent while pending
    pub payment_date: Option<DateTimeUtc>,
    /// Payment status
    pub status: TransactionStatus,
    /// Owning member for fees
    pub member_id: Option<String>,
    /// Calendar month this entry belongs to (`YYYY-MM`)
    pub month_ref: String,
    /// Whether the entry is rolled into the following month
    pub is_recurring: bool,
    /// When the entry was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Fees belong to one member
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
