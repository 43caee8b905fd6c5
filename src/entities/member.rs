//! Member entity - Represents a studio client enrolled for billing and classes.
//!
//! Each member carries the monthly fee used by fee generation and an optional
//! billing due day, which may be stored either as a plain day number or as a
//! full date whose day component is used.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a member. Only active members are billed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    /// Billed every month and allowed to enroll in classes
    #[sea_orm(string_value = "active")]
    Active,
    /// Kept for history, skipped by fee generation
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

/// Member database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "members")]
pub struct Model {
    /// Store-assigned identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Contact phone, if known
    pub phone: Option<String>,
    /// Monthly fee charged while the member is active
    pub monthly_fee: f64,
    /// Billing due day: `"1"`..`"31"` or a `YYYY-MM-DD` date
    pub due_day: Option<String>,
    /// Lifecycle status
    pub status: MemberStatus,
    /// When the member was registered
    pub created_at: DateTimeUtc,
    /// When the member was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Member and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One member owns many fee transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
    /// One member holds up to a configured number of class enrollments
    #[sea_orm(has_many = "super::class_enrollment::Entity")]
    Enrollments,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::class_enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
