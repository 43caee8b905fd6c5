//! Class enrollment entity - Links a member to a weekly class slot.
//!
//! Slots are identified by `"{weekday}_{HH:MM}"` strings. The pair
//! (`member_id`, `slot_id`) is unique.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Class enrollment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "class_enrollments")]
pub struct Model {
    /// Enrolled member
    #[sea_orm(primary_key, auto_increment = false)]
    pub member_id: String,
    /// Weekly slot, e.g. `"monday_08:00"`
    #[sea_orm(primary_key, auto_increment = false)]
    pub slot_id: String,
    /// When the member joined the slot
    pub enrolled_at: DateTimeUtc,
}

/// Defines relationships between `ClassEnrollment` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each enrollment belongs to one member
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
