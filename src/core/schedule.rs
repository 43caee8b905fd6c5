//! Class scheduling - weekly slots and member enrollment.
//!
//! A slot is a weekday plus a start time, stored as `"{weekday}_{HH:MM}"`.
//! Enrollment enforces two limits from [`BillingConfig`]: how many slots one
//! member may hold and how many members fit in one slot.

use crate::{
    config::billing::BillingConfig,
    core::member::require_member,
    entities::{ClassEnrollment, MemberStatus, class_enrollment, member},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use sea_orm::{QueryOrder, Set, prelude::*};
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument};

/// A weekly class slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassSlot {
    /// Day of the week
    pub weekday: Weekday,
    /// Start time
    pub time: NaiveTime,
}

impl ClassSlot {
    /// Builds a slot from a weekday and an `HH:MM` start time.
    pub fn new(weekday: Weekday, time: &str) -> Result<Self> {
        let time = NaiveTime::parse_from_str(time, "%H:%M")
            .map_err(|e| Error::validation(format!("Invalid slot time '{time}': {e}")))?;
        Ok(Self { weekday, time })
    }
}

impl fmt::Display for ClassSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let day = match self.weekday {
            Weekday::Mon => "monday",
            Weekday::Tue => "tuesday",
            Weekday::Wed => "wednesday",
            Weekday::Thu => "thursday",
            Weekday::Fri => "friday",
            Weekday::Sat => "saturday",
            Weekday::Sun => "sunday",
        };
        write!(f, "{day}_{}", self.time.format("%H:%M"))
    }
}

impl FromStr for ClassSlot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (day, time) = s
            .split_once('_')
            .ok_or_else(|| Error::validation(format!("Malformed slot '{s}'")))?;
        let weekday: Weekday = day
            .parse()
            .map_err(|_| Error::validation(format!("Unknown weekday '{day}'")))?;
        Self::new(weekday, time)
    }
}

/// How full a slot is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyLevel {
    /// Fewer than 4 members
    Low,
    /// From 4 members up to one below capacity
    Medium,
    /// At or above capacity
    Full,
}

/// Member count and level of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    /// Enrolled members
    pub count: usize,
    /// Configured capacity
    pub capacity: usize,
    /// Derived level
    pub level: OccupancyLevel,
}

impl Occupancy {
    #[must_use]
    fn new(count: usize, capacity: usize) -> Self {
        let level = if count >= capacity {
            OccupancyLevel::Full
        } else if count >= 4 {
            OccupancyLevel::Medium
        } else {
            OccupancyLevel::Low
        };
        Self {
            count,
            capacity,
            level,
        }
    }
}

/// Slots a member is enrolled in, ordered by slot id.
pub async fn get_member_slots<C>(db: &C, member_id: &str) -> Result<Vec<ClassSlot>>
where
    C: ConnectionTrait,
{
    let rows = ClassEnrollment::find()
        .filter(class_enrollment::Column::MemberId.eq(member_id))
        .order_by_asc(class_enrollment::Column::SlotId)
        .all(db)
        .await?;
    rows.iter().map(|row| row.slot_id.parse()).collect()
}

/// Members enrolled in a slot, ordered by name.
pub async fn get_slot_members<C>(db: &C, slot: ClassSlot) -> Result<Vec<member::Model>>
where
    C: ConnectionTrait,
{
    let rows = ClassEnrollment::find()
        .filter(class_enrollment::Column::SlotId.eq(slot.to_string()))
        .find_also_related(crate::entities::Member)
        .all(db)
        .await?;

    let mut members: Vec<member::Model> = rows.into_iter().filter_map(|(_, m)| m).collect();
    members.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(members)
}

/// Current occupancy of a slot.
pub async fn slot_occupancy<C>(
    db: &C,
    slot: ClassSlot,
    settings: &BillingConfig,
) -> Result<Occupancy>
where
    C: ConnectionTrait,
{
    let count = ClassEnrollment::find()
        .filter(class_enrollment::Column::SlotId.eq(slot.to_string()))
        .count(db)
        .await?;
    let count = usize::try_from(count).unwrap_or(usize::MAX);
    Ok(Occupancy::new(count, settings.slot_capacity))
}

/// Enrolls a member in a slot.
///
/// Enrolling a member already in the slot is a no-op.
///
/// # Errors
/// * `NotFound` if the member does not exist
/// * `InvalidState` if the member is inactive, already holds the maximum
///   number of slots, or the slot is full
#[instrument(skip(db, settings, now), fields(slot = %slot))]
pub async fn enroll_member(
    db: &DatabaseConnection,
    member_id: &str,
    slot: ClassSlot,
    settings: &BillingConfig,
    now: DateTime<Utc>,
) -> Result<()> {
    let member = require_member(db, member_id).await?;
    if member.status == MemberStatus::Inactive {
        return Err(Error::InvalidState {
            message: format!("{} is inactive and cannot join classes", member.name),
        });
    }

    let slots = get_member_slots(db, member_id).await?;
    if slots.contains(&slot) {
        return Ok(());
    }
    if slots.len() >= settings.max_slots_per_member {
        return Err(Error::InvalidState {
            message: format!(
                "{} already holds {} of {} class slots",
                member.name,
                slots.len(),
                settings.max_slots_per_member
            ),
        });
    }

    let occupancy = slot_occupancy(db, slot, settings).await?;
    if occupancy.level == OccupancyLevel::Full {
        return Err(Error::InvalidState {
            message: format!("Slot {slot} is full ({}/{})", occupancy.count, occupancy.capacity),
        });
    }

    class_enrollment::ActiveModel {
        member_id: Set(member_id.to_string()),
        slot_id: Set(slot.to_string()),
        enrolled_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(member_id, "Member enrolled");
    Ok(())
}

/// Removes a member from a slot. Returns whether an enrollment was removed.
#[instrument(skip(db), fields(slot = %slot))]
pub async fn withdraw_member(
    db: &DatabaseConnection,
    member_id: &str,
    slot: ClassSlot,
) -> Result<bool> {
    let result = ClassEnrollment::delete_many()
        .filter(class_enrollment::Column::MemberId.eq(member_id))
        .filter(class_enrollment::Column::SlotId.eq(slot.to_string()))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        info!(member_id, "Member withdrawn");
    }
    Ok(result.rows_affected > 0)
}
