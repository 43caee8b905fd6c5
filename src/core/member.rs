//! Member roster business logic.
//!
//! Provides functions for registering members, editing their billing details
//! and toggling their status. Members are never hard-deleted; deactivating a
//! member removes them from fee generation.

use crate::{
    entities::{Member, MemberStatus, member},
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, instrument};
use uuid::Uuid;

/// Editable billing details of a member.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDetails {
    /// Display name
    pub name: String,
    /// Contact phone
    pub phone: Option<String>,
    /// Monthly fee, must be finite and non-negative
    pub monthly_fee: f64,
    /// Due day as a day number or a `YYYY-MM-DD` date
    pub due_day: Option<String>,
}

impl MemberDetails {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Member name cannot be empty"));
        }
        if !self.monthly_fee.is_finite() || self.monthly_fee < 0.0 {
            return Err(Error::InvalidAmount {
                amount: self.monthly_fee,
            });
        }
        if let Some(raw) = self.due_day.as_deref().filter(|raw| !raw.trim().is_empty()) {
            if parse_due_day(raw).is_none() {
                return Err(Error::validation(format!(
                    "Due day '{raw}' is neither a day number (1-31) nor a YYYY-MM-DD date"
                )));
            }
        }
        Ok(())
    }

    fn normalized_due_day(&self) -> Option<String> {
        self.due_day
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(ToString::to_string)
    }
}

/// Extracts the billing day from a stored due day.
///
/// Accepts a plain day number (`"10"`) or a full date (`"2024-03-10"`), whose
/// day component is used. Returns `None` for anything else.
#[must_use]
pub fn parse_due_day(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(day) = raw.parse::<u32>() {
        return (1..=31).contains(&day).then_some(day);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.day())
}

/// The day a member's fee falls due, or `default_day` if unset or unparsable.
#[must_use]
pub fn billing_day(member: &member::Model, default_day: u32) -> u32 {
    member
        .due_day
        .as_deref()
        .and_then(parse_due_day)
        .unwrap_or(default_day)
}

/// Registers a new member with a generated identifier.
#[instrument(skip(db, details), fields(name = %details.name))]
pub async fn create_member(
    db: &DatabaseConnection,
    details: MemberDetails,
    status: MemberStatus,
    now: DateTime<Utc>,
) -> Result<member::Model> {
    details.validate()?;

    let model = member::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set(details.name.trim().to_string()),
        phone: Set(details.phone.clone()),
        monthly_fee: Set(details.monthly_fee),
        due_day: Set(details.normalized_due_day()),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let result = model.insert(db).await?;
    info!(member_id = %result.id, "Registered member");
    Ok(result)
}

/// Replaces a member's billing details.
pub async fn update_member(
    db: &DatabaseConnection,
    member_id: &str,
    details: MemberDetails,
    now: DateTime<Utc>,
) -> Result<member::Model> {
    details.validate()?;
    let existing = require_member(db, member_id).await?;

    let due_day = details.normalized_due_day();
    let mut active_model: member::ActiveModel = existing.into();
    active_model.name = Set(details.name.trim().to_string());
    active_model.phone = Set(details.phone);
    active_model.monthly_fee = Set(details.monthly_fee);
    active_model.due_day = Set(due_day);
    active_model.updated_at = Set(now);
    active_model.update(db).await.map_err(Into::into)
}

/// Activates or deactivates a member.
#[instrument(skip(db))]
pub async fn set_member_status(
    db: &DatabaseConnection,
    member_id: &str,
    status: MemberStatus,
    now: DateTime<Utc>,
) -> Result<member::Model> {
    let existing = require_member(db, member_id).await?;
    if existing.status == status {
        return Ok(existing);
    }

    let mut active_model: member::ActiveModel = existing.into();
    active_model.status = Set(status);
    active_model.updated_at = Set(now);
    let updated = active_model.update(db).await?;
    info!(?status, "Member status changed");
    Ok(updated)
}

/// Finds a member by identifier.
pub async fn get_member_by_id<C>(db: &C, member_id: &str) -> Result<Option<member::Model>>
where
    C: ConnectionTrait,
{
    Member::find_by_id(member_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a member by identifier, failing with `NotFound` when absent.
pub async fn require_member<C>(db: &C, member_id: &str) -> Result<member::Model>
where
    C: ConnectionTrait,
{
    get_member_by_id(db, member_id)
        .await?
        .ok_or_else(|| Error::not_found("Member", member_id))
}

/// All members, ordered by name.
pub async fn get_all_members(db: &DatabaseConnection) -> Result<Vec<member::Model>> {
    Member::find()
        .order_by_asc(member::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Members with status `active`, ordered by name.
pub async fn get_active_members<C>(db: &C) -> Result<Vec<member::Model>>
where
    C: ConnectionTrait,
{
    Member::find()
        .filter(member::Column::Status.eq(MemberStatus::Active))
        .order_by_asc(member::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sum of monthly fees over active members.
pub async fn expected_monthly_revenue(db: &DatabaseConnection) -> Result<f64> {
    let members = get_active_members(db).await?;
    Ok(members.iter().map(|m| m.monthly_fee).sum())
}
