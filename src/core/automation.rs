//! Recurring ledger generation.
//!
//! For a target month this module creates one fee per active member and rolls
//! every recurring expense of the previous month forward. Runs are gated by a
//! watermark in the `system_state` table holding the last generated month.
//!
//! Automated entries use deterministic identifiers (`fee_{member}_{month}` and
//! `recurring_{month}_{description}`) inserted with `ON CONFLICT DO NOTHING`,
//! so two sessions generating the same month concurrently cannot both create
//! the same record.

use crate::{
    config::billing::BillingConfig,
    core::{
        member::{billing_day, get_active_members},
        month::{MonthRef, add_one_month},
    },
    entities::{
        SystemState, Transaction, TransactionKind, TransactionStatus, member, system_state,
        transaction,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, prelude::*, sea_query::OnConflict};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

const LAST_AUTO_GENERATION_KEY: &str = "last_auto_generation";

/// Deterministic identifier of a member's fee for a month.
#[must_use]
pub fn fee_id(member_id: &str, month_ref: MonthRef) -> String {
    format!("fee_{member_id}_{month_ref}")
}

/// Deterministic identifier of a recurring expense rolled into a month.
#[must_use]
pub fn rollover_id(description: &str, month_ref: MonthRef) -> String {
    format!("recurring_{month_ref}_{description}")
}

/// Result of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    /// Month that was generated
    pub month_ref: MonthRef,
    /// Identifiers of the fees created by this run
    pub fees_created: Vec<String>,
    /// Identifiers of the recurring expenses rolled into the month
    pub rollovers_created: Vec<String>,
    /// Records that already existed and were left untouched
    pub skipped_existing: usize,
}

impl GenerationReport {
    fn new(month_ref: MonthRef) -> Self {
        Self {
            month_ref,
            fees_created: Vec::new(),
            rollovers_created: Vec::new(),
            skipped_existing: 0,
        }
    }

    /// Every identifier created by this run.
    pub fn created_ids(&self) -> impl Iterator<Item = &str> {
        self.fees_created
            .iter()
            .chain(&self.rollovers_created)
            .map(String::as_str)
    }
}

enum Creation {
    Fee(String),
    Rollover(String),
    Skipped,
}

/// Reads the month of the last completed generation run.
///
/// # Returns
/// * `Ok(Some(month))` - Last generated month
/// * `Ok(None)` - Never generated, cleared, or holding an unreadable value
pub async fn get_watermark<C>(db: &C) -> Result<Option<MonthRef>>
where
    C: ConnectionTrait,
{
    let state = SystemState::find_by_id(LAST_AUTO_GENERATION_KEY.to_string())
        .one(db)
        .await?;

    match state {
        Some(s) if !s.value.is_empty() => match s.value.parse::<MonthRef>() {
            Ok(month_ref) => Ok(Some(month_ref)),
            Err(e) => {
                warn!(value = %s.value, "Ignoring unreadable automation watermark: {}", e);
                Ok(None)
            }
        },
        _ => Ok(None),
    }
}

async fn write_watermark<C>(db: &C, value: String, now: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let state = system_state::ActiveModel {
        key: Set(LAST_AUTO_GENERATION_KEY.to_string()),
        value: Set(value),
        updated_at: Set(now),
    };

    SystemState::insert(state)
        .on_conflict(
            OnConflict::column(system_state::Column::Key)
                .update_columns([system_state::Column::Value, system_state::Column::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Resets the watermark so the next run regenerates whatever month it targets.
pub async fn clear_watermark<C>(db: &C, now: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    write_watermark(db, String::new(), now).await?;
    info!("Automation watermark cleared");
    Ok(())
}

/// Whether `month_ref` still needs a generation run.
pub async fn is_generation_needed<C>(db: &C, month_ref: MonthRef) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(get_watermark(db).await? != Some(month_ref))
}

/// Inserts a transaction under its caller-supplied id. Returns `false` when a
/// record with that id already exists.
async fn insert_if_absent<C>(db: &C, model: transaction::ActiveModel) -> Result<bool>
where
    C: ConnectionTrait,
{
    let inserted = Transaction::insert(model)
        .on_conflict(
            OnConflict::column(transaction::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await;

    match inserted {
        Ok(rows) => Ok(rows > 0),
        Err(DbErr::RecordNotInserted) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn create_fee_if_absent(
    db: DatabaseConnection,
    member: member::Model,
    month_ref: MonthRef,
    settings: BillingConfig,
    now: DateTime<Utc>,
) -> Result<Creation> {
    let existing = Transaction::find()
        .filter(transaction::Column::MemberId.eq(member.id.as_str()))
        .filter(transaction::Column::MonthRef.eq(month_ref.to_string()))
        .filter(transaction::Column::Kind.eq(TransactionKind::Fee))
        .count(&db)
        .await?;
    if existing > 0 {
        return Ok(Creation::Skipped);
    }

    let id = fee_id(&member.id, month_ref);
    let due_date = month_ref.date_with_day(billing_day(&member, settings.default_due_day));
    let fee = transaction::ActiveModel {
        id: Set(id.clone()),
        kind: Set(TransactionKind::Fee),
        category: Set(settings.fee_category.clone()),
        description: Set(format!("{} - {}", settings.fee_category, member.name)),
        amount: Set(member.monthly_fee),
        due_date: Set(due_date),
        payment_date: Set(None),
        status: Set(TransactionStatus::Pending),
        member_id: Set(Some(member.id.clone())),
        month_ref: Set(month_ref.to_string()),
        is_recurring: Set(false),
        created_at: Set(now),
    };

    if insert_if_absent(&db, fee).await? {
        debug!(fee_id = %id, %due_date, "Fee created");
        Ok(Creation::Fee(id))
    } else {
        Ok(Creation::Skipped)
    }
}

async fn roll_forward_if_absent(
    db: DatabaseConnection,
    source: transaction::Model,
    month_ref: MonthRef,
    now: DateTime<Utc>,
) -> Result<Creation> {
    let existing = Transaction::find()
        .filter(transaction::Column::Description.eq(source.description.as_str()))
        .filter(transaction::Column::MonthRef.eq(month_ref.to_string()))
        .count(&db)
        .await?;
    if existing > 0 {
        return Ok(Creation::Skipped);
    }

    let id = rollover_id(&source.description, month_ref);
    let due_date = add_one_month(source.due_date);
    let copy = transaction::ActiveModel {
        id: Set(id.clone()),
        kind: Set(source.kind),
        category: Set(source.category),
        description: Set(source.description),
        amount: Set(source.amount),
        due_date: Set(due_date),
        payment_date: Set(None),
        status: Set(TransactionStatus::Pending),
        member_id: Set(source.member_id),
        month_ref: Set(month_ref.to_string()),
        is_recurring: Set(source.is_recurring),
        created_at: Set(now),
    };

    if insert_if_absent(&db, copy).await? {
        debug!(rollover_id = %id, %due_date, "Recurring expense rolled forward");
        Ok(Creation::Rollover(id))
    } else {
        Ok(Creation::Skipped)
    }
}

/// Generates fees and recurring-expense rollovers for `month_ref`.
///
/// 1. Returns `Ok(None)` without writing anything if the watermark already
///    equals `month_ref`
/// 2. Creates a pending fee for every active member that has none this month
/// 3. Copies every recurring transaction of the previous month that has no
///    same-description entry this month, advancing its due date one month
/// 4. Runs all creations concurrently and waits for every one to settle
/// 5. Writes the watermark only if every creation succeeded
///
/// Creations that succeeded before a failure are kept; re-invoking is safe.
///
/// # Errors
/// The first creation failure, after all issued creations have finished.
#[instrument(skip(db, settings, now), fields(month = %month_ref))]
pub async fn ensure_month_generated(
    db: &DatabaseConnection,
    month_ref: MonthRef,
    now: DateTime<Utc>,
    settings: &BillingConfig,
) -> Result<Option<GenerationReport>> {
    if !is_generation_needed(db, month_ref).await? {
        debug!("Month already generated, nothing to do");
        return Ok(None);
    }

    generate_month(db, month_ref, now, settings).await.map(Some)
}

/// Ungated body of a generation run; ends by writing the watermark.
async fn generate_month(
    db: &DatabaseConnection,
    month_ref: MonthRef,
    now: DateTime<Utc>,
    settings: &BillingConfig,
) -> Result<GenerationReport> {
    info!("Running financial automation");

    let members = get_active_members(db).await?;
    let previous_month = month_ref.previous()?;
    let recurring = Transaction::find()
        .filter(transaction::Column::MonthRef.eq(previous_month.to_string()))
        .filter(transaction::Column::IsRecurring.eq(true))
        .all(db)
        .await?;

    debug!(
        members = members.len(),
        recurring = recurring.len(),
        previous = %previous_month,
        "Collected generation sources"
    );

    let mut tasks = JoinSet::new();
    for member in members {
        tasks.spawn(create_fee_if_absent(
            db.clone(),
            member,
            month_ref,
            settings.clone(),
            now,
        ));
    }
    for source in recurring {
        tasks.spawn(roll_forward_if_absent(db.clone(), source, month_ref, now));
    }

    let mut report = GenerationReport::new(month_ref);
    let mut first_error: Option<Error> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(Error::from).and_then(|outcome| outcome) {
            Ok(Creation::Fee(id)) => report.fees_created.push(id),
            Ok(Creation::Rollover(id)) => report.rollovers_created.push(id),
            Ok(Creation::Skipped) => report.skipped_existing += 1,
            Err(e) => {
                error!("Ledger creation failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    report.fees_created.sort();
    report.rollovers_created.sort();

    write_watermark(db, month_ref.to_string(), now).await?;
    info!(
        fees = report.fees_created.len(),
        rollovers = report.rollovers_created.len(),
        skipped = report.skipped_existing,
        "Automation complete for {}",
        month_ref
    );

    Ok(report)
}

/// Clears the watermark and regenerates `month_ref`, picking up members added
/// or corrected since the last run. Existing records are never duplicated.
///
/// The run is not gated, so a session that generates the same month between
/// the clear and the run only makes this report come back empty.
#[instrument(skip(db, settings, now), fields(month = %month_ref))]
pub async fn force_regeneration(
    db: &DatabaseConnection,
    month_ref: MonthRef,
    now: DateTime<Utc>,
    settings: &BillingConfig,
) -> Result<GenerationReport> {
    clear_watermark(db, now).await?;
    generate_month(db, month_ref, now, settings).await
}

/// Formats a generation report into a human-readable summary.
#[must_use]
pub fn format_generation_summary(report: &GenerationReport) -> String {
    use std::fmt::Write;

    let mut summary = format!("Automation - {}\n", report.month_ref);
    let _ = writeln!(
        summary,
        "  Fees created: {} | Rollovers: {} | Already present: {}",
        report.fees_created.len(),
        report.rollovers_created.len(),
        report.skipped_existing
    );
    for id in report.created_ids() {
        let _ = writeln!(summary, "  + {id}");
    }
    summary
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::transaction::{ExpenseKind, create_expense, get_transactions_for_month};
    use crate::entities::MemberStatus;
    use crate::test_utils::*;
    use sea_orm::PaginatorTrait;

    async fn fee_count(db: &DatabaseConnection, member_id: &str, month_ref: &str) -> u64 {
        Transaction::find()
            .filter(transaction::Column::MemberId.eq(member_id))
            .filter(transaction::Column::MonthRef.eq(month_ref))
            .filter(transaction::Column::Kind.eq(TransactionKind::Fee))
            .count(db)
            .await
            .unwrap()
    }

    async fn all_transactions(db: &DatabaseConnection) -> Vec<transaction::Model> {
        Transaction::find().all(db).await.unwrap()
    }

    #[tokio::test]
    async fn test_watermark_absent_initially() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(get_watermark(&db).await?.is_none());
        assert!(is_generation_needed(&db, month("2024-03")).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_watermark_set_and_cleared() -> Result<()> {
        let db = setup_test_db().await?;

        write_watermark(&db, "2024-02".to_string(), test_now()).await?;
        write_watermark(&db, "2024-03".to_string(), test_now()).await?;
        assert_eq!(get_watermark(&db).await?, Some(month("2024-03")));
        assert_eq!(SystemState::find().count(&db).await?, 1);

        clear_watermark(&db, test_now()).await?;
        assert!(get_watermark(&db).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_generates_fee_for_active_member() -> Result<()> {
        let db = setup_test_db().await?;
        let member = create_test_member(&db, "Ana", 150.0, Some("2024-03-10")).await?;

        let report = ensure_month_generated(&db, month("2024-03"), test_now(), &test_settings())
            .await?
            .unwrap();
        assert_eq!(report.fees_created, vec![fee_id(&member.id, month("2024-03"))]);
        assert!(report.rollovers_created.is_empty());

        let fee = crate::core::transaction::get_transaction_by_id(&db, &report.fees_created[0])
            .await?
            .unwrap();
        assert_eq!(fee.kind, TransactionKind::Fee);
        assert_eq!(fee.amount, 150.0);
        assert_eq!(fee.due_date, date(2024, 3, 10));
        assert_eq!(fee.status, TransactionStatus::Pending);
        assert!(fee.payment_date.is_none());
        assert_eq!(fee.member_id.as_deref(), Some(member.id.as_str()));
        assert_eq!(fee.month_ref, "2024-03");
        assert_eq!(fee.description, "Monthly fee - Ana");

        assert_eq!(get_watermark(&db).await?, Some(month("2024-03")));
        Ok(())
    }

    #[tokio::test]
    async fn test_skips_inactive_members() -> Result<()> {
        let db = setup_test_db().await?;
        let member = create_test_member(&db, "Ana", 150.0, None).await?;
        crate::core::member::set_member_status(
            &db,
            &member.id,
            MemberStatus::Inactive,
            test_now(),
        )
        .await?;

        let report = ensure_month_generated(&db, month("2024-03"), test_now(), &test_settings())
            .await?
            .unwrap();
        assert!(report.fees_created.is_empty());
        assert_eq!(fee_count(&db, &member.id, "2024-03").await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_due_day_fallback_and_clamping() -> Result<()> {
        let db = setup_test_db().await?;
        let no_day = create_test_member(&db, "Ana", 100.0, None).await?;
        let late_day = create_test_member(&db, "Bia", 100.0, Some("31")).await?;

        ensure_month_generated(&db, month("2023-02"), test_now(), &test_settings()).await?;

        let fees = get_transactions_for_month(&db, month("2023-02")).await?;
        let due_of = |member_id: &str| {
            fees.iter()
                .find(|t| t.member_id.as_deref() == Some(member_id))
                .map(|t| t.due_date)
                .unwrap()
        };
        assert_eq!(due_of(&no_day.id), date(2023, 2, 10));
        assert_eq!(due_of(&late_day.id), date(2023, 2, 28));
        Ok(())
    }

    #[tokio::test]
    async fn test_rolls_recurring_expense_forward() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_expense(&db, "2024-02", "Rent", 1200.0, date(2024, 2, 1), true).await?;
        create_test_expense(&db, "2024-02", "Paint", 80.0, date(2024, 2, 3), false).await?;

        let report = ensure_month_generated(&db, month("2024-03"), test_now(), &test_settings())
            .await?
            .unwrap();
        assert_eq!(report.rollovers_created, vec![rollover_id("Rent", month("2024-03"))]);

        let march = get_transactions_for_month(&db, month("2024-03")).await?;
        assert_eq!(march.len(), 1);
        let rent = &march[0];
        assert_eq!(rent.description, "Rent");
        assert_eq!(rent.kind, TransactionKind::ExpenseFixed);
        assert_eq!(rent.due_date, date(2024, 3, 1));
        assert_eq!(rent.status, TransactionStatus::Pending);
        assert_eq!(rent.month_ref, "2024-03");
        assert!(rent.is_recurring);
        assert!(rent.payment_date.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_rollover_resets_paid_source_and_clamps_date() -> Result<()> {
        let db = setup_test_db().await?;
        let source =
            create_test_expense(&db, "2024-01", "Insurance", 90.0, date(2024, 1, 31), true).await?;
        crate::core::transaction::mark_paid(&db, &source.id, test_now()).await?;

        ensure_month_generated(&db, month("2024-02"), test_now(), &test_settings()).await?;

        let february = get_transactions_for_month(&db, month("2024-02")).await?;
        assert_eq!(february.len(), 1);
        assert_eq!(february[0].due_date, date(2024, 2, 29));
        assert_eq!(february[0].status, TransactionStatus::Pending);
        assert!(february[0].payment_date.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_rollover_skips_description_already_present() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_expense(&db, "2024-02", "Rent", 1200.0, date(2024, 2, 1), true).await?;
        create_expense(
            &db,
            month("2024-03"),
            ExpenseKind::Fixed,
            "Rent".to_string(),
            1300.0,
            date(2024, 3, 2),
            true,
            test_now(),
        )
        .await?;

        let report = ensure_month_generated(&db, month("2024-03"), test_now(), &test_settings())
            .await?
            .unwrap();
        assert!(report.rollovers_created.is_empty());
        assert_eq!(report.skipped_existing, 1);

        let march = get_transactions_for_month(&db, month("2024-03")).await?;
        assert_eq!(march.len(), 1);
        assert_eq!(march[0].amount, 1300.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() -> Result<()> {
        let db = setup_test_db().await?;
        let member = create_test_member(&db, "Ana", 150.0, Some("10")).await?;
        create_test_expense(&db, "2024-02", "Rent", 1200.0, date(2024, 2, 1), true).await?;

        let settings = test_settings();
        let first = ensure_month_generated(&db, month("2024-03"), test_now(), &settings).await?;
        assert!(first.is_some());
        let after_first = all_transactions(&db).await;

        let second = ensure_month_generated(&db, month("2024-03"), test_now(), &settings).await?;
        assert!(second.is_none());
        assert_eq!(all_transactions(&db).await, after_first);
        assert_eq!(fee_count(&db, &member.id, "2024-03").await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_forced_regeneration_never_duplicates() -> Result<()> {
        let db = setup_test_db().await?;
        let ana = create_test_member(&db, "Ana", 150.0, None).await?;
        create_test_expense(&db, "2024-02", "Rent", 1200.0, date(2024, 2, 1), true).await?;

        ensure_month_generated(&db, month("2024-03"), test_now(), &test_settings()).await?;
        let bia = create_test_member(&db, "Bia", 120.0, None).await?;

        let report =
            force_regeneration(&db, month("2024-03"), test_now(), &test_settings()).await?;
        assert_eq!(report.fees_created, vec![fee_id(&bia.id, month("2024-03"))]);
        assert!(report.rollovers_created.is_empty());
        assert_eq!(report.skipped_existing, 2);

        assert_eq!(fee_count(&db, &ana.id, "2024-03").await, 1);
        assert_eq!(fee_count(&db, &bia.id, "2024-03").await, 1);
        assert_eq!(get_transactions_for_month(&db, month("2024-03")).await?.len(), 3);
        assert_eq!(get_watermark(&db).await?, Some(month("2024-03")));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_runs_create_one_fee() -> Result<()> {
        let db = setup_test_db().await?;
        let member = create_test_member(&db, "Ana", 150.0, None).await?;
        let settings = test_settings();

        let (a, b) = tokio::join!(
            ensure_month_generated(&db, month("2024-03"), test_now(), &settings),
            ensure_month_generated(&db, month("2024-03"), test_now(), &settings),
        );
        a?;
        b?;

        assert_eq!(fee_count(&db, &member.id, "2024-03").await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_if_absent_rejects_duplicate_key() -> Result<()> {
        let db = setup_test_db().await?;
        let member = create_test_member(&db, "Ana", 150.0, None).await?;

        let first = create_fee_if_absent(
            db.clone(),
            member.clone(),
            month("2024-03"),
            test_settings(),
            test_now(),
        )
        .await?;
        assert!(matches!(first, Creation::Fee(_)));

        // A racing writer that missed the existence check still hits the key
        let racing = transaction::ActiveModel {
            id: Set(fee_id(&member.id, month("2024-03"))),
            kind: Set(TransactionKind::Fee),
            category: Set("Monthly fee".to_string()),
            description: Set("Monthly fee - Ana".to_string()),
            amount: Set(150.0),
            due_date: Set(date(2024, 3, 10)),
            payment_date: Set(None),
            status: Set(TransactionStatus::Pending),
            member_id: Set(Some(member.id.clone())),
            month_ref: Set("2024-03".to_string()),
            is_recurring: Set(false),
            created_at: Set(test_now()),
        };
        assert!(!insert_if_absent(&db, racing).await?);
        assert_eq!(fee_count(&db, &member.id, "2024-03").await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_watermark_gate_performs_no_writes() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_member(&db, "Ana", 150.0, None).await?;
        ensure_month_generated(&db, month("2024-03"), test_now(), &test_settings()).await?;

        // New sources appear, but the month is already marked as generated
        create_test_member(&db, "Bia", 120.0, None).await?;
        create_test_expense(&db, "2024-02", "Rent", 1200.0, date(2024, 2, 1), true).await?;
        let transactions_before = all_transactions(&db).await;
        let state_before = SystemState::find().all(&db).await?;

        let later = test_now() + chrono::Duration::hours(1);
        let result = ensure_month_generated(&db, month("2024-03"), later, &test_settings()).await?;
        assert!(result.is_none());

        assert_eq!(all_transactions(&db).await, transactions_before);
        assert_eq!(SystemState::find().all(&db).await?, state_before);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_creation_keeps_others_and_skips_watermark() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_member(&db, "Ana", 150.0, None).await?;
        create_test_expense(&db, "2024-02", "Rent", 1200.0, date(2024, 2, 1), true).await?;
        create_test_expense(&db, "2024-02", "Boom", 50.0, date(2024, 2, 5), true).await?;

        db.execute_unprepared(
            "CREATE TRIGGER reject_boom BEFORE INSERT ON transactions \
             WHEN NEW.description = 'Boom' AND NEW.month_ref = '2024-03' \
             BEGIN SELECT RAISE(ABORT, 'boom'); END;",
        )
        .await?;

        let result =
            ensure_month_generated(&db, month("2024-03"), test_now(), &test_settings()).await;
        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
        assert!(get_watermark(&db).await?.is_none());

        // The fee and the other rollover were still written
        let march = get_transactions_for_month(&db, month("2024-03")).await?;
        assert_eq!(march.len(), 2);
        assert!(march.iter().any(|t| t.kind == TransactionKind::Fee));
        assert!(march.iter().any(|t| t.description == "Rent"));

        // Once the store accepts the write, a retry completes the month
        db.execute_unprepared("DROP TRIGGER reject_boom;").await?;
        let retry = ensure_month_generated(&db, month("2024-03"), test_now(), &test_settings())
            .await?
            .unwrap();
        assert_eq!(retry.rollovers_created, vec![rollover_id("Boom", month("2024-03"))]);
        assert_eq!(retry.skipped_existing, 2);
        assert_eq!(get_watermark(&db).await?, Some(month("2024-03")));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_watermark_does_not_block_generation() -> Result<()> {
        let db = setup_test_db().await?;
        let member = create_test_member(&db, "Ana", 150.0, None).await?;
        write_watermark(&db, "garbage".to_string(), test_now()).await?;

        assert!(get_watermark(&db).await?.is_none());
        assert!(is_generation_needed(&db, month("2024-03")).await?);

        let report = ensure_month_generated(&db, month("2024-03"), test_now(), &test_settings())
            .await?
            .unwrap();
        assert_eq!(report.fees_created, vec![fee_id(&member.id, month("2024-03"))]);
        assert_eq!(get_watermark(&db).await?, Some(month("2024-03")));
        Ok(())
    }

    #[tokio::test]
    async fn test_regeneration_after_another_session_finished_is_empty() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_member(&db, "Ana", 150.0, None).await?;
        create_test_expense(&db, "2024-02", "Rent", 1200.0, date(2024, 2, 1), true).await?;

        // Another session completes the month right after the watermark was cleared
        clear_watermark(&db, test_now()).await?;
        ensure_month_generated(&db, month("2024-03"), test_now(), &test_settings()).await?;
        let before = all_transactions(&db).await;

        let report = generate_month(&db, month("2024-03"), test_now(), &test_settings()).await?;
        assert_eq!(report, GenerationReport {
            month_ref: month("2024-03"),
            fees_created: Vec::new(),
            rollovers_created: Vec::new(),
            skipped_existing: 2,
        });
        assert_eq!(all_transactions(&db).await.len(), before.len());

        let forced =
            force_regeneration(&db, month("2024-03"), test_now(), &test_settings()).await?;
        assert_eq!(forced.created_ids().count(), 0);
        assert_eq!(get_watermark(&db).await?, Some(month("2024-03")));
        Ok(())
    }

    #[tokio::test]
    async fn test_generation_before_first_supported_month_fails() -> Result<()> {
        let db = setup_test_db().await?;
        let result =
            ensure_month_generated(&db, month("0001-01"), test_now(), &test_settings()).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        assert!(get_watermark(&db).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_store_still_records_watermark() -> Result<()> {
        let db = setup_test_db().await?;
        let report = ensure_month_generated(&db, month("2024-03"), test_now(), &test_settings())
            .await?
            .unwrap();
        assert_eq!(report.created_ids().count(), 0);
        assert_eq!(get_watermark(&db).await?, Some(month("2024-03")));
        Ok(())
    }

    #[test]
    fn test_format_generation_summary() {
        let report = GenerationReport {
            month_ref: month("2024-03"),
            fees_created: vec!["fee_a_2024-03".to_string()],
            rollovers_created: vec!["recurring_2024-03_Rent".to_string()],
            skipped_existing: 2,
        };

        let summary = format_generation_summary(&report);
        assert!(summary.contains("Automation - 2024-03"));
        assert!(summary.contains("Fees created: 1 | Rollovers: 1 | Already present: 2"));
        assert!(summary.contains("+ fee_a_2024-03"));
        assert!(summary.contains("+ recurring_2024-03_Rent"));
    }
}
