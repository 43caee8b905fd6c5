//! Ledger context - the single owner of application state.
//!
//! [`Ledger`] bundles the store connection, billing settings, a clock and the
//! change-notification channel. Front-ends and scheduled jobs hold one
//! `Ledger` instead of ambient globals; its methods wrap the core operations
//! and notify subscribers after each successful write.

/// Change notifications and subscriptions
pub mod events;

use crate::{
    config::billing::BillingConfig,
    core::{
        automation::{self, GenerationReport},
        clock::Clock,
        month::MonthRef,
        transaction::{self, ExpenseKind},
    },
    entities::transaction as transaction_entity,
    errors::Result,
};
use chrono::NaiveDate;
use events::{ChangeKind, EventFilter, LedgerEvent, Subscription};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 256;

/// Shared context for every ledger operation.
pub struct Ledger {
    database: DatabaseConnection,
    settings: BillingConfig,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<LedgerEvent>,
}

impl Ledger {
    /// Creates a ledger over an initialised database.
    #[must_use]
    pub fn new(
        database: DatabaseConnection,
        settings: BillingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            database,
            settings,
            clock,
            events,
        }
    }

    /// Database connection for direct queries
    #[must_use]
    pub const fn database(&self) -> &DatabaseConnection {
        &self.database
    }

    /// Active billing settings
    #[must_use]
    pub const fn settings(&self) -> &BillingConfig {
        &self.settings
    }

    /// The clock's current date.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// The month containing the clock's current date.
    pub fn current_month(&self) -> Result<MonthRef> {
        MonthRef::from_date(self.today())
    }

    /// Subscribes to changes matching `filter`.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        Subscription::new(self.events.subscribe(), filter)
    }

    fn publish(&self, kind: ChangeKind, transaction_id: &str, month_ref: MonthRef) {
        // No subscribers is not an error
        let _ = self.events.send(LedgerEvent {
            kind,
            transaction_id: transaction_id.to_string(),
            month_ref,
        });
    }

    fn publish_model(&self, kind: ChangeKind, model: &transaction_entity::Model) {
        match model.month_ref.parse() {
            Ok(month_ref) => self.publish(kind, &model.id, month_ref),
            Err(e) => tracing::warn!(transaction_id = %model.id, "Not publishing change: {}", e),
        }
    }

    fn publish_report(&self, report: &GenerationReport) {
        for id in report.created_ids() {
            self.publish(ChangeKind::Created, id, report.month_ref);
        }
    }

    /// Runs generation for `month_ref`; see [`automation::ensure_month_generated`].
    pub async fn ensure_month_generated(
        &self,
        month_ref: MonthRef,
    ) -> Result<Option<GenerationReport>> {
        let report = automation::ensure_month_generated(
            &self.database,
            month_ref,
            self.clock.now(),
            &self.settings,
        )
        .await?;
        if let Some(report) = &report {
            self.publish_report(report);
        }
        Ok(report)
    }

    /// Runs generation for the clock's current month.
    pub async fn ensure_current_month_generated(&self) -> Result<Option<GenerationReport>> {
        self.ensure_month_generated(self.current_month()?).await
    }

    /// Clears the watermark and regenerates `month_ref`.
    pub async fn force_regeneration(&self, month_ref: MonthRef) -> Result<GenerationReport> {
        let report = automation::force_regeneration(
            &self.database,
            month_ref,
            self.clock.now(),
            &self.settings,
        )
        .await?;
        self.publish_report(&report);
        Ok(report)
    }

    /// Marks a transaction paid at the current time.
    pub async fn mark_paid(&self, transaction_id: &str) -> Result<transaction_entity::Model> {
        let paid = transaction::mark_paid(&self.database, transaction_id, self.clock.now()).await?;
        self.publish_model(ChangeKind::Updated, &paid);
        Ok(paid)
    }

    /// Records a manual expense.
    pub async fn record_expense(
        &self,
        month_ref: MonthRef,
        kind: ExpenseKind,
        description: String,
        amount: f64,
        due_date: NaiveDate,
        is_recurring: bool,
    ) -> Result<transaction_entity::Model> {
        let created = transaction::create_expense(
            &self.database,
            month_ref,
            kind,
            description,
            amount,
            due_date,
            is_recurring,
            self.clock.now(),
        )
        .await?;
        self.publish_model(ChangeKind::Created, &created);
        Ok(created)
    }

    /// Records extra income, already received.
    pub async fn record_extra_income(
        &self,
        month_ref: MonthRef,
        description: String,
        amount: f64,
        received_on: NaiveDate,
    ) -> Result<transaction_entity::Model> {
        let created = transaction::create_extra_income(
            &self.database,
            month_ref,
            description,
            amount,
            received_on,
            self.clock.now(),
        )
        .await?;
        self.publish_model(ChangeKind::Created, &created);
        Ok(created)
    }

    /// Deletes a transaction.
    pub async fn delete_transaction(&self, transaction_id: &str) -> Result<()> {
        let deleted = transaction::delete_transaction(&self.database, transaction_id).await?;
        self.publish_model(ChangeKind::Deleted, &deleted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::test_utils::*;

    async fn test_ledger() -> Result<Ledger> {
        let db = setup_test_db().await?;
        Ok(Ledger::new(db, test_settings(), Arc::new(FixedClock(test_now()))))
    }

    #[tokio::test]
    async fn test_current_month_follows_clock() -> Result<()> {
        let ledger = test_ledger().await?;
        assert_eq!(ledger.today(), date(2024, 3, 15));
        assert_eq!(ledger.current_month()?, month("2024-03"));
        Ok(())
    }

    #[tokio::test]
    async fn test_month_summary_uses_ledger_clock() -> Result<()> {
        let db = setup_test_db().await?;
        let clock = Arc::new(FixedClock(test_now() + chrono::Duration::days(30)));
        let ledger = Ledger::new(db, test_settings(), clock);
        ledger
            .record_expense(
                month("2024-04"),
                ExpenseKind::Fixed,
                "Rent".to_string(),
                1000.0,
                date(2024, 4, 10),
                true,
            )
            .await?;

        // 2024-04-14 on the ledger clock, so the rent is already overdue
        assert_eq!(ledger.today(), date(2024, 4, 14));
        let summary = crate::core::report::generate_month_summary(
            ledger.database(),
            ledger.current_month()?,
            ledger.today(),
        )
        .await?;
        assert_eq!(summary.overdue.len(), 1);
        assert_eq!(summary.overdue[0].description, "Rent");
        Ok(())
    }

    #[tokio::test]
    async fn test_generation_notifies_subscribers() -> Result<()> {
        let ledger = test_ledger().await?;
        let member = create_test_member(ledger.database(), "Ana", 150.0, None).await?;
        let mut subscription = ledger.subscribe(EventFilter::All);

        let report = ledger.ensure_current_month_generated().await?.unwrap();
        assert_eq!(report.fees_created.len(), 1);

        let event = subscription.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(
            event.transaction_id,
            automation::fee_id(&member.id, month("2024-03"))
        );
        assert_eq!(event.month_ref, month("2024-03"));

        // A second run is gated by the watermark and stays silent
        assert!(ledger.ensure_current_month_generated().await?.is_none());
        assert!(subscription.try_recv().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_month_filter_and_payment_events() -> Result<()> {
        let ledger = test_ledger().await?;
        let mut march = ledger.subscribe(EventFilter::Month(month("2024-03")));

        ledger
            .record_expense(
                month("2024-04"),
                ExpenseKind::Variable,
                "Paint".to_string(),
                50.0,
                date(2024, 4, 2),
                false,
            )
            .await?;
        let rent = ledger
            .record_expense(
                month("2024-03"),
                ExpenseKind::Fixed,
                "Rent".to_string(),
                1000.0,
                date(2024, 3, 5),
                true,
            )
            .await?;
        ledger.mark_paid(&rent.id).await?;
        ledger.delete_transaction(&rent.id).await?;

        let kinds: Vec<ChangeKind> = std::iter::from_fn(|| march.try_recv())
            .map(|event| {
                assert_eq!(event.transaction_id, rent.id);
                event.kind
            })
            .collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Created, ChangeKind::Updated, ChangeKind::Deleted]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unsubscribe_and_closed_channel() -> Result<()> {
        let ledger = test_ledger().await?;
        let first = ledger.subscribe(EventFilter::All);
        let mut second = ledger.subscribe(EventFilter::All);
        assert_eq!(ledger.events.receiver_count(), 2);

        first.unsubscribe();
        assert_eq!(ledger.events.receiver_count(), 1);

        drop(ledger);
        assert!(second.recv().await.is_none());
        Ok(())
    }
}
