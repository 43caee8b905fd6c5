//! Core business logic - framework-agnostic ledger operations.
//!
//! Every function takes a `SeaORM` connection and explicit inputs (month,
//! current time, settings) and returns structured data. No function reads a
//! global clock or caches state between calls.

/// Recurring ledger generation and the automation watermark
pub mod automation;
/// Time sources
pub mod clock;
/// Member roster
pub mod member;
/// Calendar-month keys and date arithmetic
pub mod month;
/// Monthly totals, alerts and fee groupings
pub mod report;
/// Weekly class slots and enrollment limits
pub mod schedule;
/// Manual ledger entries and payment
pub mod transaction;
