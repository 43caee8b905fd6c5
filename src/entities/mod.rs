//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod class_enrollment;
pub mod member;
pub mod system_state;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use class_enrollment::{
    Column as ClassEnrollmentColumn, Entity as ClassEnrollment, Model as ClassEnrollmentModel,
};
pub use member::{Column as MemberColumn, Entity as Member, MemberStatus, Model as MemberModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionKind, TransactionStatus,
};
