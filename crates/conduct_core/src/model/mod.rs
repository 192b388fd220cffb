//! Domain model for the behavior scoring engine.
//!
//! # Responsibility
//! - Define canonical records shared by ledgers, scoring and cycle closure.
//! - Own the level state machine and input validation rules.
//!
//! # Invariants
//! - Point events and history entries are immutable once created.
//! - A subject's `current_level` is the single authoritative level row.

pub mod cycle;
pub mod history;
pub mod level;
pub mod point;
pub mod subject;
pub mod validation;
