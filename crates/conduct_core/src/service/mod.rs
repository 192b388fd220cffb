//! Engine use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the operation surface of the engine.
//! - Keep callers decoupled from storage details.

pub mod audit_service;
pub mod cycle_manager;
pub mod ledger_service;
pub mod notification;
pub mod score_service;
