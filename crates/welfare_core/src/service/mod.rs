//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep UI layers decoupled from storage details and backend choice.

pub mod account_service;
pub mod attachment_service;
pub mod auth_service;
pub mod backup_service;
pub mod family_service;
pub mod stats;
pub mod undo;
