//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and provisioner calls into use-case level APIs.
//! - Keep API/CLI layers decoupled from storage details.

pub mod curriculum_service;
