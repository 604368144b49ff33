//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls and reminder maintenance into use-case APIs.
//! - Keep UI/FFI layers decoupled from storage and platform details.

pub mod task_service;
