//! Shared utilities for the tourist-safety backend.
//!
//! This crate provides common validation logic used by the domain crate's
//! request payloads.

pub mod validation;
