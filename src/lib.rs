//! Lectern - paid enrollment backend for a course and e-book storefront
//!
//! This library provides checkout initialization against a hosted payment
//! gateway, callback and webhook handling, and the reconciliation that keeps
//! enrollments and e-book purchases consistent however notifications arrive.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod payments;
pub mod rate_limit;
pub mod reconcile;
