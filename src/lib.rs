//! Plaza - moderation and authorization core
//!
//! This library provides the role gate, the approval state machine, the
//! moderator and admin HTTP surface and the pending-item notification
//! dispatcher of the Plaza social platform.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
