//! Attendance points service: attendance recording, points ledger, badges,
//! reward redemption and leaderboards over MySQL.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod docs;
pub mod engine;
pub mod model;
pub mod oracle;
pub mod routes;
pub mod store;
