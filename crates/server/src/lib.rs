//! Prediction service for charging-station usage tiers

pub mod api;
pub mod config;
