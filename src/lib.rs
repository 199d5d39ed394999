//! NutriCheck Library
//!
//! Micronutrient deficiency screening, lab tracking and health metrics.

pub mod build_info;
pub mod config;
pub mod db;
pub mod health;
pub mod mcp;
pub mod models;
pub mod tools;
