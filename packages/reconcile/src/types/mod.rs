//! Data model and configuration for the reconciliation engine.

pub mod catalog;
pub mod cluster;
pub mod config;
pub mod entity;
pub mod message;
