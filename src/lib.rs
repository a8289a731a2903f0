pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod mapping;
pub mod reconcile;
pub mod registry;
pub mod sheets;
pub mod table;
pub mod terms;
