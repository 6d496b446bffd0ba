pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod services;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
