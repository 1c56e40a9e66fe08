// src/lib.rs

pub mod client;
pub mod config;
pub mod docs;
pub mod error;
pub mod extractors;
pub mod grading;
pub mod handlers;
pub mod models;
pub mod navigation;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod utils;

pub use routes::create_router;
