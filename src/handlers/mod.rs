// src/handlers/mod.rs

pub mod auth;
pub mod exams;
pub mod results;
