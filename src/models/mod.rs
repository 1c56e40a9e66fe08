// src/models/mod.rs

pub mod exam;
pub mod result;
pub mod user;
