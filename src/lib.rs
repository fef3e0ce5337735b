// src/lib.rs

pub mod api;
pub mod auth;
pub mod capture;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod errors;
pub mod export;
pub mod highlight;
pub mod logging;
pub mod models;
pub mod render;
pub mod session;
pub mod speaker;
pub mod ui;
pub mod utils;

pub use errors::{IntellexError, IntellexResult};
