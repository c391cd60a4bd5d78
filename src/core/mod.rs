pub mod arbiter;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod registry;
