//! Moderation pipeline for clickpack archives posted to Discord, plus the
//! download counter that validates names against the published catalog.

pub mod catalog;
pub mod config;
pub mod db;
pub mod decision;
pub mod detector;
pub mod discord;
pub mod dispatcher;
pub mod downloads;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod platform;
pub mod prompt;
pub mod token;
