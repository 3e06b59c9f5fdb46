//! Casipe - Spanish learning site
//!
//! This library provides the blog, the temario vocabulary, the graded readers
//! and the one-off migration tools behind the Casipe site.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
