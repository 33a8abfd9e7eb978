//! Admin console backend: the notification center, its access gate and the
//! layout coordinator for the console shell.

pub mod auth;
pub mod center;
pub mod config;
pub mod error;
pub mod filters;
pub mod handlers;
pub mod layout;
pub mod middleware;
pub mod models;
pub mod service;
