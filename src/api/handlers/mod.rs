pub mod analytics;
pub mod auth;
pub mod files;
pub mod health;
pub mod links;
pub mod resolve;
pub mod tokens;
