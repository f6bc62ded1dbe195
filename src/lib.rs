// Tandem client - authenticated request pipeline

pub mod auth;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http_client;
pub mod interceptor;
