pub mod client;
pub mod config;
mod query;
mod record;
pub mod schema;
