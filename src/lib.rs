pub mod config;
pub mod error;
pub mod queue;
pub mod routes;
pub mod sandbox;
pub mod web_server;
pub mod worker;
