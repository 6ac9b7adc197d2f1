//! # Order cache server
//! This crate hosts the runnable service around the order cache engine. It is responsible for:
//! * Connecting the engine's ingestion pipeline to Kafka (see [`kafka`]).
//! * Serving cached orders over HTTP.
//! * Wiring startup and shutdown together (see [`server`]).
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/order/{order_uid}`: The order with the given id, from the cache if possible.
//! * `/cache/stats`: The number of cached orders and their ids.

pub mod cli;
pub mod config;
pub mod errors;
pub mod kafka;
pub mod routes;
pub mod server;
