// Library exports for Pictor
// This allows integration tests and external code to use Pictor modules

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod guard;
pub mod identity;
pub mod optimistic;
pub mod routes;
pub mod state;
pub mod storage;
