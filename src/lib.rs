// Library exports so integration tests can drive the router and repositories.

pub mod auth;
pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod messages;
pub mod places;
pub mod routes;
pub mod state;
