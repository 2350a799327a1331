pub mod app;
pub mod config;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod locks;
pub mod middleware;
pub mod routes;
pub mod services;
