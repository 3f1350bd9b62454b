// src/lib.rs

pub mod audit;
pub mod config;
pub mod hrms_client;
pub mod model;
pub mod period;
pub mod server;
pub mod store;
pub mod summary;
pub mod workflow;

#[cfg(test)]
mod workflow_tests;
