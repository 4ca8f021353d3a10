// Library exports for testing and modular access

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;
