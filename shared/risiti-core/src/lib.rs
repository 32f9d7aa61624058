//! Risiti Core - Shared service infrastructure
//!
//! This crate provides:
//! - Standard service trait all Risiti microservices implement
//! - Error handling utilities
//! - Configuration management

pub mod config;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use error::{Result, RisitiError};
pub use service::{DependencyStatus, HealthStatus, MicroserviceRuntime, ReadinessStatus, RisitiService};
