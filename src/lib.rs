// src/lib.rs
//! Control-plane orchestration for Azure Container Instances, Container Apps
//! and Container App Jobs over the Azure Resource Manager REST API.

pub mod arm;
pub mod auth;
pub mod cli;
pub mod commands;
pub mod error;
pub mod locator;
pub mod lro;
pub mod merge;
pub mod model;
pub mod resolver;
pub mod session;
pub mod template;

pub use error::{AzError, BackendError, Result};
pub use locator::{Output, ResourceDescriptor, ResourceId, ResourceKind, ResourceLocator};
pub use session::Session;

// Re-export tracing for use in other modules
pub use tracing;
