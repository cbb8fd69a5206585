//! Core types for apistack
//!
//! This crate provides the CloudFormation template model, intrinsic function
//! helpers, logical id derivation and the resource dependency graph shared by
//! all service crates.

pub mod assets;
pub mod env;
pub mod error;
pub mod graph;
pub mod intrinsic;
pub mod logical_id;
pub mod request_id;
pub mod stack;
pub mod template;

pub use assets::AssetManifest;
pub use env::StackEnv;
pub use error::{ErrorCode, StackError};
pub use graph::DependencyGraph;
pub use logical_id::LogicalId;
pub use request_id::RequestId;
pub use stack::Stack;
pub use template::{DeletionPolicy, Output, Resource, Template};
