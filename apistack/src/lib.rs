//! apistack - a Cognito-protected transactions API
//!
//! Declares a user pool with its hosted domain and OAuth client, a function
//! serving `GET /transactions`, and a REST API that only forwards requests
//! carrying a token from that pool. The declaration synthesizes into a
//! CloudFormation template and can be served locally.

pub mod cli;
pub mod config;
pub mod serve;
pub mod stack;
pub mod synth;

pub use config::StackConfig;
pub use stack::{build_stack, define, ApiStack};
pub use synth::{synthesize, Assembly, TemplateFormat};
