//! Lambda function constructs for apistack
//!
//! Declares functions backed by local code assets, the execution role they
//! assume, and the proxy event types exchanged with the gateway.

pub mod asset;
pub mod event;
pub mod function;
pub mod invocation;

pub use asset::Code;
pub use event::{ApiGatewayEvent, ApiGatewayResponse};
pub use function::{Function, FunctionProps, Runtime};
pub use invocation::{EchoInvoker, InvocationError, Invoker};
