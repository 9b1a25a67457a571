pub mod call;
pub mod cli;
pub mod config;
pub(crate) mod debug;
pub mod error;
pub mod http;
pub mod scope;
pub mod testutil;
pub mod twiml;

pub use call::{AdvanceOptions, CallFlow, CallOptions, CallScope, CallSession};
pub use error::CallScopeError;
pub use http::{HttpDriver, HttpMethod, UreqDriver};
pub use scope::ScopedDocument;
