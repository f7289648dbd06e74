//! # Ports
//!
//! - `inbound`: the API the remote library offers its host
//! - `outbound`: what the remote library needs (transport, local engine,
//!   configuration)

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
