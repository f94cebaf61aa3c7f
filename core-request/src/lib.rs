//! Request layer
//!
//! Turns [`ResourceDescriptor`]s into fetches. The [`RequestDispatcher`]
//! keeps at most one fetch outstanding per [`Target`] and hands the bytes
//! back through a [`Ticket`]; a [`Transport`] does the actual I/O, either
//! over the network ([`LiveTransport`]) or from recorded files
//! ([`FixtureTransport`]).

pub mod descriptor;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod fixtures;
pub mod transport;

pub use descriptor::{ResourceDescriptor, Target, TargetArgs};
pub use dispatcher::{Completion, Dispatch, RejectReason, RequestDispatcher, Ticket};
pub use endpoint::SearchEndpoint;
pub use error::{RequestError, Result};
pub use fixtures::FixtureTransport;
pub use transport::{LiveTransport, Transport};
