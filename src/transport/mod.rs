/// Blocking JSON-over-HTTP transport, retry, and a replaying stub.
pub mod http;

pub use http::{HttpRequest, HttpTransport, ReplayTransport, TransportError, UreqTransport};
