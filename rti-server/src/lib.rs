//! The async server half of an OpenRTI node: the message dispatcher, the drain-dispatch-reply
//! loop harness, the wire/in-process transports it drives, and the leaf registry that lets
//! in-process connects find each other (spec §4, §5, §6).

pub mod bincodec;
pub mod dispatcher;
pub mod inbox;
pub mod registry;
pub mod server_loop;
pub mod transport;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use inbox::Inbox;
pub use registry::{LeafHandle, lookup, register_or_join, unregister};
pub use server_loop::{NetworkServerLoop, Posted, ServerHarness, ServerState, ThreadServerLoop};
pub use transport::{InProcessClosed, InProcessTransport, TcpTransport, Transport};
