// Binary socket protocol: framing, message catalogue, dispatch and sessions.

pub mod codec;
pub mod dispatcher;
pub mod handlers;
pub mod messages;
pub mod registry;
pub mod server;
pub mod session;
pub mod wire;
