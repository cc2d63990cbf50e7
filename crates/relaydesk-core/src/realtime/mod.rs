//! Real-time delivery: viewer sessions, room membership and fan-out.

pub mod broker;
pub mod room;
pub mod session;

pub use broker::FanoutBroker;
pub use room::RoomRegistry;
pub use session::{SessionHandle, SessionId, TransportKind};
