//! Message relay: persist, fan out, deliver to the platform, auto-reply.

pub mod delivery;
pub mod keyed;
pub mod reply;
pub mod service;

pub use delivery::{OutboundDelivery, PlatformDelivery, PlatformSender};
pub use keyed::KeyedLock;
pub use reply::ReplyGenerator;
pub use service::{MessageRelay, RelayOptions};
