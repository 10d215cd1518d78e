pub mod bridge;
pub mod traits;

pub use bridge::BridgeTransport;
pub use traits::{DeviceTransport, MessagePublisher, TransportError};
