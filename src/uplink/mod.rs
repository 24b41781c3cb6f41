//! UART link to the network co-processor that owns Wi-Fi and MQTT.

pub mod frame;
pub mod transport;

pub use frame::{FrameError, Kind, Reply, ReplyDecoder};
pub use transport::{UartUplink, UplinkError};
