pub mod protocol;
pub mod transport;

pub use protocol::{SensorCommand, SensorResponse, SensorStatus, clamp_confidence};
pub use transport::{LineLink, SensorLink, SerialLink};
