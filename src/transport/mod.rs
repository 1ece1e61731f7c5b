pub mod mqtt;
pub mod traits;

#[cfg(test)]
pub mod mock;
#[cfg(test)]
pub mod test_broker;

pub use mqtt::{MqttConnector, MqttSettings};
pub use traits::{EventSink, PublishRequest, Transport, TransportConnector};
