//! Bus module - topics, connection lifecycle and bus-facing errors.

mod command;
mod connection_state;
mod errors;
mod topic;

pub use command::DeviceCommand;
pub use connection_state::ConnectionState;
pub use errors::{BusError, CommandError};
pub use topic::{Topic, TopicKind, TOPIC_ROOT};
