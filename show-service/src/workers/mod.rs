pub mod acceptance;
pub mod amqp;
pub mod source;

pub use acceptance::{AcceptanceOutcome, AcceptanceUpdater};
pub use amqp::AmqpSource;
pub use source::{Acknowledger, ChannelSource, MessageSource, QueueMessage};
