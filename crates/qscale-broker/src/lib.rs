//! qscale-broker — message broker clients.
//!
//! [`RabbitMqClient`] implements [`qscale_autoscale::BrokerClient`] against
//! the RabbitMQ management HTTP API. Plain HTTP only.

pub mod error;
pub mod rabbitmq;

pub use error::BrokerError;
pub use rabbitmq::{RabbitMqClient, parse_queue_depth};
