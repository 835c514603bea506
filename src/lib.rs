//! In-process topic-exchange message broker.
//!
//! This crate implements the routing core of an AMQP-style pub/sub
//! transport without talking to an actual broker process: a
//! [`TopicTrie`](trie::TopicTrie) pattern index backs each declared
//! exchange, and a [`Broker`](broker::Broker) owns the exchange, queue,
//! binding, and consumer tables plus the unacked-delivery table that
//! coordinates acknowledge/reject/requeue.
//!
//! Typical usage:
//!
//! ```no_run
//! use std::sync::Arc;
//! use topic_broker::{Broker, ClientHandle, ExchangeDeclareOptions, InProcessTransport,
//!     QueueDeclareOptions, Transport};
//!
//! let broker = Broker::new();
//! let transport = InProcessTransport::new(Arc::clone(&broker));
//! let client = ClientHandle::default();
//!
//! transport.declare_exchange(&client, "events", ExchangeDeclareOptions::default())?;
//! let queue = transport.declare_queue(&client, None, QueueDeclareOptions::default())?;
//! transport.bind(&client, "events", &queue, "orders.*.created")?;
//! # Ok::<(), topic_broker::Error>(())
//! ```

mod broker;
mod consumer;
mod ctag;
mod error;
mod exchange;
mod model;
mod queue;
mod stats;
mod transport;
mod trie;

pub use broker::Broker;
pub use consumer::ConsumerCallback;
pub use error::{Error, ErrorKind, Result};
pub use model::{
    ExchangeDeclareOptions, ExchangeKind, FieldTable, HeaderFrame, Message, MethodFrame,
    QueueDeclareOptions,
};
pub use stats::QueueStats;
pub use transport::{ClientHandle, InProcessTransport, Transport};
pub use trie::TopicTrie;
