//! Per-consumer delivery worker. One of these threads runs for each active
//! consumer, draining its queue's buffer and invoking the user callback,
//! mirroring the `_run_consumer` greenlet of the reference router.

use crate::broker::Broker;
use crate::model::{HeaderFrame, MethodFrame};
use crate::queue::{QueueBuffer, QueueItem};
use log::error;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

/// Callback invoked for every delivered message. Receives the broker handle
/// (so the callback may re-enter the broker, e.g. to `ack` or `publish`),
/// the method frame, the header frame, and the raw body.
pub type ConsumerCallback = Arc<dyn Fn(&Broker, MethodFrame, HeaderFrame, Vec<u8>) + Send + Sync>;

/// Bookkeeping the broker keeps per active consumer. The worker's
/// `JoinHandle` is taken by `stop_consume` to bound-wait for exit.
pub(crate) struct ConsumerRecord {
    pub(crate) tag: String,
    pub(crate) exclusive: bool,
    pub(crate) handle: Option<JoinHandle<()>>,
}

/// Spawns the worker thread for one consumer and returns its `JoinHandle`.
/// `broker` is a `Weak` handle, upgraded to a strong `Arc` only for the
/// duration of each delivered message: holding a strong reference across
/// the blocking wait for the next message would keep the broker alive
/// forever, since `stop_consume`'s close sentinel is itself delivered
/// through the very mechanism this thread is waiting on.
pub(crate) fn spawn(
    broker: Weak<Broker>,
    tag: String,
    queue: String,
    buffer: Arc<QueueBuffer>,
    no_ack: bool,
    callback: ConsumerCallback,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("consumer-{}", tag))
        .spawn(move || run(broker, tag, queue, buffer, no_ack, callback))
        .expect("failed to spawn consumer worker thread")
}

fn run(
    broker: Weak<Broker>,
    tag: String,
    queue: String,
    buffer: Arc<QueueBuffer>,
    no_ack: bool,
    callback: ConsumerCallback,
) {
    let mut delivered: u64 = 0;

    loop {
        match buffer.pop_blocking() {
            QueueItem::Close => break,
            QueueItem::Message(message) => {
                let broker = match broker.upgrade() {
                    Some(broker) => broker,
                    None => break,
                };

                let delivery_tag = format!("{}-{}", tag, delivered);
                delivered += 1;

                if !no_ack {
                    broker.record_unacked(
                        delivery_tag.clone(),
                        tag.clone(),
                        queue.clone(),
                        message.clone(),
                    );
                }

                let method = MethodFrame {
                    consumer_tag: tag.clone(),
                    redelivered: message.redelivered,
                    exchange: message.exchange.clone(),
                    routing_key: message.routing_key.clone(),
                    delivery_tag,
                };
                let header = HeaderFrame {
                    headers: message.properties.clone(),
                };

                // A callback failure must never take the worker down with it.
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    callback(&broker, method, header, message.body)
                }));
                if outcome.is_err() {
                    error!("consumer '{}' callback panicked, continuing", tag);
                }
            }
        }
    }
}
