//! The in-process broker: exchanges, queues, bindings, consumers, and the
//! unacked-delivery table, coordinating concurrent publishers and
//! per-queue delivery workers. See module docs on [`crate::trie::TopicTrie`]
//! for the matching algorithm and `SPEC_FULL.md` §5/§8 for the lock model.

use crate::consumer::{self, ConsumerCallback, ConsumerRecord};
use crate::error::{ErrorKind, Result};
use crate::exchange::ExchangeState;
use crate::model::{
    ExchangeDeclareOptions, ExchangeKind, FieldTable, Message, QueueDeclareOptions,
};
use crate::queue::{QueueItem, QueueState};
use crate::stats::QueueStats;
use crossbeam_channel::{unbounded, Receiver, Sender};
use indexmap::IndexMap;
use log::{debug, warn};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

const CONSUMER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// One published-but-not-yet-routed message, queued onto the shared ingress
/// channel by `publish` and drained by the ingress router thread.
enum IngressItem {
    Publish {
        exchange: String,
        routing_key: String,
        body: Vec<u8>,
        properties: FieldTable,
    },
    Shutdown,
}

/// `L_decl`: exchanges, queues, and the bindings embedded in each queue.
struct Declarables {
    exchanges: IndexMap<String, ExchangeState>,
    queues: IndexMap<String, QueueState>,
}

/// `L_cons`: the consumer registry and the ctag pool.
struct Consumers {
    by_queue: IndexMap<String, Vec<ConsumerRecord>>,
    by_ctag: IndexMap<String, String>,
    pool: crate::ctag::CtagPool,
}

/// One entry of `L_unack`: everything needed to requeue a rejected message.
struct UnackedEntry {
    queue: String,
    message: Message,
}

/// The in-process broker. Cheap to share: construct once via [`Broker::new`]
/// (which returns an `Arc`) and hand clones of the `Arc` to every publisher,
/// consumer, and transport facade that needs it.
pub struct Broker {
    decl: Mutex<Declarables>,
    cons: Mutex<Consumers>,
    unacked: Mutex<IndexMap<String, UnackedEntry>>,
    errors: Mutex<Vec<String>>,
    ingress_tx: Sender<IngressItem>,
    ingress_handle: Mutex<Option<thread::JoinHandle<()>>>,
    closed: Mutex<bool>,
    self_ref: Mutex<Weak<Broker>>,
}

impl Broker {
    /// Builds a broker and starts its ingress router thread.
    pub fn new() -> Arc<Broker> {
        let (ingress_tx, ingress_rx) = unbounded();

        let broker = Arc::new(Broker {
            decl: Mutex::new(Declarables {
                exchanges: IndexMap::new(),
                queues: IndexMap::new(),
            }),
            cons: Mutex::new(Consumers {
                by_queue: IndexMap::new(),
                by_ctag: IndexMap::new(),
                pool: crate::ctag::CtagPool::new(),
            }),
            unacked: Mutex::new(IndexMap::new()),
            errors: Mutex::new(Vec::new()),
            ingress_tx,
            ingress_handle: Mutex::new(None),
            closed: Mutex::new(false),
            self_ref: Mutex::new(Weak::new()),
        });

        *broker.self_ref.lock().unwrap() = Arc::downgrade(&broker);

        // The ingress thread holds only a `Weak` back-reference so that the
        // last caller-held `Arc<Broker>` going out of scope is enough to
        // drop the broker and have `Drop` join this thread, rather than the
        // thread itself keeping the broker alive forever.
        let worker_broker = Arc::downgrade(&broker);
        let handle = thread::Builder::new()
            .name("broker-ingress".into())
            .spawn(move || run_ingress(worker_broker, ingress_rx))
            .expect("failed to spawn ingress worker thread");
        *broker.ingress_handle.lock().unwrap() = Some(handle);

        broker
    }

    // ---- declarative operations ------------------------------------

    pub fn declare_exchange(&self, name: &str, options: ExchangeDeclareOptions) -> Result<()> {
        if options.kind != ExchangeKind::Topic {
            return Err(ErrorKind::UnsupportedExchangeType {
                kind: options.kind.as_str().to_string(),
            });
        }

        let mut decl = self.decl.lock().unwrap();
        match decl.exchanges.get(name) {
            Some(existing) if existing.options.compatible(&options) => Ok(()),
            Some(_) => Err(ErrorKind::ExchangeDeclareConflict {
                name: name.to_string(),
            }),
            None => {
                decl.exchanges
                    .insert(name.to_string(), ExchangeState::new(options));
                Ok(())
            }
        }
    }

    pub fn delete_exchange(&self, name: &str) -> Result<()> {
        let mut decl = self.decl.lock().unwrap();
        decl.exchanges.remove(name);
        Ok(())
    }

    pub fn declare_queue(&self, name: Option<&str>, options: QueueDeclareOptions) -> Result<String> {
        let mut decl = self.decl.lock().unwrap();

        let name = match name.filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => mint_queue_name(&decl.queues),
        };

        match decl.queues.get(&name) {
            Some(existing) if existing.options.compatible(&options) => Ok(name),
            Some(_) => Err(ErrorKind::QueueDeclareConflict { name }),
            None => {
                decl.queues.insert(name.clone(), QueueState::new(options));
                Ok(name)
            }
        }
    }

    pub fn delete_queue(&self, name: &str) -> Result<()> {
        let mut decl = self.decl.lock().unwrap();
        if let Some(queue) = decl.queues.remove(name) {
            for (exchange, binding_key) in queue.bindings {
                if let Some(ex) = decl.exchanges.get_mut(&exchange) {
                    ex.trie.remove(&binding_key, name);
                }
            }
        }
        Ok(())
    }

    pub fn bind(&self, exchange: &str, queue: &str, binding_key: &str) -> Result<()> {
        let mut decl = self.decl.lock().unwrap();
        if !decl.exchanges.contains_key(exchange) {
            return Err(ErrorKind::UnknownExchange {
                name: exchange.to_string(),
            });
        }
        if !decl.queues.contains_key(queue) {
            return Err(ErrorKind::UnknownQueue {
                name: queue.to_string(),
            });
        }

        decl.exchanges
            .get_mut(exchange)
            .unwrap()
            .trie
            .add(binding_key, queue.to_string());
        decl.queues
            .get_mut(queue)
            .unwrap()
            .bindings
            .push((exchange.to_string(), binding_key.to_string()));
        Ok(())
    }

    pub fn unbind(&self, exchange: &str, queue: &str, binding_key: &str) -> Result<()> {
        let mut decl = self.decl.lock().unwrap();
        if !decl.exchanges.contains_key(exchange) {
            return Err(ErrorKind::UnknownExchange {
                name: exchange.to_string(),
            });
        }
        if !decl.queues.contains_key(queue) {
            return Err(ErrorKind::UnknownQueue {
                name: queue.to_string(),
            });
        }

        decl.exchanges.get_mut(exchange).unwrap().trie.remove(binding_key, queue);
        let bindings = &mut decl.queues.get_mut(queue).unwrap().bindings;
        if let Some(pos) = bindings
            .iter()
            .position(|(ex, key)| ex == exchange && key == binding_key)
        {
            bindings.remove(pos);
        }
        Ok(())
    }

    // ---- messaging operations ----------------------------------------

    /// Enqueues a message onto the shared ingress channel. `immediate` and
    /// `mandatory` are accepted for interface parity with the AMQP
    /// transport facade and are documented no-ops in this core.
    pub fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        properties: FieldTable,
        _immediate: bool,
        _mandatory: bool,
    ) -> Result<()> {
        self.ingress_tx
            .send(IngressItem::Publish {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                body,
                properties,
            })
            .map_err(|_| ErrorKind::TransportFailure {
                message: "ingress router is no longer running".to_string(),
            })
    }

    pub fn start_consume(
        &self,
        queue: &str,
        no_ack: bool,
        exclusive: bool,
        callback: ConsumerCallback,
    ) -> Result<String> {
        // Lock order: L_cons -> L_decl, re-entrantly for the spawn below.
        let mut cons = self.cons.lock().unwrap();
        let decl = self.decl.lock().unwrap();

        let queue_state = decl
            .queues
            .get(queue)
            .ok_or_else(|| ErrorKind::UnknownQueue {
                name: queue.to_string(),
            })?;

        let existing = cons.by_queue.get(queue).map(Vec::as_slice).unwrap_or(&[]);
        if exclusive && !existing.is_empty() || existing.iter().any(|c| c.exclusive) {
            return Err(ErrorKind::ExclusiveConsumerConflict {
                queue: queue.to_string(),
            });
        }

        let tag = cons.pool.acquire();
        let buffer = Arc::clone(&queue_state.buffer);
        drop(decl);

        // Same reasoning as the ingress thread: a consumer worker holds only
        // a `Weak` reference back to its broker, upgraded per delivered
        // message, so it never keeps the broker alive on its own.
        let weak_broker = self.self_ref.lock().unwrap().clone();
        let handle = consumer::spawn(
            weak_broker,
            tag.clone(),
            queue.to_string(),
            buffer,
            no_ack,
            callback,
        );

        cons.by_queue.entry(queue.to_string()).or_default().push(ConsumerRecord {
            tag: tag.clone(),
            exclusive,
            handle: Some(handle),
        });
        cons.by_ctag.insert(tag.clone(), queue.to_string());

        debug!("consumer '{}' started on queue '{}'", tag, queue);
        Ok(tag)
    }

    pub fn stop_consume(&self, consumer_tag: &str) -> Result<()> {
        let mut cons = self.cons.lock().unwrap();
        let queue = cons
            .by_ctag
            .remove(consumer_tag)
            .ok_or_else(|| ErrorKind::UnknownConsumer {
                tag: consumer_tag.to_string(),
            })?;

        let records = cons.by_queue.get_mut(&queue).expect("consumer registry consistent");
        let pos = records
            .iter()
            .position(|r| r.tag == consumer_tag)
            .expect("consumer registry consistent");
        let mut record = records.remove(pos);
        cons.pool.release(consumer_tag);
        drop(cons);

        {
            let decl = self.decl.lock().unwrap();
            if let Some(q) = decl.queues.get(&queue) {
                q.buffer.push(QueueItem::Close);
            }
        }

        if let Some(handle) = record.handle.take() {
            join_with_timeout(handle, CONSUMER_JOIN_TIMEOUT);
        }

        debug!("consumer '{}' stopped", consumer_tag);
        Ok(())
    }

    pub fn ack(&self, delivery_tag: &str) -> Result<()> {
        let mut unacked = self.unacked.lock().unwrap();
        unacked
            .remove(delivery_tag)
            .map(|_| ())
            .ok_or_else(|| ErrorKind::UnknownDelivery {
                tag: delivery_tag.to_string(),
            })
    }

    pub fn reject(&self, delivery_tag: &str, requeue: bool) -> Result<()> {
        let entry = {
            let mut unacked = self.unacked.lock().unwrap();
            unacked.remove(delivery_tag)
        }
        .ok_or_else(|| ErrorKind::UnknownDelivery {
            tag: delivery_tag.to_string(),
        })?;

        if requeue {
            let decl = self.decl.lock().unwrap();
            if let Some(q) = decl.queues.get(&entry.queue) {
                warn!("requeueing delivery '{}' onto '{}'", delivery_tag, entry.queue);
                q.buffer.push(QueueItem::Message(entry.message.requeued()));
            }
        }
        Ok(())
    }

    pub fn qos(&self, _prefetch_size: u32, _prefetch_count: u16, _global: bool) -> Result<()> {
        Ok(())
    }

    pub fn purge(&self, queue: &str) -> Result<u32> {
        let decl = self.decl.lock().unwrap();
        let q = decl
            .queues
            .get(queue)
            .ok_or_else(|| ErrorKind::UnknownQueue {
                name: queue.to_string(),
            })?;
        Ok(q.buffer.drain_messages().len() as u32)
    }

    pub fn get_stats(&self, queue: &str) -> Result<QueueStats> {
        let cons = self.cons.lock().unwrap();
        let decl = self.decl.lock().unwrap();
        let q = decl
            .queues
            .get(queue)
            .ok_or_else(|| ErrorKind::UnknownQueue {
                name: queue.to_string(),
            })?;
        Ok(QueueStats {
            message_count: q.buffer.len() as u32,
            consumer_count: cons.by_queue.get(queue).map(Vec::len).unwrap_or(0) as u32,
        })
    }

    /// Broker-level routing errors accumulated by the ingress router, e.g.
    /// a publish to an exchange that was never declared.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    /// Signals the ingress router to drain and stop, cancels every active
    /// consumer, and joins the ingress thread. Idempotent.
    pub fn shutdown(&self) {
        let mut closed = self.closed.lock().unwrap();
        if *closed {
            return;
        }
        *closed = true;
        drop(closed);

        let tags: Vec<String> = self.cons.lock().unwrap().by_ctag.keys().cloned().collect();
        for tag in tags {
            let _ = self.stop_consume(&tag);
        }

        let _ = self.ingress_tx.send(IngressItem::Shutdown);
        if let Some(handle) = self.ingress_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub(crate) fn record_unacked(&self, delivery_tag: String, _ctag: String, queue: String, message: Message) {
        self.unacked
            .lock()
            .unwrap()
            .insert(delivery_tag, UnackedEntry { queue, message });
    }

    fn record_error(&self, message: String) {
        warn!("{}", message);
        self.errors.lock().unwrap().push(message);
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The ingress router: drains published messages in FIFO order and routes
/// each into every matching queue's buffer, holding `L_decl` for the whole
/// match-and-enqueue pass. Holds only a `Weak<Broker>`, upgraded once per
/// drained item, so this thread never keeps the broker alive by itself.
fn run_ingress(broker: Weak<Broker>, rx: Receiver<IngressItem>) {
    for item in rx.iter() {
        match item {
            IngressItem::Shutdown => break,
            IngressItem::Publish {
                exchange,
                routing_key,
                body,
                properties,
            } => {
                let broker = match broker.upgrade() {
                    Some(broker) => broker,
                    None => break,
                };
                let decl = broker.decl.lock().unwrap();
                match decl.exchanges.get(&exchange) {
                    None => {
                        drop(decl);
                        broker.record_error(format!(
                            "publish to unknown exchange '{}' (routing key '{}')",
                            exchange, routing_key
                        ));
                    }
                    Some(ex) => {
                        let matched = ex.trie.matches(&routing_key);
                        debug!("routed '{}' to {} queue(s)", routing_key, matched.len());
                        for queue_name in matched {
                            if let Some(q) = decl.queues.get(&queue_name) {
                                let message = Message::fresh(
                                    exchange.clone(),
                                    routing_key.clone(),
                                    body.clone(),
                                    properties.clone(),
                                );
                                q.buffer.push(QueueItem::Message(message));
                            }
                        }
                    }
                }
            }
        }
    }
}

fn mint_queue_name(queues: &IndexMap<String, QueueState>) -> String {
    loop {
        let candidate = format!("q-{}", random_alphanumeric10());
        if !queues.contains_key(&candidate) {
            return candidate;
        }
    }
}

fn random_alphanumeric10() -> String {
    Uuid::new_v4()
        .to_string()
        .chars()
        .filter(|c| *c != '-')
        .take(10)
        .collect()
}

/// Joins `handle`, waiting up to `timeout`. Rust has no safe way to force a
/// thread to terminate, so on timeout the join is handed off to a detached
/// watcher thread instead of actually killing the worker — a documented
/// narrowing of the reference implementation's `join(timeout); kill()`.
fn join_with_timeout(handle: thread::JoinHandle<()>, timeout: Duration) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let _ = handle.join();
        let _ = tx.send(());
    });
    if rx.recv_timeout(timeout).is_err() {
        warn!("consumer worker did not exit within {:?}, detaching", timeout);
    }
}
