//! A narrow, polymorphic transport operation surface. [`InProcessTransport`]
//! is the only implementation in this crate — it delegates straight to a
//! [`Broker`] — but the trait is shaped so that an external-broker variant
//! translating to a wire protocol could implement it too, per the original
//! `BaseTransport` design.

use crate::broker::Broker;
use crate::consumer::ConsumerCallback;
use crate::error::Result;
use crate::model::{ExchangeDeclareOptions, FieldTable, QueueDeclareOptions};
use crate::stats::QueueStats;
use std::sync::Arc;

/// Opaque per-client reference. The in-process variant ignores it; an
/// external-broker variant would use it as a channel/connection handle.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientHandle;

pub trait Transport {
    fn declare_exchange(
        &self,
        client: &ClientHandle,
        name: &str,
        options: ExchangeDeclareOptions,
    ) -> Result<()>;

    fn delete_exchange(&self, client: &ClientHandle, name: &str) -> Result<()>;

    fn declare_queue(
        &self,
        client: &ClientHandle,
        name: Option<&str>,
        options: QueueDeclareOptions,
    ) -> Result<String>;

    fn delete_queue(&self, client: &ClientHandle, name: &str) -> Result<()>;

    fn bind(
        &self,
        client: &ClientHandle,
        exchange: &str,
        queue: &str,
        binding_key: &str,
    ) -> Result<()>;

    fn unbind(
        &self,
        client: &ClientHandle,
        exchange: &str,
        queue: &str,
        binding_key: &str,
    ) -> Result<()>;

    #[allow(clippy::too_many_arguments)]
    fn publish(
        &self,
        client: &ClientHandle,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        properties: FieldTable,
        immediate: bool,
        mandatory: bool,
    ) -> Result<()>;

    fn start_consume(
        &self,
        client: &ClientHandle,
        queue: &str,
        no_ack: bool,
        exclusive: bool,
        callback: ConsumerCallback,
    ) -> Result<String>;

    fn stop_consume(&self, client: &ClientHandle, consumer_tag: &str) -> Result<()>;

    fn ack(&self, client: &ClientHandle, delivery_tag: &str) -> Result<()>;

    fn reject(&self, client: &ClientHandle, delivery_tag: &str, requeue: bool) -> Result<()>;

    fn qos(
        &self,
        client: &ClientHandle,
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    ) -> Result<()>;

    fn purge(&self, client: &ClientHandle, queue: &str) -> Result<u32>;

    fn get_stats(&self, client: &ClientHandle, queue: &str) -> Result<QueueStats>;
}

/// Delegates every operation straight to an owned [`Broker`] handle; the
/// client handle is accepted for interface parity and otherwise unused.
pub struct InProcessTransport {
    broker: Arc<Broker>,
}

impl InProcessTransport {
    pub fn new(broker: Arc<Broker>) -> InProcessTransport {
        InProcessTransport { broker }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }
}

impl Transport for InProcessTransport {
    fn declare_exchange(
        &self,
        _client: &ClientHandle,
        name: &str,
        options: ExchangeDeclareOptions,
    ) -> Result<()> {
        self.broker.declare_exchange(name, options)
    }

    fn delete_exchange(&self, _client: &ClientHandle, name: &str) -> Result<()> {
        self.broker.delete_exchange(name)
    }

    fn declare_queue(
        &self,
        _client: &ClientHandle,
        name: Option<&str>,
        options: QueueDeclareOptions,
    ) -> Result<String> {
        self.broker.declare_queue(name, options)
    }

    fn delete_queue(&self, _client: &ClientHandle, name: &str) -> Result<()> {
        self.broker.delete_queue(name)
    }

    fn bind(
        &self,
        _client: &ClientHandle,
        exchange: &str,
        queue: &str,
        binding_key: &str,
    ) -> Result<()> {
        self.broker.bind(exchange, queue, binding_key)
    }

    fn unbind(
        &self,
        _client: &ClientHandle,
        exchange: &str,
        queue: &str,
        binding_key: &str,
    ) -> Result<()> {
        self.broker.unbind(exchange, queue, binding_key)
    }

    fn publish(
        &self,
        _client: &ClientHandle,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        properties: FieldTable,
        immediate: bool,
        mandatory: bool,
    ) -> Result<()> {
        self.broker
            .publish(exchange, routing_key, body, properties, immediate, mandatory)
    }

    fn start_consume(
        &self,
        _client: &ClientHandle,
        queue: &str,
        no_ack: bool,
        exclusive: bool,
        callback: ConsumerCallback,
    ) -> Result<String> {
        self.broker.start_consume(queue, no_ack, exclusive, callback)
    }

    fn stop_consume(&self, _client: &ClientHandle, consumer_tag: &str) -> Result<()> {
        self.broker.stop_consume(consumer_tag)
    }

    fn ack(&self, _client: &ClientHandle, delivery_tag: &str) -> Result<()> {
        self.broker.ack(delivery_tag)
    }

    fn reject(&self, _client: &ClientHandle, delivery_tag: &str, requeue: bool) -> Result<()> {
        self.broker.reject(delivery_tag, requeue)
    }

    fn qos(
        &self,
        _client: &ClientHandle,
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    ) -> Result<()> {
        self.broker.qos(prefetch_size, prefetch_count, global)
    }

    fn purge(&self, _client: &ClientHandle, queue: &str) -> Result<u32> {
        self.broker.purge(queue)
    }

    fn get_stats(&self, _client: &ClientHandle, queue: &str) -> Result<QueueStats> {
        self.broker.get_stats(queue)
    }
}
