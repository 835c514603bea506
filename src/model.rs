use indexmap::IndexMap;

/// Opaque property map carried alongside every published message.
///
/// The broker core never interprets these bytes; it only stores and
/// round-trips them, same as the `properties` argument in the original
/// transport abstraction. Keys and values are plain byte buffers so that
/// the core has no dependency on any particular wire serializer — the
/// external-broker variant is free to pack/unpack this with whatever
/// format its wire protocol uses.
pub type FieldTable = IndexMap<Vec<u8>, Vec<u8>>;

/// Declared kind of an exchange. Only `Topic` is implemented; the others
/// exist so `declare_exchange` can reject them with `UnsupportedExchangeType`
/// rather than silently treating every exchange as topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Topic,
    Direct,
    Fanout,
    Headers,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Topic => "topic",
            ExchangeKind::Direct => "direct",
            ExchangeKind::Fanout => "fanout",
            ExchangeKind::Headers => "headers",
        }
    }
}

/// Declared attributes of an exchange, asserted for equality on redeclare.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeDeclareOptions {
    pub kind: ExchangeKind,
    pub durable: bool,
    pub auto_delete: bool,
    /// Free-form tag identifying the originator of the declare; stored,
    /// never interpreted by the broker.
    pub blame: Option<String>,
}

impl Default for ExchangeDeclareOptions {
    fn default() -> Self {
        ExchangeDeclareOptions {
            kind: ExchangeKind::Topic,
            durable: false,
            auto_delete: true,
            blame: None,
        }
    }
}

impl ExchangeDeclareOptions {
    /// Attribute equality used by redeclare, ignoring `blame` — the
    /// diagnostic tag never participates in the declare-conflict check.
    pub fn compatible(&self, other: &ExchangeDeclareOptions) -> bool {
        self.kind == other.kind && self.durable == other.durable && self.auto_delete == other.auto_delete
    }
}

/// Declared attributes of a queue, asserted for equality on redeclare.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueueDeclareOptions {
    pub durable: bool,
    pub auto_delete: bool,
    pub blame: Option<String>,
}

impl QueueDeclareOptions {
    /// Attribute equality used by redeclare, ignoring `blame`.
    pub fn compatible(&self, other: &QueueDeclareOptions) -> bool {
        self.durable == other.durable && self.auto_delete == other.auto_delete
    }
}

/// A message as it sits in a queue's buffer: the tuple the spec calls
/// `(exchange, routing_key, body, properties)`, plus a redelivered flag
/// set when the message reaches the buffer via `reject(requeue = true)`.
#[derive(Debug, Clone)]
pub struct Message {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    pub properties: FieldTable,
    pub redelivered: bool,
}

impl Message {
    pub(crate) fn fresh(
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        body: Vec<u8>,
        properties: FieldTable,
    ) -> Message {
        Message {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            body,
            properties,
            redelivered: false,
        }
    }

    pub(crate) fn requeued(mut self) -> Message {
        self.redelivered = true;
        self
    }
}

/// Method-frame descriptor handed to a consumer callback alongside the
/// header frame and body, mirroring the `(method_frame, header_frame, body)`
/// triple of the original transport's delivery callback contract.
#[derive(Debug, Clone)]
pub struct MethodFrame {
    pub consumer_tag: String,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    pub delivery_tag: String,
}

/// Header frame handed to a consumer callback: a shallow copy of the
/// message's properties at delivery time.
#[derive(Debug, Clone, Default)]
pub struct HeaderFrame {
    pub headers: FieldTable,
}

