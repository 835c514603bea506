use snafu::Snafu;

/// Crate-wide result alias; every synchronous broker operation returns this.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type Error = ErrorKind;

/// The error kinds a caller of the broker or transport facade can observe.
///
/// Routing-path failures (unknown exchange during ingress, a panicking
/// consumer callback) do not appear here: they are appended to
/// [`crate::broker::Broker::errors`] instead of being returned, per the
/// propagation policy of the routing layer.
#[derive(Debug, Clone, Snafu)]
pub enum ErrorKind {
    #[snafu(display("exchange '{}' is not declared", name))]
    UnknownExchange { name: String },

    #[snafu(display("queue '{}' is not declared", name))]
    UnknownQueue { name: String },

    #[snafu(display("no consumer registered with tag '{}'", tag))]
    UnknownConsumer { tag: String },

    #[snafu(display("no unacked delivery with tag '{}'", tag))]
    UnknownDelivery { tag: String },

    #[snafu(display(
        "exchange '{}' already declared with different attributes",
        name
    ))]
    ExchangeDeclareConflict { name: String },

    #[snafu(display("queue '{}' already declared with different attributes", name))]
    QueueDeclareConflict { name: String },

    #[snafu(display("exchange type '{}' is not supported, only 'topic' is", kind))]
    UnsupportedExchangeType { kind: String },

    #[snafu(display("queue '{}' already has an exclusive consumer", queue))]
    ExclusiveConsumerConflict { queue: String },

    #[snafu(display("transport failure: {}", message))]
    TransportFailure { message: String },
}
