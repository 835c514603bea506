use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use topic_broker::{
    Broker, ExchangeDeclareOptions, HeaderFrame, MethodFrame, QueueDeclareOptions,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// A callback that forwards every delivery to a channel, so the test thread
/// can assert on it without blocking the consumer worker.
fn recording_callback(
    tx: Sender<(MethodFrame, HeaderFrame, Vec<u8>)>,
) -> topic_broker::ConsumerCallback {
    Arc::new(move |_broker, method, header, body| {
        let _ = tx.send((method, header, body));
    })
}

#[test]
fn single_binding_delivers_exact_body_and_routing_key() {
    init_logging();
    let broker = Broker::new();

    broker
        .declare_exchange("ex1", ExchangeDeclareOptions::default())
        .unwrap();
    let q1 = broker
        .declare_queue(Some("q1"), QueueDeclareOptions::default())
        .unwrap();
    broker.bind("ex1", &q1, "a.*.c").unwrap();

    let (tx, rx) = unbounded();
    broker
        .start_consume(&q1, false, false, recording_callback(tx))
        .unwrap();

    broker
        .publish(
            "ex1",
            "a.b.c",
            b"hello".to_vec(),
            Default::default(),
            false,
            false,
        )
        .unwrap();

    let (method, _header, body) = rx.recv_timeout(RECV_TIMEOUT).expect("expected a delivery");
    assert_eq!(body, b"hello");
    assert_eq!(method.routing_key, "a.b.c");
    assert_eq!(method.exchange, "ex1");
    assert!(!method.redelivered);

    assert_eq!(rx.recv_timeout(Duration::from_millis(200)), Err(RecvTimeoutError::Timeout));
}

#[test]
fn overlapping_bindings_deduplicate_to_one_delivery() {
    init_logging();
    let broker = Broker::new();

    broker
        .declare_exchange("ex1", ExchangeDeclareOptions::default())
        .unwrap();
    let q1 = broker
        .declare_queue(Some("q1"), QueueDeclareOptions::default())
        .unwrap();
    broker.bind("ex1", &q1, "a.#").unwrap();
    broker.bind("ex1", &q1, "#.c").unwrap();

    let (tx, rx) = unbounded();
    broker
        .start_consume(&q1, false, false, recording_callback(tx))
        .unwrap();

    broker
        .publish("ex1", "a.b.c", b"x".to_vec(), Default::default(), false, false)
        .unwrap();

    rx.recv_timeout(RECV_TIMEOUT).expect("expected exactly one delivery");
    assert_eq!(rx.recv_timeout(Duration::from_millis(200)), Err(RecvTimeoutError::Timeout));
}

#[test]
fn stop_consume_then_restart_then_reject_requeues_messages() {
    init_logging();
    let broker = Broker::new();

    broker
        .declare_exchange("ex1", ExchangeDeclareOptions::default())
        .unwrap();
    let q1 = broker
        .declare_queue(Some("q1"), QueueDeclareOptions::default())
        .unwrap();
    broker.bind("ex1", &q1, "a.b.c").unwrap();

    let (tx, rx) = unbounded();
    let ctag = broker
        .start_consume(&q1, false, false, recording_callback(tx))
        .unwrap();

    for _ in 0..3 {
        broker
            .publish("ex1", "a.b.c", b"msg".to_vec(), Default::default(), false, false)
            .unwrap();
    }

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(rx.recv_timeout(RECV_TIMEOUT).expect("expected a delivery"));
    }
    broker.stop_consume(&ctag).unwrap();

    // None of the three deliveries were acked; reject each with requeue.
    for (method, _, _) in &received {
        broker.reject(&method.delivery_tag, true).unwrap();
    }

    assert_eq!(broker.get_stats(&q1).unwrap().message_count, 3);

    let (tx2, rx2) = unbounded();
    broker
        .start_consume(&q1, false, false, recording_callback(tx2))
        .unwrap();

    for _ in 0..3 {
        let (method, _, _) = rx2.recv_timeout(RECV_TIMEOUT).expect("expected a redelivery");
        assert!(method.redelivered);
    }
}

#[test]
fn messages_published_before_consumer_starts_are_delivered_once_consumer_attaches() {
    init_logging();
    let broker = Broker::new();

    broker
        .declare_exchange("ex1", ExchangeDeclareOptions::default())
        .unwrap();
    let q1 = broker
        .declare_queue(Some("q1"), QueueDeclareOptions::default())
        .unwrap();
    broker.bind("ex1", &q1, "a.b.c").unwrap();

    broker
        .publish(
            "ex1",
            "a.b.c",
            b"queued".to_vec(),
            Default::default(),
            false,
            false,
        )
        .unwrap();

    // Give the ingress router a moment to land the message in the queue.
    std::thread::sleep(Duration::from_millis(100));

    let (tx, rx) = unbounded();
    broker
        .start_consume(&q1, false, false, recording_callback(tx))
        .unwrap();

    let (_, _, body) = rx.recv_timeout(RECV_TIMEOUT).expect("expected the queued delivery");
    assert_eq!(body, b"queued");
}

#[test]
fn publish_to_unknown_exchange_is_recorded_and_broker_stays_usable() {
    init_logging();
    let broker = Broker::new();

    broker
        .publish("exX", "whatever", b"x".to_vec(), Default::default(), false, false)
        .unwrap();

    // Give the ingress router a moment to process and record the error.
    std::thread::sleep(Duration::from_millis(100));
    assert!(!broker.errors().is_empty());

    // The broker remains operational afterwards.
    broker
        .declare_exchange("ex1", ExchangeDeclareOptions::default())
        .unwrap();
    let q1 = broker
        .declare_queue(Some("q1"), QueueDeclareOptions::default())
        .unwrap();
    broker.bind("ex1", &q1, "k").unwrap();

    let (tx, rx) = unbounded();
    broker
        .start_consume(&q1, false, false, recording_callback(tx))
        .unwrap();
    broker
        .publish("ex1", "k", b"ok".to_vec(), Default::default(), false, false)
        .unwrap();
    rx.recv_timeout(RECV_TIMEOUT).expect("expected a delivery on the valid exchange");
}

#[test]
fn ack_of_unknown_tag_fails_and_double_ack_fails() {
    init_logging();
    let broker = Broker::new();

    assert!(broker.ack("zctag-0-0").is_err());

    broker
        .declare_exchange("ex1", ExchangeDeclareOptions::default())
        .unwrap();
    let q1 = broker
        .declare_queue(Some("q1"), QueueDeclareOptions::default())
        .unwrap();
    broker.bind("ex1", &q1, "k").unwrap();

    let (tx, rx) = unbounded();
    broker
        .start_consume(&q1, false, false, recording_callback(tx))
        .unwrap();
    broker
        .publish("ex1", "k", b"x".to_vec(), Default::default(), false, false)
        .unwrap();
    let (method, _, _) = rx.recv_timeout(RECV_TIMEOUT).expect("expected a delivery");

    broker.ack(&method.delivery_tag).unwrap();
    assert!(broker.ack(&method.delivery_tag).is_err());
}

#[test]
fn delete_queue_removes_it_from_every_exchange_match_set() {
    init_logging();
    let broker = Broker::new();

    broker
        .declare_exchange("ex1", ExchangeDeclareOptions::default())
        .unwrap();
    let q1 = broker
        .declare_queue(Some("q1"), QueueDeclareOptions::default())
        .unwrap();
    broker.bind("ex1", &q1, "a.#").unwrap();
    broker.bind("ex1", &q1, "#.c").unwrap();

    broker.delete_queue(&q1).unwrap();

    broker
        .publish("ex1", "a.b.c", b"x".to_vec(), Default::default(), false, false)
        .unwrap();
    std::thread::sleep(Duration::from_millis(100));

    // No consumer exists any more, and nothing should have blown up: the
    // message is simply dropped because its matched queue no longer exists.
    assert!(broker.errors().is_empty());
}

#[test]
fn declare_exchange_is_idempotent_but_rejects_conflicting_redeclare() {
    let broker = Broker::new();

    broker
        .declare_exchange("ex1", ExchangeDeclareOptions::default())
        .unwrap();
    broker
        .declare_exchange("ex1", ExchangeDeclareOptions::default())
        .unwrap();

    let conflicting = ExchangeDeclareOptions {
        durable: true,
        ..Default::default()
    };
    assert!(broker.declare_exchange("ex1", conflicting).is_err());
}

#[test]
fn exclusive_consumer_rejects_a_second_consumer_on_the_same_queue() {
    let broker = Broker::new();
    broker
        .declare_exchange("ex1", ExchangeDeclareOptions::default())
        .unwrap();
    let q1 = broker
        .declare_queue(Some("q1"), QueueDeclareOptions::default())
        .unwrap();

    let (tx, _rx) = unbounded();
    broker
        .start_consume(&q1, false, true, recording_callback(tx))
        .unwrap();

    let (tx2, _rx2) = unbounded();
    assert!(broker.start_consume(&q1, false, false, recording_callback(tx2)).is_err());
}
