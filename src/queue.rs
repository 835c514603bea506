//! A queue's ordered message buffer plus the reverse binding index used to
//! cascade binding cleanup when the queue is deleted.

use crate::model::{Message, QueueDeclareOptions};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

/// An item traveling through a queue's buffer: either a real message or the
/// sentinel a consumer worker uses to notice it should exit.
pub(crate) enum QueueItem {
    Message(Message),
    Close,
}

/// The FIFO buffer shared between the ingress router (writer) and a queue's
/// consumer worker(s) (readers). Kept as its own mutex/condvar pair, distinct
/// from `L_decl`, so a consumer worker can block waiting for work without
/// holding the declarations lock.
pub(crate) struct QueueBuffer {
    items: Mutex<VecDeque<QueueItem>>,
    ready: Condvar,
}

impl QueueBuffer {
    fn new() -> QueueBuffer {
        QueueBuffer {
            items: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn push(&self, item: QueueItem) {
        let mut items = self.items.lock().unwrap();
        items.push_back(item);
        self.ready.notify_one();
    }

    /// Blocks the calling thread until an item is available, then returns it.
    pub(crate) fn pop_blocking(&self) -> QueueItem {
        let mut items = self.items.lock().unwrap();
        while items.is_empty() {
            items = self.ready.wait(items).unwrap();
        }
        items.pop_front().expect("queue buffer non-empty under lock")
    }

    pub(crate) fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| matches!(item, QueueItem::Message(_)))
            .count()
    }

    /// Removes and returns every pending message, discarding any stray
    /// close sentinels. Used by `purge`.
    pub(crate) fn drain_messages(&self) -> Vec<Message> {
        let mut items = self.items.lock().unwrap();
        items
            .drain(..)
            .filter_map(|item| match item {
                QueueItem::Message(m) => Some(m),
                QueueItem::Close => None,
            })
            .collect()
    }
}

/// A declared queue: its buffer plus the bindings that currently route to
/// it, tracked here so `delete_queue` can cascade the cleanup into every
/// exchange's trie without having to scan every exchange.
pub(crate) struct QueueState {
    pub(crate) options: QueueDeclareOptions,
    pub(crate) buffer: Arc<QueueBuffer>,
    /// `(exchange, binding_key)` pairs, i.e. `bindings_by_queue[name]`.
    pub(crate) bindings: Vec<(String, String)>,
}

impl QueueState {
    pub(crate) fn new(options: QueueDeclareOptions) -> QueueState {
        QueueState {
            options,
            buffer: Arc::new(QueueBuffer::new()),
            bindings: Vec::new(),
        }
    }
}
