//! A declared exchange: its attributes plus the `TopicTrie` that stores
//! `binding_key -> queue name` for every binding routed through it.

use crate::model::ExchangeDeclareOptions;
use crate::trie::TopicTrie;

pub(crate) struct ExchangeState {
    pub(crate) options: ExchangeDeclareOptions,
    pub(crate) trie: TopicTrie,
}

impl ExchangeState {
    pub(crate) fn new(options: ExchangeDeclareOptions) -> ExchangeState {
        ExchangeState {
            options,
            trie: TopicTrie::new(),
        }
    }
}
