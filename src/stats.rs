/// Snapshot returned by `get_stats`, mirroring the `(message_count,
/// consumer_count)` pair the reference transport's `get_stats_impl`
/// extracted from a passive queue-declare frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub message_count: u32,
    pub consumer_count: u32,
}
