/// Sink for scanner progress.
///
/// The backlog and handled-height hooks are required; the rest default to
/// no-ops so simple reporters only track what they care about.
pub trait StatusReporter: Send + Sync {
    /// Blocks between the last submitted height and the new effective height.
    fn report_backlog_size(&self, blocks: u64);

    /// Handled watermark after every batch of a range completed. Trackers of
    /// different ranges call this concurrently, so a lower height can arrive
    /// after a higher one.
    fn report_handled_height(&self, height: u64);

    fn report_full_scan_requested(&self, _height: u64) {}

    fn report_batches_dispatched(&self, _batches: usize, _addresses: usize) {}
}
