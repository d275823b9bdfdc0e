//! Job progress reporting
//!
//! The orchestration loops stay pure: they emit an event after every item
//! through an unbounded channel and never wait on the receiver, so a slow or
//! absent consumer cannot stall a run.

use tokio::sync::mpsc;

/// One progress tick, emitted after each processed item.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Items completed so far, including skips and errors
    pub processed: usize,
    /// Total candidates in this run
    pub total: usize,
    /// File name of the item that just finished
    pub label: String,
}

/// Sending half the caller hands to a job to watch it run.
pub type ProgressSender = mpsc::UnboundedSender<Progress>;

/// Fire-and-continue send; a closed or missing receiver is ignored.
pub(crate) fn report(progress: Option<&ProgressSender>, processed: usize, total: usize, label: &str) {
    if let Some(tx) = progress {
        let _ = tx.send(Progress {
            processed,
            total,
            label: label.to_string(),
        });
    }
}
