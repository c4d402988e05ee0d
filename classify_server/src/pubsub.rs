use bytes::Bytes;
use common::protocol::LabelRow;
use tokio::sync::{broadcast, watch};

pub type FrameSender = broadcast::Sender<Bytes>;
pub type FrameReceiver = broadcast::Receiver<Bytes>;
pub type RowsReceiver = watch::Receiver<Vec<LabelRow>>;

/// Fan-out of the frame loop results to the HTTP streams.
///
/// Encoded frames are broadcast, so a slow viewer only lags behind. Label rows are kept as the
/// latest snapshot, so a new viewer sees the current rows immediately.
pub struct Publisher {
    frames_tx: FrameSender,
    rows_tx: watch::Sender<Vec<LabelRow>>,
    rows_rx: RowsReceiver,
}

impl Publisher {
    pub fn new() -> Self {
        let (frames_tx, _) = broadcast::channel(4);
        let (rows_tx, rows_rx) = watch::channel(Vec::new());
        Self {
            frames_tx,
            rows_tx,
            rows_rx,
        }
    }

    pub fn publish_frame(&self, frame: Bytes) {
        // Fails only without viewers
        self.frames_tx.send(frame).ok();
    }

    pub fn publish_rows(&self, rows: &[LabelRow]) {
        self.rows_tx.send_replace(rows.to_vec());
    }

    /// Number of open video streams.
    pub fn viewers(&self) -> usize {
        self.frames_tx.receiver_count()
    }

    pub fn subscribe_frames(&self) -> FrameReceiver {
        self.frames_tx.subscribe()
    }

    pub fn subscribe_rows(&self) -> RowsReceiver {
        self.rows_rx.clone()
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[tokio::test]
    async fn late_row_subscribers_see_latest_snapshot() {
        let publisher = Publisher::new();
        publisher.publish_rows(&[LabelRow::default(), LabelRow::default()]);

        let rows = publisher.subscribe_rows();
        assert_eq!(rows.borrow().len(), 2);
    }

    #[tokio::test]
    async fn frames_reach_every_subscriber() -> Result<(), broadcast::error::RecvError> {
        let publisher = Publisher::new();
        let mut first = publisher.subscribe_frames();
        let mut second = publisher.subscribe_frames();
        assert_eq!(publisher.viewers(), 2);

        publisher.publish_frame(Bytes::from_static(b"frame"));

        assert_eq!(first.recv().await?, Bytes::from_static(b"frame"));
        assert_eq!(second.recv().await?, Bytes::from_static(b"frame"));

        Ok(())
    }

    #[test]
    fn publishing_without_viewers_is_fine() {
        let publisher = Publisher::new();
        publisher.publish_frame(Bytes::from_static(b"frame"));
    }
}
