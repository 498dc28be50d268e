use super::NodeId;
use tokio::sync::mpsc;

/// A structural change observed under a connected node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl MutationRecord {
    pub fn has_additions(&self) -> bool {
        !self.added.is_empty()
    }
}

/// Subscription to structural mutations of a whole document.
///
/// Dropping the watch disconnects it; the document prunes closed
/// subscriptions on its next mutation.
#[derive(Debug)]
pub struct MutationWatch {
    rx: mpsc::UnboundedReceiver<MutationRecord>,
}

impl MutationWatch {
    pub(super) fn new(rx: mpsc::UnboundedReceiver<MutationRecord>) -> Self {
        Self { rx }
    }

    /// Drain every record queued so far without waiting.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        let mut records = Vec::new();
        while let Ok(record) = self.rx.try_recv() {
            records.push(record);
        }
        records
    }

    /// Wait for the next record. Returns `None` once the document is gone.
    pub async fn next(&mut self) -> Option<MutationRecord> {
        self.rx.recv().await
    }
}

#[derive(Debug, Default)]
pub(super) struct WatcherSet {
    senders: Vec<mpsc::UnboundedSender<MutationRecord>>,
}

impl WatcherSet {
    pub(super) fn subscribe(&mut self) -> MutationWatch {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        MutationWatch::new(rx)
    }

    pub(super) fn notify(&mut self, record: MutationRecord) {
        self.senders.retain(|tx| tx.send(record.clone()).is_ok());
    }

    pub(super) fn len(&self) -> usize {
        self.senders.iter().filter(|tx| !tx.is_closed()).count()
    }
}
