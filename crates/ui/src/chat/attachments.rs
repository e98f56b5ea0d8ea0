use crate::chat::message::Attachment;

/// Ordered pending attachments.
///
/// Entries are identified by ingestion, not content: the same image ingested twice
/// occupies two slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentStore {
    entries: Vec<Attachment>,
}

impl AttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[Attachment] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.entries.iter()
    }

    /// Appends a whole batch at the tail, keeping its order.
    pub fn append(&mut self, batch: impl IntoIterator<Item = Attachment>) {
        self.entries.extend(batch);
    }

    /// Removes the entry at `index`, shifting later entries down.
    ///
    /// Out-of-range indices are ignored; a removal click can race a concurrent append.
    pub fn remove(&mut self, index: usize) -> Option<Attachment> {
        if index >= self.entries.len() {
            tracing::debug!(index, len = self.entries.len(), "ignoring out-of-range attachment removal");
            return None;
        }

        Some(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Payload strings in store order.
    pub fn data_uris(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.data.clone()).collect()
    }

    pub fn take_all(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.entries)
    }
}
