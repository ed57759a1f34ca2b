use shared::protocol::DocumentRecord;

/// Client-side mirror of the documents the server holds for the session.
///
/// The sequence changes only in response to a server-confirmed event: a
/// listing replaces it, a confirmed upload appends, a confirmed deletion
/// removes. It never runs ahead of the server, so a partial upload (2 of
/// 5 files indexed) shows up exactly as reported.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    records: Vec<DocumentRecord>,
}

impl DocumentRegistry {
    /// Replaces the whole sequence with the server's authoritative listing.
    pub fn replace_all(&mut self, records: Vec<DocumentRecord>) {
        self.records = records;
    }

    /// Appends server-confirmed records after the existing entries, in the
    /// order the server returned them. No deduplication: the server owns
    /// document identity, the client mirrors it.
    pub fn append(&mut self, records: impl IntoIterator<Item = DocumentRecord>) {
        self.records.extend(records);
    }

    /// Removes the first entry with the given filename, if any.
    pub fn remove_first(&mut self, filename: &str) -> Option<DocumentRecord> {
        let index = self.records.iter().position(|r| r.filename == filename)?;
        Some(self.records.remove(index))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn snapshot(&self) -> Vec<DocumentRecord> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
