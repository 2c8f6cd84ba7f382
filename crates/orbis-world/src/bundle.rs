use bytes::Bytes;
use orbis_types::ContentId;

/// A fully fetched content bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateBundle {
    pub id: ContentId,
    /// Entry name inside the architecture directory.
    pub name: String,
    pub bytes: Bytes,
}

impl TemplateBundle {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
