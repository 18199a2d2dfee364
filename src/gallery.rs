//! Session-scoped gallery of finalized clips.
//!
//! The gallery lives for the lifetime of the hosting view; the core only ever
//! prepends finalized items and never deletes (export and deletion belong to
//! the view layer).

/// A finalized encoded clip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipArtifact {
    /// Encoded container bytes.
    pub bytes: Vec<u8>,
    /// Container MIME type.
    pub mime: &'static str,
}

/// One finalized gallery entry. Immutable once created.
#[derive(Clone, Debug)]
pub struct GalleryItem {
    /// Opaque identifier derived from the artifact and its creation time.
    pub id: String,
    /// The playable artifact.
    pub artifact: ClipArtifact,
    /// Creation timestamp in milliseconds.
    pub created_at_ms: u64,
}

impl GalleryItem {
    /// Build an item for a finalized artifact.
    pub fn new(artifact: ClipArtifact, created_at_ms: u64) -> Self {
        let mut seed = artifact.bytes.clone();
        seed.extend_from_slice(&created_at_ms.to_le_bytes());
        let id = format!("{:016x}", xxhash_rust::xxh3::xxh3_64(&seed));
        Self {
            id,
            artifact,
            created_at_ms,
        }
    }

    /// Suggested export filename embedding the creation timestamp.
    pub fn export_filename(&self) -> String {
        format!("ambient-{}.mp4", self.created_at_ms)
    }
}

/// Ordered, newest-first collection of finalized clips.
#[derive(Debug, Default)]
pub struct SessionGallery {
    items: Vec<GalleryItem>,
}

impl SessionGallery {
    /// Create an empty gallery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a newly finalized item.
    pub fn push_front(&mut self, item: GalleryItem) {
        self.items.insert(0, item);
    }

    /// Newest item, if any.
    pub fn front(&self) -> Option<&GalleryItem> {
        self.items.first()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the gallery is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate newest-first.
    pub fn iter(&self) -> impl Iterator<Item = &GalleryItem> {
        self.items.iter()
    }
}
