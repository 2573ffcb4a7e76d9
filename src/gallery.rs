//! Persisted, most-recent-first record of generated and edited images.
//!
//! The whole gallery is serialized as one JSON array under [`GALLERY_KEY`].
//! Every mutation writes the full sequence before it becomes visible, so a
//! failed write leaves the in-memory gallery untouched.

use crate::error::{Result, StudioError};
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};

/// Key the gallery is stored under.
pub const GALLERY_KEY: &str = "ai-image-studio-gallery";

/// How a gallery item was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GalleryKind {
    /// Text-to-image generation.
    #[serde(rename = "generate")]
    Generated,
    /// Instruction edit of an uploaded image.
    #[serde(rename = "edit")]
    Edited,
}

impl std::fmt::Display for GalleryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generated => write!(f, "generate"),
            Self::Edited => write!(f, "edit"),
        }
    }
}

/// A stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    /// Unique within the gallery; larger ids are newer.
    pub id: u64,
    /// How the artifact was produced.
    #[serde(rename = "type")]
    pub kind: GalleryKind,
    /// The image as a data URL.
    #[serde(rename = "imageData")]
    pub artifact: String,
    /// The instruction that produced the image.
    pub prompt: String,
    /// The original image, for edits.
    #[serde(
        rename = "originalImage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_image: Option<String>,
}

/// An item about to be added; the gallery assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGalleryItem {
    /// How the artifact was produced.
    pub kind: GalleryKind,
    /// The image as a data URL.
    pub artifact: String,
    /// The instruction that produced the image.
    pub prompt: String,
    /// The original image, for edits.
    pub source_image: Option<String>,
}

impl NewGalleryItem {
    /// A text-to-image result.
    pub fn generated(artifact: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            kind: GalleryKind::Generated,
            artifact: artifact.into(),
            prompt: prompt.into(),
            source_image: None,
        }
    }

    /// An edit result together with the image it was derived from.
    pub fn edited(
        artifact: impl Into<String>,
        prompt: impl Into<String>,
        source_image: impl Into<String>,
    ) -> Self {
        Self {
            kind: GalleryKind::Edited,
            artifact: artifact.into(),
            prompt: prompt.into(),
            source_image: Some(source_image.into()),
        }
    }
}

/// What the gallery surface shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryView {
    /// Nothing has been generated or edited yet.
    Empty,
    /// Items, newest first.
    Items(Vec<GalleryItem>),
}

/// The gallery and the store it persists to.
pub struct GalleryStore<K> {
    store: K,
    items: Vec<GalleryItem>,
}

impl<K: KeyValueStore> GalleryStore<K> {
    /// Loads the gallery from `store`.
    ///
    /// A missing, unreadable, or malformed blob yields an empty gallery.
    pub fn load(store: K) -> Self {
        let items = match store.read(GALLERY_KEY) {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<GalleryItem>>(&blob) {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!("discarding malformed gallery: {e}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("could not read gallery, starting empty: {e}");
                Vec::new()
            }
        };
        tracing::debug!(items = items.len(), "gallery loaded");
        Self { store, items }
    }

    /// Adds an item at the head of the gallery and persists it.
    pub fn add(&mut self, item: NewGalleryItem) -> Result<GalleryItem> {
        let mut stored = self.add_all(vec![item])?;
        stored
            .pop()
            .ok_or_else(|| StudioError::Storage("gallery insert returned no item".into()))
    }

    /// Adds `items` in order, as if each were passed to [`add`](Self::add),
    /// with a single write.
    ///
    /// The last item ends up at the head. Either every item is persisted and
    /// visible or, on a failed write, none is. Returns the stored items in
    /// input order.
    pub fn add_all(&mut self, items: Vec<NewGalleryItem>) -> Result<Vec<GalleryItem>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut stored = Vec::with_capacity(items.len());
        let mut id = self.next_id()?;
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                id = id.checked_add(1).ok_or_else(id_space_exhausted)?;
            }
            stored.push(GalleryItem {
                id,
                kind: item.kind,
                artifact: item.artifact,
                prompt: item.prompt,
                source_image: item.source_image,
            });
        }

        let mut next = Vec::with_capacity(self.items.len() + stored.len());
        next.extend(stored.iter().rev().cloned());
        next.extend(self.items.iter().cloned());
        self.persist(&next)?;
        self.items = next;

        for item in &stored {
            tracing::info!(id = item.id, kind = %item.kind, "added gallery item");
        }
        Ok(stored)
    }

    /// All items, newest first.
    pub fn list(&self) -> &[GalleryItem] {
        &self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the gallery has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The gallery as the surface should render it.
    pub fn view(&self) -> GalleryView {
        if self.items.is_empty() {
            GalleryView::Empty
        } else {
            GalleryView::Items(self.items.clone())
        }
    }

    /// Looks up an item by id.
    pub fn find_by_id(&self, id: u64) -> Option<&GalleryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Removes the item with `id` if present and persists the result.
    ///
    /// Deleting an unknown id succeeds and leaves the gallery unchanged.
    pub fn delete_by_id(&mut self, id: u64) -> Result<()> {
        let next: Vec<GalleryItem> = self
            .items
            .iter()
            .filter(|item| item.id != id)
            .cloned()
            .collect();
        let removed = next.len() != self.items.len();
        self.persist(&next)?;
        self.items = next;

        if removed {
            tracing::info!(id, "deleted gallery item");
        }
        Ok(())
    }

    fn persist(&self, items: &[GalleryItem]) -> Result<()> {
        let blob = serde_json::to_string(items)?;
        self.store.write(GALLERY_KEY, &blob)
    }

    fn next_id(&self) -> Result<u64> {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        match self.items.iter().map(|item| item.id).max() {
            Some(last) => {
                let after = last.checked_add(1).ok_or_else(id_space_exhausted)?;
                Ok(now.max(after))
            }
            None => Ok(now),
        }
    }
}

fn id_space_exhausted() -> StudioError {
    StudioError::Storage("no gallery ids left above the newest item".into())
}
