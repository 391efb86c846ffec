//! Bookmarks
//!
//! A [`Bookmark`] is an opaque 8-byte value naming one row of a cursor. The
//! [`BookmarkManager`] mints them from a per-cursor sequence, so a bookmark is
//! never handed out twice while the cursor lives, even after the row it named
//! has been deleted and its bookmark retired.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use indexmap::IndexMap;

use crate::constants::BOOKMARK_LEN;
use crate::row_buffer::SlotId;

/// Opaque, equality-comparable row identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bookmark(Bytes);

impl Bookmark {
    fn from_sequence(seq: u64) -> Self {
        Bookmark(Bytes::copy_from_slice(&seq.to_be_bytes()))
    }

    /// Rebuild a bookmark from bytes previously returned by [`as_bytes`]
    ///
    /// [`as_bytes`]: Bookmark::as_bytes
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Bookmark(bytes.into())
    }

    /// Raw bookmark bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Bookmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Mints, resolves and retires bookmarks for one cursor
#[derive(Debug, Default)]
pub struct BookmarkManager {
    next: u64,
    live: IndexMap<Bookmark, SlotId>,
    by_slot: HashMap<SlotId, Bookmark>,
    /// Bookmarks of deleted rows; they name a position but no live row
    retired: HashMap<Bookmark, SlotId>,
}

impl BookmarkManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Bookmark for a slot, minting one on first request
    pub fn mint(&mut self, slot: SlotId) -> Bookmark {
        if let Some(existing) = self.by_slot.get(&slot) {
            return existing.clone();
        }
        self.next += 1;
        let bookmark = Bookmark::from_sequence(self.next);
        tracing::trace!(bookmark = %bookmark, slot = slot.index(), "minted bookmark");
        self.live.insert(bookmark.clone(), slot);
        self.by_slot.insert(slot, bookmark.clone());
        bookmark
    }

    /// Bookmark already minted for a slot
    pub fn get(&self, slot: SlotId) -> Option<&Bookmark> {
        self.by_slot.get(&slot)
    }

    /// Slot named by a live bookmark
    pub fn resolve(&self, bookmark: &Bookmark) -> Option<SlotId> {
        if bookmark.as_bytes().len() != BOOKMARK_LEN {
            return None;
        }
        self.live.get(bookmark).copied()
    }

    /// Slot named by a live or retired bookmark
    pub fn locate(&self, bookmark: &Bookmark) -> Option<SlotId> {
        self.resolve(bookmark)
            .or_else(|| self.retired.get(bookmark).copied())
    }

    /// Retire the bookmark of a deleted slot
    pub fn retire(&mut self, slot: SlotId) -> Option<Bookmark> {
        let bookmark = self.by_slot.remove(&slot)?;
        self.live.shift_remove(&bookmark);
        self.retired.insert(bookmark.clone(), slot);
        tracing::trace!(bookmark = %bookmark, "retired bookmark");
        Some(bookmark)
    }

    /// Forget every slot mapping, keeping the sequence
    pub fn forget_all(&mut self) {
        self.live.clear();
        self.by_slot.clear();
        self.retired.clear();
    }

    /// Number of live bookmarks
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no bookmark is live
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
