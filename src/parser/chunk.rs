// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

use std::fmt::{Debug, Formatter};

use crate::{
    debug::DebugByteSlice,
    parser::{Error, Overrun},
};

/// A primitive decode result, attributed to the chunk that was open when it
/// was read.
///
/// Byte values borrow from the blob (zero-copy), so field values have the
/// same lifetime as the input.
#[derive(Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// A 32-bit unsigned integer.
    U32(u32),

    /// An IEEE-754 single-precision float.
    F32(f32),

    /// A raw byte run, either fixed-length or delimiter-terminated.
    Bytes(&'a [u8]),
}

impl<'a> Debug for FieldValue<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Self::U32(value) => write!(f, "{value}"),
            Self::F32(value) => write!(f, "{value}"),
            Self::Bytes(bytes) => DebugByteSlice(bytes).fmt(f),
        }
    }
}

/// A named primitive field covering `[start, end)` of the blob.
///
/// Fields are leaves: they carry no children of their own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Field<'a> {
    /// Field name from the format grammar.
    pub name: &'static str,

    /// Decoded value.
    pub value: FieldValue<'a>,

    /// Absolute offset of the field's first byte.
    pub start: usize,

    /// Absolute offset one past the field's last byte.
    pub end: usize,
}

/// A decoded region of the blob: a block, a record-array element, or a
/// format header, together with the fields read from it and any nested
/// chunks.
///
/// Chunk ranges nest properly: a child's byte range is fully contained in
/// its parent's, and sibling ranges never overlap.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk<'a> {
    /// Format-specific kind tag (e.g. `"bes_block"`).
    pub kind: &'static str,

    /// Human-readable label, resolved from the grammar or synthesized for
    /// array elements.
    pub label: String,

    /// Absolute offset of the chunk's first byte.
    pub start: usize,

    /// Absolute offset one past the chunk's last byte.
    pub end: usize,

    /// Primitive fields read while this chunk was the innermost open one.
    pub fields: Vec<Field<'a>>,

    /// Nested chunks, in decode order.
    pub children: Vec<Chunk<'a>>,

    /// Present when this block's handler consumed past the declared end.
    pub overrun: Option<Overrun>,
}

impl<'a> Chunk<'a> {
    /// Whether `offset` falls within this chunk's byte range.
    pub fn contains(&self, offset: usize) -> bool {
        (self.start..self.end).contains(&offset)
    }

    /// The innermost chunk (possibly `self`) whose byte range contains
    /// `offset`.
    pub fn chunk_at(&self, offset: usize) -> Option<&Chunk<'a>> {
        if !self.contains(offset) {
            return None;
        }

        self.children
            .iter()
            .find_map(|child| child.chunk_at(offset))
            .or(Some(self))
    }

    /// Find a descendant chunk by label and verify that exactly one such
    /// descendant exists at each level.
    ///
    /// If `label` contains one or more slash (`/`) characters, it is treated
    /// as a hierarchical path and each segment is resolved against the
    /// previous match's children.
    ///
    /// Will return `None` if no matching chunk is found _or_ if more than
    /// one chunk matches a path segment.
    pub fn find_by_label(&self, label: &str) -> Option<&Chunk<'a>> {
        find_in(&self.children, label)
    }

    /// Clamp this chunk's subtree to end no later than `limit`.
    pub(crate) fn clamp_to(&mut self, limit: usize) {
        self.start = self.start.min(limit);
        self.end = self.end.min(limit);
        for field in &mut self.fields {
            field.start = field.start.min(limit);
            field.end = field.end.min(limit);
        }
        for child in &mut self.children {
            child.clamp_to(limit);
        }
    }
}

fn find_in<'t, 'a>(chunks: &'t [Chunk<'a>], label: &str) -> Option<&'t Chunk<'a>> {
    let (label, suffix) = match label.split_once('/') {
        Some((label, suffix)) => (label, Some(suffix)),
        None => (label, None),
    };

    let mut matching = chunks.iter().filter(|chunk| chunk.label == label);
    let first = matching.next()?;
    if matching.next().is_some() {
        return None;
    }

    match suffix {
        Some(suffix) => find_in(&first.children, suffix),
        None => Some(first),
    }
}

/// Incremental chunk tree construction from start/end events.
///
/// The builder enforces the push/pop discipline: a chunk's end offset is
/// fixed exactly once, when the matching [`end_chunk`](Self::end_chunk)
/// closes it, and chunks close in the reverse order of opening. Breaking
/// that discipline is a caller bug and panics rather than surfacing as a
/// parse error.
#[derive(Debug, Default)]
pub struct ChunkTreeBuilder<'a> {
    roots: Vec<Chunk<'a>>,
    open: Vec<Chunk<'a>>,
}

impl<'a> ChunkTreeBuilder<'a> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a chunk starting at `offset` as a child of the innermost open
    /// chunk (or as a root if none is open).
    pub fn start_chunk(&mut self, kind: &'static str, label: impl Into<String>, offset: usize) {
        self.open.push(Chunk {
            kind,
            label: label.into(),
            start: offset,
            end: offset,
            fields: Vec::new(),
            children: Vec::new(),
            overrun: None,
        });
    }

    /// Record a field on the innermost open chunk.
    pub fn add_field(&mut self, field: Field<'a>) {
        if let Some(chunk) = self.open.last_mut() {
            chunk.fields.push(field);
        } else {
            unreachable!("field {:?} recorded with no open chunk", field.name);
        }
    }

    /// Close the innermost open chunk, fixing its end offset at `offset`.
    pub fn end_chunk(&mut self, offset: usize) {
        if let Some(mut chunk) = self.open.pop() {
            assert!(
                offset >= chunk.start,
                "chunk {:?} closed at {offset}, before its start {}",
                chunk.label,
                chunk.start
            );
            chunk.end = offset;
            match self.open.last_mut() {
                Some(parent) => parent.children.push(chunk),
                None => self.roots.push(chunk),
            }
        } else {
            unreachable!("end_chunk with no open chunk");
        }
    }

    /// Flag the innermost open chunk as having overrun its declared end,
    /// clamping its recorded fields and children to the resync offset so
    /// that sibling ranges stay disjoint.
    ///
    /// The overrun record retains the offset actually consumed to, so no
    /// information is lost by the clamp.
    pub fn mark_overrun(&mut self, overrun: Overrun, resync_to: usize) {
        if let Some(chunk) = self.open.last_mut() {
            chunk.overrun = Some(overrun);
            chunk.clamp_to(resync_to);
        } else {
            unreachable!("overrun recorded with no open chunk");
        }
    }

    /// Seal any still-open chunks at `offset` and produce the final tree.
    ///
    /// Open chunks remain only when a fatal error unwound the parse; sealing
    /// them keeps the partial tree well-formed for inspection.
    pub fn finish(mut self, offset: usize, error: Option<Error>) -> ParseTree<'a> {
        while !self.open.is_empty() {
            self.end_chunk(offset);
        }

        ParseTree {
            chunks: self.roots,
            error,
        }
    }
}

/// The output of a parse: the root chunks plus the first fatal error, if
/// any.
///
/// A tree with an error attached is the longest valid prefix the engine
/// could establish before the failure — still useful for diagnostics, but
/// not a complete decode of the blob.
#[derive(Debug, PartialEq)]
pub struct ParseTree<'a> {
    /// Root chunks, in decode order.
    pub chunks: Vec<Chunk<'a>>,

    /// The fatal error that stopped the parse, if one occurred.
    pub error: Option<Error>,
}

impl<'a> ParseTree<'a> {
    /// Whether the parse ran to completion.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// The innermost chunk containing `offset`, for visualization
    /// hit-testing.
    pub fn chunk_at(&self, offset: usize) -> Option<&Chunk<'a>> {
        self.chunks.iter().find_map(|chunk| chunk.chunk_at(offset))
    }

    /// Find a chunk by label, starting from the roots.
    ///
    /// Same path semantics as [`Chunk::find_by_label`].
    pub fn find_by_label(&self, label: &str) -> Option<&Chunk<'a>> {
        find_in(&self.chunks, label)
    }
}
