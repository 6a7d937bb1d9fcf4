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

use byteorder::{ByteOrder, LittleEndian};
use log::{trace, warn};

use crate::{
    parser::{
        ByteCursor, ChunkTreeBuilder, Error, Field, FieldValue, Grammar, Overrun, ParseTree,
    },
    BlockLabel,
};

/// Display name for blocks whose label is absent from the grammar table.
///
/// Unrecognized labels are expected in this format family and never fail the
/// parse; the block becomes a chunk with this name spanning exactly its
/// declared size.
pub const UNKNOWN_BLOCK: &str = "Unknown";

/// Recursion depth limit applied by [`BlockParser::new`].
const DEFAULT_DEPTH_LIMIT: usize = 64;

/// The block decoding engine: a cursor over the blob plus the chunk tree
/// being built from it.
///
/// Format code drives the engine in two ways. Header decoders and block
/// handlers read primitive fields through the `read_*` methods, which record
/// each consumed range as a [`Field`] on the innermost open chunk. Framing is
/// delegated to [`decode_block`](Self::decode_block) and its sequence
/// variants, which handle label resolution, handler dispatch, bounded
/// recursion, and resynchronization to each block's declared end.
///
/// The declared size in a block's header is treated as the authoritative
/// framing contract: whatever a handler actually consumes, the cursor lands
/// on the declared end before the next sibling is considered. Handlers may
/// therefore decode only the fields they understand and leave reserved or
/// not-yet-understood trailing bytes to the engine.
pub struct BlockParser<'a> {
    cursor: ByteCursor<'a>,
    tree: ChunkTreeBuilder<'a>,
    depth: usize,
    depth_limit: usize,
}

impl<'a> BlockParser<'a> {
    /// Create a parser over `blob`, positioned at `start`, with the default
    /// recursion depth limit.
    pub fn new(blob: &'a [u8], start: usize) -> Self {
        Self::with_depth_limit(blob, start, DEFAULT_DEPTH_LIMIT)
    }

    /// Create a parser with an explicit recursion depth limit.
    ///
    /// Block nesting beyond the limit fails the parse with
    /// [`Error::MaxDepthExceeded`].
    pub fn with_depth_limit(blob: &'a [u8], start: usize, depth_limit: usize) -> Self {
        Self {
            cursor: ByteCursor::new(blob, start),
            tree: ChunkTreeBuilder::new(),
            depth: 0,
            depth_limit,
        }
    }

    /// Current absolute read offset.
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Number of bytes between the current position and the end of the
    /// blob.
    pub fn bytes_remaining(&self) -> usize {
        self.cursor.bytes_remaining()
    }

    /// Open a chunk at the current position.
    pub fn start_chunk(&mut self, kind: &'static str, label: impl Into<String>) {
        self.tree.start_chunk(kind, label, self.cursor.position());
    }

    /// Close the innermost open chunk at the current position.
    ///
    /// Must be called only after all of the chunk's reads, skips, and
    /// recursions have completed, since this is the one place its end offset
    /// is fixed.
    pub fn end_chunk(&mut self) {
        self.tree.end_chunk(self.cursor.position());
    }

    /// Read a 32-bit unsigned integer in byte order `E` and record it as a
    /// field named `name`.
    pub fn read_u32<E: ByteOrder>(&mut self, name: &'static str) -> Result<u32, Error> {
        let start = self.cursor.position();
        let value = self.cursor.read_u32::<E>()?;
        self.record(name, FieldValue::U32(value), start);
        Ok(value)
    }

    /// Little-endian shorthand for [`read_u32`](Self::read_u32).
    pub fn read_le32(&mut self, name: &'static str) -> Result<u32, Error> {
        self.read_u32::<LittleEndian>(name)
    }

    /// Read an IEEE-754 single-precision float in byte order `E` and record
    /// it as a field named `name`.
    pub fn read_f32<E: ByteOrder>(&mut self, name: &'static str) -> Result<f32, Error> {
        let start = self.cursor.position();
        let value = self.cursor.read_f32::<E>()?;
        self.record(name, FieldValue::F32(value), start);
        Ok(value)
    }

    /// Little-endian shorthand for [`read_f32`](Self::read_f32).
    pub fn read_f32_le(&mut self, name: &'static str) -> Result<f32, Error> {
        self.read_f32::<LittleEndian>(name)
    }

    /// Read exactly `len` raw bytes and record them as a field named
    /// `name`.
    pub fn read_bytes(&mut self, name: &'static str, len: usize) -> Result<&'a [u8], Error> {
        let start = self.cursor.position();
        let bytes = self.cursor.read_bytes(len)?;
        self.record(name, FieldValue::Bytes(bytes), start);
        Ok(bytes)
    }

    /// Read up to (and consume) `delimiter`, recording the bytes before it
    /// as a field named `name`.
    pub fn read_until(&mut self, name: &'static str, delimiter: u8) -> Result<&'a [u8], Error> {
        let start = self.cursor.position();
        let bytes = self.cursor.read_until(delimiter)?;
        self.record(name, FieldValue::Bytes(bytes), start);
        Ok(bytes)
    }

    /// Skip `count` bytes without reading them.
    ///
    /// Skipped bytes remain attributed to the innermost open chunk but are
    /// not recorded as a field.
    pub fn skip(&mut self, count: usize) -> Result<(), Error> {
        self.cursor.skip(count)
    }

    /// Read a 32-bit little-endian integer at an absolute offset without
    /// moving the cursor.
    pub fn peek_le32_at(&self, offset: usize) -> Result<u32, Error> {
        self.cursor.peek_u32_at::<LittleEndian>(offset)
    }

    fn record(&mut self, name: &'static str, value: FieldValue<'a>, start: usize) {
        self.tree.add_field(Field {
            name,
            value,
            start,
            end: self.cursor.position(),
        });
    }

    /// Decode one block at the current position.
    ///
    /// Peeks the `label` and `size` header words, opens a chunk named from
    /// the grammar's descriptor table (or [`UNKNOWN_BLOCK`]), re-reads the
    /// header words as visible fields, dispatches to the label's handler
    /// (or skips the declared remainder for unknown labels), and finally
    /// resynchronizes the cursor to the block's declared end.
    ///
    /// The peek must not move the cursor: the chunk's start offset is the
    /// label field's own start offset.
    pub fn decode_block(&mut self, grammar: &Grammar) -> Result<(), Error> {
        if self.depth >= self.depth_limit {
            return Err(Error::MaxDepthExceeded {
                offset: self.cursor.position(),
                limit: self.depth_limit,
            });
        }

        let header_start = self.cursor.position();
        let label = BlockLabel(self.peek_le32_at(header_start)?);
        let size = self.peek_le32_at(header_start + 4)?;

        // The declared size counts from the start of the label field, header
        // included. A block can never end before its own header, so the
        // resync target is floored at the header end; otherwise a hostile
        // size could rewind the cursor and stall the sequence loop.
        let block_end = header_start + size as usize;
        let resync_to = block_end.max(header_start + 8);

        let descriptor = grammar.descriptor(label);
        let name = descriptor.map_or(UNKNOWN_BLOCK, |d| d.name);
        trace!("block {label} ({name}) at offset {header_start}, declared end {block_end}");

        self.start_chunk(grammar.block_kind(), name);
        self.read_le32("label")?;
        self.read_le32("size")?;

        self.depth += 1;
        let decoded = match descriptor {
            Some(descriptor) => (descriptor.handler)(self, grammar, block_end),
            None => self.skip_to(resync_to),
        };
        self.depth -= 1;
        decoded?;

        // Containment: short consumption skips forward to the declared end;
        // consumption past it rewinds and flags the chunk. Either way the
        // next sibling starts exactly where this block's framing said.
        if self.cursor.position() < resync_to {
            self.skip_to(resync_to)?;
        }
        let consumed_to = self.cursor.position();
        if consumed_to > block_end {
            warn!(
                "block {label} ({name}) consumed to {consumed_to}, past its declared end {block_end}"
            );
            self.tree.mark_overrun(
                Overrun {
                    declared_end: block_end,
                    consumed_to,
                },
                resync_to,
            );
            self.cursor.rewind_to(resync_to);
        }

        self.end_chunk();
        Ok(())
    }

    /// Decode sibling blocks until fewer than a header's worth of bytes
    /// remains before `outer_end`.
    ///
    /// The `> 8` guard deliberately tolerates small trailing padding that
    /// could not hold another block header; the engine's resync for the
    /// enclosing block accounts for those bytes.
    pub fn decode_block_sequence(&mut self, grammar: &Grammar, outer_end: usize) -> Result<(), Error> {
        while outer_end.saturating_sub(self.cursor.position()) > 8 {
            self.decode_block(grammar)?;
        }
        Ok(())
    }

    /// Decode top-level blocks until the blob cannot hold another block
    /// header.
    pub fn decode_blocks_to_end(&mut self, grammar: &Grammar) -> Result<(), Error> {
        while self.cursor.bytes_remaining() >= 8 {
            self.decode_block(grammar)?;
        }
        Ok(())
    }

    /// Finish the parse, producing the chunk tree.
    ///
    /// `error` is the fatal error that stopped the parse, if any; chunks
    /// left open by the unwind are sealed at the current position so the
    /// partial tree remains well-formed.
    pub fn into_tree(self, error: Option<Error>) -> ParseTree<'a> {
        let pos = self.cursor.position();
        self.tree.finish(pos, error)
    }

    fn skip_to(&mut self, offset: usize) -> Result<(), Error> {
        self.cursor.skip(offset - self.cursor.position())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use pretty_assertions_sorted::assert_eq;

    use crate::{
        parser::{BlockDescriptor, BlockParser, Error, FieldValue, Grammar, Overrun},
        BlockLabel,
    };

    const VALUE: BlockLabel = BlockLabel(0x0a);
    const GROUP: BlockLabel = BlockLabel(0x0b);
    const GREEDY: BlockLabel = BlockLabel(0x0c);

    fn value(p: &mut BlockParser<'_>, _g: &Grammar, _end: usize) -> Result<(), Error> {
        p.read_le32("value")?;
        Ok(())
    }

    fn group(p: &mut BlockParser<'_>, g: &Grammar, end: usize) -> Result<(), Error> {
        p.read_le32("child_count")?;
        p.decode_block_sequence(g, end)
    }

    // Reads two words regardless of the block's declared size.
    fn greedy(p: &mut BlockParser<'_>, _g: &Grammar, _end: usize) -> Result<(), Error> {
        p.read_le32("a")?;
        p.read_le32("b")?;
        Ok(())
    }

    fn grammar() -> Grammar {
        Grammar::new(
            "test_block",
            [
                (
                    VALUE,
                    BlockDescriptor {
                        name: "Value",
                        handler: value,
                    },
                ),
                (
                    GROUP,
                    BlockDescriptor {
                        name: "Group",
                        handler: group,
                    },
                ),
                (
                    GREEDY,
                    BlockDescriptor {
                        name: "Greedy",
                        handler: greedy,
                    },
                ),
            ],
        )
    }

    fn block(label: BlockLabel, declared: u32, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + body.len());
        out.extend_from_slice(&label.0.to_le_bytes());
        out.extend_from_slice(&declared.to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    // Declared size covering exactly the header plus the body.
    fn sized_block(label: BlockLabel, body: &[u8]) -> Vec<u8> {
        let declared = u32::try_from(8 + body.len()).unwrap();
        block(label, declared, body)
    }

    fn parse(blob: &[u8]) -> crate::parser::ParseTree<'_> {
        let grammar = grammar();
        let mut p = BlockParser::new(blob, 0);
        let result = p.decode_blocks_to_end(&grammar);
        p.into_tree(result.err())
    }

    #[test]
    fn header_words_become_fields() {
        let blob = sized_block(VALUE, &7u32.to_le_bytes());
        let tree = parse(&blob);

        assert!(tree.is_complete());
        let chunk = &tree.chunks[0];
        assert_eq!(chunk.label, "Value");
        assert_eq!(chunk.start..chunk.end, 0..12);

        let names: Vec<&str> = chunk.fields.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["label", "size", "value"]);
        assert_eq!(chunk.fields[0].value, FieldValue::U32(VALUE.0));
        assert_eq!(chunk.fields[0].start..chunk.fields[0].end, 0..4);
        assert_eq!(chunk.fields[1].value, FieldValue::U32(12));
        assert_eq!(chunk.fields[2].value, FieldValue::U32(7));
    }

    #[test]
    fn under_consumption_resyncs_to_declared_end() {
        // Declared size leaves 8 trailing bytes the handler never touches.
        let mut body = 7u32.to_le_bytes().to_vec();
        body.extend_from_slice(&[0xee; 8]);
        let mut blob = sized_block(VALUE, &body);
        blob.extend_from_slice(&sized_block(VALUE, &9u32.to_le_bytes()));

        let tree = parse(&blob);
        assert!(tree.is_complete());
        assert_eq!(tree.chunks.len(), 2);
        assert_eq!(tree.chunks[0].start..tree.chunks[0].end, 0..20);
        assert_eq!(tree.chunks[0].overrun, None);
        assert_eq!(tree.chunks[1].start..tree.chunks[1].end, 20..32);
    }

    #[test]
    fn over_consumption_is_flagged_and_contained() {
        // Greedy reads 8 body bytes but the block declares only 4.
        let mut blob = block(GREEDY, 12, &1u32.to_le_bytes());
        blob.extend_from_slice(&sized_block(VALUE, &2u32.to_le_bytes()));

        let tree = parse(&blob);
        assert!(tree.is_complete());
        assert_eq!(tree.chunks.len(), 2);

        let greedy = &tree.chunks[0];
        assert_eq!(greedy.start..greedy.end, 0..12);
        assert_eq!(
            greedy.overrun,
            Some(Overrun {
                declared_end: 12,
                consumed_to: 16,
            })
        );

        // The sibling starts exactly at the declared end and is unaffected.
        let sibling = &tree.chunks[1];
        assert_eq!(sibling.label, "Value");
        assert_eq!(sibling.start..sibling.end, 12..24);
        assert_eq!(sibling.fields[2].value, FieldValue::U32(2));
    }

    #[test]
    fn overrun_children_are_clamped() {
        // A group declaring 24 bytes whose child block claims 16: the child
        // extends four bytes past the group's declared end.
        let child = block(VALUE, 16, &[0xaa; 8]);
        let mut body = 1u32.to_le_bytes().to_vec();
        body.extend_from_slice(&child);
        let blob = block(GROUP, 24, &body);

        let tree = parse(&blob);
        assert!(tree.is_complete());

        let group = &tree.chunks[0];
        assert_eq!(group.start..group.end, 0..24);
        assert_eq!(
            group.overrun,
            Some(Overrun {
                declared_end: 24,
                consumed_to: 28,
            })
        );

        // The child's recorded range is clamped to the group's end.
        assert_eq!(group.children.len(), 1);
        assert_eq!(group.children[0].start..group.children[0].end, 12..24);
    }

    #[test]
    fn unknown_label_spans_declared_size() {
        let mut blob = sized_block(BlockLabel(0x7777), &[0x55; 12]);
        blob.extend_from_slice(&sized_block(VALUE, &4u32.to_le_bytes()));

        let tree = parse(&blob);
        assert!(tree.is_complete());
        assert_eq!(tree.chunks.len(), 2);

        let unknown = &tree.chunks[0];
        assert_eq!(unknown.label, "Unknown");
        assert_eq!(unknown.start..unknown.end, 0..20);
        assert!(unknown.children.is_empty());

        assert_eq!(tree.chunks[1].label, "Value");
    }

    #[test]
    fn truncated_block_fails_at_its_own_offset() {
        let mut blob = sized_block(VALUE, &1u32.to_le_bytes());
        // Claims 64 bytes; the blob ends long before that.
        blob.extend_from_slice(&block(BlockLabel(0x7777), 64, &[0u8; 4]));

        let grammar = grammar();
        let mut p = BlockParser::new(&blob, 0);
        let result = p.decode_blocks_to_end(&grammar);
        assert_eq!(
            result.unwrap_err(),
            Error::InvalidSkip {
                offset: 20,
                count: 56,
            }
        );

        // The partial tree still holds the first block, and the failed one
        // is sealed where the parse stopped.
        let tree = p.into_tree(result.err());
        assert!(!tree.is_complete());
        assert_eq!(tree.chunks.len(), 2);
        assert_eq!(tree.chunks[0].label, "Value");
        assert_eq!(tree.chunks[0].start..tree.chunks[0].end, 0..12);
    }

    #[test]
    fn declared_size_below_header_still_advances() {
        // Two back-to-back blocks whose declared size is zero: the resync
        // floor pins each to its header, so both decode as siblings.
        let mut blob = block(BlockLabel(0x7777), 0, &[]);
        blob.extend_from_slice(&block(BlockLabel(0x8888), 0, &[]));

        let tree = parse(&blob);
        assert!(tree.is_complete());
        assert_eq!(tree.chunks.len(), 2);
        assert_eq!(tree.chunks[0].start..tree.chunks[0].end, 0..8);
        assert_eq!(tree.chunks[1].start..tree.chunks[1].end, 8..16);
        assert!(tree.chunks[0].overrun.is_some());
    }

    #[test]
    fn trailing_padding_is_not_a_block() {
        // Group body: count word, one child, then 8 bytes of padding that
        // must not be misread as another header.
        let mut body = 1u32.to_le_bytes().to_vec();
        body.extend_from_slice(&sized_block(VALUE, &5u32.to_le_bytes()));
        body.extend_from_slice(&[0xff; 8]);
        let blob = sized_block(GROUP, &body);

        let tree = parse(&blob);
        assert!(tree.is_complete());

        let group = &tree.chunks[0];
        assert_eq!(group.children.len(), 1);
        assert_eq!(group.overrun, None);
        assert_eq!(group.end, blob.len());
    }

    #[test]
    fn depth_limit_fails_closed() {
        let leaf = sized_block(VALUE, &1u32.to_le_bytes());
        let mut inner_body = 1u32.to_le_bytes().to_vec();
        inner_body.extend_from_slice(&leaf);
        let inner = sized_block(GROUP, &inner_body);
        let mut outer_body = 1u32.to_le_bytes().to_vec();
        outer_body.extend_from_slice(&inner);
        let blob = sized_block(GROUP, &outer_body);

        let grammar = grammar();

        // Three levels decode fine with the default limit.
        let mut p = BlockParser::new(&blob, 0);
        assert!(p.decode_blocks_to_end(&grammar).is_ok());

        // A limit of two rejects the leaf.
        let mut p = BlockParser::with_depth_limit(&blob, 0, 2);
        assert_eq!(
            p.decode_blocks_to_end(&grammar).unwrap_err(),
            Error::MaxDepthExceeded {
                offset: 24,
                limit: 2,
            }
        );
    }

    #[test]
    fn chunk_ranges_never_partially_overlap() {
        fn check(chunks: &[crate::parser::Chunk<'_>]) {
            for (i, a) in chunks.iter().enumerate() {
                assert!(a.start <= a.end);
                for b in chunks.iter().skip(i + 1) {
                    assert!(a.end <= b.start || b.end <= a.start, "siblings overlap");
                }
                for child in &a.children {
                    assert!(child.start >= a.start && child.end <= a.end);
                }
                check(&a.children);
            }
        }

        // A mix of clean, unknown, and overrunning blocks.
        let mut blob = block(GREEDY, 12, &1u32.to_le_bytes());
        blob.extend_from_slice(&sized_block(BlockLabel(0x7777), &[0xab; 4]));
        let mut body = 2u32.to_le_bytes().to_vec();
        body.extend_from_slice(&sized_block(VALUE, &6u32.to_le_bytes()));
        blob.extend_from_slice(&sized_block(GROUP, &body));

        let tree = parse(&blob);
        assert!(tree.is_complete());
        check(&tree.chunks);
    }

    #[test]
    fn reparse_is_idempotent() {
        let mut body = 2u32.to_le_bytes().to_vec();
        body.extend_from_slice(&sized_block(VALUE, &1u32.to_le_bytes()));
        body.extend_from_slice(&sized_block(BlockLabel(0x9999), &[0x11; 4]));
        let blob = sized_block(GROUP, &body);

        assert_eq!(parse(&blob), parse(&blob));
    }
}
