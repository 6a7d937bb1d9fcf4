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

//! The generic block decoding engine.
//!
//! This module is format-agnostic: it provides the pieces a format module
//! assembles into a decoder.
//!
//! # Layers
//!
//! [`ByteCursor`] is the bottom layer: a read cursor over a blob with
//! bounds-checked fixed-width, raw-byte, and delimiter-terminated reads.
//! It knows nothing about chunks.
//!
//! [`ChunkTreeBuilder`] receives start/end chunk events and builds the
//! nested, byte-accurate [`ParseTree`] a visualization host consumes.
//!
//! [`BlockParser`] combines the two and adds block framing: it reads a
//! block's `label`/`size` header, dispatches to the [`Grammar`]'s handler
//! for that label, recurses into sub-blocks with a hard ceiling at the
//! block's declared end, and resynchronizes the cursor to that end no
//! matter what the handler consumed.
//!
//! # Example
//!
//! ```
//! use chunkscope::{
//!     parser::{BlockDescriptor, BlockParser, Error, Grammar},
//!     BlockLabel,
//! };
//!
//! fn point(p: &mut BlockParser<'_>, _g: &Grammar, _end: usize) -> Result<(), Error> {
//!     p.read_f32_le("x")?;
//!     p.read_f32_le("y")?;
//!     Ok(())
//! }
//!
//! let grammar = Grammar::new(
//!     "demo_block",
//!     [(BlockLabel(0x01), BlockDescriptor { name: "Point", handler: point })],
//! );
//!
//! let mut blob = vec![];
//! blob.extend_from_slice(&1u32.to_le_bytes()); // label
//! blob.extend_from_slice(&16u32.to_le_bytes()); // size, header included
//! blob.extend_from_slice(&1.0f32.to_le_bytes());
//! blob.extend_from_slice(&2.0f32.to_le_bytes());
//!
//! let mut p = BlockParser::new(&blob, 0);
//! let result = p.decode_blocks_to_end(&grammar);
//! let tree = p.into_tree(result.err());
//!
//! assert!(tree.is_complete());
//! assert_eq!(tree.chunks[0].label, "Point");
//! ```

mod chunk;
mod cursor;
mod engine;
mod error;
mod grammar;

pub use chunk::{Chunk, ChunkTreeBuilder, Field, FieldValue, ParseTree};
pub use cursor::ByteCursor;
pub use engine::{BlockParser, UNKNOWN_BLOCK};
pub use error::{Error, Overrun};
pub use grammar::{BlockDescriptor, BlockHandler, Grammar};
