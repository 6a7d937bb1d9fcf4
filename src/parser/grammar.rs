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

use std::collections::HashMap;

use crate::{
    parser::{BlockParser, Error},
    BlockLabel,
};

/// A block-body decoding routine.
///
/// Invoked with the header already consumed. The routine reads the fields it
/// understands through the parser, may recurse into child blocks via
/// [`BlockParser::decode_block_sequence`], and must treat `block_end` (the
/// third argument) as a hard ceiling. It need not consume the whole body:
/// the engine resynchronizes the cursor to the declared end afterward.
pub type BlockHandler = for<'a> fn(&mut BlockParser<'a>, &Grammar, usize) -> Result<(), Error>;

/// What a grammar knows about one block label.
///
/// Name resolution and handler dispatch are keyed by the same descriptor so
/// the two can never disagree about a label.
#[derive(Clone, Copy, Debug)]
pub struct BlockDescriptor {
    /// Display name for chunks decoded under this label.
    pub name: &'static str,

    /// Body decoding routine.
    pub handler: BlockHandler,
}

/// One format's block vocabulary: a chunk kind tag plus the label table.
///
/// Grammars are plain values passed into the engine, so several formats can
/// coexist in one process and be tested independently.
#[derive(Debug)]
pub struct Grammar {
    block_kind: &'static str,
    blocks: HashMap<BlockLabel, BlockDescriptor>,
}

impl Grammar {
    /// Create a grammar from a chunk kind tag and `(label, descriptor)`
    /// pairs.
    pub fn new(
        block_kind: &'static str,
        blocks: impl IntoIterator<Item = (BlockLabel, BlockDescriptor)>,
    ) -> Self {
        Self {
            block_kind,
            blocks: blocks.into_iter().collect(),
        }
    }

    /// Kind tag stamped on every block chunk decoded under this grammar.
    pub fn block_kind(&self) -> &'static str {
        self.block_kind
    }

    /// Descriptor for `label`, if the grammar knows it.
    pub fn descriptor(&self, label: BlockLabel) -> Option<&BlockDescriptor> {
        self.blocks.get(&label)
    }
}
