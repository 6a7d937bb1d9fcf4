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

/// Fatal parse failures.
///
/// Each variant carries the absolute blob offset at which the condition was
/// detected. These conditions make further framing impossible, so they abort
/// the parse; the partially built tree remains available via
/// [`ParseTree`](crate::parser::ParseTree) with the error attached.
///
/// An unrecognized block label is deliberately *not* an error: it produces an
/// `"Unknown"`-tagged chunk and a size-driven skip. A handler that consumes
/// past its block's declared end is recorded as an [`Overrun`] on the chunk
/// rather than failing the parse.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// A fixed-width or declared-length read would run past the end of the
    /// blob.
    #[error("read of {needed} bytes at offset {offset} runs past the end of the blob")]
    TruncatedRead {
        /// Offset the read started at.
        offset: usize,
        /// Number of bytes the read asked for.
        needed: usize,
    },

    /// A delimiter-terminated read reached the end of the blob without
    /// finding its terminator.
    #[error("delimiter {delimiter:#04x} not found between offset {offset} and the end of the blob")]
    DelimiterNotFound {
        /// Offset the search started at.
        offset: usize,
        /// The byte that was being searched for.
        delimiter: u8,
    },

    /// A skip target lies past the end of the blob.
    #[error("skip of {count} bytes at offset {offset} lands outside the blob")]
    InvalidSkip {
        /// Offset the skip started at.
        offset: usize,
        /// Number of bytes the skip asked for.
        count: usize,
    },

    /// Block nesting exceeded the configured recursion limit.
    ///
    /// Genuine files nest shallowly; hitting this limit means the input is
    /// hostile or corrupt, and the parse fails closed instead of risking
    /// stack exhaustion.
    #[error("block nesting exceeded {limit} levels at offset {offset}")]
    MaxDepthExceeded {
        /// Offset of the block header that would have exceeded the limit.
        offset: usize,
        /// The configured limit.
        limit: usize,
    },
}

impl Error {
    /// Absolute blob offset at which the failure was detected.
    pub fn offset(&self) -> usize {
        match *self {
            Self::TruncatedRead { offset, .. }
            | Self::DelimiterNotFound { offset, .. }
            | Self::InvalidSkip { offset, .. }
            | Self::MaxDepthExceeded { offset, .. } => offset,
        }
    }
}

/// Record of a block handler consuming past the block's declared end.
///
/// The declared size is the framing contract between siblings, so the engine
/// rewinds the cursor to the declared end and continues; this record is
/// attached to the offending chunk so the condition stays visible. It
/// indicates either a corrupt file or a block layout the grammar does not
/// fully understand yet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Overrun {
    /// The block's declared end offset.
    pub declared_end: usize,
    /// The offset the handler had actually consumed to.
    pub consumed_to: usize,
}
