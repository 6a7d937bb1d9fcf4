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

use byteorder::ByteOrder;

use crate::parser::Error;

/// A read cursor over an addressable blob.
///
/// The cursor tracks a single absolute byte offset and exposes bounds-checked
/// reads; every failure reports the offset at which it occurred. It knows
/// nothing about chunks or block framing.
///
/// Multi-byte reads take the byte order as a type parameter
/// ([`byteorder::LittleEndian`] in both shipped grammars), so a big-endian
/// format changes a type argument rather than the cursor.
///
/// # Example
///
/// ```
/// use byteorder::LittleEndian;
/// use chunkscope::parser::ByteCursor;
///
/// let blob = [0x2a, 0x00, 0x00, 0x00, 0xff];
/// let mut cursor = ByteCursor::new(&blob, 0);
///
/// assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 42);
/// assert_eq!(cursor.position(), 4);
/// assert_eq!(cursor.bytes_remaining(), 1);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ByteCursor<'a> {
    blob: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor over `blob`, positioned at `start`.
    ///
    /// Everything before `start` is out of scope for this cursor (the blob
    /// may be a window into a larger addressable space). A `start` past the
    /// end of the blob is pinned to the end, leaving zero bytes remaining.
    pub fn new(blob: &'a [u8], start: usize) -> Self {
        Self {
            blob,
            pos: start.min(blob.len()),
        }
    }

    /// Current absolute read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes between the current position and the end of the blob.
    pub fn bytes_remaining(&self) -> usize {
        self.blob.len() - self.pos
    }

    /// The underlying blob.
    pub fn blob(&self) -> &'a [u8] {
        self.blob
    }

    /// Read a 32-bit unsigned integer in byte order `E`, advancing four
    /// bytes.
    pub fn read_u32<E: ByteOrder>(&mut self) -> Result<u32, Error> {
        let bytes = self.read_bytes(4)?;
        Ok(E::read_u32(bytes))
    }

    /// Read an IEEE-754 single-precision float in byte order `E`, advancing
    /// four bytes.
    pub fn read_f32<E: ByteOrder>(&mut self) -> Result<f32, Error> {
        let bytes = self.read_bytes(4)?;
        Ok(E::read_f32(bytes))
    }

    /// Read exactly `len` bytes, advancing past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.bytes_remaining() < len {
            return Err(Error::TruncatedRead {
                offset: self.pos,
                needed: len,
            });
        }

        let start = self.pos;
        self.pos += len;
        Ok(&self.blob[start..self.pos])
    }

    /// Read up to the first occurrence of `delimiter`.
    ///
    /// The delimiter byte is consumed but excluded from the returned slice.
    /// The search stops at the end of the blob; if the delimiter is not found
    /// the cursor does not move.
    pub fn read_until(&mut self, delimiter: u8) -> Result<&'a [u8], Error> {
        let rest = &self.blob[self.pos..];
        match rest.iter().position(|&b| b == delimiter) {
            Some(index) => {
                let bytes = &rest[..index];
                self.pos += index + 1;
                Ok(bytes)
            }
            None => Err(Error::DelimiterNotFound {
                offset: self.pos,
                delimiter,
            }),
        }
    }

    /// Advance exactly `count` bytes without reading them.
    ///
    /// The cursor only ever moves forward; a skip whose target lies past the
    /// end of the blob fails without moving.
    pub fn skip(&mut self, count: usize) -> Result<(), Error> {
        if self.bytes_remaining() < count {
            return Err(Error::InvalidSkip {
                offset: self.pos,
                count,
            });
        }

        self.pos += count;
        Ok(())
    }

    /// Read a 32-bit unsigned integer at an arbitrary absolute offset
    /// without moving the cursor.
    pub fn peek_u32_at<E: ByteOrder>(&self, offset: usize) -> Result<u32, Error> {
        if self.blob.len().saturating_sub(offset) < 4 {
            return Err(Error::TruncatedRead { offset, needed: 4 });
        }

        Ok(E::read_u32(&self.blob[offset..offset + 4]))
    }

    /// Move the cursor to `offset` unconditionally.
    ///
    /// Resynchronization only: this is the one operation that may move the
    /// cursor backward, and it is reserved for the block engine's
    /// overrun recovery.
    pub(crate) fn rewind_to(&mut self, offset: usize) {
        debug_assert!(offset <= self.blob.len());
        self.pos = offset;
    }
}
