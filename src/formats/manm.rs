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

//! The animation-track container format.
//!
//! An animation file is a fixed 16-byte header followed by one `Object`
//! block per animated object. Each object block carries per-track keyframe
//! counts, a duration, a NUL-terminated object name, and then a packed run
//! of keyframe records up to the block's declared end.
//!
//! Keyframe records are label-only (no size word): the label picks a fixed
//! record layout. Three record kinds are understood; the count fields name
//! them, which is all that is known about track 3 so far.

use crate::{
    parser::{BlockDescriptor, BlockParser, Error, Grammar, ParseTree},
    BlockLabel,
};

/// Magic signature an external file-type sniffer matches before handing a
/// blob to [`parse`].
pub const MAGIC: [u8; 4] = *b"MANM";

const OBJECT: BlockLabel = BlockLabel(0x0001);

const KEY_TRANSLATION: u32 = 0x0001;
const KEY_ROTATION: u32 = 0x0002;
const KEY_UNKNOWN3: u32 = 0x0003;

/// Whether `blob` starts with this format's magic signature.
pub fn matches(blob: &[u8]) -> bool {
    blob.len() >= MAGIC.len() && blob[..MAGIC.len()] == MAGIC
}

/// The format's block vocabulary.
pub fn grammar() -> Grammar {
    Grammar::new(
        "manm_object",
        [(
            OBJECT,
            BlockDescriptor {
                name: "object",
                handler: object,
            },
        )],
    )
}

/// Parse an animation container from `blob`, starting at `start`.
///
/// Always returns a tree: a fatal framing error leaves the longest valid
/// prefix with the error attached.
pub fn parse(blob: &[u8], start: usize) -> ParseTree<'_> {
    let grammar = grammar();
    let mut p = BlockParser::new(blob, start);
    let result = drive(&mut p, &grammar);
    p.into_tree(result.err())
}

fn drive(p: &mut BlockParser<'_>, grammar: &Grammar) -> Result<(), Error> {
    p.start_chunk("manm_header", "header");
    p.read_bytes("sig", 4)?;
    p.read_le32("unk")?;
    p.read_le32("object_children")?;
    p.read_le32("unk")?;
    p.end_chunk();

    p.decode_blocks_to_end(grammar)
}

fn object(p: &mut BlockParser<'_>, _g: &Grammar, end: usize) -> Result<(), Error> {
    // The per-track counts document the expected number of keyframes; the
    // record loop below is terminated by the block's declared end, so a
    // count that disagrees cannot desynchronize the parse.
    p.read_le32("translation_cnt")?;
    p.read_le32("rotation_cnt")?;
    p.read_le32("unknown3_cnt")?;
    p.read_le32("unknown")?;
    p.read_le32("time_duration")?;
    p.read_le32("unknown")?;
    p.read_until("name", b'\0')?;

    while p.position() < end {
        keyframe(p)?;
    }

    Ok(())
}

fn keyframe(p: &mut BlockParser<'_>) -> Result<(), Error> {
    let label = p.peek_le32_at(p.position())?;
    let name = match label {
        KEY_TRANSLATION => "Translation".to_owned(),
        KEY_ROTATION => "Rotation".to_owned(),
        KEY_UNKNOWN3 => "Unknown3".to_owned(),
        other => format!("Unknown{other}"),
    };

    p.start_chunk("manm_data", name);
    p.read_le32("label")?;
    match label {
        KEY_TRANSLATION => {
            p.read_le32("time_start")?;
            p.read_f32_le("posX")?;
            p.read_f32_le("posY")?;
            p.read_f32_le("posZ")?;
        }
        KEY_ROTATION => {
            p.read_le32("time_start")?;
            p.read_f32_le("unknown")?;
            p.read_f32_le("unknown")?;
            p.read_f32_le("unknown")?;
            p.read_f32_le("unknown")?;
        }
        KEY_UNKNOWN3 => {
            p.read_le32("time_start")?;
            p.read_f32_le("unknown")?;
            p.read_f32_le("unknown")?;
            p.read_f32_le("unknown")?;
        }
        _ => {}
    }
    p.end_chunk();

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use pretty_assertions_sorted::assert_eq;

    use crate::{
        formats::manm,
        parser::{Error, FieldValue},
    };

    fn header() -> Vec<u8> {
        let mut blob = Vec::new();
        blob.extend_from_slice(&manm::MAGIC); // sig
        blob.extend_from_slice(&0u32.to_le_bytes()); // unk
        blob.extend_from_slice(&1u32.to_le_bytes()); // object_children
        blob.extend_from_slice(&0u32.to_le_bytes()); // unk
        blob
    }

    fn translation_key(time: u32) -> Vec<u8> {
        let mut key = 1u32.to_le_bytes().to_vec();
        key.extend_from_slice(&time.to_le_bytes());
        key.extend_from_slice(&1.0f32.to_le_bytes());
        key.extend_from_slice(&2.0f32.to_le_bytes());
        key.extend_from_slice(&3.0f32.to_le_bytes());
        key
    }

    fn rotation_key(time: u32) -> Vec<u8> {
        let mut key = 2u32.to_le_bytes().to_vec();
        key.extend_from_slice(&time.to_le_bytes());
        for _ in 0..4 {
            key.extend_from_slice(&0.5f32.to_le_bytes());
        }
        key
    }

    fn object_block(translation_cnt: u32, name: &[u8], keys: &[&[u8]]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&translation_cnt.to_le_bytes());
        body.extend_from_slice(&1u32.to_le_bytes()); // rotation_cnt
        body.extend_from_slice(&0u32.to_le_bytes()); // unknown3_cnt
        body.extend_from_slice(&0u32.to_le_bytes()); // unknown
        body.extend_from_slice(&100u32.to_le_bytes()); // time_duration
        body.extend_from_slice(&0u32.to_le_bytes()); // unknown
        body.extend_from_slice(name);
        body.push(0);
        for key in keys {
            body.extend_from_slice(key);
        }

        let mut block = 1u32.to_le_bytes().to_vec();
        block.extend_from_slice(&u32::try_from(8 + body.len()).unwrap().to_le_bytes());
        block.extend_from_slice(&body);
        block
    }

    #[test]
    fn magic() {
        assert!(manm::matches(b"MANMxxxx"));
        assert!(!manm::matches(b"BES\0"));
    }

    #[test]
    fn animation_tree() {
        let translation = translation_key(0);
        let rotation = rotation_key(10);
        let mut blob = header();
        blob.extend_from_slice(&object_block(1, b"walk", &[&translation, &rotation]));

        let tree = manm::parse(&blob, 0);
        assert!(tree.is_complete());

        assert_eq!(tree.chunks.len(), 2);
        assert_eq!(tree.chunks[0].label, "header");
        assert_eq!(tree.chunks[0].start..tree.chunks[0].end, 0..16);

        let object = &tree.chunks[1];
        assert_eq!(object.label, "object");
        assert_eq!(object.kind, "manm_object");
        assert_eq!(object.start, 16);
        assert_eq!(object.end, blob.len());

        // The NUL terminator is consumed but excluded from the name.
        let name = object.fields.iter().find(|f| f.name == "name").unwrap();
        assert_eq!(name.value, FieldValue::Bytes(b"walk"));

        assert_eq!(object.children.len(), 2);
        let translation = &object.children[0];
        assert_eq!(translation.label, "Translation");
        assert_eq!(translation.end - translation.start, 20);
        assert_eq!(translation.fields[2].value, FieldValue::F32(1.0));

        let rotation = &object.children[1];
        assert_eq!(rotation.label, "Rotation");
        assert_eq!(rotation.end - rotation.start, 24);
        assert_eq!(rotation.end, object.end);
    }

    #[test]
    fn keyframe_counts_are_documentation_only() {
        // A wildly wrong translation count: recursion is bounded by the
        // block's declared end, so the two real keyframes still decode.
        let translation = translation_key(0);
        let rotation = rotation_key(10);
        let mut blob = header();
        blob.extend_from_slice(&object_block(9000, b"run", &[&translation, &rotation]));

        let tree = manm::parse(&blob, 0);
        assert!(tree.is_complete());
        assert_eq!(tree.chunks[1].children.len(), 2);
    }

    #[test]
    fn unrecognized_keyframe_label() {
        // Label 7 has no known layout: the record decodes as a bare label
        // word and the loop continues at the next word.
        let stray = 7u32.to_le_bytes();
        let translation = translation_key(5);
        let mut blob = header();
        blob.extend_from_slice(&object_block(1, b"idle", &[&stray, &translation]));

        let tree = manm::parse(&blob, 0);
        assert!(tree.is_complete());

        let object = &tree.chunks[1];
        assert_eq!(object.children.len(), 2);
        assert_eq!(object.children[0].label, "Unknown7");
        assert_eq!(object.children[0].end - object.children[0].start, 4);
        assert_eq!(object.children[1].label, "Translation");
    }

    #[test]
    fn unterminated_name_is_fatal() {
        let mut body = Vec::new();
        for _ in 0..6 {
            body.extend_from_slice(&0u32.to_le_bytes());
        }
        body.extend_from_slice(b"no terminator");

        let mut block = 1u32.to_le_bytes().to_vec();
        block.extend_from_slice(&u32::try_from(8 + body.len()).unwrap().to_le_bytes());
        block.extend_from_slice(&body);

        let mut blob = header();
        blob.extend_from_slice(&block);

        let tree = manm::parse(&blob, 0);
        assert_eq!(
            tree.error,
            Some(Error::DelimiterNotFound {
                offset: 48,
                delimiter: 0,
            })
        );

        // The header chunk and the sealed object prefix remain inspectable.
        assert_eq!(tree.chunks.len(), 2);
        assert_eq!(tree.chunks[0].label, "header");
    }

    #[test]
    fn unknown_object_label_is_skipped() {
        let mut block = 0x99u32.to_le_bytes().to_vec();
        block.extend_from_slice(&20u32.to_le_bytes());
        block.extend_from_slice(&[0xcd; 12]);

        let mut blob = header();
        blob.extend_from_slice(&block);

        let tree = manm::parse(&blob, 0);
        assert!(tree.is_complete());
        assert_eq!(tree.chunks[1].label, "Unknown");
        assert_eq!(tree.chunks[1].start..tree.chunks[1].end, 16..36);
    }

    #[test]
    fn reparse_is_idempotent() {
        let translation = translation_key(3);
        let mut blob = header();
        blob.extend_from_slice(&object_block(1, b"loop", &[&translation]));

        assert_eq!(manm::parse(&blob, 0), manm::parse(&blob, 0));
    }
}
