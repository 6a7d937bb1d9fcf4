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

//! The 3D-model container format.
//!
//! A model file is a fixed 16-byte header, a 12 KiB embedded preview image,
//! and then a run of blocks. Objects nest freely: an `Object` block holds
//! meshes and child objects, a `Mesh` holds vertex and face arrays, and
//! material blocks carry their own sub-blocks. The format is known from
//! reverse engineering, so several block kinds are mapped by label only
//! (`Unk30`, `Unk35`, ...) and their bodies are skipped by declared size.

use crate::{
    parser::{BlockDescriptor, BlockParser, Error, Grammar, ParseTree},
    BlockLabel,
};

/// Magic signature an external file-type sniffer matches before handing a
/// blob to [`parse`].
pub const MAGIC: [u8; 4] = *b"BES\0";

/// Length of the embedded preview image that follows the header.
const PREVIEW_LEN: usize = 12288;

const OBJECT: BlockLabel = BlockLabel(0x0001);
const UNK30: BlockLabel = BlockLabel(0x0030);
const MESH: BlockLabel = BlockLabel(0x0031);
const VERTICES: BlockLabel = BlockLabel(0x0032);
const FACES: BlockLabel = BlockLabel(0x0033);
const PROPERTIES: BlockLabel = BlockLabel(0x0034);
const UNK35: BlockLabel = BlockLabel(0x0035);
const UNK36: BlockLabel = BlockLabel(0x0036);
const UNK38: BlockLabel = BlockLabel(0x0038);
const USER_INFO: BlockLabel = BlockLabel(0x0070);
const MATERIAL: BlockLabel = BlockLabel(0x1000);
const BITMAP: BlockLabel = BlockLabel(0x1001);
const PTEROMAT: BlockLabel = BlockLabel(0x1002);

/// Whether `blob` starts with this format's magic signature.
pub fn matches(blob: &[u8]) -> bool {
    blob.len() >= MAGIC.len() && blob[..MAGIC.len()] == MAGIC
}

/// The format's block vocabulary.
pub fn grammar() -> Grammar {
    Grammar::new(
        "bes_block",
        [
            (
                OBJECT,
                BlockDescriptor {
                    name: "Object",
                    handler: object,
                },
            ),
            (
                UNK30,
                BlockDescriptor {
                    name: "Unk30",
                    handler: unk30,
                },
            ),
            (
                MESH,
                BlockDescriptor {
                    name: "Mesh",
                    handler: mesh,
                },
            ),
            (
                VERTICES,
                BlockDescriptor {
                    name: "Vertices",
                    handler: vertices,
                },
            ),
            (
                FACES,
                BlockDescriptor {
                    name: "Faces",
                    handler: faces,
                },
            ),
            (
                PROPERTIES,
                BlockDescriptor {
                    name: "Properties",
                    handler: properties,
                },
            ),
            (
                UNK35,
                BlockDescriptor {
                    name: "Unk35",
                    handler: opaque,
                },
            ),
            (
                UNK36,
                BlockDescriptor {
                    name: "Unk36",
                    handler: unk36,
                },
            ),
            (
                UNK38,
                BlockDescriptor {
                    name: "Unk38",
                    handler: opaque,
                },
            ),
            (
                USER_INFO,
                BlockDescriptor {
                    name: "UserInfo",
                    handler: user_info,
                },
            ),
            (
                MATERIAL,
                BlockDescriptor {
                    name: "Material",
                    handler: material,
                },
            ),
            (
                BITMAP,
                BlockDescriptor {
                    name: "Bitmap",
                    handler: bitmap,
                },
            ),
            (
                PTEROMAT,
                BlockDescriptor {
                    name: "PteroMat",
                    handler: ptero_mat,
                },
            ),
        ],
    )
}

/// Parse a model container from `blob`, starting at `start`.
///
/// Always returns a tree: a fatal framing error leaves the longest valid
/// prefix with the error attached (see
/// [`ParseTree::is_complete`]).
pub fn parse(blob: &[u8], start: usize) -> ParseTree<'_> {
    let grammar = grammar();
    let mut p = BlockParser::new(blob, start);
    let result = drive(&mut p, &grammar);
    p.into_tree(result.err())
}

fn drive(p: &mut BlockParser<'_>, grammar: &Grammar) -> Result<(), Error> {
    p.start_chunk("bes_header", "header");
    p.read_bytes("sig", 4)?;
    p.read_bytes("ver", 5)?;
    p.read_le32("unk")?;
    p.read_bytes("ver", 3)?;
    p.end_chunk();

    p.start_chunk("bes_preview", "preview");
    p.read_bytes("preview", PREVIEW_LEN)?;
    p.end_chunk();

    p.decode_blocks_to_end(grammar)
}

fn object(p: &mut BlockParser<'_>, g: &Grammar, end: usize) -> Result<(), Error> {
    p.read_le32("object_children")?;
    let name_len = p.read_le32("name_len")?;
    p.read_bytes("name", name_len as usize)?;
    p.decode_block_sequence(g, end)
}

fn unk30(p: &mut BlockParser<'_>, g: &Grammar, end: usize) -> Result<(), Error> {
    p.read_le32("mesh_children")?;
    p.decode_block_sequence(g, end)
}

fn mesh(p: &mut BlockParser<'_>, g: &Grammar, end: usize) -> Result<(), Error> {
    p.read_le32("material")?;
    p.decode_block_sequence(g, end)
}

fn vertices(p: &mut BlockParser<'_>, _g: &Grammar, _end: usize) -> Result<(), Error> {
    let count = p.read_le32("vertices_count")?;
    let vertex_size = p.read_le32("vertex_size")?;
    p.read_le32("unknown")?;

    for vertex in 0..count {
        p.start_chunk("bes_vertex", format!("Vertex[{vertex}]"));
        p.read_f32_le("posX")?;
        p.read_f32_le("posY")?;
        p.read_f32_le("posZ")?;
        // Whatever a vertex carries beyond its position is not yet
        // understood.
        p.skip(vertex_size.saturating_sub(12) as usize)?;
        p.end_chunk();
    }

    Ok(())
}

fn faces(p: &mut BlockParser<'_>, _g: &Grammar, _end: usize) -> Result<(), Error> {
    let count = p.read_le32("faces_count")?;

    for face in 0..count {
        p.start_chunk("bes_face", format!("Face[{face}]"));
        p.read_le32("vertexA")?;
        p.read_le32("vertexB")?;
        p.read_le32("vertexC")?;
        p.end_chunk();
    }

    Ok(())
}

fn properties(p: &mut BlockParser<'_>, _g: &Grammar, _end: usize) -> Result<(), Error> {
    let text_len = p.read_le32("tex_len")?;
    p.read_bytes("text", text_len as usize)?;
    Ok(())
}

// Body layout unknown; the engine skips to the declared end.
fn opaque(_p: &mut BlockParser<'_>, _g: &Grammar, _end: usize) -> Result<(), Error> {
    Ok(())
}

fn unk36(p: &mut BlockParser<'_>, _g: &Grammar, _end: usize) -> Result<(), Error> {
    p.read_le32("unknown")?;
    Ok(())
}

fn user_info(p: &mut BlockParser<'_>, _g: &Grammar, _end: usize) -> Result<(), Error> {
    let name_len = p.read_le32("name_len")?;
    let comment_len = p.read_le32("comment_len")?;
    p.read_le32("unknown")?;
    p.read_bytes("name", name_len as usize)?;
    p.read_bytes("comment", comment_len as usize)?;
    Ok(())
}

fn material(p: &mut BlockParser<'_>, g: &Grammar, end: usize) -> Result<(), Error> {
    p.read_le32("material_children")?;
    p.decode_block_sequence(g, end)
}

fn bitmap(p: &mut BlockParser<'_>, _g: &Grammar, _end: usize) -> Result<(), Error> {
    p.read_le32("unknown")?;
    p.read_le32("unknown")?;
    p.read_le32("type")?;
    Ok(())
}

fn ptero_mat(p: &mut BlockParser<'_>, _g: &Grammar, _end: usize) -> Result<(), Error> {
    p.read_le32("sides")?;
    p.read_le32("type")?;
    p.read_bytes("collision_mat", 4)?;
    p.read_le32("unknown")?;
    p.read_bytes("vegetation", 4)?;
    let name_len = p.read_le32("name_len")?;
    p.read_bytes("name", name_len as usize)?;
    Ok(())
}
