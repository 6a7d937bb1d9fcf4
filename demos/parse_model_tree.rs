//! Example: decode a small model container and print its chunk tree.
//!
//! Every line shows a chunk's label, byte range, and kind; indented `.`
//! lines are the primitive fields attributed to the chunk above them.

use chunkscope::formats::bes;
use chunkscope::parser::Chunk;

const PREVIEW_LEN: usize = 12288;

fn sized_block(label: u32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + body.len());
    out.extend_from_slice(&label.to_le_bytes());
    out.extend_from_slice(&((8 + body.len()) as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

fn main() {
    // One object holding a mesh with a 3-vertex array, plus a block the
    // grammar does not know.
    let mut vertices_body = Vec::new();
    vertices_body.extend_from_slice(&3u32.to_le_bytes()); // vertices_count
    vertices_body.extend_from_slice(&12u32.to_le_bytes()); // vertex_size
    vertices_body.extend_from_slice(&0u32.to_le_bytes()); // unknown
    for i in 0..3 {
        vertices_body.extend_from_slice(&(i as f32).to_le_bytes());
        vertices_body.extend_from_slice(&0.5f32.to_le_bytes());
        vertices_body.extend_from_slice(&(-1.0f32).to_le_bytes());
    }

    let mut mesh_body = 0u32.to_le_bytes().to_vec(); // material
    mesh_body.extend_from_slice(&sized_block(0x0032, &vertices_body));
    mesh_body.extend_from_slice(&sized_block(0x4242, &[0xaa; 8])); // unknown

    let mut object_body = Vec::new();
    object_body.extend_from_slice(&1u32.to_le_bytes()); // object_children
    object_body.extend_from_slice(&4u32.to_le_bytes()); // name_len
    object_body.extend_from_slice(b"demo"); // name
    object_body.extend_from_slice(&sized_block(0x0031, &mesh_body));

    let mut blob = Vec::new();
    blob.extend_from_slice(&bes::MAGIC);
    blob.extend_from_slice(b"100.5");
    blob.extend_from_slice(&0u32.to_le_bytes());
    blob.extend_from_slice(b"0.1");
    blob.resize(blob.len() + PREVIEW_LEN, 0);
    blob.extend_from_slice(&sized_block(0x0001, &object_body));

    let tree = bes::parse(&blob, 0);
    if let Some(error) = &tree.error {
        println!("parse stopped early: {error}");
    }

    for chunk in &tree.chunks {
        print_chunk(chunk, 0);
    }

    // Hit-test a byte in the middle of the vertex array.
    if let Some(vertices) = tree.find_by_label("Object/Mesh/Vertices") {
        let offset = vertices.start + 25;
        if let Some(hit) = tree.chunk_at(offset) {
            println!("\nbyte {offset} belongs to {}", hit.label);
        }
    }
}

fn print_chunk(chunk: &Chunk<'_>, depth: usize) {
    let indent = depth * 2;
    println!(
        "{:indent$}{} [{}..{}) {}",
        "", chunk.label, chunk.start, chunk.end, chunk.kind
    );

    for field in &chunk.fields {
        println!(
            "{:indent$}. {} = {:?}",
            "",
            field.name,
            field.value,
            indent = indent + 2
        );
    }

    for child in &chunk.children {
        print_chunk(child, depth + 1);
    }
}
