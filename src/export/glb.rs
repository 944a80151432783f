//! Binary glTF 2.0 (GLB) export of live chunks
//!
//! One mesh and node per chunk, all sharing a single buffer and a single
//! double-sided, non-metallic material. Positions are already world-space,
//! so nodes carry no transform.

use serde_json::{json, Value};

use crate::chunk::registry::ChunkRuntime;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::runtime::TerrainRuntime;

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Accumulates the binary buffer and its views/accessors
#[derive(Default)]
struct BufferBuilder {
    bin: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl BufferBuilder {
    /// Append raw bytes as a new buffer view; returns the accessor index
    fn push(&mut self, bytes: &[u8], target: u32, accessor: Value) -> usize {
        pad_to_four(&mut self.bin, 0);
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": self.bin.len(),
            "byteLength": bytes.len(),
            "target": target,
        }));
        self.bin.extend_from_slice(bytes);

        let mut accessor = accessor;
        accessor["bufferView"] = json!(self.views.len() - 1);
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    /// Buffers for one chunk; returns the primitive's attribute/indices JSON
    fn push_chunk(&mut self, chunk: &ChunkRuntime) -> Value {
        let geometry = &chunk.mesh.geometry;
        let count = geometry.positions.len();
        let bounds = geometry.bounds;

        let position = self.push(
            bytemuck::cast_slice(&geometry.positions),
            ARRAY_BUFFER,
            json!({
                "componentType": FLOAT,
                "count": count,
                "type": "VEC3",
                "min": bounds.min.to_array(),
                "max": bounds.max.to_array(),
            }),
        );
        let normal = self.push(
            bytemuck::cast_slice(&geometry.normals),
            ARRAY_BUFFER,
            json!({ "componentType": FLOAT, "count": count, "type": "VEC3" }),
        );
        let uv = self.push(
            bytemuck::cast_slice(&geometry.uvs),
            ARRAY_BUFFER,
            json!({ "componentType": FLOAT, "count": count, "type": "VEC2" }),
        );
        let indices = self.push(
            bytemuck::cast_slice(&geometry.indices),
            ELEMENT_ARRAY_BUFFER,
            json!({ "componentType": UNSIGNED_INT, "count": geometry.indices.len(), "type": "SCALAR" }),
        );

        json!({
            "attributes": { "POSITION": position, "NORMAL": normal, "TEXCOORD_0": uv },
            "indices": indices,
            "material": 0,
        })
    }
}

/// Encode every live chunk of `runtime` as a GLB file
pub fn encode(runtime: &TerrainRuntime) -> Result<Vec<u8>> {
    if runtime.is_empty() {
        return Err(Error::Export("no live chunks to export".into()));
    }

    let mut buffer = BufferBuilder::default();
    let mut meshes = Vec::new();
    let mut nodes = Vec::new();

    for chunk in runtime.chunks() {
        if chunk.mesh.geometry.normals.len() != chunk.mesh.geometry.positions.len() {
            return Err(Error::Export(format!("chunk {} has inconsistent buffers", chunk.key)));
        }
        let primitive = buffer.push_chunk(chunk);
        let name = format!("chunk_{}_{}", chunk.key.row, chunk.key.column);
        meshes.push(json!({ "name": name, "primitives": [primitive] }));
        nodes.push(json!({ "name": name, "mesh": meshes.len() - 1 }));
    }
    pad_to_four(&mut buffer.bin, 0);

    let document = json!({
        "asset": { "version": "2.0", "generator": concat!("terrastream ", env!("CARGO_PKG_VERSION")) },
        "scene": 0,
        "scenes": [{ "name": "terrain", "nodes": (0..nodes.len()).collect::<Vec<_>>() }],
        "nodes": nodes,
        "meshes": meshes,
        "materials": [{
            "name": "terrain",
            "pbrMetallicRoughness": {
                "baseColorFactor": [1.0, 1.0, 1.0, 1.0],
                "metallicFactor": 0.0,
                "roughnessFactor": 1.0,
            },
            "doubleSided": true,
            "alphaMode": "OPAQUE",
        }],
        "buffers": [{ "byteLength": buffer.bin.len() }],
        "bufferViews": buffer.views,
        "accessors": buffer.accessors,
    });

    let mut json_bytes = serde_json::to_vec(&document)?;
    pad_to_four(&mut json_bytes, b' ');

    let total = 12 + 8 + json_bytes.len() + 8 + buffer.bin.len();
    let total = u32::try_from(total)
        .map_err(|_| Error::Export(format!("GLB of {} bytes exceeds the 4 GiB limit", total)))?;

    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_bytes);
    out.extend_from_slice(&(buffer.bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&buffer.bin);
    Ok(out)
}

fn pad_to_four(bytes: &mut Vec<u8>, fill: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(fill);
    }
}
