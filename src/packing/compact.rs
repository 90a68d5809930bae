use super::{push_row, PackedBuffers, VertexLayout};
use crate::wavefront_obj::Mesh;

const UNSEEN: u32 = u32::MAX;

/// Shares a row between corners with equal position, normal and texcoord.
///
/// Only the most recent attribute combination of each position is remembered,
/// so a position alternating between two normals gets a new row on every switch.
pub(super) fn pack(mesh: &Mesh) -> PackedBuffers {
    let layout = VertexLayout::for_mesh(mesh);
    let position_count = mesh.positions().len();

    let mut row_for_position = vec![UNSEEN; position_count];
    let mut last_normal = vec![UNSEEN; position_count];
    let mut last_texcoord = vec![UNSEEN; position_count];

    let mut vertices = Vec::with_capacity(position_count * layout.components());
    let mut indices = Vec::with_capacity(mesh.triangle_count() * 3);
    let mut row_count = 0u32;

    for triangle in mesh.triangles() {
        for corner in &triangle.corners {
            let p = corner.position;
            let normal = index_key(corner.normal);
            let texcoord = index_key(corner.texcoord);

            let shared = match row_for_position.get(p) {
                Some(&row) if row != UNSEEN => {
                    let same_normal = !layout.has_normals() || last_normal[p] == normal;
                    let same_texcoord = !layout.has_texcoords() || last_texcoord[p] == texcoord;
                    if same_normal && same_texcoord {
                        Some(row)
                    } else {
                        None
                    }
                }
                _ => None,
            };

            let row = match shared {
                Some(row) => row,
                None => {
                    let row = row_count;
                    push_row(&mut vertices, layout, mesh, triangle, corner);
                    row_count += 1;
                    remember(&mut row_for_position, p, row);
                    remember(&mut last_normal, p, normal);
                    remember(&mut last_texcoord, p, texcoord);
                    row
                }
            };
            indices.push(row);
        }
    }

    PackedBuffers {
        layout,
        vertices,
        indices: Some(indices),
    }
}

fn index_key(index: Option<usize>) -> u32 {
    index.map_or(UNSEEN, |i| i as u32)
}

fn remember(slots: &mut [u32], position: usize, value: u32) {
    if let Some(slot) = slots.get_mut(position) {
        *slot = value;
    }
}
