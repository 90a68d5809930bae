//! `Mesh` を GPU に渡せるインターリーブ済み頂点バッファに詰めるモジュール。

mod compact;
mod naive;
mod normalize;

pub use normalize::{bounding_box, center_and_resize};

use crate::wavefront_obj::{Corner, Mesh, Triangle};
use std::{borrow::Cow, mem::size_of};

/// Column layout of one packed vertex row.
///
/// Every row is `material_id, object_id, position[3]`, followed by
/// `normal[3]` and `texcoord[2]` when the mesh has them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    has_normals: bool,
    has_texcoords: bool,
}

impl VertexLayout {
    pub const MATERIAL_ID_COLUMN: usize = 0;
    pub const OBJECT_ID_COLUMN: usize = 1;
    pub const POSITION_COLUMN: usize = 2;

    pub fn new(has_normals: bool, has_texcoords: bool) -> VertexLayout {
        VertexLayout {
            has_normals,
            has_texcoords,
        }
    }

    pub fn for_mesh(mesh: &Mesh) -> VertexLayout {
        VertexLayout::new(mesh.has_normals(), mesh.has_texcoords())
    }

    pub fn has_normals(&self) -> bool {
        self.has_normals
    }

    pub fn has_texcoords(&self) -> bool {
        self.has_texcoords
    }

    /// Number of floats in a row.
    pub fn components(&self) -> usize {
        let mut components = 1 + 1 + 3;
        if self.has_normals {
            components += 3;
        }
        if self.has_texcoords {
            components += 2;
        }
        components
    }

    pub fn normal_column(&self) -> Option<usize> {
        if self.has_normals {
            Some(Self::POSITION_COLUMN + 3)
        } else {
            None
        }
    }

    pub fn texcoord_column(&self) -> Option<usize> {
        if !self.has_texcoords {
            return None;
        }
        match self.normal_column() {
            Some(normal) => Some(normal + 3),
            None => Some(Self::POSITION_COLUMN + 3),
        }
    }

    /// Byte distance between consecutive rows.
    pub fn stride(&self) -> usize {
        self.components() * size_of::<f32>()
    }

    pub fn material_id_offset(&self) -> usize {
        Self::MATERIAL_ID_COLUMN * size_of::<f32>()
    }

    pub fn object_id_offset(&self) -> usize {
        Self::OBJECT_ID_COLUMN * size_of::<f32>()
    }

    pub fn position_offset(&self) -> usize {
        Self::POSITION_COLUMN * size_of::<f32>()
    }

    pub fn normal_offset(&self) -> Option<usize> {
        self.normal_column().map(|c| c * size_of::<f32>())
    }

    pub fn texcoord_offset(&self) -> Option<usize> {
        self.texcoord_column().map(|c| c * size_of::<f32>())
    }
}

/// Strategy used to turn triangles into rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackingMode {
    /// One row per triangle corner, no index buffer.
    Naive,

    /// Corners sharing position, normal and texcoord share a row; an index
    /// buffer references the rows.
    Compact,
}

/// Interleaved vertex rows and the optional index buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedBuffers {
    layout: VertexLayout,
    vertices: Vec<f32>,
    indices: Option<Vec<u32>>,
}

impl PackedBuffers {
    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    pub fn row_count(&self) -> usize {
        self.vertices.len() / self.layout.components()
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let components = self.layout.components();
        self.vertices
            .get(index * components..(index + 1) * components)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.vertices.chunks_exact(self.layout.components())
    }

    /// Number of vertices a draw call consumes.
    pub fn element_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.row_count(),
        }
    }

    /// The index buffer, or `0..rows` when packed without one.
    pub fn indices_or_identity(&self) -> Cow<'_, [u32]> {
        match &self.indices {
            Some(indices) => Cow::Borrowed(&indices[..]),
            None => Cow::Owned((0..self.row_count() as u32).collect()),
        }
    }

    /// Recenters and/or rescales positions in place.
    pub fn normalize(&mut self, center: bool, resize: bool) {
        center_and_resize(
            &mut self.vertices,
            self.layout.components(),
            VertexLayout::POSITION_COLUMN,
            center,
            resize,
        );
    }

    pub fn into_parts(self) -> (VertexLayout, Vec<f32>, Option<Vec<u32>>) {
        (self.layout, self.vertices, self.indices)
    }
}

/// Packs the triangles of `mesh` with the given strategy.
pub fn pack(mesh: &Mesh, mode: PackingMode) -> PackedBuffers {
    match mode {
        PackingMode::Naive => naive::pack(mesh),
        PackingMode::Compact => compact::pack(mesh),
    }
}

/// Appends one row for `corner` of `triangle`.
/// Attributes the mesh lacks at that index are written as zero.
fn push_row(
    vertices: &mut Vec<f32>,
    layout: VertexLayout,
    mesh: &Mesh,
    triangle: &Triangle,
    corner: &Corner,
) {
    vertices.push(triangle.material_id as f32);
    vertices.push(triangle.object_id as f32);

    let position = mesh
        .positions()
        .get(corner.position)
        .copied()
        .unwrap_or_default();
    vertices.extend_from_slice(&[position.x, position.y, position.z]);

    if layout.has_normals {
        let normal = corner
            .normal
            .and_then(|i| mesh.normals().get(i))
            .copied()
            .unwrap_or_default();
        vertices.extend_from_slice(&[normal.x, normal.y, normal.z]);
    }
    if layout.has_texcoords {
        let texcoord = corner
            .texcoord
            .and_then(|i| mesh.texcoords().get(i))
            .copied()
            .unwrap_or_default();
        vertices.extend_from_slice(&[texcoord.x, texcoord.y]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_offsets_follow_present_attributes() {
        let bare = VertexLayout::new(false, false);
        assert_eq!(bare.components(), 5);
        assert_eq!(bare.stride(), 20);
        assert_eq!(bare.position_offset(), 8);
        assert_eq!(bare.normal_offset(), None);
        assert_eq!(bare.texcoord_offset(), None);

        let textured = VertexLayout::new(false, true);
        assert_eq!(textured.components(), 7);
        assert_eq!(textured.texcoord_offset(), Some(20));

        let lit = VertexLayout::new(true, false);
        assert_eq!(lit.components(), 8);
        assert_eq!(lit.normal_offset(), Some(20));

        let full = VertexLayout::new(true, true);
        assert_eq!(full.components(), 10);
        assert_eq!(full.stride(), 40);
        assert_eq!(full.material_id_offset(), 0);
        assert_eq!(full.object_id_offset(), 4);
        assert_eq!(full.normal_offset(), Some(20));
        assert_eq!(full.texcoord_offset(), Some(32));
    }

    #[test]
    fn identity_indices_cover_every_row() {
        let buffers = PackedBuffers {
            layout: VertexLayout::new(false, false),
            vertices: vec![0.0; 5 * 3],
            indices: None,
        };
        assert_eq!(buffers.row_count(), 3);
        assert_eq!(buffers.element_count(), 3);
        assert_eq!(&buffers.indices_or_identity()[..], &[0, 1, 2]);
        assert!(buffers.row(2).is_some());
        assert!(buffers.row(3).is_none());
    }
}
