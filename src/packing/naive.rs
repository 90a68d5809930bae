use super::{push_row, PackedBuffers, VertexLayout};
use crate::wavefront_obj::Mesh;

/// One row per triangle corner, in triangle order.
pub(super) fn pack(mesh: &Mesh) -> PackedBuffers {
    let layout = VertexLayout::for_mesh(mesh);
    let mut vertices = Vec::with_capacity(mesh.triangle_count() * 3 * layout.components());

    for triangle in mesh.triangles() {
        for corner in &triangle.corners {
            push_row(&mut vertices, layout, mesh, triangle, corner);
        }
    }

    PackedBuffers {
        layout,
        vertices,
        indices: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavefront_obj::RawCorner;
    use ultraviolet::{Vec2, Vec3};

    #[test]
    fn writes_one_row_per_corner() {
        let mut mesh = Mesh::new();
        for i in 0..4 {
            mesh.add_position(Vec3::new(i as f32, 0.0, 0.0));
        }
        mesh.add_texcoord(Vec2::new(0.25, 0.75));
        mesh.detect_face_format("1/1");
        mesh.set_material("red", Some(2));
        mesh.set_object("box", true);
        mesh.set_object("lid", true);

        let corners: Vec<_> = (1..=4)
            .map(|i| {
                let raw = RawCorner {
                    position: i,
                    texcoord: Some(1),
                    normal: None,
                };
                mesh.resolve_corner(raw, |_| ()).unwrap()
            })
            .collect();
        mesh.add_face(&corners, 1).unwrap();

        let packed = pack(&mesh);
        assert_eq!(packed.layout().components(), 7);
        assert_eq!(packed.row_count(), 6);
        assert!(packed.indices().is_none());

        let positions: Vec<f32> = packed.rows().map(|r| r[2]).collect();
        assert_eq!(positions, vec![0.0, 1.0, 2.0, 0.0, 2.0, 3.0]);
        assert_eq!(
            packed.row(4),
            Some(&[2.0, 1.0, 2.0, 0.0, 0.0, 0.25, 0.75][..])
        );
    }
}
