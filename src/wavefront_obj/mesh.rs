//! 読み込み中の頂点属性と三角形を蓄積する `Mesh` 。

use super::{
    face::{resolve_index, Corner, FaceFormat, RawCorner, Triangle},
    AttributeKind, Error, Result,
};
use std::{collections::HashMap, sync::Arc};

use ultraviolet::{Vec2, Vec3};

/// Maps object names to stable ids in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct ObjectTable {
    names: Vec<Box<str>>,
    ids: HashMap<Box<str>, u32>,
}

impl ObjectTable {
    /// Returns the id of `name`, registering it if this is the first time it is seen.
    pub fn id_or_insert(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.into());
        self.ids.insert(name.into(), id);
        id
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    /// Object names in id order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| &n[..])
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Geometry read from an OBJ file, plus the state the `f` records are tagged with.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    texcoords: Vec<Vec2>,
    triangles: Vec<Triangle>,
    objects: ObjectTable,
    face_format: Option<FaceFormat>,

    material_id: u32,
    object_id: u32,
    material_name: Option<Arc<str>>,
    group_name: Option<Arc<str>>,
    object_name: Option<Arc<str>>,
}

impl Mesh {
    pub fn new() -> Mesh {
        Default::default()
    }

    pub fn add_position(&mut self, position: Vec3) {
        self.positions.push(position);
    }

    pub fn add_normal(&mut self, normal: Vec3) {
        self.normals.push(normal);
    }

    pub fn add_texcoord(&mut self, texcoord: Vec2) {
        self.texcoords.push(texcoord);
    }

    /// Switches the current object. The id is only assigned when `track_ids` is set;
    /// otherwise every triangle keeps object id 0.
    pub fn set_object(&mut self, name: &str, track_ids: bool) {
        self.object_name = Some(name.into());
        if track_ids {
            self.object_id = self.objects.id_or_insert(name);
        }
    }

    pub fn set_group(&mut self, name: Option<&str>) {
        self.group_name = name.map(Into::into);
    }

    /// Switches the current material.
    /// When `id` is `None` the name is remembered but the previous id stays active.
    pub fn set_material(&mut self, name: &str, id: Option<u32>) {
        self.material_name = Some(name.into());
        if let Some(id) = id {
            self.material_id = id;
        }
    }

    pub fn current_material_id(&self) -> u32 {
        self.material_id
    }

    pub fn current_object_id(&self) -> u32 {
        self.object_id
    }

    /// Returns the face format, detecting it from `token` if no face has been seen yet.
    /// The first detection holds for the rest of the file.
    pub fn detect_face_format(&mut self, token: &str) -> FaceFormat {
        *self
            .face_format
            .get_or_insert_with(|| FaceFormat::detect(token))
    }

    pub fn face_format(&self) -> Option<FaceFormat> {
        self.face_format
    }

    /// Resolves a raw corner against the current list sizes.
    /// `on_zero` is called for every index written as `0`.
    pub fn resolve_corner(
        &self,
        raw: RawCorner,
        mut on_zero: impl FnMut(AttributeKind),
    ) -> Result<Corner> {
        let mut resolve = |index: i64, len: usize, attribute: AttributeKind| {
            if index == 0 {
                on_zero(attribute);
            }
            resolve_index(index, len).ok_or(Error::InvalidIndex)
        };

        let position = resolve(raw.position, self.positions.len(), AttributeKind::Position)?;
        let normal = match raw.normal {
            Some(i) => Some(resolve(i, self.normals.len(), AttributeKind::Normal)?),
            None => None,
        };
        let texcoord = match raw.texcoord {
            Some(i) => Some(resolve(i, self.texcoords.len(), AttributeKind::TexCoord)?),
            None => None,
        };

        Ok(Corner {
            position,
            normal,
            texcoord,
        })
    }

    /// Adds a face as a triangle fan around its first corner.
    /// Returns the number of triangles added (`corners.len() - 2`).
    pub fn add_face(&mut self, corners: &[Corner], source_line: usize) -> Result<usize> {
        if corners.len() < 3 {
            return Err(Error::NotEnoughData {
                found: corners.len(),
                expected: 3,
            });
        }

        let mut triangle = Triangle {
            corners: [corners[0], corners[1], corners[2]],
            material_id: self.material_id,
            object_id: self.object_id,
            material_name: self.material_name.clone(),
            group_name: self.group_name.clone(),
            object_name: self.object_name.clone(),
            source_line,
        };
        for &corner in &corners[3..] {
            let next = triangle.fan(corner);
            self.triangles.push(triangle);
            triangle = next;
        }
        self.triangles.push(triangle);

        Ok(corners.len() - 2)
    }

    /// Drops triangles referencing elements that were never defined.
    /// Returns the source line and cause of each dropped triangle.
    pub fn remove_invalid_triangles(&mut self) -> Vec<(usize, Error)> {
        let lens = (
            self.positions.len(),
            self.normals.len(),
            self.texcoords.len(),
        );
        let needs_normals = self.has_normals();
        let needs_texcoords = self.has_texcoords();

        let mut dropped = vec![];
        self.triangles.retain(|triangle| {
            let checked = triangle
                .corners
                .iter()
                .try_for_each(|c| check_corner(c, lens, needs_normals, needs_texcoords));
            match checked {
                Ok(()) => true,
                Err(e) => {
                    dropped.push((triangle.source_line, e));
                    false
                }
            }
        });

        dropped
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn texcoords(&self) -> &[Vec2] {
        &self.texcoords
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// True once any face has been read.
    pub fn has_positions(&self) -> bool {
        self.face_format.is_some()
    }

    pub fn has_normals(&self) -> bool {
        self.face_format.map_or(false, FaceFormat::has_normals)
    }

    pub fn has_texcoords(&self) -> bool {
        self.face_format.map_or(false, FaceFormat::has_texcoords)
    }
}

fn check_corner(
    corner: &Corner,
    (positions, normals, texcoords): (usize, usize, usize),
    needs_normals: bool,
    needs_texcoords: bool,
) -> Result<()> {
    let check = |index: Option<usize>, len: usize, attribute: AttributeKind| match index {
        Some(index) if index < len => Ok(()),
        Some(index) => Err(Error::IndexOutOfRange {
            attribute,
            index,
            len,
        }),
        None => Err(Error::IndexOutOfRange {
            attribute,
            index: len,
            len,
        }),
    };

    check(Some(corner.position), positions, AttributeKind::Position)?;
    if needs_normals {
        check(corner.normal, normals, AttributeKind::Normal)?;
    }
    if needs_texcoords {
        check(corner.texcoord, texcoords, AttributeKind::TexCoord)?;
    }
    Ok(())
}
