//! GPU へのアップロードと描画に関係するモジュール。

use crate::{
    model::ObjModel,
    packing::{PackedBuffers, VertexLayout},
};
use std::{borrow::Cow, convert::TryFrom, mem::size_of};

use anyhow::{bail, format_err, Context, Result};
use glium::{
    backend::Facade,
    index::{IndexBuffer, NoIndices, PrimitiveType},
    uniforms::Uniforms,
    vertex::{AttributeType, VertexBuffer, VertexBufferAny, VertexFormat},
    DrawParameters, GlObject, Program, Surface,
};
use log::{debug, info};

/// Fixed vertex attribute slots. Shaders see them under `name()`, at `location()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSlot {
    Position,
    Normal,
    TexCoord,
    MaterialId,
    ObjectId,
}

impl AttributeSlot {
    pub fn location(self) -> u32 {
        match self {
            AttributeSlot::Position => 0,
            AttributeSlot::Normal => 1,
            AttributeSlot::TexCoord => 2,
            AttributeSlot::MaterialId => 3,
            AttributeSlot::ObjectId => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AttributeSlot::Position => "position",
            AttributeSlot::Normal => "normal",
            AttributeSlot::TexCoord => "texcoord",
            AttributeSlot::MaterialId => "material_id",
            AttributeSlot::ObjectId => "object_id",
        }
    }

    pub fn components(self) -> usize {
        match self {
            AttributeSlot::Position | AttributeSlot::Normal => 3,
            AttributeSlot::TexCoord => 2,
            AttributeSlot::MaterialId | AttributeSlot::ObjectId => 1,
        }
    }

    fn attribute_type(self) -> AttributeType {
        match self.components() {
            1 => AttributeType::F32,
            2 => AttributeType::F32F32,
            _ => AttributeType::F32F32F32,
        }
    }
}

/// Where one attribute lives inside a packed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeBinding {
    pub slot: AttributeSlot,

    /// Byte offset from the start of a row.
    pub offset: usize,

    /// Byte distance between rows.
    pub stride: usize,
}

/// Bindings for every attribute present in `layout`. Absent ones are skipped.
pub fn attribute_bindings(
    layout: VertexLayout,
    material_ids: bool,
    object_ids: bool,
) -> Vec<AttributeBinding> {
    let stride = layout.stride();
    let candidates = [
        (AttributeSlot::Position, Some(layout.position_offset())),
        (AttributeSlot::Normal, layout.normal_offset()),
        (AttributeSlot::TexCoord, layout.texcoord_offset()),
        (
            AttributeSlot::MaterialId,
            Some(layout.material_id_offset()).filter(|_| material_ids),
        ),
        (
            AttributeSlot::ObjectId,
            Some(layout.object_id_offset()).filter(|_| object_ids),
        ),
    ];

    candidates
        .iter()
        .filter_map(|&(slot, offset)| {
            offset.map(|offset| AttributeBinding {
                slot,
                offset,
                stride,
            })
        })
        .collect()
}

/// glium の頂点フォーマットに変換する。
pub fn vertex_format(bindings: &[AttributeBinding]) -> VertexFormat {
    let attributes: Vec<_> = bindings
        .iter()
        .map(|b| {
            (
                Cow::Borrowed(b.slot.name()),
                b.offset,
                b.slot.attribute_type(),
                false,
            )
        })
        .collect();
    Cow::Owned(attributes)
}

/// Remembers the bindings made for the last shader, rebinding only when it changes.
#[derive(Debug, Clone)]
pub struct BindingCache<K> {
    key: Option<K>,
    bindings: Vec<AttributeBinding>,
    rebind_count: usize,
}

impl<K> Default for BindingCache<K> {
    fn default() -> BindingCache<K> {
        BindingCache {
            key: None,
            bindings: vec![],
            rebind_count: 0,
        }
    }
}

impl<K: PartialEq> BindingCache<K> {
    pub fn new() -> BindingCache<K> {
        Default::default()
    }

    /// Returns the bindings for `key`, calling `bind` if `key` is not the cached shader.
    pub fn get_or_bind(
        &mut self,
        key: K,
        bind: impl FnOnce() -> Result<Vec<AttributeBinding>>,
    ) -> Result<&[AttributeBinding]> {
        if self.key.as_ref() != Some(&key) {
            self.key = None;
            self.bindings = bind()?;
            self.key = Some(key);
            self.rebind_count += 1;
        }
        Ok(&self.bindings)
    }

    /// How many times `bind` has run.
    pub fn rebind_count(&self) -> usize {
        self.rebind_count
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}

/// CPU-side staging buffers plus what the GPU side needs to know about them.
#[derive(Debug, Clone)]
pub struct PackedMesh {
    buffers: PackedBuffers,
    triangle_count: u32,
    has_positions: bool,
    material_ids: bool,
    object_ids: bool,
}

impl From<ObjModel> for PackedMesh {
    fn from(model: ObjModel) -> PackedMesh {
        PackedMesh {
            triangle_count: model.triangle_count(),
            has_positions: model.has_positions(),
            material_ids: model.has_material_ids(),
            object_ids: model.has_object_ids(),
            buffers: model.into_packed(),
        }
    }
}

impl PackedMesh {
    pub fn buffers(&self) -> &PackedBuffers {
        &self.buffers
    }

    pub fn bindings(&self) -> Vec<AttributeBinding> {
        attribute_bindings(self.buffers.layout(), self.material_ids, self.object_ids)
    }

    /// VBO/IBO を作成する。ステージングバッファは転送後に解放される。
    pub fn upload<F: Facade + ?Sized>(self, facade: &F) -> Result<GpuModel> {
        if !self.has_positions {
            bail!("Model has no vertex positions");
        }

        let bindings = self.bindings();
        let format = vertex_format(&bindings);
        let (layout, vertices, indices) = self.buffers.into_parts();

        let vertex_buffer = match layout.components() {
            5 => upload_rows::<F, 5>(facade, &vertices, format)?,
            7 => upload_rows::<F, 7>(facade, &vertices, format)?,
            8 => upload_rows::<F, 8>(facade, &vertices, format)?,
            10 => upload_rows::<F, 10>(facade, &vertices, format)?,
            n => bail!("Unsupported row size: {} floats", n),
        };
        let index_buffer = match indices {
            Some(indices) => Some(
                IndexBuffer::new(facade, PrimitiveType::TrianglesList, &indices)
                    .context("Failed to create the index buffer")?,
            ),
            None => None,
        };
        info!(
            "Uploaded {} rows, {} indices",
            vertices.len() / layout.components(),
            index_buffer.as_ref().map_or(0, |b| b.len())
        );

        Ok(GpuModel {
            vertex_buffer,
            index_buffer,
            bindings,
            triangle_count: self.triangle_count,
            cache: BindingCache::new(),
        })
    }
}

fn upload_rows<F: Facade + ?Sized, const N: usize>(
    facade: &F,
    vertices: &[f32],
    format: VertexFormat,
) -> Result<VertexBufferAny> {
    let rows = vertices
        .chunks_exact(N)
        .map(|row| <[f32; N]>::try_from(row))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // Every offset in `format` lies inside an N-float row.
    let buffer = unsafe { VertexBuffer::new_raw(facade, &rows, format, N * size_of::<f32>()) }
        .context("Failed to create the vertex buffer")?;
    Ok(buffer.into())
}

type ShaderId = <Program as GlObject>::Id;

/// VBO/IBO 化したモデルの情報を表す。
#[derive(Debug)]
pub struct GpuModel {
    vertex_buffer: VertexBufferAny,
    index_buffer: Option<IndexBuffer<u32>>,
    bindings: Vec<AttributeBinding>,
    triangle_count: u32,
    cache: BindingCache<ShaderId>,
}

impl GpuModel {
    pub fn triangle_count(&self) -> u32 {
        self.triangle_count
    }

    /// VBO を返す。
    pub fn vertex_buffer(&self) -> &VertexBufferAny {
        &self.vertex_buffer
    }

    /// IBO を返す。
    pub fn index_buffer(&self) -> Option<&IndexBuffer<u32>> {
        self.index_buffer.as_ref()
    }

    /// Binds the present attributes for `program`. Attributes the shader does
    /// not declare are still passed; the shader just never reads them.
    pub fn bind(&mut self, program: &Program) -> Result<&[AttributeBinding]> {
        let bindings = &self.bindings;
        self.cache.get_or_bind(program.get_id(), || {
            for binding in bindings {
                if program.get_attribute(binding.slot.name()).is_none() {
                    debug!("Shader does not use attribute '{}'", binding.slot.name());
                }
            }
            Ok(bindings.clone())
        })
    }

    pub fn draw<S: Surface, U: Uniforms>(
        &mut self,
        surface: &mut S,
        program: &Program,
        uniforms: &U,
        parameters: &DrawParameters,
    ) -> Result<()> {
        self.bind(program)?;
        match &self.index_buffer {
            Some(indices) => {
                surface.draw(&self.vertex_buffer, indices, program, uniforms, parameters)?
            }
            None => surface.draw(
                &self.vertex_buffer,
                NoIndices(PrimitiveType::TrianglesList),
                program,
                uniforms,
                parameters,
            )?,
        }
        Ok(())
    }

    /// Draws `instances.len()` copies, feeding `instances` as per-instance attributes.
    pub fn draw_instanced<S: Surface, U: Uniforms, T: Copy + Send + 'static>(
        &mut self,
        surface: &mut S,
        program: &Program,
        uniforms: &U,
        parameters: &DrawParameters,
        instances: &VertexBuffer<T>,
    ) -> Result<()> {
        self.bind(program)?;
        let per_instance = instances
            .per_instance()
            .map_err(|_| format_err!("Instanced drawing is not supported"))?;

        match &self.index_buffer {
            Some(indices) => surface.draw(
                (&self.vertex_buffer, per_instance),
                indices,
                program,
                uniforms,
                parameters,
            )?,
            None => surface.draw(
                (&self.vertex_buffer, per_instance),
                NoIndices(PrimitiveType::TrianglesList),
                program,
                uniforms,
                parameters,
            )?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(bindings: &[AttributeBinding]) -> Vec<AttributeSlot> {
        bindings.iter().map(|b| b.slot).collect()
    }

    #[test]
    fn absent_attributes_are_not_bound() {
        let bare = attribute_bindings(VertexLayout::new(false, false), true, true);
        assert_eq!(
            slots(&bare),
            vec![
                AttributeSlot::Position,
                AttributeSlot::MaterialId,
                AttributeSlot::ObjectId
            ]
        );
        assert!(bare.iter().all(|b| b.stride == 20));

        let full = attribute_bindings(VertexLayout::new(true, true), false, false);
        assert_eq!(
            slots(&full),
            vec![
                AttributeSlot::Position,
                AttributeSlot::Normal,
                AttributeSlot::TexCoord
            ]
        );
        assert_eq!(full[1].offset, 20);
        assert_eq!(full[2].offset, 32);
    }

    #[test]
    fn vertex_format_uses_slot_names_and_offsets() {
        let bindings = attribute_bindings(VertexLayout::new(false, true), true, false);
        let format = vertex_format(&bindings);
        let names: Vec<_> = format.iter().map(|a| (&a.0[..], a.1)).collect();
        assert_eq!(
            names,
            vec![("position", 8), ("texcoord", 20), ("material_id", 0)]
        );
        assert!(matches!(format[1].2, AttributeType::F32F32));
        assert!(matches!(format[2].2, AttributeType::F32));
    }

    #[test]
    fn binding_is_memoized_per_shader() {
        let layout = VertexLayout::new(true, false);
        let mut cache = BindingCache::new();

        for _ in 0..3 {
            let bound = cache
                .get_or_bind(1u32, || Ok(attribute_bindings(layout, true, true)))
                .unwrap();
            assert_eq!(bound.len(), 4);
        }
        assert_eq!(cache.rebind_count(), 1);

        cache
            .get_or_bind(2, || Ok(attribute_bindings(layout, false, false)))
            .unwrap();
        assert_eq!(cache.rebind_count(), 2);

        assert!(cache.get_or_bind(3, || bail!("link failed")).is_err());
        cache
            .get_or_bind(3, || Ok(attribute_bindings(layout, true, true)))
            .unwrap();
        assert_eq!(cache.rebind_count(), 3);

        cache.invalidate();
        cache.get_or_bind(3, || Ok(vec![])).unwrap();
        assert_eq!(cache.rebind_count(), 4);
    }
}
