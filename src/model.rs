//! インポート済みモデルに関係するモジュール。

use crate::{
    packing::{self, PackedBuffers, PackingMode, VertexLayout},
    wavefront_obj::{
        base_directory_of, Diagnostic, Error, MaterialRegistry, Mesh, ObjParser, Result, Triangle,
    },
};
use std::{
    fs::File,
    io::{prelude::*, BufReader},
    path::{Path, PathBuf},
};

use log::info;
use ultraviolet::{Vec2, Vec3};

/// Import-time switches. `Default` turns everything off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ImportOptions {
    /// Scale so that the largest half-extent is 1.
    pub unitize: bool,

    /// Move the bounding box center to the origin.
    pub center: bool,

    /// Share rows between identical corners and emit an index buffer.
    pub compact: bool,

    /// Do not load `.mtl` files; every material id is 0.
    pub no_materials: bool,

    /// Do not track `o` records; every object id is 0.
    pub no_objects: bool,
}

impl ImportOptions {
    pub fn unitized(mut self) -> ImportOptions {
        self.unitize = true;
        self
    }

    pub fn centered(mut self) -> ImportOptions {
        self.center = true;
        self
    }

    pub fn compact_storage(mut self) -> ImportOptions {
        self.compact = true;
        self
    }

    pub fn without_materials(mut self) -> ImportOptions {
        self.no_materials = true;
        self
    }

    pub fn without_objects(mut self) -> ImportOptions {
        self.no_objects = true;
        self
    }

    pub fn packing_mode(&self) -> PackingMode {
        if self.compact {
            PackingMode::Compact
        } else {
            PackingMode::Naive
        }
    }
}

/// An imported OBJ model: the parsed mesh and its packed vertex rows.
#[derive(Debug, Clone)]
pub struct ObjModel {
    mesh: Mesh,
    packed: PackedBuffers,
    options: ImportOptions,
    diagnostics: Vec<Diagnostic>,
    material_libraries: Vec<PathBuf>,
}

impl ObjModel {
    /// Imports an OBJ file. `mtllib` paths are resolved next to it.
    /// Fails only when the file cannot be opened or read.
    pub fn import_file(
        path: impl AsRef<Path>,
        options: ImportOptions,
        registry: &mut MaterialRegistry,
    ) -> Result<ObjModel> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::FileOpen {
            path: path.to_owned(),
            source,
        })?;
        info!("Importing {}", path.display());

        ObjModel::import_reader(
            BufReader::new(file),
            &path.to_string_lossy(),
            base_directory_of(path),
            options,
            registry,
        )
    }

    /// Imports OBJ text from `reader`.
    /// `file_name` labels diagnostics; `base_directory` is where `mtllib` paths are looked up.
    pub fn import_reader(
        reader: impl BufRead,
        file_name: &str,
        base_directory: impl Into<PathBuf>,
        options: ImportOptions,
        registry: &mut MaterialRegistry,
    ) -> Result<ObjModel> {
        let parsed = ObjParser::new(options, registry, base_directory).parse(reader, file_name)?;

        let mut packed = packing::pack(&parsed.mesh, options.packing_mode());
        packed.normalize(options.center, options.unitize);
        info!(
            "Packed {} triangles into {} rows ({:?}, {} bytes per row)",
            parsed.mesh.triangle_count(),
            packed.row_count(),
            options.packing_mode(),
            packed.layout().stride()
        );

        Ok(ObjModel {
            mesh: parsed.mesh,
            packed,
            options,
            diagnostics: parsed.diagnostics,
            material_libraries: parsed.material_libraries,
        })
    }

    pub fn triangle_count(&self) -> u32 {
        self.mesh.triangle_count() as u32
    }

    pub fn options(&self) -> ImportOptions {
        self.options
    }

    pub fn packed(&self) -> &PackedBuffers {
        &self.packed
    }

    pub fn layout(&self) -> VertexLayout {
        self.packed.layout()
    }

    /// Gives up the parsed data, keeping only the staging buffers for upload.
    pub fn into_packed(self) -> PackedBuffers {
        self.packed
    }

    pub fn has_positions(&self) -> bool {
        self.mesh.has_positions()
    }

    pub fn has_normals(&self) -> bool {
        self.layout().has_normals()
    }

    pub fn has_texcoords(&self) -> bool {
        self.layout().has_texcoords()
    }

    pub fn has_material_ids(&self) -> bool {
        !self.options.no_materials
    }

    pub fn has_object_ids(&self) -> bool {
        !self.options.no_objects
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn positions(&self) -> &[Vec3] {
        self.mesh.positions()
    }

    pub fn normals(&self) -> &[Vec3] {
        self.mesh.normals()
    }

    pub fn texcoords(&self) -> &[Vec2] {
        self.mesh.texcoords()
    }

    pub fn triangles(&self) -> &[Triangle] {
        self.mesh.triangles()
    }

    /// Object names in id order.
    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.mesh.objects().names()
    }

    /// Recoverable problems, in the order they were found.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn material_libraries(&self) -> &[PathBuf] {
        &self.material_libraries
    }
}
