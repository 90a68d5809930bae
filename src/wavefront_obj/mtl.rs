//! .mtl ファイルの読み込みと、マテリアル名から ID を引くレジストリ。

use super::{Error, Result};
use crate::tokenizer::{LineReader, Tokens};
use std::{
    collections::HashMap,
    fs::File,
    io::{prelude::*, BufReader},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use ultraviolet::Vec3;

/// ID of the built-in material every registry starts with.
pub const DEFAULT_MATERIAL_ID: u32 = 0;

/// Wavefront MTL のマテリアルの値を表す。
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialProperty {
    /// `Ns`, `Ni`, `d` などの小数値
    Float(f32),

    /// `illum` などの整数値
    Integer(u32),

    /// `Kd` などの Vec3 値
    Vector(Vec3),

    /// `map_Kd` などのパス情報
    Path(Box<Path>),
}

/// .mtl ファイルで定義されるマテリアル情報を表す。
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    name: String,
    properties: HashMap<String, MaterialProperty>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Material {
        Material {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    /// The material used by faces that precede any `usemtl`.
    pub fn default_material() -> Material {
        let mut material = Material::new("__default__");
        material.set("Ka", MaterialProperty::Vector(Vec3::new(0.1, 0.1, 0.1)));
        material.set("Kd", MaterialProperty::Vector(Vec3::new(0.8, 0.8, 0.8)));
        material.set("Ks", MaterialProperty::Vector(Vec3::zero()));
        material.set("Ns", MaterialProperty::Float(0.0));
        material.set("d", MaterialProperty::Float(1.0));
        material.set("Ni", MaterialProperty::Float(1.0));
        material
    }

    /// マテリアル名を返す。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Ka` の値を返す。
    pub fn ambient_color(&self) -> Option<Vec3> {
        self.vector("Ka")
    }

    /// `Kd` の値を返す。
    pub fn diffuse_color(&self) -> Option<Vec3> {
        self.vector("Kd")
    }

    /// `Ks` の値を返す。
    pub fn specular_color(&self) -> Option<Vec3> {
        self.vector("Ks")
    }

    /// `Tf` の値を返す。
    pub fn transmission_filter(&self) -> Option<Vec3> {
        self.vector("Tf")
    }

    /// `Ns` の値を返す。
    pub fn shininess(&self) -> Option<f32> {
        self.float("Ns")
    }

    /// `d` の値を返す。
    pub fn dissolve(&self) -> Option<f32> {
        self.float("d")
    }

    /// `Ni` の値を返す。
    pub fn index_of_refraction(&self) -> Option<f32> {
        self.float("Ni")
    }

    /// `illum` の値を返す。
    pub fn illumination(&self) -> Option<u32> {
        match self.properties.get("illum") {
            Some(MaterialProperty::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    /// `map_Kd` の値を返す。
    pub fn diffuse_map(&self) -> Option<&Path> {
        self.path("map_Kd")
    }

    /// `map_Ka` の値を返す。
    pub fn ambient_map(&self) -> Option<&Path> {
        self.path("map_Ka")
    }

    /// `map_Ks` の値を返す。
    pub fn specular_map(&self) -> Option<&Path> {
        self.path("map_Ks")
    }

    /// マテリアルの値を取得する。
    pub fn get(&self, key: &str) -> Option<&MaterialProperty> {
        self.properties.get(key)
    }

    pub fn set(&mut self, key: &str, value: MaterialProperty) {
        self.properties.insert(key.to_owned(), value);
    }

    fn vector(&self, key: &str) -> Option<Vec3> {
        match self.properties.get(key) {
            Some(MaterialProperty::Vector(v)) => Some(*v),
            _ => None,
        }
    }

    fn float(&self, key: &str) -> Option<f32> {
        match self.properties.get(key) {
            Some(MaterialProperty::Float(v)) => Some(*v),
            _ => None,
        }
    }

    fn path(&self, key: &str) -> Option<&Path> {
        match self.properties.get(key) {
            Some(MaterialProperty::Path(v)) => Some(v),
            _ => None,
        }
    }
}

/// Materials known to a scene, addressed by insertion-ordered ids.
///
/// Id 0 is always the default material. Pass the same registry to every
/// import of a scene so that material ids are shared between models.
#[derive(Debug, Clone)]
pub struct MaterialRegistry {
    materials: Vec<Material>,
    ids: HashMap<String, u32>,
    libraries: Vec<PathBuf>,
}

impl Default for MaterialRegistry {
    fn default() -> MaterialRegistry {
        MaterialRegistry::new()
    }
}

impl MaterialRegistry {
    pub fn new() -> MaterialRegistry {
        MaterialRegistry {
            materials: vec![Material::default_material()],
            ids: HashMap::new(),
            libraries: vec![],
        }
    }

    /// Registers a material and returns its id.
    /// A name defined twice keeps resolving to its first definition.
    pub fn add(&mut self, material: Material) -> u32 {
        let id = self.materials.len() as u32;
        if self.ids.contains_key(material.name()) {
            warn!("Material \"{}\" is defined more than once", material.name());
        } else {
            self.ids.insert(material.name().to_owned(), id);
        }
        self.materials.push(material);
        id
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    pub fn get(&self, id: u32) -> Option<&Material> {
        self.materials.get(id as usize)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Paths of the libraries loaded so far.
    pub fn libraries(&self) -> &[PathBuf] {
        &self.libraries
    }

    /// Loads a .mtl file. Returns the number of materials added.
    /// A library already loaded into this registry is not read again.
    pub fn load_library(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if self.libraries.iter().any(|p| p == path) {
            debug!("Material library \"{}\" already loaded", path.display());
            return Ok(0);
        }

        let file = File::open(path).map_err(|source| Error::FileOpen {
            path: path.to_owned(),
            source,
        })?;
        let added = self.parse_library(BufReader::new(file), &path.to_string_lossy())?;
        self.libraries.push(path.to_owned());
        Ok(added)
    }

    /// Parses MTL text from `reader`. Returns the number of materials added.
    pub fn parse_library(&mut self, reader: impl BufRead, file_name: &str) -> Result<usize> {
        let mut reader = LineReader::new(reader, file_name);
        let mut buffer = MtlBuffer::default();

        while reader.read_next_line(true)? {
            let mut tokens = reader.tokens();
            let keyword = match tokens.next_token() {
                Some(k) => k,
                None => continue,
            };
            if let Err(e) = buffer.process_line(keyword, tokens) {
                warn!(
                    "{}:{}: Skipping '{}': {}",
                    reader.file_name(),
                    reader.line_number(),
                    keyword,
                    e
                );
            }
        }
        buffer.commit_material();

        let added = buffer.complete_materials.len();
        for material in buffer.complete_materials {
            self.add(material);
        }
        Ok(added)
    }
}

#[derive(Debug, Default)]
struct MtlBuffer {
    current: Option<Material>,
    complete_materials: Vec<Material>,
}

impl MtlBuffer {
    fn commit_material(&mut self) {
        if let Some(material) = self.current.take() {
            self.complete_materials.push(material);
        }
    }

    fn process_line(&mut self, keyword: &str, mut data: Tokens) -> Result<()> {
        if keyword == "newmtl" {
            self.commit_material();
            let name = data.next_token().unwrap_or("");
            self.current = Some(Material::new(name));
            return Ok(());
        }

        let material = match self.current.as_mut() {
            Some(m) => m,
            None => {
                warn!("MTL keyword '{}' appears before any newmtl", keyword);
                return Ok(());
            }
        };

        match keyword {
            "illum" => {
                let value = data.next_unsigned().map_err(|_| not_enough(0, 1))?;
                material.set(keyword, MaterialProperty::Integer(value));
            }
            "Ka" | "Kd" | "Ks" | "Ke" | "Tf" => {
                let value = take_vec3(data)?;
                material.set(keyword, MaterialProperty::Vector(value));
            }
            "Ns" | "Ni" | "d" | "Tr" | "sharpness" => {
                let value = data.next_float().map_err(|_| not_enough(0, 1))?;
                material.set(keyword, MaterialProperty::Float(value));
            }
            k if k.starts_with("map_") || k == "bump" || k == "disp" => {
                skip_map_options(&mut data);
                let filename = data.remainder().replace("\\\\", "\\");
                material.set(
                    k,
                    MaterialProperty::Path(PathBuf::from(filename).into_boxed_path()),
                );
            }
            _ => {
                warn!("Unsupported MTL keyword: {}", keyword);
            }
        }
        Ok(())
    }
}

/// Skips texture options such as `-bm 1.0` or `-o 0 0.5` preceding the file name.
fn skip_map_options(data: &mut Tokens) {
    while let Some(option) = data.peek_token() {
        let (min_args, max_args) = match option {
            "-blendu" | "-blendv" | "-bm" | "-boost" | "-cc" | "-clamp" | "-imfchan"
            | "-texres" | "-type" => (1, 1),
            "-mm" => (2, 2),
            "-o" | "-s" | "-t" => (1, 3),
            _ => return,
        };
        data.next_token();
        for i in 0..max_args {
            let is_number = data.peek_token().map_or(false, |t| t.parse::<f32>().is_ok());
            if i >= min_args && !is_number {
                break;
            }
            data.next_token();
        }
    }
}

fn not_enough(found: usize, expected: usize) -> Error {
    Error::NotEnoughData { found, expected }
}

/// Takes three floats; a single value is spread to all components (`Kd 0.5`).
fn take_vec3(mut data: Tokens) -> Result<Vec3> {
    let x = data.next_float().map_err(|_| not_enough(0, 3))?;
    let y = match data.next_float() {
        Ok(y) => y,
        Err(_) => return Ok(Vec3::new(x, x, x)),
    };
    let z = data.next_float().map_err(|_| not_enough(2, 3))?;
    Ok(Vec3::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LIBRARY: &str = "\
# two materials
newmtl red
Ka 0.1 0 0
Kd 1 0 0
Ns 32
illum 2
map_Kd textures\\\\red.png

newmtl grey
Kd 0.5
d 0.25
map_bump -bm 0.5 bump.png
map_Ka -o 0.5 0.5 -clamp on my texture.png
";

    #[test]
    fn default_material_has_id_zero() {
        let registry = MaterialRegistry::new();
        assert_eq!(registry.len(), 1);
        let default = registry.get(DEFAULT_MATERIAL_ID).unwrap();
        assert_eq!(default.dissolve(), Some(1.0));
        assert_eq!(registry.id_of(default.name()), None);
    }

    #[test]
    fn parses_materials_in_order() {
        let mut registry = MaterialRegistry::new();
        let added = registry
            .parse_library(Cursor::new(LIBRARY), "two.mtl")
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(registry.id_of("red"), Some(1));
        assert_eq!(registry.id_of("grey"), Some(2));
        assert_eq!(registry.id_of("blue"), None);

        let red = registry.get(1).unwrap();
        assert_eq!(red.diffuse_color(), Some(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(red.ambient_color(), Some(Vec3::new(0.1, 0.0, 0.0)));
        assert_eq!(red.shininess(), Some(32.0));
        assert_eq!(red.illumination(), Some(2));
        assert_eq!(red.diffuse_map(), Some(Path::new("textures\\red.png")));

        let grey = registry.get(2).unwrap();
        assert_eq!(grey.diffuse_color(), Some(Vec3::new(0.5, 0.5, 0.5)));
        assert_eq!(grey.dissolve(), Some(0.25));
        assert!(matches!(
            grey.get("map_bump"),
            Some(MaterialProperty::Path(p)) if &**p == Path::new("bump.png")
        ));
        assert_eq!(grey.ambient_map(), Some(Path::new("my texture.png")));
    }

    #[test]
    fn malformed_properties_are_skipped() {
        let mut registry = MaterialRegistry::new();
        let source = "Kd 1 1 1\nnewmtl broken\nKd\nNs abc\nKs 0 0 0\n";
        let added = registry
            .parse_library(Cursor::new(source), "broken.mtl")
            .unwrap();
        assert_eq!(added, 1);
        let broken = registry.get(1).unwrap();
        assert_eq!(broken.diffuse_color(), None);
        assert_eq!(broken.shininess(), None);
        assert_eq!(broken.specular_color(), Some(Vec3::zero()));
    }

    #[test]
    fn duplicate_names_keep_first_id() {
        let mut registry = MaterialRegistry::new();
        registry.add(Material::new("a"));
        registry.add(Material::new("a"));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.id_of("a"), Some(1));
    }

    #[test]
    fn missing_library_is_an_error() {
        let mut registry = MaterialRegistry::new();
        let result = registry.load_library("definitely/not/here.mtl");
        assert!(matches!(result, Err(Error::FileOpen { .. })));
        assert!(registry.libraries().is_empty());
    }
}
