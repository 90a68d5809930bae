//! .obj ファイルのパーサー。行ごとにキーワードで分岐して `Mesh` に蓄積する。

use super::{
    AttributeKind, Corner, Diagnostic, DiagnosticKind, Error, MaterialRegistry, Mesh, Result,
};
use crate::{
    model::ImportOptions,
    tokenizer::{LineReader, TokenError, Tokens},
};
use std::{
    io::prelude::*,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use ultraviolet::{Vec2, Vec3};

/// Result of parsing one OBJ source.
#[derive(Debug, Clone)]
pub struct ParsedObj {
    pub mesh: Mesh,
    pub diagnostics: Vec<Diagnostic>,

    /// Every path named by `mtllib`, resolved against the OBJ's directory.
    pub material_libraries: Vec<PathBuf>,
}

/// .obj ファイルのパーサー。
#[derive(Debug)]
pub struct ObjParser<'a> {
    options: ImportOptions,
    registry: &'a mut MaterialRegistry,
    base_directory: PathBuf,
    file_name: Box<str>,
    mesh: Mesh,
    diagnostics: Vec<Diagnostic>,
    material_libraries: Vec<PathBuf>,
}

impl<'a> ObjParser<'a> {
    /// `base_directory` is where `mtllib` paths are looked up.
    pub fn new(
        options: ImportOptions,
        registry: &'a mut MaterialRegistry,
        base_directory: impl Into<PathBuf>,
    ) -> ObjParser<'a> {
        ObjParser {
            options,
            registry,
            base_directory: base_directory.into(),
            file_name: "".into(),
            mesh: Mesh::new(),
            diagnostics: vec![],
            material_libraries: vec![],
        }
    }

    /// Reads the whole source. Only I/O failures abort; everything else is
    /// recorded as a diagnostic and the offending record is skipped.
    pub fn parse(mut self, reader: impl BufRead, file_name: &str) -> Result<ParsedObj> {
        self.file_name = file_name.into();
        let mut reader = LineReader::new(reader, file_name);

        while reader.read_next_line(true)? {
            let line = reader.line_number();
            let mut tokens = reader.tokens();
            let keyword = match tokens.next_lowercase_token() {
                Some(k) => k,
                None => continue,
            };
            self.process_line(&keyword, tokens, line);
        }
        reader.close();

        for (line, error) in self.mesh.remove_invalid_triangles() {
            let kind = match error {
                Error::IndexOutOfRange {
                    attribute,
                    index,
                    len,
                } => DiagnosticKind::IndexOutOfRange {
                    attribute,
                    index,
                    len,
                },
                e => DiagnosticKind::InvalidCorner {
                    token: "".into(),
                    reason: e.to_string().into(),
                },
            };
            self.report(line, kind);
        }

        info!(
            "Parsed {}: {} positions, {} normals, {} texture coords, {} triangles",
            self.file_name,
            self.mesh.positions().len(),
            self.mesh.normals().len(),
            self.mesh.texcoords().len(),
            self.mesh.triangle_count()
        );

        Ok(ParsedObj {
            mesh: self.mesh,
            diagnostics: self.diagnostics,
            material_libraries: self.material_libraries,
        })
    }

    fn process_line(&mut self, keyword: &str, mut data: Tokens, line: usize) {
        match keyword {
            "v" => {
                let position = self.take_vec3(data, keyword, line);
                self.mesh.add_position(position);
            }
            "vn" => {
                let normal = self.take_vec3(data, keyword, line);
                self.mesh.add_normal(normal);
            }
            "vt" => {
                let texcoord = self.take_vec2(data, keyword, line);
                self.mesh.add_texcoord(texcoord);
            }
            "mtllib" => self.process_material_library(data, line),
            "o" => {
                let name = data.next_token().unwrap_or("");
                self.mesh.set_object(name, !self.options.no_objects);
            }
            "g" => self.mesh.set_group(data.next_token()),
            "usemtl" => self.process_use_material(data, line),
            "s" => (),
            "f" => self.process_face(data, line),
            _ => self.report(line, DiagnosticKind::UnknownKeyword(keyword.into())),
        }
    }

    fn process_material_library(&mut self, data: Tokens, line: usize) {
        for name in data {
            let path = self.base_directory.join(name);
            self.material_libraries.push(path.clone());
            if self.options.no_materials {
                continue;
            }

            match self.registry.load_library(&path) {
                Ok(count) => debug!("Loaded {} materials from {}", count, path.display()),
                Err(e) => {
                    debug!("{}", e);
                    self.report(line, DiagnosticKind::MaterialLibraryUnavailable(path));
                }
            }
        }
    }

    fn process_use_material(&mut self, mut data: Tokens, line: usize) {
        let name = data.next_token().unwrap_or("");
        if self.options.no_materials {
            self.mesh.set_material(name, None);
            return;
        }

        let id = self.registry.id_of(name);
        if id.is_none() {
            self.report(line, DiagnosticKind::UnknownMaterial(name.into()));
        }
        self.mesh.set_material(name, id);
    }

    fn process_face(&mut self, data: Tokens, line: usize) {
        let found = data.remaining_count();
        let first = match data.peek_token() {
            Some(token) if found >= 3 => token,
            _ => {
                self.report(line, DiagnosticKind::CorruptFace { found });
                return;
            }
        };
        let format = self.mesh.detect_face_format(first);

        let mut corners: Vec<Corner> = Vec::with_capacity(found);
        let mut zeros = vec![];
        for token in data {
            let resolved = format
                .parse_corner(token)
                .and_then(|raw| self.mesh.resolve_corner(raw, |a| zeros.push(a)));
            match resolved {
                Ok(corner) => corners.push(corner),
                Err(e) => {
                    self.report_zero_indices(&zeros, line);
                    self.report(
                        line,
                        DiagnosticKind::InvalidCorner {
                            token: token.into(),
                            reason: e.to_string().into(),
                        },
                    );
                    return;
                }
            }
        }
        self.report_zero_indices(&zeros, line);

        if let Err(e) = self.mesh.add_face(&corners, line) {
            warn!("{}:{}: {}", self.file_name, line, e);
        }
    }

    fn report_zero_indices(&mut self, zeros: &[AttributeKind], line: usize) {
        for &attribute in zeros {
            self.report(line, DiagnosticKind::ZeroIndex(attribute));
        }
    }

    fn take_vec3(&mut self, mut data: Tokens, keyword: &str, line: usize) -> Vec3 {
        let x = self.take_float(&mut data, keyword, line);
        let y = self.take_float(&mut data, keyword, line);
        let z = self.take_float(&mut data, keyword, line);
        Vec3::new(x, y, z)
    }

    /// A third `vt` component (w) is ignored.
    fn take_vec2(&mut self, mut data: Tokens, keyword: &str, line: usize) -> Vec2 {
        let u = self.take_float(&mut data, keyword, line);
        let v = self.take_float(&mut data, keyword, line);
        Vec2::new(u, v)
    }

    /// Missing or malformed values become `0.0`.
    fn take_float(&mut self, data: &mut Tokens, keyword: &str, line: usize) -> f32 {
        match data.next_float() {
            Ok(value) => value,
            Err(e) => {
                let token = match e {
                    TokenError::Missing => None,
                    TokenError::Malformed(token) => Some(token),
                };
                self.report(
                    line,
                    DiagnosticKind::MalformedNumber {
                        keyword: keyword.into(),
                        token,
                    },
                );
                0.0
            }
        }
    }

    fn report(&mut self, line: usize, kind: DiagnosticKind) {
        let diagnostic = Diagnostic {
            file: self.file_name.clone(),
            line,
            kind,
        };
        warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

/// Directory `mtllib` paths of `obj_path` are relative to.
pub fn base_directory_of(obj_path: &Path) -> PathBuf {
    obj_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavefront_obj::FaceFormat;
    use std::io::Cursor;

    fn parse_with(source: &str, options: ImportOptions) -> (ParsedObj, MaterialRegistry) {
        let mut registry = MaterialRegistry::new();
        let parsed = ObjParser::new(options, &mut registry, "")
            .parse(Cursor::new(source), "test.obj")
            .unwrap();
        (parsed, registry)
    }

    fn parse(source: &str) -> ParsedObj {
        parse_with(source, ImportOptions::default()).0
    }

    #[test]
    fn reads_attributes_and_vtn_faces() {
        let parsed = parse(
            "v 0 0 0\nv 1 0 0\nv 1 1 0\n\
             vt 0 0\nvt 1 0 0.5\nvt 1 1\n\
             vn 0 0 1\n\
             s off\n\
             f 1/1/1 2/2/1 3/3/1\n",
        );
        assert!(parsed.diagnostics.is_empty());

        let mesh = &parsed.mesh;
        assert_eq!(mesh.face_format(), Some(FaceFormat::VertexTextureNormal));
        assert_eq!(mesh.texcoords()[1], Vec2::new(1.0, 0.0));
        assert_eq!(mesh.triangle_count(), 1);

        let corners = mesh.triangles()[0].corners;
        for (i, corner) in corners.iter().enumerate() {
            assert_eq!(corner.position, i);
            assert_eq!(corner.texcoord, Some(i));
            assert_eq!(corner.normal, Some(0));
        }
    }

    #[test]
    fn short_face_is_skipped_with_diagnostic() {
        let parsed = parse("v 0 0 0\nv 1 0 0\nf 1 2\n");
        assert_eq!(parsed.mesh.triangle_count(), 0);
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].line, 3);
        assert_eq!(
            parsed.diagnostics[0].kind,
            DiagnosticKind::CorruptFace { found: 2 }
        );
        assert!(!parsed.mesh.has_positions());
    }

    #[test]
    fn unknown_keywords_and_bad_numbers_are_reported() {
        let parsed = parse("v 1 x\nvp 0.5\nv 0 0 0\nv 0 0 0\nf 1 2 3\n");
        let kinds: Vec<_> = parsed.diagnostics.iter().map(|d| &d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &DiagnosticKind::MalformedNumber {
                    keyword: "v".into(),
                    token: Some("x".into()),
                },
                &DiagnosticKind::MalformedNumber {
                    keyword: "v".into(),
                    token: None,
                },
                &DiagnosticKind::UnknownKeyword("vp".into()),
            ]
        );
        assert_eq!(parsed.mesh.positions()[0], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(parsed.mesh.triangle_count(), 1);
    }

    #[test]
    fn zero_index_warns_and_drops_triangle() {
        let parsed = parse("v 0 0 0\nv 1 0 0\nv 1 1 0\nf 1 2 0\nf 1 2 3\n");
        assert_eq!(parsed.mesh.triangle_count(), 1);
        assert_eq!(
            parsed.diagnostics[0].kind,
            DiagnosticKind::ZeroIndex(AttributeKind::Position)
        );
        assert_eq!(
            parsed.diagnostics[1].kind,
            DiagnosticKind::IndexOutOfRange {
                attribute: AttributeKind::Position,
                index: 3,
                len: 3,
            }
        );
        assert_eq!(parsed.diagnostics[1].line, 4);
    }

    #[test]
    fn corner_with_wrong_grammar_skips_face() {
        let parsed = parse("v 0 0 0\nv 1 0 0\nv 1 1 0\nf 1//1 2//1 3//1\nf 1 2 3\n");
        assert_eq!(parsed.mesh.face_format(), Some(FaceFormat::VertexNormal));
        assert_eq!(
            parsed.diagnostics[0].kind,
            DiagnosticKind::InvalidCorner {
                token: "1".into(),
                reason: "Invalid face vertex definition".into(),
            }
        );
    }

    #[test]
    fn corner_before_start_of_list_keeps_its_cause() {
        let parsed = parse("v 0 0 0\nv 1 0 0\nv 1 1 0\nf -4 -2 -1\n");
        assert_eq!(parsed.mesh.triangle_count(), 0);
        assert_eq!(
            parsed.diagnostics[0].kind,
            DiagnosticKind::InvalidCorner {
                token: "-4".into(),
                reason: "Invalid index definition".into(),
            }
        );
        assert_eq!(
            parsed.diagnostics[0].to_string(),
            "test.obj:4: Invalid face corner '-4': Invalid index definition"
        );
    }

    #[test]
    fn keywords_match_whole_words() {
        let mut registry = MaterialRegistry::new();
        registry
            .parse_library(Cursor::new("newmtl red\n"), "inline.mtl")
            .unwrap();
        let source = "v 0 0 0\nv 1 0 0\nv 1 1 0\n\
                      usemtl red\nusemap texture\nmg 1 0.5\nsp 1 2\nUSEMTL red\nf 1 2 3\n";
        let parsed = ObjParser::new(ImportOptions::default(), &mut registry, "")
            .parse(Cursor::new(source), "test.obj")
            .unwrap();

        let kinds: Vec<_> = parsed.diagnostics.iter().map(|d| &d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &DiagnosticKind::UnknownKeyword("usemap".into()),
                &DiagnosticKind::UnknownKeyword("mg".into()),
                &DiagnosticKind::UnknownKeyword("sp".into()),
            ]
        );
        assert!(parsed.material_libraries.is_empty());
        assert_eq!(parsed.mesh.triangles()[0].material_id, 1);
    }

    #[test]
    fn objects_are_tracked_unless_disabled() {
        let source = "v 0 0 0\nv 1 0 0\nv 1 1 0\n\
                      o first\nf 1 2 3\no second\nf 1 2 3\no first\nf 1 2 3\n";
        let parsed = parse(source);
        let ids: Vec<_> = parsed
            .mesh
            .triangles()
            .iter()
            .map(|t| t.object_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 0]);
        assert_eq!(parsed.mesh.objects().len(), 2);

        let (parsed, _) = parse_with(source, ImportOptions::default().without_objects());
        assert!(parsed.mesh.triangles().iter().all(|t| t.object_id == 0));
        assert!(parsed.mesh.objects().is_empty());
        assert_eq!(
            parsed.mesh.triangles()[1].object_name.as_deref(),
            Some("second")
        );
    }

    #[test]
    fn unknown_material_keeps_previous_id() {
        let mut registry = MaterialRegistry::new();
        registry
            .parse_library(Cursor::new("newmtl red\nKd 1 0 0\n"), "inline.mtl")
            .unwrap();
        let source = "v 0 0 0\nv 1 0 0\nv 1 1 0\n\
                      f 1 2 3\nusemtl red\nf 1 2 3\nusemtl UnknownName\nf 1 2 3\n";
        let parsed = ObjParser::new(ImportOptions::default(), &mut registry, "")
            .parse(Cursor::new(source), "test.obj")
            .unwrap();

        let ids: Vec<_> = parsed
            .mesh
            .triangles()
            .iter()
            .map(|t| t.material_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 1]);
        assert_eq!(
            parsed.diagnostics[0].kind,
            DiagnosticKind::UnknownMaterial("UnknownName".into())
        );
        assert_eq!(
            parsed.mesh.triangles()[2].material_name.as_deref(),
            Some("UnknownName")
        );
    }

    #[test]
    fn missing_material_library_is_a_diagnostic() {
        let (parsed, registry) = parse_with(
            "mtllib nowhere.mtl\nv 0 0 0\n",
            ImportOptions::default(),
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(parsed.material_libraries, vec![PathBuf::from("nowhere.mtl")]);
        assert_eq!(
            parsed.diagnostics[0].kind,
            DiagnosticKind::MaterialLibraryUnavailable(PathBuf::from("nowhere.mtl"))
        );

        let (parsed, _) = parse_with(
            "mtllib nowhere.mtl\n",
            ImportOptions::default().without_materials(),
        );
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(parsed.material_libraries.len(), 1);
    }

    #[test]
    fn base_directory_is_parent_of_obj() {
        assert_eq!(
            base_directory_of(Path::new("assets/models/box.obj")),
            PathBuf::from("assets/models")
        );
        assert_eq!(base_directory_of(Path::new("box.obj")), PathBuf::from(""));
    }
}
