//! `f` 行の書式判定、インデックス解決、三角形分割。

use super::{Error, Result};
use std::sync::Arc;

/// Index grammar used by the corners of `f` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceFormat {
    /// `v`
    Vertex,

    /// `v/t`
    VertexTexture,

    /// `v//n`
    VertexNormal,

    /// `v/t/n`
    VertexTextureNormal,
}

impl FaceFormat {
    /// Decides the grammar from one corner token, most specific match first.
    pub fn detect(token: &str) -> FaceFormat {
        if token.contains("//") {
            return FaceFormat::VertexNormal;
        }
        match leading_integer_count(token) {
            n if n >= 3 => FaceFormat::VertexTextureNormal,
            2 => FaceFormat::VertexTexture,
            _ => FaceFormat::Vertex,
        }
    }

    pub fn has_normals(self) -> bool {
        matches!(
            self,
            FaceFormat::VertexNormal | FaceFormat::VertexTextureNormal
        )
    }

    pub fn has_texcoords(self) -> bool {
        matches!(
            self,
            FaceFormat::VertexTexture | FaceFormat::VertexTextureNormal
        )
    }

    /// Parses one corner token with this grammar.
    /// Fields past the ones the grammar needs are ignored.
    pub fn parse_corner(self, token: &str) -> Result<RawCorner> {
        let mut fields = token.split('/');
        let position = parse_field(fields.next())?;

        let corner = match self {
            FaceFormat::Vertex => RawCorner {
                position,
                texcoord: None,
                normal: None,
            },
            FaceFormat::VertexTexture => RawCorner {
                position,
                texcoord: Some(parse_field(fields.next())?),
                normal: None,
            },
            FaceFormat::VertexNormal => {
                if fields.next() != Some("") {
                    return Err(Error::InvalidFaceVertex);
                }
                RawCorner {
                    position,
                    texcoord: None,
                    normal: Some(parse_field(fields.next())?),
                }
            }
            FaceFormat::VertexTextureNormal => {
                let texcoord = parse_field(fields.next())?;
                let normal = parse_field(fields.next())?;
                RawCorner {
                    position,
                    texcoord: Some(texcoord),
                    normal: Some(normal),
                }
            }
        };

        Ok(corner)
    }
}

fn leading_integer_count(token: &str) -> usize {
    token
        .split('/')
        .take_while(|field| field.parse::<i64>().is_ok())
        .count()
}

fn parse_field(field: Option<&str>) -> Result<i64> {
    field
        .and_then(|s| s.parse().ok())
        .ok_or(Error::InvalidFaceVertex)
}

/// A face corner as written in the file (1-based or negative indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawCorner {
    pub position: i64,
    pub texcoord: Option<i64>,
    pub normal: Option<i64>,
}

/// Converts an OBJ index into a zero-based one.
///
/// Positive indices count from 1; `-k` is the k-th most recently defined
/// element, relative to `len` at the time the face is read.
/// `0` is undefined in OBJ and resolves to `len`, one past the end.
/// Returns `None` when a negative index reaches before the first element.
pub fn resolve_index(index: i64, len: usize) -> Option<usize> {
    if index > 0 {
        Some((index - 1) as usize)
    } else {
        let resolved = len as i64 + index;
        if resolved >= 0 {
            Some(resolved as usize)
        } else {
            None
        }
    }
}

/// Zero-based attribute indices of one triangle corner.
/// `None` means the attribute is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Corner {
    pub position: usize,
    pub normal: Option<usize>,
    pub texcoord: Option<usize>,
}

/// A triangle of the mesh, tagged with the state active when its face was read.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub corners: [Corner; 3],
    pub material_id: u32,
    pub object_id: u32,
    pub material_name: Option<Arc<str>>,
    pub group_name: Option<Arc<str>>,
    pub object_name: Option<Arc<str>>,

    /// Line of the `f` record this triangle came from.
    pub source_line: usize,
}

impl Triangle {
    /// Builds the next triangle of a fan: corner 0 and corner 2 of this
    /// triangle become corners 0 and 1, `corner` becomes corner 2.
    pub fn fan(&self, corner: Corner) -> Triangle {
        Triangle {
            corners: [self.corners[0], self.corners[2], corner],
            ..self.clone()
        }
    }
}
