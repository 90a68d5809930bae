//! Wavefront OBJ 関係のモジュール。

mod face;
mod mesh;
mod mtl;
mod parser;

pub use face::{resolve_index, Corner, FaceFormat, RawCorner, Triangle};
pub use mesh::{Mesh, ObjectTable};
pub use mtl::{Material, MaterialProperty, MaterialRegistry, DEFAULT_MATERIAL_ID};
pub use parser::{base_directory_of, ObjParser, ParsedObj};

use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
    io::Error as IoError,
    path::PathBuf,
};

/// Wavefront OBJ/MTL の読み込みで発生するエラーを表す。
#[derive(Debug)]
pub enum Error {
    /// The source could not be opened.
    FileOpen { path: PathBuf, source: IoError },

    /// Reading from an already opened source failed.
    Io(IoError),

    /// Not enough values in `v`, `vt`, `vn`, etc.
    NotEnoughData { found: usize, expected: usize },

    /// A face corner does not follow the face format of the file.
    InvalidFaceVertex,

    /// A relative index points before the start of its list.
    InvalidIndex,

    /// A resolved index is past the end of its list.
    IndexOutOfRange {
        attribute: AttributeKind,
        index: usize,
        len: usize,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Error::FileOpen { path, source } => {
                write!(f, "Failed to open \"{}\": {}", path.display(), source)
            }
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::NotEnoughData { found, expected } => write!(
                f,
                "Not enough data (found {}, expected {})",
                found, expected
            ),
            Error::InvalidFaceVertex => write!(f, "Invalid face vertex definition"),
            Error::InvalidIndex => write!(f, "Invalid index definition"),
            Error::IndexOutOfRange {
                attribute,
                index,
                len,
            } => write!(
                f,
                "{} index {} is out of range (only {} defined)",
                attribute, index, len
            ),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::FileOpen { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Error {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Kind of per-vertex attribute referenced by a face corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Position,
    Normal,
    TexCoord,
}

impl Display for AttributeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AttributeKind::Position => write!(f, "vertex"),
            AttributeKind::Normal => write!(f, "normal"),
            AttributeKind::TexCoord => write!(f, "texture coord"),
        }
    }
}

/// Recoverable problem found while importing. The offending record is
/// skipped or replaced with a fallback value and the import goes on.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub file: Box<str>,
    pub line: usize,
    pub kind: DiagnosticKind,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}: {}", self.file, self.line, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// 未知のキーワード
    UnknownKeyword(Box<str>),

    /// `f` with fewer than three corners.
    CorruptFace { found: usize },

    /// Index `0`, which OBJ does not define.
    ZeroIndex(AttributeKind),

    /// Corner token that does not match the face format, or a relative
    /// index pointing before the first element.
    InvalidCorner { token: Box<str>, reason: Box<str> },

    /// A triangle referencing an element that was never defined.
    IndexOutOfRange {
        attribute: AttributeKind,
        index: usize,
        len: usize,
    },

    /// `usemtl` with a name no loaded library defines.
    UnknownMaterial(Box<str>),

    /// A numeric value is missing or unparsable; `0` was used instead.
    MalformedNumber {
        keyword: Box<str>,
        token: Option<Box<str>>,
    },

    /// The `.mtl` file named by `mtllib` could not be read.
    MaterialLibraryUnavailable(PathBuf),
}

impl Display for DiagnosticKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DiagnosticKind::UnknownKeyword(k) => {
                write!(f, "Found corrupt line in OBJ. Unknown keyword '{}'", k)
            }
            DiagnosticKind::CorruptFace { found } => {
                write!(f, "Corrupt 'f' (found {} corners, expected 3 or more)", found)
            }
            DiagnosticKind::ZeroIndex(attribute) => {
                write!(f, "Unexpected OBJ {} index of 0", attribute)
            }
            DiagnosticKind::InvalidCorner { token, reason } => {
                write!(f, "Invalid face corner '{}': {}", token, reason)
            }
            DiagnosticKind::IndexOutOfRange {
                attribute,
                index,
                len,
            } => write!(
                f,
                "Triangle dropped: {} index {} is out of range (only {} defined)",
                attribute,
                index + 1,
                len
            ),
            DiagnosticKind::UnknownMaterial(name) => write!(f, "Unknown material '{}'", name),
            DiagnosticKind::MalformedNumber {
                keyword,
                token: Some(token),
            } => write!(f, "Malformed number '{}' in '{}'", token, keyword),
            DiagnosticKind::MalformedNumber {
                keyword,
                token: None,
            } => write!(f, "Missing number in '{}'", keyword),
            DiagnosticKind::MaterialLibraryUnavailable(path) => {
                write!(f, "Material library \"{}\" is unavailable", path.display())
            }
        }
    }
}
