//! Imports Wavefront OBJ models and packs them into interleaved vertex
//! buffers ready for upload with glium.

pub mod model;
pub mod packing;
pub mod rendering;
pub mod tokenizer;
pub mod wavefront_obj;

pub use model::{ImportOptions, ObjModel};
pub use wavefront_obj::MaterialRegistry;
