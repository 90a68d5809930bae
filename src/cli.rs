use obj_packer::ImportOptions;
use std::path::PathBuf;

use clap::Parser;

/// Represents CLI arguments.
#[derive(Parser, Debug)]
#[clap(author, version)]
pub struct Arguments {
    /// Specifies the OBJ file to import.
    pub input: PathBuf,

    /// Scales the model so that its largest half-extent is 1.
    #[clap(long)]
    pub unitize: bool,

    /// Moves the bounding box center to the origin.
    #[clap(long)]
    pub center: bool,

    /// Shares rows between identical corners and emits an index buffer.
    #[clap(long)]
    pub compact: bool,

    /// Skips loading material libraries.
    #[clap(long)]
    pub no_materials: bool,

    /// Skips tracking object ids.
    #[clap(long)]
    pub no_objects: bool,

    /// Outputs debug info.
    #[clap(short, long)]
    pub verbose: bool,
}

impl Arguments {
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            unitize: self.unitize,
            center: self.center,
            compact: self.compact,
            no_materials: self.no_materials,
            no_objects: self.no_objects,
        }
    }
}
