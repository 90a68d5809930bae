mod cli;

use crate::cli::Arguments;
use obj_packer::{packing::PackedBuffers, rendering::attribute_bindings, MaterialRegistry, ObjModel};
use std::env;

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{info, LevelFilter};

fn main() -> Result<()> {
    let args = Arguments::parse();
    initialize_logger(args.verbose);

    let mut registry = MaterialRegistry::new();
    let model = ObjModel::import_file(&args.input, args.import_options(), &mut registry)
        .with_context(|| format!("Failed to import {}", args.input.display()))?;
    info!("Imported {}", args.input.display());

    report(&model, &registry);
    Ok(())
}

fn initialize_logger(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    } else {
        builder.filter_level(LevelFilter::Warn);
        if let Ok(filters) = env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
    }
    builder.init();
}

fn report(model: &ObjModel, registry: &MaterialRegistry) {
    let packed = model.packed();
    let layout = packed.layout();
    let attributes = attribute_bindings(layout, model.has_material_ids(), model.has_object_ids())
        .iter()
        .map(|b| b.slot.name())
        .join(", ");

    println!("Triangles:   {}", model.triangle_count());
    println!("Rows:        {}", packed.row_count());
    println!("Indices:     {}", index_summary(packed));
    println!("Stride:      {} bytes", layout.stride());
    println!(
        "Offsets:     material_id={} object_id={} position={} normal={} texcoord={}",
        layout.material_id_offset(),
        layout.object_id_offset(),
        layout.position_offset(),
        offset_summary(layout.normal_offset()),
        offset_summary(layout.texcoord_offset())
    );
    println!("Attributes:  {}", attributes);
    println!("Objects:     {}", model.object_names().join(", "));
    println!("Materials:   {}", registry.len());
    println!("Diagnostics: {}", model.diagnostics().len());
}

fn index_summary(packed: &PackedBuffers) -> String {
    match packed.indices() {
        Some(indices) => indices.len().to_string(),
        None => "none".to_owned(),
    }
}

fn offset_summary(offset: Option<usize>) -> String {
    match offset {
        Some(offset) => offset.to_string(),
        None => "-".to_owned(),
    }
}
