//! Print the LOD chain of a GLB file and write one file per level.
//!
//! Usage: cargo run --example lod_chain -- input.glb

use glbopt::prelude::*;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: lod_chain <input.glb>");
        std::process::exit(1);
    }

    let bytes = std::fs::read(&args[1]).expect("failed to read input");
    let asset = Asset::from_glb(&bytes).expect("failed to parse GLB");
    println!("input: {:?}", asset.stats());

    let options = OptimizeOptions::default();
    let output = optimize(&asset, &options).expect("optimization failed");

    let codec = MeshoptCodec::new();
    let images = RasterImageCodec::new();
    let writer = GlbWriter::new()
        .with_buffer_codec(&codec)
        .with_image_codec(&images);

    for (i, level) in output.chain.levels.iter().enumerate() {
        let mut report = output.report.clone();
        let glb = writer
            .write(&asset, level, &mut report)
            .expect("write failed");
        let path = format!("lod{}_{:.0}pct.glb", i, level.ratio * 100.0);
        std::fs::write(&path, &glb).expect("failed to write level");
        println!(
            "  ratio {:.2}: {} triangles, {} bytes -> {}",
            level.ratio,
            level.triangle_count,
            glb.len(),
            path
        );
    }

    if !output.report.is_clean() {
        println!("{}", output.report.summary());
    }
}
