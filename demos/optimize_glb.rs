//! Optimize a GLB file from the command line.
//!
//! Usage: cargo run --example optimize_glb -- input.glb output.glb

use glbopt::prelude::*;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: optimize_glb <input.glb> <output.glb>");
        std::process::exit(1);
    }

    let input = std::fs::read(&args[1]).expect("failed to read input");
    let options = OptimizeOptions {
        texture_aware: true,
        lod_levels: vec![1.0],
        ..Default::default()
    };

    let (output, report) = match optimize_to_glb(&input, &options) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("optimization failed: {e}");
            std::process::exit(1);
        }
    };

    std::fs::write(&args[2], &output).expect("failed to write output");

    println!("{} bytes -> {} bytes", input.len(), output.len());
    println!("{}", report.summary());
}
