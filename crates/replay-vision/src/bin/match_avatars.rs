//! CLI tool to score a tray avatar against a formation avatar with the multi-scale matcher.
//! Usage: cargo run -p replay-vision --features cli --bin match_avatars -- <formation.png> <tray.png> [max_scale]

use replay_capture::ScreenRegion;
use replay_vision::{best_match, scaled_templates, ScaleRange};
use std::path::PathBuf;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <formation.png> <tray.png> [max_scale]", args[0]);
        std::process::exit(1);
    }

    let formation_path = PathBuf::from(&args[1]);
    let tray_path = PathBuf::from(&args[2]);
    let max_scale = args
        .get(3)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(1.25);

    let formation = match image::open(&formation_path) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            eprintln!("Failed to open {}: {}", formation_path.display(), e);
            std::process::exit(1);
        }
    };
    let tray = match image::open(&tray_path) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            eprintln!("Failed to open {}: {}", tray_path.display(), e);
            std::process::exit(1);
        }
    };

    println!(
        "Formation avatar: {}x{}, tray avatar: {}x{}",
        formation.width(),
        formation.height(),
        tray.width(),
        tray.height()
    );

    let scales = ScaleRange {
        start: 1.0,
        end: max_scale,
        step: 0.01,
    };
    let values = scales.values();
    let templates = scaled_templates(&tray, &ScreenRegion::full(), &scales);

    println!("\n=== Per-scale scores ===");
    for (scale, templ) in values.iter().zip(&templates) {
        match best_match(&formation, std::slice::from_ref(templ), f64::NEG_INFINITY) {
            Some(m) => println!(
                "  scale {:.2} ({}x{}): score {:.3} at ({}, {})",
                scale,
                templ.width(),
                templ.height(),
                m.score,
                m.x,
                m.y
            ),
            None => println!("  scale {:.2}: template larger than formation avatar", scale),
        }
    }

    match best_match(&formation, &templates, f64::NEG_INFINITY) {
        Some(m) => println!("\nBest: scale {:.2}, score {:.3}", values[m.index], m.score),
        None => println!("\nNo scale fits inside the formation avatar"),
    }
}
