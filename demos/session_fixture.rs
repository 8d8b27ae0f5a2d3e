//! Writes a synthetic JSON-lines session for `dwelld --input`.
//!
//! Three rounds of three colored objects pass the camera at 2 fps. The
//! second round has a slow green object, so its batch comes out late. A few
//! unclassifiable and low-confidence detections are mixed in.

use anyhow::{anyhow, Result};
use serde_json::json;
use std::io::Write;

const FPS: f64 = 2.0;

/// (category, enter_s, leave_s)
const SCRIPT: &[(&str, f64, f64)] = &[
    ("red", 0.0, 5.0),
    ("blue", 1.0, 6.0),
    ("green", 2.0, 7.0),
    ("red", 10.0, 15.0),
    ("blue", 10.5, 14.0),
    ("green", 11.0, 29.0),
    ("white", 32.0, 34.0),
    ("yellow", 32.5, 35.0),
    ("orange", 33.0, 36.0),
];

fn main() -> Result<()> {
    let out = parse_arg("--out")?;
    let mut file = std::fs::File::create(&out)
        .map_err(|e| anyhow!("failed to create {}: {}", out, e))?;

    let end = SCRIPT.iter().map(|s| s.2).fold(0.0, f64::max) + 2.0;
    let frames = (end * FPS) as u64;
    for frame in 0..=frames {
        let t = frame as f64 / FPS;
        let mut detections = Vec::new();
        for (i, &(category, enter, leave)) in SCRIPT.iter().enumerate() {
            if t >= enter && t < leave {
                let x = 40 * i as i32;
                detections.push(json!({
                    "category": category,
                    "confidence": 0.55,
                    "region": [x, 20, x + 32, 52],
                }));
            }
        }
        if frame % 7 == 3 {
            detections.push(json!({ "category": null, "confidence": 0.2 }));
        }
        if frame % 11 == 5 {
            detections.push(json!({ "category": "orange", "confidence": 0.05 }));
        }
        let line = json!({ "t": t, "detections": detections });
        writeln!(file, "{}", line)?;
    }
    println!("wrote {} ticks to {}", frames + 1, out);
    Ok(())
}

fn parse_arg(flag: &str) -> Result<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == flag {
            return args
                .next()
                .ok_or_else(|| anyhow!("missing value for {}", flag));
        }
    }
    Err(anyhow!("missing required flag {}", flag))
}
