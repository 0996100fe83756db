//! Check ffmpeg and codec availability.

use serde::Serialize;
use tickettock_render_engine::encoder::is_ffmpeg_on_path;
use tickettock_render_engine::{probe_codecs, CodecAvailability};

#[derive(Serialize)]
struct CheckReport {
    ffmpeg: bool,
    codecs: Vec<CodecAvailability>,
}

pub fn run(json: bool) -> anyhow::Result<()> {
    let report = CheckReport {
        ffmpeg: is_ffmpeg_on_path(),
        codecs: probe_codecs(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("TicketTock System Check");
    println!("{}", "=".repeat(50));

    if report.ffmpeg {
        println!("[OK] ffmpeg found on PATH");
    } else {
        println!("[FAIL] ffmpeg not found on PATH");
    }

    for entry in &report.codecs {
        match &entry.reason {
            None => println!("[OK] {:<6} via {}", entry.codec, entry.encoder),
            Some(reason) => println!("[WARN] {:<6} unavailable: {reason}", entry.codec),
        }
    }

    println!();
    if report.codecs.iter().any(|c| c.available) {
        println!("At least one codec is available. TicketTock is ready.");
    } else {
        println!("No codec is available. Install ffmpeg with libx264 or mpeg4 support.");
    }

    Ok(())
}
