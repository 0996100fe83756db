//! Print the overlay layout.

use std::path::PathBuf;

use tickettock_layout::LayoutSpec;

pub fn run(file: Option<PathBuf>, size: Option<(u32, u32)>) -> anyhow::Result<()> {
    let spec = match &file {
        Some(path) => LayoutSpec::from_json_file(path)?,
        None => LayoutSpec::default(),
    };

    println!("{}", spec.to_json_pretty());

    if let Some((width, height)) = size {
        let resolved = spec.resolve(width, height)?;
        println!();
        println!("Resolved for {width}x{height}:");
        println!("  timestamp_region: {:?}", resolved.timestamp_region);
        println!("  timestamp_top:    {}", resolved.timestamp_top);
        println!("  countdown_region: {:?}", resolved.countdown_region);
        println!("  countdown_top:    {}", resolved.countdown_top);
        println!("  blink_bar:        {:?}", resolved.blink_bar);
        if let Some(decoration) = &resolved.decoration {
            println!("  decoration:       {decoration:?}");
        }
    }

    Ok(())
}
