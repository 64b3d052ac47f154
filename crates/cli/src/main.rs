//! CLI for geotile - Clip GeoJSON to lat/lon tiles
//!
//! This is a thin wrapper around the geotile-core library.

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use geotile_core::tile::TileCoord;
use geotile_core::{ClippedTile, Config, Splitter, Tile};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "geotile",
    about = "Clip GeoJSON geometry to rectangular lat/lon tiles",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clip every feature of a GeoJSON file to one window
    Clip(ClipArgs),
    /// Split a GeoJSON file into {z}/{x}/{y}.geojson tiles
    Split(SplitArgs),
}

#[derive(ClapArgs, Debug)]
struct ClipArgs {
    /// Input GeoJSON file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Northern bound (latitude)
    #[arg(long, allow_hyphen_values = true, requires_all = ["south", "east", "west"], conflicts_with = "tile")]
    north: Option<f64>,

    /// Southern bound (latitude)
    #[arg(long, allow_hyphen_values = true)]
    south: Option<f64>,

    /// Eastern bound (longitude)
    #[arg(long, allow_hyphen_values = true)]
    east: Option<f64>,

    /// Western bound (longitude)
    #[arg(long, allow_hyphen_values = true)]
    west: Option<f64>,

    /// Web Mercator tile address instead of explicit bounds
    #[arg(long, value_name = "Z/X/Y")]
    tile: Option<TileCoord>,

    /// Output file (stdout when omitted)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct SplitArgs {
    /// Input GeoJSON file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Directory receiving the tiles
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Minimum zoom level
    #[arg(long, default_value = "0")]
    min_zoom: u8,

    /// Maximum zoom level
    #[arg(long, default_value = "14")]
    max_zoom: u8,

    /// Also write tiles where no feature survives clipping
    #[arg(long)]
    keep_empty: bool,
}

impl ClipArgs {
    fn window(&self) -> Result<Tile> {
        if let Some(coord) = self.tile {
            return Ok(coord.bounds());
        }
        match (self.north, self.south, self.east, self.west) {
            (Some(north), Some(south), Some(east), Some(west)) => {
                Tile::new(north, south, east, west).context("Invalid clipping window")
            }
            _ => bail!("Either --tile or all of --north, --south, --east and --west are required"),
        }
    }
}

fn run_clip(args: &ClipArgs) -> Result<()> {
    let window = args.window()?;

    let collection = geotile_core::read_collection(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let features_read = collection.features.len();

    let mut tile = ClippedTile::new(window);
    let report = tile.add_geojson(geojson::GeoJson::FeatureCollection(collection));

    let json = serde_json::to_string_pretty(&tile.to_feature_collection())
        .context("Failed to serialize clipped features")?;

    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "✓ Clipped {} of {} features into {}",
                report.retained,
                features_read,
                path.display()
            );
        }
        None => println!("{}", json),
    }

    if !report.errors.is_empty() {
        log::warn!("{} features could not be clipped", report.errors.len());
    }

    Ok(())
}

fn run_split(args: &SplitArgs) -> Result<()> {
    let config = Config::default()
        .with_zoom_range(args.min_zoom, args.max_zoom)
        .with_skip_empty(!args.keep_empty);
    config.validate().context("Invalid zoom range")?;

    let stats = Splitter::new(config)
        .split_file(&args.input, &args.output_dir)
        .context("Failed to split GeoJSON into tiles")?;

    println!(
        "✓ Wrote {} tiles ({} features) to {}",
        stats.tiles_written,
        stats.features_written,
        args.output_dir.display()
    );

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match &args.command {
        Command::Clip(clip) => run_clip(clip),
        Command::Split(split) => run_split(split),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clip_with_bounds() {
        let args = Args::try_parse_from([
            "geotile", "clip", "in.geojson", "--north", "10", "--south", "-10", "--east", "190",
            "--west", "170",
        ])
        .unwrap();

        let Command::Clip(clip) = args.command else {
            panic!("expected clip");
        };
        let window = clip.window().unwrap();
        assert_eq!(window.south(), -10.0);
        assert_eq!(window.east(), 190.0);
    }

    #[test]
    fn test_parse_clip_with_tile() {
        let args = Args::try_parse_from(["geotile", "clip", "in.geojson", "--tile", "1/1/0"]).unwrap();
        let Command::Clip(clip) = args.command else {
            panic!("expected clip");
        };
        let window = clip.window().unwrap();
        assert_eq!(window.west(), 0.0);
        assert_eq!(window.east(), 180.0);
    }

    #[test]
    fn test_clip_requires_a_window() {
        let args = Args::try_parse_from(["geotile", "clip", "in.geojson"]).unwrap();
        let Command::Clip(clip) = args.command else {
            panic!("expected clip");
        };
        assert!(clip.window().is_err());

        assert!(Args::try_parse_from(["geotile", "clip", "in.geojson", "--north", "10"]).is_err());
    }

    #[test]
    fn test_parse_split() {
        let args = Args::try_parse_from([
            "geotile", "split", "in.geojson", "tiles", "--max-zoom", "6", "--keep-empty", "-v",
        ])
        .unwrap();
        assert!(args.verbose);

        let Command::Split(split) = args.command else {
            panic!("expected split");
        };
        assert_eq!((split.min_zoom, split.max_zoom), (0, 6));
        assert!(split.keep_empty);
    }
}
