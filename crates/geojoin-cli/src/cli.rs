use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "geojoin",
    about = "Join geophysical observations on hierarchical spatial identifiers",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode a spatial or temporal identifier
    Inspect(InspectArgs),
    /// Locate a latitude/longitude on the mesh
    Locate(LocateArgs),
    /// Generate the cells covering a region
    Cover(CoverArgs),
    /// Join source documents into a record container
    Join(JoinArgs),
    /// Dump the identifiers of source documents, one JSON object per source
    Dump(DumpArgs),
    /// Show the schema and rows of a record container
    Show(ShowArgs),
}

#[derive(Args)]
pub struct InspectArgs {
    /// Identifier as 0x-prefixed hex or decimal
    pub id: String,
    /// Decode as a temporal identifier
    #[arg(long)]
    pub temporal: bool,
}

#[derive(Args)]
pub struct LocateArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,
    #[arg(short, long, default_value = "10")]
    pub resolution: u8,
}

#[derive(Args)]
pub struct CoverArgs {
    #[command(subcommand)]
    pub region: RegionArgs,
}

#[derive(Subcommand)]
pub enum RegionArgs {
    /// A spherical cap
    Circle {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Angular radius in degrees
        #[arg(long)]
        radius: f64,
        #[command(flatten)]
        options: CoverOptions,
    },
    /// The convex hull of two or more points
    Polygon {
        /// A vertex as "lat,lon"; repeat for each vertex
        #[arg(long = "point", required = true, allow_hyphen_values = true, value_parser = parse_point)]
        points: Vec<(f64, f64)>,
        #[command(flatten)]
        options: CoverOptions,
    },
}

#[derive(Args)]
pub struct CoverOptions {
    #[arg(short, long, default_value = "5")]
    pub resolution: u8,
    /// Maximum number of cells (defaults to the configured limit)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Coarsest resolution to fall back to when the cover is too large
    #[arg(long)]
    pub min_resolution: Option<u8>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Also emit the cell triangulation (JSON output only)
    #[arg(long)]
    pub geometry: bool,
}

#[derive(Args)]
pub struct JoinArgs {
    /// Source documents (JSON)
    #[arg(short, long, required = true)]
    pub input: Vec<PathBuf>,
    /// Time-sliced secondary documents (JSON); replaces the configured
    /// secondaries
    #[arg(long)]
    pub sliced: Vec<PathBuf>,
    /// Primary source key
    #[arg(long)]
    pub primary: Option<String>,
    /// Secondary source keys, in output order
    #[arg(long)]
    pub secondary: Vec<String>,
    #[arg(short, long)]
    pub resolution: Option<u8>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Record container to write
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[arg(long, allow_hyphen_values = true, requires_all = ["cover_lon", "cover_radius"])]
    pub cover_lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires_all = ["cover_lat", "cover_radius"])]
    pub cover_lon: Option<f64>,
    #[arg(long, requires_all = ["cover_lat", "cover_lon"])]
    pub cover_radius: Option<f64>,
}

#[derive(Args)]
pub struct DumpArgs {
    /// Source documents (JSON)
    #[arg(short, long, required = true)]
    pub input: Vec<PathBuf>,
    /// Normalize identifiers into cells at this resolution first
    #[arg(short, long)]
    pub resolution: Option<u8>,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub path: PathBuf,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

pub fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lon\", got {s:?}"))?;
    let lat = lat.trim().parse::<f64>().map_err(|e| format!("latitude: {e}"))?;
    let lon = lon.trim().parse::<f64>().map_err(|e| format!("longitude: {e}"))?;
    Ok((lat, lon))
}
