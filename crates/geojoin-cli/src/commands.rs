use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use geojoin_catalog::{Catalog, CatalogConfig};
use geojoin_cover::{
    cell_center, cell_vertices, cover, cover_with_fallback, locate, CellGeometry, Region,
};
use geojoin_join::{
    decode_value, GeojoinConfig, JoinEngine, JoinOutput, RecordTable, SampleSource, SlicedSource,
    SourceData,
};
use geojoin_types::{Resolution, SourceKey, SpatialId, TemporalId};
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Inspect(args) => cmd_inspect(args, format),
        Command::Locate(args) => cmd_locate(args, format),
        Command::Cover(args) => cmd_cover(args, format),
        Command::Join(args) => cmd_join(args, format),
        Command::Dump(args) => cmd_dump(args),
        Command::Show(args) => cmd_show(args, format),
    }
}

fn hex(id: SpatialId) -> String {
    id.to_string()
}

fn load_config(path: Option<&Path>) -> anyhow::Result<GeojoinConfig> {
    match path {
        Some(path) => GeojoinConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(GeojoinConfig::default()),
    }
}

fn load_sources(paths: &[PathBuf]) -> anyhow::Result<Vec<SourceData>> {
    paths
        .iter()
        .map(|path| {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            SourceData::from_json_reader(BufReader::new(file))
                .with_context(|| format!("reading source document {}", path.display()))
        })
        .collect()
}

fn parse_raw(text: &str) -> anyhow::Result<u64> {
    let text = text.trim();
    let raw = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16)?,
        None => text.parse::<u64>()?,
    };
    Ok(raw)
}

// ---------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------

fn cmd_inspect(args: InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    if args.temporal {
        let id = TemporalId::try_from_raw(parse_raw(&args.id)?)?;
        let (start, end) = id.interval();
        let at = id.to_datetime().map(|t| t.to_rfc3339());
        match format {
            OutputFormat::Json => println!(
                "{}",
                json!({
                    "id": id.to_string(),
                    "millis": id.millis(),
                    "datetime": at,
                    "resolution": id.resolution(),
                    "half_width_ms": id.half_width_ms(),
                    "interval": [start, end],
                })
            ),
            OutputFormat::Text => {
                println!("Temporal id {}", id.to_string().yellow().bold());
                println!("  Instant: {} ({} ms)", at.unwrap_or_else(|| "-".into()).cyan(), id.millis());
                println!("  Resolution: {} (±{} ms)", id.resolution(), id.half_width_ms());
                println!("  Interval: [{start}, {end}]");
            }
        }
        return Ok(());
    }

    let id: SpatialId = args.id.parse()?;
    let cell = id.clear();
    let (lat, lon) = cell_center(cell);
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "id": hex(id),
                "decimal": id.to_i64(),
                "face": id.face(),
                "resolution": id.resolution(),
                "digits": id.digits(),
                "cell": hex(cell),
                "terminator": hex(id.terminator()),
                "parent": id.parent().map(hex),
                "center": [lat, lon],
                "vertices": cell_vertices(cell),
            })
        ),
        OutputFormat::Text => {
            println!("Spatial id {}", hex(id).yellow().bold());
            println!("  Decimal: {}", id.to_i64());
            println!("  Face: {}  Resolution: {}", id.face(), id.resolution().to_string().bold());
            let digits: Vec<String> = id.digits().iter().map(u8::to_string).collect();
            println!("  Digits: {}", digits.join(" "));
            println!("  Cell: {}  Terminator: {}", hex(cell).cyan(), hex(id.terminator()).dimmed());
            if let Some(parent) = id.parent() {
                println!("  Parent: {}", hex(parent).cyan());
            }
            println!("  Center: {lat:.6}, {lon:.6}");
        }
    }
    Ok(())
}

fn cmd_locate(args: LocateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let resolution = Resolution::new(args.resolution)?;
    let id = locate(args.lat, args.lon, resolution)?;
    let cell = id.clear();
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "lat": args.lat,
                "lon": args.lon,
                "id": hex(id),
                "cell": hex(cell),
                "resolution": resolution.level(),
                "length_km": resolution.length_km(),
            })
        ),
        OutputFormat::Text => {
            println!("{} {}", "✓".green(), hex(id).yellow().bold());
            println!("  Cell: {} (≈{:.1} km)", hex(cell).cyan(), resolution.length_km());
        }
    }
    Ok(())
}

fn cmd_cover(args: CoverArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (region, options) = match args.region {
        RegionArgs::Circle {
            lat,
            lon,
            radius,
            options,
        } => (Region::circle(lat, lon, radius)?, options),
        RegionArgs::Polygon { points, options } => (Region::polygon(&points)?, options),
    };
    let config = load_config(options.config.as_deref())?;
    let resolution = Resolution::new(options.resolution)?;
    let limit = options.limit.unwrap_or(config.cover.result_size_limit);
    let min_resolution = match options.min_resolution {
        Some(level) => Some(Resolution::new(level)?),
        None => config.cover.min_resolution,
    };

    let (ids, used) = match min_resolution {
        Some(min) => cover_with_fallback(&region, resolution, min, limit)?,
        None => (cover(&region, resolution, limit)?, resolution),
    };

    match format {
        OutputFormat::Json => {
            let mut out = json!({
                "resolution": used.level(),
                "ids": ids.iter().map(|id| hex(*id)).collect::<Vec<_>>(),
            });
            if options.geometry {
                let mut geometry: CellGeometry = ids.iter().copied().collect();
                out["geometry"] = serde_json::to_value(geometry.triangulation())?;
            }
            println!("{out}");
        }
        OutputFormat::Text => {
            if used != resolution {
                eprintln!(
                    "{} cover coarsened from resolution {} to {}",
                    "!".yellow().bold(),
                    resolution,
                    used
                );
            }
            for id in &ids {
                println!("{}", hex(*id));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------
// Joins
// ---------------------------------------------------------------

fn cmd_join(args: JoinArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(level) = args.resolution {
        config.join.resolution = Some(Resolution::new(level)?);
    }
    if let Some(primary) = &args.primary {
        config.join.primary = SourceKey::parse(primary);
    }
    if !args.secondary.is_empty() {
        config.join.secondaries = args.secondary.iter().map(|s| SourceKey::parse(s)).collect();
    }

    let docs = load_sources(&args.input)?;
    let sliced = args
        .sliced
        .iter()
        .map(|path| -> anyhow::Result<SlicedSource> {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            let source: SlicedSource = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("reading sliced document {}", path.display()))?;
            source.validate()?;
            Ok(source)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    if !sliced.is_empty() {
        config.join.secondaries = sliced.iter().map(|s| s.key.clone()).collect();
    }

    let mut engine = JoinEngine::from_config(&config);
    if let (Some(lat), Some(lon), Some(radius)) = (args.cover_lat, args.cover_lon, args.cover_radius) {
        engine = engine.with_region(Region::circle(lat, lon, radius)?);
    }

    let output = if sliced.is_empty() {
        let (primary, secondaries) = engine.select(&docs)?;
        let secondaries: Vec<&dyn SampleSource> =
            secondaries.into_iter().map(|s| s as &dyn SampleSource).collect();
        engine.join(primary, &secondaries)?
    } else {
        let primary = docs
            .iter()
            .find(|d| d.key == config.join.primary)
            .with_context(|| format!("no source document for {}", config.join.primary))?;
        let refs: Vec<&SlicedSource> = sliced.iter().collect();
        engine.join_sliced(primary, &refs)?
    };

    let table = RecordTable::from_output(&output, &config.join);
    let written = match &args.output {
        Some(path) => Some(table.write_to(path)?),
        None => None,
    };
    print_join_summary(&output, written.as_ref().map(|f| f.path.as_path()), format)
}

fn print_join_summary(output: &JoinOutput, written: Option<&Path>, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "resolution": output.resolution.level(),
                "primary": output.primary.as_str(),
                "secondaries": output.secondaries.iter().map(SourceKey::as_str).collect::<Vec<_>>(),
                "stats": serde_json::to_value(&output.stats)?,
                "output": written.map(|p| p.display().to_string()),
            })
        ),
        OutputFormat::Text => {
            println!(
                "{} Joined {} against {} at resolution {}",
                "✓".green().bold(),
                output.primary.as_str().yellow(),
                output
                    .secondaries
                    .iter()
                    .map(SourceKey::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
                    .yellow(),
                output.resolution.to_string().bold()
            );
            let stats = &output.stats;
            println!("  Records: {}", stats.records.to_string().bold());
            println!("  Elements pushed: {}", stats.elements_pushed);
            println!("  Cells: {} ({} with primary data)", stats.cells, stats.cells_with_primary);
            if stats.outside_cover > 0 {
                println!("  Outside cover: {}", stats.outside_cover);
            }
            if stats.invalid_samples > 0 {
                println!("  Invalid samples: {}", stats.invalid_samples.to_string().red());
            }
            if let Some(path) = written {
                println!("  Written: {}", path.display().to_string().cyan());
            }
        }
    }
    Ok(())
}

fn cmd_dump(args: DumpArgs) -> anyhow::Result<()> {
    let docs = load_sources(&args.input)?;
    let config = CatalogConfig {
        resolution: args.resolution.map(Resolution::new).transpose()?,
        ..Default::default()
    };
    let mut catalog = Catalog::unseeded(config);
    for doc in &docs {
        for (id, &value) in doc.ids.iter().zip(&doc.values) {
            if let Some(id) = id {
                catalog.add(&doc.key, *id, value);
            }
        }
    }

    let index = catalog.id_index();
    match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            index.write_json_lines(BufWriter::new(file))?;
        }
        None => index.write_json_lines(std::io::stdout().lock())?,
    }
    Ok(())
}

fn cmd_show(args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let table = RecordTable::read_from(&args.path)
        .with_context(|| format!("reading container {}", args.path.display()))?;
    let scale = table.attribute("value_scale").unwrap_or(1.0);
    let offset = table.attribute("value_offset").unwrap_or(0.0);
    let shown = &table.rows[..table.rows.len().min(args.limit)];

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "fields": table.fields,
                "attributes": table.attributes.iter().map(|(k, v)| (k.clone(), json!(v))).collect::<serde_json::Map<_, _>>(),
                "rows": table.rows.len(),
                "head": shown,
            })
        ),
        OutputFormat::Text => {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{} rows", table.rows.len().to_string().bold())?;
            for (name, value) in &table.attributes {
                writeln!(out, "  {} = {}", name.cyan(), value)?;
            }
            writeln!(out, "{}", table.fields.join("\t").bold())?;
            for row in shown {
                let cells: Vec<String> = table
                    .fields
                    .iter()
                    .zip(row)
                    .map(|(field, &v)| {
                        if field.ends_with("_value") {
                            decode_value(v, scale, offset).map_or_else(|| "-".into(), |x| format!("{x:.3}"))
                        } else {
                            v.to_string()
                        }
                    })
                    .collect();
                writeln!(out, "{}", cells.join("\t"))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    fn write_doc(dir: &Path, name: &str, doc: &SourceData) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        serde_json::to_writer(BufWriter::new(file), doc).unwrap();
        path
    }

    fn sample_inputs(dir: &Path) -> Vec<PathBuf> {
        let goes = SourceData::from_lat_lon(
            SourceKey::Goes,
            &[19.0, 19.0, -999.0],
            &[-155.0, -155.0, 0.0],
            vec![10.0, 20.0, 30.0],
            Resolution::new(10).unwrap(),
        )
        .unwrap();
        let m2 = SourceData::from_lat_lon(
            SourceKey::Merra2,
            &[19.0],
            &[-155.0],
            vec![4.0],
            Resolution::new(5).unwrap(),
        )
        .unwrap();
        vec![write_doc(dir, "goes.json", &goes), write_doc(dir, "m2.json", &m2)]
    }

    #[test]
    fn dump_writes_one_object_per_source_line() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample_inputs(dir.path());
        let output = dir.path().join("ids.jsonl");
        cmd_dump(DumpArgs {
            input,
            resolution: None,
            output: Some(output.clone()),
        })
        .unwrap();

        let lines: Vec<String> = BufReader::new(File::open(&output).unwrap())
            .lines()
            .map(Result::unwrap)
            .collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value.as_object().unwrap().len(), 1);
        }
        let goes: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(goes["goes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn joined_container_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample_inputs(dir.path());
        let output = dir.path().join("joined.gjrc");
        cmd_join(
            JoinArgs {
                input,
                sliced: vec![],
                primary: None,
                secondary: vec![],
                resolution: None,
                config: None,
                output: Some(output.clone()),
                cover_lat: None,
                cover_lon: None,
                cover_radius: None,
            },
            OutputFormat::Json,
        )
        .unwrap();

        let table = RecordTable::read_from(&output).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.fields[0], "stare_spatial");
        let scale = table.attribute("value_scale").unwrap();
        let offset = table.attribute("value_offset").unwrap();
        let values = table.column("m2_value").unwrap();
        for stored in &values[..2] {
            let value = decode_value(*stored, scale, offset).unwrap();
            assert!((value - 4.0).abs() < 0.01);
        }
        assert_eq!(decode_value(values[2], scale, offset), None);

        cmd_show(ShowArgs { path: output, limit: 2 }, OutputFormat::Json).unwrap();
    }
}
