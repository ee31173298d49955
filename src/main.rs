mod cli;

use attachforge::{
    config,
    interpolate::resolve,
    registry::ORIGINAL_STYLE,
    repository::Repository,
    staging::CommitReport,
    validation::detected_mime,
};
use attachforge_common::{Record, RecordId, UploadPayload};
use attachforge_db::{init_pool, SqliteRecordStore};
use attachforge_geometry::{resize_file, Geometry, ResizeOptions, ResizeOutcome, SingleAxis};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "attachforge=trace,attachforge_geometry=debug,attachforge_db=debug".to_string()
        } else {
            "attachforge=info,attachforge_db=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Paths {
            entity,
            field,
            file,
            id,
            style,
            json,
        } => show_paths(
            cli.config.as_deref(),
            &entity,
            &field,
            &file,
            id.map(RecordId::from),
            style.as_deref(),
            json,
        ),
        Commands::Resize {
            input,
            output,
            geometry,
            quality,
            exact,
        } => resize(&input, &output, &geometry, quality, exact),
        Commands::Attach {
            entity,
            field,
            file,
            id,
            db,
        } => attach(
            cli.config.as_deref(),
            db,
            &entity,
            &field,
            &file,
            id.map(RecordId::from),
        ),
        Commands::Detach { entity, id, db } => {
            detach(cli.config.as_deref(), db, &entity, RecordId::from(id))
        }
        Commands::Version => {
            println!("attachforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };
    let registry = config.to_registry()?;

    println!("✓ Configuration is valid");
    println!("  Web root: {}", registry.web_root());
    println!("  App root: {}", registry.app_root());
    println!("  Move failures: {:?}", registry.move_failure());
    println!("  Database: {}", config.database.path.display());
    println!("  Entities: {}", registry.entities().count());
    for entity in registry.entities() {
        for (field, spec) in registry.specs(entity) {
            let styles: Vec<String> = spec
                .styles
                .iter()
                .map(|(name, geometry)| format!("{}={}", name, geometry))
                .collect();
            println!(
                "    {}.{} (quality {}, overwrite {}) styles: [{}]",
                entity,
                field,
                spec.quality,
                spec.overwrite,
                styles.join(", ")
            );
        }
    }

    Ok(())
}

fn show_paths(
    config_path: Option<&Path>,
    entity: &str,
    field: &str,
    file: &str,
    id: Option<RecordId>,
    style: Option<&str>,
    json: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let registry = config.to_registry()?;
    let spec = registry.require(entity, field)?;

    let styles: Vec<&str> = match style {
        Some(s) => vec![s],
        None => std::iter::once(ORIGINAL_STYLE)
            .chain(spec.styles.keys().map(String::as_str))
            .collect(),
    };

    let mut locations = serde_json::Map::new();
    for style in styles {
        let loc = resolve(&registry, entity, id.as_ref(), field, file, style)?;
        if json {
            locations.insert(
                style.to_string(),
                serde_json::json!({
                    "path": loc.path,
                    "url": loc.url,
                    "default_url": loc.default_url,
                }),
            );
            continue;
        }
        println!("{}", style);
        println!("  path: {}", loc.path.display());
        println!("  url:  {}", loc.url);
        if let Some(default_url) = loc.default_url {
            println!("  default_url: {}", default_url);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&locations)?);
    }
    Ok(())
}

fn resize(input: &Path, output: &Path, geometry: &str, quality: u8, exact: bool) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }
    if !(1..=100).contains(&quality) {
        anyhow::bail!("Quality must be between 1 and 100, got {}", quality);
    }
    let geometry: Geometry = geometry
        .parse()
        .with_context(|| format!("Invalid geometry: {}", geometry))?;
    let options = ResizeOptions {
        quality,
        single_axis: if exact {
            SingleAxis::Exact
        } else {
            SingleAxis::Legacy
        },
    };

    match resize_file(input, output, &geometry, &options)
        .with_context(|| format!("Failed to resize {:?}", input))?
    {
        ResizeOutcome::Written { width, height } => {
            println!("{} -> {} ({}x{})", input.display(), output.display(), width, height);
        }
        ResizeOutcome::Unsupported => {
            println!("{} is not a GIF, JPEG or PNG file; nothing written", input.display());
        }
    }
    Ok(())
}

fn open_repository(
    config_path: Option<&Path>,
    db: Option<PathBuf>,
) -> Result<Repository<SqliteRecordStore>> {
    let config = config::load_config_or_default(config_path)?;
    let registry = Arc::new(config.to_registry()?);
    let db_path = db.unwrap_or_else(|| config.database.path.clone());

    tracing::debug!("Opening database at {}", db_path.display());
    let pool = init_pool(&db_path.to_string_lossy())
        .with_context(|| format!("Failed to open database {:?}", db_path))?;

    Ok(Repository::new(registry, Arc::new(SqliteRecordStore::new(pool))))
}

/// Copy `file` to a private temporary path so the lifecycle can move it.
fn stage_upload(file: &Path) -> Result<UploadPayload> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("Not a file: {:?}", file))?;
    let temp = std::env::temp_dir().join(format!("attachforge-{}", uuid::Uuid::new_v4().simple()));
    std::fs::copy(file, &temp).with_context(|| format!("Failed to read {:?}", file))?;

    let mut payload = UploadPayload::from_path(&temp, "application/octet-stream")?;
    payload.name = name;
    payload.content_type = detected_mime(&payload);
    Ok(payload)
}

fn print_report(report: &CommitReport) {
    for path in &report.deleted {
        println!("deleted {}", path.display());
    }
    for path in &report.written {
        println!("wrote {}", path.display());
    }
    for skipped in &report.skipped {
        println!("skipped {} ({}): {}", skipped.path.display(), skipped.style, skipped.reason);
    }
}

fn attach(
    config_path: Option<&Path>,
    db: Option<PathBuf>,
    entity: &str,
    field: &str,
    file: &Path,
    id: Option<RecordId>,
) -> Result<()> {
    let mut repo = open_repository(config_path, db)?;
    repo.hooks().registry().require(entity, field)?;

    let mut record = match id {
        Some(id) => repo
            .store()
            .find(entity, &id)?
            .with_context(|| format!("{} {} does not exist", entity, id))?
            .into_record(),
        None => Record::new(entity),
    };

    let payload = stage_upload(file)?;
    let temp = payload.temp_path.clone();
    record.set_upload(field, payload);

    let result = repo.save(&mut record);
    if temp.exists() {
        let _ = std::fs::remove_file(&temp);
    }
    let report = result?;

    let id = record.id.as_ref().map(ToString::to_string).unwrap_or_default();
    println!("{} {}", entity, id);
    if let Some(name) = record.file_name(field) {
        println!("{}_file_name = {}", field, name);
    }
    print_report(&report);
    Ok(())
}

fn detach(config_path: Option<&Path>, db: Option<PathBuf>, entity: &str, id: RecordId) -> Result<()> {
    let mut repo = open_repository(config_path, db)?;
    let record = repo
        .store()
        .find(entity, &id)?
        .with_context(|| format!("{} {} does not exist", entity, id))?
        .into_record();

    let report = repo.delete(&record)?;
    println!("deleted {} {}", entity, id);
    print_report(&report);
    Ok(())
}
