//! Plate - build and inspect tiled image pyramids.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use image::RgbaImage;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plate_store::{
    config::{Cli, Command, ExtractArgs, InsertArgs, StoreArgs},
    PlateStore, TileCoordinate,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Insert(args) => run_insert(args).await,
        Command::Mipmap(args) => run_mipmap(args).await,
        Command::Info(args) => run_info(args).await,
        Command::Extract(args) => run_extract(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "plate_store=debug,plate=debug"
    } else {
        "plate_store=info,plate=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn open_store(args: &StoreArgs) -> Result<PlateStore, String> {
    PlateStore::open(&args.plate, args.to_config())
        .await
        .map_err(|e| format!("Failed to open {}: {}", args.plate.display(), e))
}

// =============================================================================
// Insert Command
// =============================================================================

async fn run_insert(args: InsertArgs) -> Result<(), String> {
    let store = open_store(&args.store).await?;
    let image = load_image(&args.image).await?;

    info!(
        "Ingesting {} ({}x{})",
        args.image.display(),
        image.width(),
        image.height()
    );
    let report = store.insert(&image).await.map_err(|e| e.to_string())?;

    println!(
        "Wrote {}/{} tiles at level {} ({} x {} blocks)",
        report.written,
        report.block_count(),
        report.level,
        report.block_cols,
        report.block_rows
    );
    for (coord, e) in &report.failures {
        warn!("  {}: {}", coord, e);
    }

    if args.mipmap {
        let mipmap = store.mipmap().await.map_err(|e| e.to_string())?;
        println!("Generated {} mipmap tiles", mipmap.generated);
    }

    store.close().await.map_err(|e| e.to_string())?;

    if report.failures.is_empty() {
        Ok(())
    } else {
        Err(format!("{} tile(s) failed to write", report.failures.len()))
    }
}

async fn load_image(path: &Path) -> Result<RgbaImage, String> {
    let owned = path.to_path_buf();
    let decoded = tokio::task::spawn_blocking(move || image::open(&owned))
        .await
        .map_err(|e| format!("Image decoding task failed: {}", e))?;
    decoded
        .map(|image| image.to_rgba8())
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

// =============================================================================
// Mipmap Command
// =============================================================================

async fn run_mipmap(args: StoreArgs) -> Result<(), String> {
    let store = open_store(&args).await?;
    let report = store.mipmap().await.map_err(|e| e.to_string())?;
    println!("Generated {} mipmap tiles", report.generated);
    store.close().await.map_err(|e| e.to_string())
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(args: StoreArgs) -> Result<(), String> {
    let store = open_store(&args).await?;
    let stats = store.stats().await;

    println!("Plate: {}", store.name());
    println!("  Path:        {}", store.path().display());
    println!("  Block size:  {}", store.default_block_size());
    println!("  File type:   {}", store.default_file_type());
    println!("  Depth:       {}", stats.depth);
    println!("  Records:     {} ({} valid)", stats.records, stats.valid);
    println!("  Blobs:");
    for (id, len) in &stats.blobs {
        println!("    plate_{}.blob  {} bytes", id, len);
    }

    Ok(())
}

// =============================================================================
// Extract Command
// =============================================================================

async fn run_extract(args: ExtractArgs) -> Result<(), String> {
    let store = open_store(&args.store).await?;
    let coord = TileCoordinate::new(args.col, args.row, args.level);

    let read = store.read(coord).await.map_err(|e| e.to_string())?;
    let Some(image) = read.image else {
        return Err(format!("Tile {} has not been generated yet", coord));
    };

    save_image(image, &args.output).await?;
    println!(
        "Wrote {} ({} {} bytes) to {}",
        coord,
        read.record.file_type,
        read.record.block_size,
        args.output.display()
    );
    Ok(())
}

async fn save_image(image: RgbaImage, path: &Path) -> Result<(), String> {
    let owned = path.to_path_buf();
    let is_jpeg = path
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            ext == "jpg" || ext == "jpeg"
        })
        .unwrap_or(false);

    let saved = tokio::task::spawn_blocking(move || {
        // JPEG has no alpha channel
        if is_jpeg {
            image::DynamicImage::ImageRgba8(image).to_rgb8().save(&owned)
        } else {
            image.save(&owned)
        }
    })
    .await
    .map_err(|e| format!("Image encoding task failed: {}", e))?;

    saved.map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}
