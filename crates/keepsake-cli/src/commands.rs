use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::Value;
use tracing::debug;

use keepsake_sdk::{
    AssetKind, DirectorySink, EntityId, ImageScope, Keepsake, KeepsakeConfig, NewListing, Notice,
    Notifier, SettingsPatch, SweepPolicy, SweepReport,
};

use crate::cli::*;

/// Prints notices to the terminal.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Success(m) => println!("{} {}", "✓".green().bold(), m),
            Notice::Error(m) => eprintln!("{} {}", "✗".red().bold(), m),
        }
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let keepsake = open(&cli)?;
    match cli.command {
        Command::Settings(args) => cmd_settings(&keepsake, args),
        Command::Export(args) => {
            let mut sink = DirectorySink::new(args.dir);
            ok_or_bail(keepsake.export_settings(&mut sink), "export")?;
            for path in sink.written() {
                println!("  {}", path.display().to_string().cyan());
            }
            Ok(())
        }
        Command::Import(args) => cmd_import(&keepsake, &args.file),
        Command::Logo(args) => cmd_upload(&keepsake, AssetKind::Logo, args).await,
        Command::Favicon(args) => cmd_upload(&keepsake, AssetKind::Favicon, args).await,
        Command::Images(args) => cmd_images(&keepsake, args).await,
        Command::Listings(args) => cmd_listings(&keepsake, args),
        Command::Gc(args) => cmd_gc(&keepsake, args),
    }
}

fn open(cli: &Cli) -> anyhow::Result<Keepsake> {
    let mut config = match &cli.config {
        Some(path) => KeepsakeConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => KeepsakeConfig::default(),
    };
    if let Some(store) = &cli.store {
        config.store.path = store.clone();
    }
    debug!(store = %config.store.path.display(), "opening store");
    let keepsake = Keepsake::open(config).context("opening store")?;
    Ok(keepsake.with_notifier(Arc::new(ConsoleNotifier)))
}

fn ok_or_bail(ok: bool, what: &str) -> anyhow::Result<()> {
    if !ok {
        bail!("{what} failed");
    }
    Ok(())
}

fn cmd_settings(k: &Keepsake, args: SettingsArgs) -> anyhow::Result<()> {
    match args.action {
        SettingsAction::Show => {
            let settings = k.settings().offloaded();
            println!("{}", serde_json::to_string_pretty(&settings)?);
            println!("  Logo: {}", shorten(&k.logo_url()).cyan());
            println!("  Favicon: {}", shorten(&k.favicon_url()).cyan());
            Ok(())
        }
        SettingsAction::Set { key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            ok_or_bail(k.update_settings(&SettingsPatch::new().set(key, value)), "settings update")
        }
        SettingsAction::Reset => ok_or_bail(k.reset_settings(), "reset"),
    }
}

fn cmd_import(k: &Keepsake, file: &Path) -> anyhow::Result<()> {
    let document = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    ok_or_bail(k.import_settings(&document), "import")
}

async fn cmd_upload(k: &Keepsake, kind: AssetKind, args: UploadArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let media_type = args
        .media_type
        .unwrap_or_else(|| guess_media_type(&args.file).to_string());
    ok_or_bail(k.upload(kind, &bytes, &media_type).await, "upload")?;
    println!("  {}", shorten(&k.display_url(kind)).cyan());
    Ok(())
}

async fn cmd_images(k: &Keepsake, args: ImagesArgs) -> anyhow::Result<()> {
    match args.action {
        ImagesAction::Save { id: Some(id), images } => {
            let id = EntityId::new(id)?;
            let saved = k.images().save_images(&id, &images);
            println!(
                "{} Saved {} image(s) for {}",
                "✓".green(),
                saved.to_string().bold(),
                id.as_str().yellow()
            );
        }
        ImagesAction::Save { id: None, images } => {
            let staged = k.stage_images(&ImageScope::Staging, &images).await;
            println!("{} Staged {} image(s)", "✓".green(), staged.len().to_string().bold());
        }
        ImagesAction::Show { id } => {
            let scope = match id {
                Some(id) => ImageScope::from(&EntityId::new(id)?),
                None => ImageScope::Staging,
            };
            let images = k.images().get_images(&scope);
            if images.is_empty() {
                println!("No images for {}.", scope.suffix().yellow());
            }
            let featured = k.images().get_featured_image(&scope);
            let marked = featured_position(&images, &featured);
            for (i, image) in images.iter().enumerate() {
                let marker = if marked == Some(i) { "*".green().bold() } else { " ".normal() };
                println!("{marker} {}", shorten(image));
            }
            if marked.is_none() && !featured.is_empty() {
                println!("{} {} (featured only)", "*".green().bold(), shorten(&featured));
            }
        }
        ImagesAction::Clear { id } => {
            let id = EntityId::new(id)?;
            k.images().clear_images(&id);
            println!("Cleared images for {}", id.as_str().yellow());
        }
        ImagesAction::Finalize { id } => {
            let id = EntityId::new(id)?;
            if k.images().finalize_staged_images(&id) {
                println!("{} Moved staged images to {}", "✓".green(), id.as_str().yellow());
            } else {
                println!("No staged images.");
            }
        }
        ImagesAction::Purge => {
            let removed = k.images().purge_all();
            println!("{} Purged {} key(s)", "✓".green(), removed.to_string().bold());
        }
    }
    Ok(())
}

fn cmd_listings(k: &Keepsake, args: ListingsArgs) -> anyhow::Result<()> {
    match args.action {
        ListingsAction::List => {
            let listings = k.listings().list();
            if listings.is_empty() {
                println!("No listings.");
            }
            for listing in listings.into_iter().map(|l| k.listings().hydrate(l)) {
                println!(
                    "{}  {}  {} ({}, {} image(s))",
                    listing.id.as_str().yellow().bold(),
                    listing.title.bold(),
                    listing.location,
                    listing.dates.dimmed(),
                    listing.images.len()
                );
            }
        }
        ListingsAction::Add { title, location, price, description, images } => {
            let listing = k.listings().create(NewListing {
                title,
                location,
                price,
                description: description.unwrap_or_default(),
                images,
                ..NewListing::default()
            })?;
            println!("{} Created listing {}", "✓".green().bold(), listing.id.as_str().yellow());
        }
        ListingsAction::Remove { id } => {
            let id = EntityId::new(id)?;
            if k.listings().delete(&id)? {
                println!("Removed listing {}", id.as_str().yellow());
            } else {
                println!("No listing {}.", id.as_str().yellow());
            }
        }
    }
    Ok(())
}

fn cmd_gc(k: &Keepsake, args: GcArgs) -> anyhow::Result<()> {
    let report = match args.staging_older_than {
        Some(secs) => {
            let policy = SweepPolicy::staging_older_than(Duration::from_secs(secs));
            let policy = if args.full { policy.with_full_scan() } else { policy };
            k.sweep_with(&policy)
        }
        None => k.sweep(args.full),
    };
    print_report(&report);
    Ok(())
}

fn print_report(report: &SweepReport) {
    println!("{} GC: {} key(s) removed.", "✓".green(), report.total_removed().to_string().bold());
    println!("  Staging: {}", report.staging_removed);
    for (kind, removed) in &report.versions_removed {
        println!("  {kind} versions: {removed}");
    }
    for kind in &report.skipped {
        println!("  {kind}: {}", "no current version".dimmed());
    }
}

fn guess_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Data URLs are too long for a terminal.
/// Index of the featured image within the listed set.
fn featured_position(images: &[String], featured: &str) -> Option<usize> {
    images.iter().position(|image| image == featured)
}

fn shorten(value: &str) -> String {
    const MAX: usize = 72;
    if value.chars().count() <= MAX {
        return value.to_string();
    }
    let head: String = value.chars().take(MAX).collect();
    format!("{head}… ({} chars)", value.chars().count())
}
