use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "keepsake",
    about = "Keepsake -- site settings and listing images in one key-value store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Store file; overrides the configured path
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show or change site settings
    Settings(SettingsArgs),
    /// Write the settings to a dated JSON file
    Export(ExportArgs),
    /// Load settings from a JSON file
    Import(ImportArgs),
    /// Upload the site logo
    Logo(UploadArgs),
    /// Upload the site favicon
    Favicon(UploadArgs),
    /// Manage per-listing image sets
    Images(ImagesArgs),
    /// Manage listings
    Listings(ListingsArgs),
    /// Remove stale staging sets and superseded asset versions
    Gc(GcArgs),
}

#[derive(Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub action: SettingsAction,
}

#[derive(Subcommand)]
pub enum SettingsAction {
    Show,
    /// Set a top-level field; VALUE is JSON, or a plain string
    Set { key: String, value: String },
    Reset,
}

#[derive(Args)]
pub struct ExportArgs {
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct ImportArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct UploadArgs {
    pub file: PathBuf,
    /// Media type; guessed from the file extension when omitted
    #[arg(long)]
    pub media_type: Option<String>,
}

#[derive(Args)]
pub struct ImagesArgs {
    #[command(subcommand)]
    pub action: ImagesAction,
}

#[derive(Subcommand)]
pub enum ImagesAction {
    /// Store images for a listing, or stage them when no id is given
    Save {
        #[arg(long)]
        id: Option<String>,
        #[arg(required = true)]
        images: Vec<String>,
    },
    /// Show a listing's images, or the staged ones
    Show {
        #[arg(long)]
        id: Option<String>,
    },
    Clear { id: String },
    /// Move the staged images to a listing
    Finalize { id: String },
    /// Remove every image set
    Purge,
}

#[derive(Args)]
pub struct ListingsArgs {
    #[command(subcommand)]
    pub action: ListingsAction,
}

#[derive(Subcommand)]
pub enum ListingsAction {
    List,
    Add {
        title: String,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "0")]
        price: f64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "image")]
        images: Vec<String>,
    },
    Remove { id: String },
}

#[derive(Args)]
pub struct GcArgs {
    /// Sweep staging sets older than this many seconds
    #[arg(long)]
    pub staging_older_than: Option<u64>,
    /// Scan every key instead of trusting the indexes
    #[arg(long)]
    pub full: bool,
}
