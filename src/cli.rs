use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "attachforge")]
#[command(author, version, about = "Record-bound file attachments with image styles")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Show resolved paths and URLs of an attachment
    Paths {
        /// Entity type, e.g. User
        #[arg(long)]
        entity: String,

        /// Attachment field, e.g. avatar
        #[arg(long)]
        field: String,

        /// Stored file name
        #[arg(long)]
        file: String,

        /// Record primary key
        #[arg(long)]
        id: Option<String>,

        /// Only show this style
        #[arg(long)]
        style: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a geometry derivative of an image
    Resize {
        /// Source image (GIF, JPEG or PNG)
        input: PathBuf,

        /// Destination file
        output: PathBuf,

        /// Geometry, e.g. 100x100, [300x100], 200w, 80h, 150l
        #[arg(short, long)]
        geometry: String,

        /// Quality 1-100 (ignored for PNG)
        #[arg(short, long, default_value = "95")]
        quality: u8,

        /// Constrain single-axis geometries to exactly N pixels
        #[arg(long)]
        exact: bool,
    },

    /// Attach a file to a record, creating the record if no id is given
    Attach {
        /// Entity type
        #[arg(long)]
        entity: String,

        /// Attachment field
        #[arg(long)]
        field: String,

        /// File to attach
        #[arg(required = true)]
        file: PathBuf,

        /// Existing record to update
        #[arg(long)]
        id: Option<String>,

        /// SQLite database (overrides config)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Delete a record and all its attachment files
    Detach {
        /// Entity type
        #[arg(long)]
        entity: String,

        /// Record primary key
        #[arg(long)]
        id: String,

        /// SQLite database (overrides config)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
