use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dmgee")]
#[command(version, about = "Lay out and build macOS disk image installers")]
#[command(
    after_help = "QUICK START:\n  dmgee init app.toml                  Create a project\n  dmgee add-file app.toml App.app 199 276\n  dmgee add-symlink app.toml Applications /Applications 569 276\n  dmgee build app.toml                 Build the disk image"
)]
pub struct Cli {
    /// Directory holding `dmgee Settings.yaml` (default: platform config dir)
    #[arg(long, global = true)]
    pub config_dir: Option<Utf8PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Write a new project with default settings
    Init {
        project: Utf8PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print every property of a project
    Show { project: Utf8PathBuf },

    /// Set a property, e.g. `iconsize 160` or `gridsize 32x32`
    Set {
        project: Utf8PathBuf,
        key: String,
        value: String,
    },

    /// Place a file in the window
    AddFile {
        project: Utf8PathBuf,
        path: String,
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
        /// Snap the position using the project's grid and feature settings
        #[arg(long)]
        snap: bool,
    },

    /// Place a symlink (e.g. Applications) in the window
    AddSymlink {
        project: Utf8PathBuf,
        name: String,
        target: String,
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
        #[arg(long)]
        snap: bool,
    },

    /// Remove a file by its index in `show`
    RemoveFile { project: Utf8PathBuf, index: usize },

    /// Remove a symlink by its index in `show`
    RemoveSymlink { project: Utf8PathBuf, index: usize },

    /// Print the features detected in the background image
    Detect { project: Utf8PathBuf },

    /// Build the disk image, streaming the build log
    Build {
        project: Utf8PathBuf,
        /// Output path (default: the project's filename)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// List the supported disk image formats
    Formats,
}
