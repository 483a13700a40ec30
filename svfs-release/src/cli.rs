use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::target::Target;

#[derive(Parser, Debug, Clone)]
#[clap(
    name = "svfs-release",
    version,
    about = "Cross-compile svfs and build its deb, rpm and macOS pkg artifacts",
    long_about = None
)]
pub struct ReleaseCli {
    #[clap(subcommand)]
    pub command: Option<Command>,

    /// Release tag or version (e.g., v0.9.1 or 0.9.1)
    /// If not specified, uses the tag on HEAD of the source directory
    #[clap(short, long, global = true)]
    pub tag: Option<String>,

    /// Output directory for binaries and packages
    #[clap(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Only build these targets (comma-separated os/format/arch)
    /// Example: linux/deb/amd64,darwin/pkg/amd64
    #[clap(short = 'T', long, value_delimiter = ',', global = true)]
    pub targets: Option<Vec<String>>,

    /// Directory containing the svfs sources
    #[clap(long, global = true)]
    pub source_dir: Option<PathBuf>,

    /// Don't generate checksum files (SHA256SUMS)
    #[clap(long, global = true)]
    pub no_checksum: bool,

    /// Log the commands for each target without running them
    #[clap(long, global = true)]
    pub dry_run: bool,

    /// Configuration file path
    /// Defaults to .config/svfs-release.toml, then the user-wide file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[clap(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the targets of the release matrix
    Targets {
        /// Print as JSON
        #[clap(long)]
        json: bool,
    },

    /// Render a metadata template (e.g. a Dockerfile) with the release version
    Render {
        /// Template file containing {{version}} placeholders
        #[clap(long)]
        template: PathBuf,

        /// Where to write the rendered file
        #[clap(long)]
        to: PathBuf,
    },
}

#[derive(Debug, Clone)]
pub struct Args {
    pub tag: Option<String>,
    pub output: Option<PathBuf>,
    pub targets: Option<Vec<String>>,
    pub source_dir: Option<PathBuf>,
    pub no_checksum: bool,
    pub dry_run: bool,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

impl From<ReleaseCli> for Args {
    fn from(cli: ReleaseCli) -> Self {
        Args {
            tag: cli.tag,
            output: cli.output,
            targets: cli.targets,
            source_dir: cli.source_dir,
            no_checksum: cli.no_checksum,
            dry_run: cli.dry_run,
            config: cli.config,
            verbose: cli.verbose,
        }
    }
}

impl Args {
    /// Parse the `--targets` filter, if any.
    pub fn target_filter(&self) -> anyhow::Result<Option<Vec<Target>>> {
        match &self.targets {
            None => Ok(None),
            Some(names) => {
                let targets = names
                    .iter()
                    .map(|name| name.trim().parse::<Target>())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(targets))
            }
        }
    }

    /// Version from `--tag`, without a leading `v`.
    pub fn version(&self) -> Option<String> {
        self.tag.as_deref().map(version_from_tag)
    }
}

/// `v1.2.3` → `1.2.3`; anything else unchanged.
pub fn version_from_tag(tag: &str) -> String {
    match tag.strip_prefix('v') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest.to_string(),
        _ => tag.to_string(),
    }
}
