use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ReleaseError;
use crate::target::{Os, TargetMatrix};

/// Project configuration, relative to the working directory.
pub const LOCAL_CONFIG_PATH: &str = ".config/svfs-release.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub package: PackageConfig,

    #[serde(default)]
    pub matrix: TargetMatrix,

    #[serde(default = "default_files")]
    pub files: Vec<FileMapping>,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub descriptor: DescriptorConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            package: PackageConfig::default(),
            matrix: TargetMatrix::default(),
            files: default_files(),
            build: BuildConfig::default(),
            descriptor: DescriptorConfig::default(),
            tools: ToolsConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Package metadata shared by every target. The version is supplied per run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub maintainer: String,

    #[serde(default)]
    pub vendor: String,

    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_description")]
    pub description: String,

    #[serde(default)]
    pub license: String,

    /// Absolute directory the client binary is installed into.
    #[serde(default = "default_install_dir")]
    pub install_dir: String,

    #[serde(default = "default_dependencies")]
    pub dependencies: Vec<Dependency>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            maintainer: String::new(),
            vendor: String::new(),
            url: default_url(),
            description: default_description(),
            license: String::new(),
            install_dir: default_install_dir(),
            dependencies: default_dependencies(),
        }
    }
}

/// A runtime package dependency and its version constraint (e.g. `> 2.8`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Dependency {
    pub name: String,
    pub constraint: String,
}

impl Dependency {
    pub fn new(name: &str, constraint: &str) -> Self {
        Self {
            name: name.to_string(),
            constraint: constraint.to_string(),
        }
    }
}

/// A static file bundled next to the compiled binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileMapping {
    /// Operating system whose packages include this file.
    pub os: Os,
    /// Source file, relative to the build source directory unless absolute.
    pub source: PathBuf,
    /// Install path: absolute on Linux, relative to the staging root on macOS.
    pub target: String,
    #[serde(default = "default_mode")]
    pub mode: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Directory holding the client sources; the compiler runs here.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    #[serde(default = "default_compiler")]
    pub compiler: String,

    /// Arguments placed before `-o <output>`.
    #[serde(default = "default_compiler_args")]
    pub compiler_args: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            compiler: default_compiler(),
            compiler_args: default_compiler_args(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DescriptorConfig {
    /// Template for the flat package `PackageInfo`, relative to the source
    /// directory. The template bundled with the tool is used when unset.
    #[serde(default)]
    pub template: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_fpm")]
    pub fpm: String,

    /// Archiver for the flat package `Payload`.
    #[serde(default = "default_cpio")]
    pub cpio: String,

    #[serde(default = "default_mkbom")]
    pub mkbom: String,

    #[serde(default = "default_xar")]
    pub xar: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fpm: default_fpm(),
            cpio: default_cpio(),
            mkbom: default_mkbom(),
            xar: default_xar(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Write a SHA256SUMS file for the final packages.
    #[serde(default = "default_checksums")]
    pub checksums: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            checksums: default_checksums(),
        }
    }
}

/// Package metadata for one release run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
    pub maintainer: String,
    pub vendor: String,
    pub url: String,
    pub description: String,
    pub license: String,
    pub install_dir: String,
    pub dependencies: Vec<Dependency>,
}

impl PackageSpec {
    /// Install path of the client binary, e.g. `/usr/local/bin/svfs`.
    pub fn binary_install_path(&self) -> String {
        format!("{}/{}", self.install_dir.trim_end_matches('/'), self.name)
    }
}

fn default_name() -> String {
    "svfs".to_string()
}

fn default_url() -> String {
    "https://github.com/ovh/svfs".to_string()
}

fn default_description() -> String {
    "The Swift Virtual File System".to_string()
}

fn default_install_dir() -> String {
    "/usr/local/bin".to_string()
}

fn default_dependencies() -> Vec<Dependency> {
    vec![
        Dependency::new("fuse", "> 2.8"),
        Dependency::new("ruby", "> 1.9.1"),
    ]
}

fn default_mode() -> u32 {
    0o644
}

fn default_files() -> Vec<FileMapping> {
    let mapping = |os: Os, source: &str, target: &str| FileMapping {
        os,
        source: PathBuf::from(source),
        target: target.to_string(),
        mode: 0o755,
    };

    vec![
        mapping(
            Os::Linux,
            "scripts/hubic-application.rb",
            "/usr/local/bin/hubic-application",
        ),
        mapping(Os::Linux, "scripts/mount.svfs", "/sbin/mount.svfs"),
        mapping(
            Os::Darwin,
            "scripts/hubic-application.rb",
            "usr/local/bin/hubic-application",
        ),
        mapping(Os::Darwin, "scripts/mount.svfs", "usr/local/bin/mount_svfs"),
    ]
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_compiler() -> String {
    "go".to_string()
}

fn default_compiler_args() -> Vec<String> {
    vec!["build".to_string()]
}

fn default_fpm() -> String {
    "fpm".to_string()
}

fn default_cpio() -> String {
    "cpio".to_string()
}

fn default_mkbom() -> String {
    "mkbom".to_string()
}

fn default_xar() -> String {
    "xar".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("release")
}

fn default_checksums() -> bool {
    true
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Configuration file to load. A path given explicitly must exist;
    /// otherwise the project file is used when present, then the user-wide one.
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if !path.is_file() {
                anyhow::bail!("Configuration file {} not found", path.display());
            }
            return Ok(path.to_path_buf());
        }

        let local = PathBuf::from(LOCAL_CONFIG_PATH);
        if local.is_file() {
            Ok(local)
        } else {
            Ok(Self::default_path())
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("svfs-release.toml"))
            .unwrap_or_else(|| PathBuf::from("~/.config/svfs-release.toml"))
    }

    /// Merge configuration with command line arguments
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(dir) = &args.output {
            self.output.dir = dir.clone();
        }

        if args.no_checksum {
            self.output.checksums = false;
        }

        if let Some(dir) = &args.source_dir {
            self.build.source_dir = dir.clone();
        }
    }

    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.package.name.trim().is_empty() {
            return Err(ReleaseError::Config("package.name must not be empty".into()));
        }

        if !self.package.install_dir.starts_with('/') {
            return Err(ReleaseError::Config(format!(
                "package.install_dir must be absolute, got '{}'",
                self.package.install_dir
            )));
        }

        let mut seen = HashSet::new();
        for dep in &self.package.dependencies {
            if !seen.insert(dep.name.as_str()) {
                return Err(ReleaseError::Config(format!(
                    "Duplicate dependency '{}'",
                    dep.name
                )));
            }
        }

        for file in &self.files {
            let caps = file.os.capabilities();
            let absolute = file.target.starts_with('/');
            if caps.native_packager && !absolute {
                return Err(ReleaseError::Config(format!(
                    "Install path '{}' for {} must be absolute",
                    file.target, file.os
                )));
            }
            if caps.flat_package && absolute {
                return Err(ReleaseError::Config(format!(
                    "Install path '{}' for {} must be relative to the package root",
                    file.target, file.os
                )));
            }
        }

        self.matrix.validate()
    }

    /// Freeze the package metadata for a release of `version`.
    pub fn package_spec(&self, version: &str) -> PackageSpec {
        PackageSpec {
            name: self.package.name.clone(),
            version: version.to_string(),
            maintainer: self.package.maintainer.clone(),
            vendor: self.package.vendor.clone(),
            url: self.package.url.clone(),
            description: self.package.description.clone(),
            license: self.package.license.clone(),
            install_dir: self.package.install_dir.clone(),
            dependencies: self.package.dependencies.clone(),
        }
    }

    /// Static files declared for `os`, in declaration order.
    pub fn files_for(&self, os: &Os) -> Vec<FileMapping> {
        self.files.iter().filter(|f| &f.os == os).cloned().collect()
    }

    /// Resolve a path from the configuration against the source directory.
    pub fn source_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.build.source_dir.join(path)
        }
    }
}
