//! Release targets and the static matrix they are enumerated from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ReleaseError, Result};

/// Operating system of a release target, using the Go toolchain's names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Os {
    Linux,
    Darwin,
    Other(String),
}

/// What the release pipeline can produce for an operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Packages are delegated to the generic native packager (deb, rpm).
    pub native_packager: bool,
    /// Packages are assembled by hand as macOS flat packages.
    pub flat_package: bool,
}

impl Os {
    pub fn as_str(&self) -> &str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Other(name) => name,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Os::Linux => Capabilities {
                native_packager: true,
                flat_package: false,
            },
            Os::Darwin => Capabilities {
                native_packager: false,
                flat_package: true,
            },
            Os::Other(_) => Capabilities {
                native_packager: false,
                flat_package: false,
            },
        }
    }
}

impl From<String> for Os {
    fn from(name: String) -> Self {
        match name.as_str() {
            "linux" => Os::Linux,
            "darwin" | "macos" => Os::Darwin,
            _ => Os::Other(name),
        }
    }
}

impl From<Os> for String {
    fn from(os: Os) -> Self {
        os.as_str().to_string()
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Native package container produced for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    Deb,
    Rpm,
    Pkg,
}

impl PackageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageFormat::Deb => "deb",
            PackageFormat::Rpm => "rpm",
            PackageFormat::Pkg => "pkg",
        }
    }

    /// Whether an OS with `caps` can produce this format.
    pub fn supported_by(&self, caps: Capabilities) -> bool {
        match self {
            PackageFormat::Deb | PackageFormat::Rpm => caps.native_packager,
            PackageFormat::Pkg => caps.flat_package,
        }
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PackageFormat {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "deb" => Ok(PackageFormat::Deb),
            "rpm" => Ok(PackageFormat::Rpm),
            "pkg" => Ok(PackageFormat::Pkg),
            _ => Err(ReleaseError::Config(format!("Unknown package format: {s}"))),
        }
    }
}

/// One `(os, format, arch)` leaf of the release matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    pub os: Os,
    pub format: PackageFormat,
    /// Architecture alias as written in the matrix (e.g. `armhf`).
    pub arch: String,
}

impl Target {
    pub fn new(os: Os, format: PackageFormat, arch: impl Into<String>) -> Self {
        Self {
            os,
            format,
            arch: arch.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.os, self.format, self.arch)
    }
}

impl FromStr for Target {
    type Err = ReleaseError;

    /// Parse `os/format/arch`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(ReleaseError::Config(format!(
                "Invalid target '{s}'. Expected format: os/format/arch (e.g. linux/deb/amd64)"
            )));
        }
        Ok(Target::new(
            Os::from(parts[0].to_string()),
            parts[1].parse()?,
            parts[2],
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatEntry {
    pub format: PackageFormat,
    pub archs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub os: Os,
    pub formats: Vec<FormatEntry>,
}

/// Operating systems → package formats → architectures, in traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetMatrix(pub Vec<MatrixEntry>);

impl TargetMatrix {
    /// Enumerate every leaf in configuration order.
    pub fn targets(&self) -> Vec<Target> {
        self.0
            .iter()
            .flat_map(|entry| {
                entry.formats.iter().flat_map(move |fmt| {
                    fmt.archs
                        .iter()
                        .map(move |arch| Target::new(entry.os.clone(), fmt.format, arch.clone()))
                })
            })
            .collect()
    }

    /// Reject formats the OS cannot produce and empty architecture names.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.0 {
            for fmt in &entry.formats {
                if !fmt.format.supported_by(entry.os.capabilities()) {
                    return Err(ReleaseError::Config(format!(
                        "Package format '{}' is not supported on '{}'",
                        fmt.format, entry.os
                    )));
                }
                if fmt.archs.iter().any(|a| a.trim().is_empty()) {
                    return Err(ReleaseError::Config(format!(
                        "Empty architecture in {}/{} matrix entry",
                        entry.os, fmt.format
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for TargetMatrix {
    fn default() -> Self {
        let archs = |names: &[&str]| -> Vec<String> {
            names.iter().map(|s| s.to_string()).collect()
        };
        TargetMatrix(vec![
            MatrixEntry {
                os: Os::Linux,
                formats: vec![
                    FormatEntry {
                        format: PackageFormat::Deb,
                        archs: archs(&["386", "amd64", "armhf", "armel"]),
                    },
                    FormatEntry {
                        format: PackageFormat::Rpm,
                        archs: archs(&["386", "amd64"]),
                    },
                ],
            },
            MatrixEntry {
                os: Os::Darwin,
                formats: vec![FormatEntry {
                    format: PackageFormat::Pkg,
                    archs: archs(&["386", "amd64"]),
                }],
            },
        ])
    }
}
