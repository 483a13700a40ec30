//! Native package assembly and release checksums.
//!
//! Each target OS declares which assembler it supports (see
//! [`Capabilities`](crate::target::Capabilities)): Linux packages are built
//! by `fpm`, macOS flat packages are assembled by hand.

mod linux;
mod macos;
pub mod payload;

pub use linux::{file_mapping_args, fpm_args, LinuxAssembler};
pub use macos::{package_file_name, MacAssembler, MacPackageLayout, PAYLOAD_OWNER};

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::PackageSpec;
use crate::error::{ReleaseError, Result};
use crate::target::Target;

/// Turns one compiled binary into one native package.
pub trait PackageAssembler {
    /// Short name used in logs.
    fn kind(&self) -> &'static str;

    /// Package `binary` for `target` into `output_dir`, returning the final
    /// package path.
    fn assemble(
        &self,
        target: &Target,
        spec: &PackageSpec,
        binary: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf>;
}

/// Generate SHA256 checksums for files
pub fn generate_checksums(files: &[PathBuf], output_dir: &Path) -> Result<PathBuf> {
    let checksum_path = output_dir.join("SHA256SUMS");
    let mut checksum_file =
        File::create(&checksum_path).map_err(|e| ReleaseError::fs(&checksum_path, e))?;

    for file_path in files {
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ReleaseError::Config(format!("Invalid file path: {}", file_path.display()))
            })?;

        let mut file = File::open(file_path).map_err(|e| ReleaseError::fs(file_path, e))?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        let hash_hex = hex::encode(hasher.finalize());

        writeln!(checksum_file, "{}  {}", hash_hex, file_name)?;
    }

    tracing::info!("Generated checksums: {}", checksum_path.display());
    Ok(checksum_path)
}
