//! # svfs-release
//!
//! Release packaging for the svfs filesystem client.
//!
//! ## Overview
//!
//! `svfs-release` cross-compiles the client for every (OS, architecture)
//! pair of a static release matrix and wraps each binary in the native
//! package of its platform: `.deb` and `.rpm` on Linux through `fpm`, and a
//! hand-assembled flat `.pkg` on macOS.
//!
//! ## Pipeline
//!
//! Targets run one at a time, in matrix order:
//!
//! 1. the architecture alias is normalized (`armhf` → `GOARCH=arm GOARM=6`)
//! 2. the client is compiled to `<name>-<os>-<arch>`
//! 3. the binary is packaged by the assembler the OS supports
//! 4. the intermediate binary is removed
//!
//! The first failure aborts the whole run.
//!
//! ## Usage
//!
//! ```bash
//! # Release the tag on HEAD
//! svfs-release
//!
//! # Release an explicit version into ./dist
//! svfs-release --tag v0.9.1 --output dist
//!
//! # Only build some targets
//! svfs-release --targets linux/deb/amd64,darwin/pkg/amd64
//!
//! # Render a Dockerfile for the release
//! svfs-release render --template Dockerfile.tmpl --to Dockerfile
//! ```
//!
//! ## Configuration
//!
//! The matrix, package metadata, bundled files and tool paths are read from
//! `.config/svfs-release.toml` in the working directory, or
//! `~/.config/svfs-release.toml` for user-wide settings.

/// Architecture alias normalization for the Go toolchain
pub mod arch;

/// Release orchestration over the target matrix
pub mod builder;

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Cross-compilation of the client binary
pub mod compiler;

/// Configuration file handling and default settings management
pub mod config;

/// Template rendering for package descriptors and metadata files
pub mod descriptor;

/// Error types and error handling utilities
pub mod error;

/// Native package assembly and checksum generation
pub mod packager;

/// Structured external command execution
pub mod process;

/// Release targets and the target matrix
pub mod target;

/// File system helpers shared by the pipeline stages
pub mod utils;
