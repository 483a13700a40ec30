//! Architecture aliases used in the release matrix, mapped to what the Go
//! toolchain understands.

/// Compiler-facing architecture for one matrix alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerArch {
    /// Value for `GOARCH`.
    pub arch: String,
    /// Value for `GOARM`, only set for 32-bit ARM aliases.
    pub arm_revision: Option<u8>,
}

/// `(alias, GOARCH, GOARM)`
const ARCH_ALIASES: &[(&str, &str, Option<u8>)] = &[
    ("armhf", "arm", Some(6)),
    ("armel", "arm", Some(5)),
    ("i386", "386", None),
];

/// Map an architecture alias to the compiler's architecture and ARM revision.
///
/// Unknown names pass through unchanged.
pub fn normalize(alias: &str) -> CompilerArch {
    ARCH_ALIASES
        .iter()
        .find(|(name, _, _)| *name == alias)
        .map(|(_, arch, arm_revision)| CompilerArch {
            arch: (*arch).to_string(),
            arm_revision: *arm_revision,
        })
        .unwrap_or_else(|| CompilerArch {
            arch: alias.to_string(),
            arm_revision: None,
        })
}
