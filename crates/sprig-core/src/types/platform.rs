//! Platform subdirectories.

/// Subdirectory holding platform-independent packages
pub const NOARCH: &str = "noarch";

/// Subdirectories recognised in `channel/subdir::name` specs and configuration
pub const KNOWN_SUBDIRS: &[&str] = &[
    "noarch",
    "emscripten-wasm32",
    "wasi-wasm32",
    "freebsd-64",
    "linux-32",
    "linux-64",
    "linux-aarch64",
    "linux-armv6l",
    "linux-armv7l",
    "linux-ppc64le",
    "linux-s390x",
    "osx-64",
    "osx-arm64",
    "win-32",
    "win-64",
    "win-arm64",
    "zos-z",
];

/// Check whether `subdir` is a recognised platform subdirectory
pub fn is_known_subdir(subdir: &str) -> bool {
    KNOWN_SUBDIRS.contains(&subdir)
}

/// Subdirectory for the platform this binary was built for
pub fn host_subdir() -> String {
    let os = match std::env::consts::OS {
        "macos" => "osx",
        "windows" => "win",
        other => other,
    };
    let arch = match (os, std::env::consts::ARCH) {
        (_, "x86_64") => "64",
        (_, "x86") => "32",
        ("osx", "aarch64") | ("win", "aarch64") => "arm64",
        (_, "powerpc64") => "ppc64le",
        (_, other) => other,
    };
    format!("{}-{}", os, arch)
}
