//! Engine signatures
//!
//! A built package only applies to the platform, architecture and runtime
//! major version it was built on. The signature joins the three, e.g.
//! `linux-x64-node-20`.

/// Platform name as runtimes report it
pub fn platform() -> &'static str {
    platform_name(std::env::consts::OS)
}

/// Architecture name as runtimes report it
pub fn arch() -> &'static str {
    arch_name(std::env::consts::ARCH)
}

fn platform_name(os: &'static str) -> &'static str {
    match os {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

fn arch_name(arch: &'static str) -> &'static str {
    match arch {
        "x86_64" => "x64",
        "x86" => "ia32",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        other => other,
    }
}

/// Signature for `runtime` at `version` on the current machine
pub fn current(runtime: &str, version: &str) -> String {
    signature(platform(), arch(), runtime, version)
}

/// Signature from explicit parts; only the major version is kept
pub fn signature(platform: &str, arch: &str, runtime: &str, version: &str) -> String {
    let version = version.trim_start_matches('v');
    let major = version.split('.').next().unwrap_or(version);
    format!("{}-{}-{}-{}", platform, arch, runtime, major)
}
