//! Engine executable path helpers

use crate::error::{GodotRlError, Result};

/// Subpath of the binary inside a macOS application bundle
pub const MACOS_BUNDLE_SUBPATH: &str = "/Contents/MacOS/";

/// Resolve the binary inside a macOS `.app` bundle
///
/// `./Demo.app` becomes `./Demo.app/Contents/MacOS/Demo`. The base name is
/// the part of a path segment before its last dot; exactly one segment may
/// provide one.
pub fn convert_macos_path(env_path: &str) -> Result<String> {
    let names: Vec<&str> = env_path
        .split('/')
        .filter_map(|segment| match segment.rfind('.') {
            Some(dot) if dot > 0 => Some(&segment[..dot]),
            _ => None,
        })
        .collect();

    match names.as_slice() {
        [name] => Ok(format!("{}{}{}", env_path, MACOS_BUNDLE_SUBPATH, name)),
        _ => Err(GodotRlError::InvalidPathFormat(format!(
            "expected one base name in '{}', found {:?}",
            env_path, names
        ))),
    }
}
