// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tracing::debug;

const UNKNOWN_KERNEL: &str = "unknown";

/// Release string of the running kernel (`uname -r`), or `"unknown"` when it
/// cannot be read.
#[must_use]
pub fn kernel_version() -> String {
    #[cfg(unix)]
    {
        match nix::sys::utsname::uname() {
            Ok(uts) => {
                if let Some(release) = uts.release().to_str() {
                    if !release.is_empty() {
                        return release.to_string();
                    }
                }
                debug!("Kernel release is empty or not valid UTF-8");
            }
            Err(e) => {
                debug!("Failed to read kernel release: {}", e);
            }
        }
    }
    #[cfg(not(unix))]
    {
        debug!("Kernel release is not available on {}", std::env::consts::OS);
    }

    UNKNOWN_KERNEL.to_string()
}
