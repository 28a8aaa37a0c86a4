// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Build script for the EL3 runtime.

/// Platforms which can be selected with `--cfg platform="..."`.
const PLATFORMS: [&str; 1] = ["qemu"];

fn main() {
    println!(
        "cargo::rustc-check-cfg=cfg(platform, values(\"{}\"))",
        PLATFORMS.join("\", \""),
    );
    println!("cargo:rerun-if-env-changed=LOG_LEVEL");
}
