//! Puts `memory.x` on the linker search path, so the firmware and the on-target
//! testsuite both link against the same memory layout.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_src = manifest_dir.join("memory.x");
    fs::copy(&memory_src, out_dir.join("memory.x")).expect("copy memory.x -> OUT_DIR");

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed={}", memory_src.display());
}
