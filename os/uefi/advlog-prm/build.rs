#[path = "src/image.rs"]
mod image;

use std::env;

fn main() {
    // Rebuild when inputs change
    println!("cargo:rerun-if-changed=src/image.rs");

    // Runtime driver subsystem for the driver binary only
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if let Some(arg) = image::driver_link_arg(&target_os) {
        println!("cargo:rustc-link-arg-bin=advlog-prm-driver={arg}");
    }
}
