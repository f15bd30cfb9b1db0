use std::path::PathBuf;
use bootloader::{BiosBoot, UefiBoot};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CARGO_MANIFEST_DIR");
    println!("cargo:rerun-if-env-changed=OS86_PROFILE");
    println!("cargo:rerun-if-changed=../os");

    let manifest_dir = match std::env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set; skipping disk images");
            return;
        }
    };
    let workspace_root = manifest_dir.parent().unwrap_or(&manifest_dir).to_path_buf();
    let profile = std::env::var("OS86_PROFILE").unwrap_or_else(|_| "debug".into());

    let kernel_path = workspace_root
        .join("target")
        .join("x86_64-unknown-none")
        .join(&profile)
        .join("os86");

    if !kernel_path.exists() {
        println!(
            "cargo:warning=kernel binary not found at {}; run `cargo build -p os86 --target x86_64-unknown-none` first",
            kernel_path.display()
        );
        return;
    }

    // --- BIOS image ---
    let bios_img_path = workspace_root.join("os86-bios.img");
    if let Err(err) = BiosBoot::new(&kernel_path).create_disk_image(&bios_img_path) {
        panic!("failed to create BIOS disk image: {err}");
    }
    println!("cargo:rustc-env=OS86_BIOS_IMAGE={}", bios_img_path.display());

    // --- UEFI image ---
    let uefi_img_path = workspace_root.join("os86-uefi.img");
    if let Err(err) = UefiBoot::new(&kernel_path).create_disk_image(&uefi_img_path) {
        panic!("failed to create UEFI disk image: {err}");
    }
    println!("cargo:rustc-env=OS86_UEFI_IMAGE={}", uefi_img_path.display());
}
