//! Prints the disk images produced by the build script.

fn main() {
    match (option_env!("OS86_BIOS_IMAGE"), option_env!("OS86_UEFI_IMAGE")) {
        (Some(bios), Some(uefi)) => {
            println!("BIOS image: {bios}");
            println!("UEFI image: {uefi}");
        }
        _ => {
            eprintln!("no disk images were built; build the kernel for x86_64-unknown-none first");
            std::process::exit(1);
        }
    }
}
