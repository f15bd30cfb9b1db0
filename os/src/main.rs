#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod kernel_entry {
    use core::panic::PanicInfo;

    use os86::arch::x86::instructions;
    use os86::config::BOOTLOADER_CONFIG;
    use os86::kernel;

    bootloader_api::entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

    fn kernel_main(boot_info: &'static mut bootloader_api::BootInfo) -> ! {
        match kernel::early_init(boot_info) {
            Ok(machine) => kernel::kernel_loop(machine),
            Err(err) => {
                // The logger may not be up yet
                os86::serial::write_fmt(format_args!("os86: bring-up failed: {err}\n"));
                instructions::halt_forever()
            }
        }
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        os86::serial::write_fmt(format_args!("os86: {info}\n"));
        instructions::halt_forever()
    }
}

/// Built for the host only so the workspace checks there; the kernel runs
/// from `kernel_main` on `x86_64-unknown-none`.
#[cfg(not(target_os = "none"))]
fn main() {}
