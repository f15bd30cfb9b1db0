//! Kernel bring-up
//!
//! [`early_init`] takes the CPU from the bootloader's hand-off to a state
//! where every vector is dispatched:
//!
//! 1. interrupts off, serial and logger up
//! 2. check the boot stage left us in long mode
//! 3. build the [`Machine`]: GDT, IDT and console, created once
//! 4. load the GDT and reload every segment register
//! 5. load the IDT
//! 6. remap the PICs, program the PIT
//! 7. interrupts on

pub mod gdt;
pub mod idt;

#[cfg(all(target_arch = "x86_64", feature = "selftest"))]
pub mod selftest;

#[cfg(target_arch = "x86_64")]
pub use self::machine::{dispatch, early_init, kernel_loop, machine, Machine};

#[cfg(target_arch = "x86_64")]
mod machine {
    use core::ptr::NonNull;

    use bootloader_api::info::Optional;
    use bootloader_api::BootInfo;
    use spin::{Mutex, Once};

    use super::gdt::{self, loader, GlobalDescriptorTable, KERNEL_CODE_SELECTOR};
    use super::idt::dispatch::Dispatcher;
    use super::idt::frame::InterruptFrame;
    use super::idt::{self, entry, InterruptDescriptorTable};
    use crate::arch::x86::instructions;
    use crate::arch::x86::mode::{self, ActiveMode, CpuMode};
    use crate::arch::x86::pic::ChainedPics;
    use crate::arch::x86::pit;
    use crate::arch::x86::port::HardwarePorts;
    use crate::config;
    use crate::console::{Console, NullConsole, TextConsole};
    use crate::error::{InitError, InitResult};

    /// Everything the interrupt path and mainline share. Created once.
    pub struct Machine {
        gdt: GlobalDescriptorTable,
        idt: InterruptDescriptorTable<ActiveMode>,
        console: Mutex<TextConsole<HardwarePorts>>,
        dispatcher: Dispatcher,
    }

    static MACHINE: Once<Machine> = Once::new();

    impl Machine {
        fn new(console: TextConsole<HardwarePorts>) -> Self {
            Self {
                gdt: gdt::build_gdt::<ActiveMode>(),
                idt: idt::build_idt::<ActiveMode>(KERNEL_CODE_SELECTOR, entry::stub_address),
                console: Mutex::new(console),
                dispatcher: Dispatcher::new(ChainedPics::new(
                    config::PIC_MASTER_BASE,
                    config::PIC_SLAVE_BASE,
                )),
            }
        }

        pub fn gdt(&self) -> &GlobalDescriptorTable {
            &self.gdt
        }

        pub fn idt(&self) -> &InterruptDescriptorTable<ActiveMode> {
            &self.idt
        }

        pub fn dispatcher(&self) -> &Dispatcher {
            &self.dispatcher
        }

        /// Run `f` on the console with interrupts off, so the dispatcher
        /// never finds it locked mid-line.
        pub fn with_console<R>(&self, f: impl FnOnce(&mut TextConsole<HardwarePorts>) -> R) -> R {
            instructions::without_interrupts(|| f(&mut self.console.lock()))
        }

        fn dispatch(&self, frame: &mut InterruptFrame) {
            // SAFETY: interrupts are off inside the handler; nothing else
            // drives the PIC or the keyboard controller.
            let mut io = unsafe { HardwarePorts::new() };
            match self.console.try_lock() {
                Some(mut console) => self.dispatcher.dispatch(frame, &mut io, &mut *console),
                None => self.dispatcher.dispatch(frame, &mut io, &mut NullConsole),
            }
        }
    }

    /// The machine, once [`early_init`] has built it
    pub fn machine() -> Option<&'static Machine> {
        MACHINE.get()
    }

    /// Entry from the interrupt stubs
    pub fn dispatch(frame: &mut InterruptFrame) {
        if let Some(machine) = MACHINE.get() {
            machine.dispatch(frame);
        }
    }

    pub fn early_init(boot_info: &'static BootInfo) -> InitResult<&'static Machine> {
        instructions::disable();

        crate::serial::init();
        crate::logger::init(config::LOG_LEVEL)?;
        log::info!("os86: kernel running");

        if !mode::is_long_mode() {
            return Err(InitError::UnexpectedMode {
                expected: ActiveMode::NAME,
            });
        }
        log::info!("{}", ActiveMode::NAME);

        let physical_offset = match boot_info.physical_memory_offset {
            Optional::Some(offset) => offset,
            Optional::None => return Err(InitError::NoPhysicalMemoryMapping),
        };
        let cells = NonNull::new((physical_offset + config::TEXT_BUFFER_PHYS) as *mut u16)
            .ok_or(InitError::NoPhysicalMemoryMapping)?;

        // Fail before any CPU state changes
        pit::reload_value(config::TIMER_HZ)?;

        let machine = MACHINE.call_once(|| {
            // SAFETY: the bootloader maps all physical memory at
            // `physical_offset`; the text buffer is ours alone.
            let console = unsafe { TextConsole::new(cells, HardwarePorts::new()) };
            Machine::new(console)
        });
        gdt::log_gdt(&machine.gdt);

        // SAFETY: interrupts are off and the table lives in a static.
        unsafe { loader::load_gdt(&machine.gdt) };
        log::info!(
            "GDT loaded: CS={:#x} DS={:#x}",
            KERNEL_CODE_SELECTOR.0,
            gdt::KERNEL_DATA_SELECTOR.0
        );

        // SAFETY: every gate points at a stub in the kernel code segment
        // just loaded.
        unsafe { loader::load_idt(&machine.idt) };
        log::info!("IDT loaded: {} vectors", idt::IDT_ENTRIES);

        // SAFETY: a fixed table base is a physical address, reached through
        // the bootloader's mapping; modes with IDTR write nothing.
        if let Some(address) = unsafe { machine.idt.install_fixed(physical_offset) } {
            log::info!("vector table copied to {:#x}", address);
        }

        // SAFETY: single-threaded bring-up, interrupts still off.
        let mut io = unsafe { HardwarePorts::new() };
        let pics = machine.dispatcher.pics();
        pics.remap(&mut io);
        log::info!(
            "PIC remapped: master {:#04x}, slave {:#04x}",
            pics.master_base(),
            pics.slave_base()
        );

        let reload = pit::program_timer(&mut io, config::TIMER_HZ)?;
        log::info!("PIT: {} Hz (reload {})", config::TIMER_HZ, reload);

        instructions::enable();
        log::info!("interrupts enabled");
        Ok(machine)
    }

    /// Greet on the console, run the self tests, then idle.
    pub fn kernel_loop(machine: &'static Machine) -> ! {
        machine.with_console(|console| {
            console.set_attribute(config::STATUS_ATTRIBUTE);
            console.clear();
            console.put_str("Greetings! os86 running in ");
            console.put_str(ActiveMode::NAME);
            console.put_glyph(b'\n');
            console.put_hex(0x1A2B_3C4D);
            console.put_glyph(b' ');
            console.put_dec(-12345);
            console.put_glyph(b' ');
            console.put_dec(core::mem::size_of::<gdt::SegmentDescriptor>() as i64);
            console.put_glyph(b'\n');
        });

        #[cfg(feature = "selftest")]
        super::selftest::run(machine);

        loop {
            instructions::hlt();
        }
    }
}
