// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use super::Platform;
use crate::{
    context::{CoresImpl, EntryPointInfo},
    logger::{self, LockedWriter},
};
use arm_pl011_uart::{PL011Registers, Uart, UniqueMmioPointer};
use arm_sysregs::{MpidrEl1, SpsrEl3 as Spsr};
use core::ptr::NonNull;
use percore::Cores;

#[cfg(feature = "rme")]
compile_error!("RME is not supported on QEMU");

/// Base address of the secure world PL011 UART, aka. UART1.
const UART1_BASE: usize = 0x0904_0000;
const PL011_BASE_ADDRESS: *mut PL011Registers = UART1_BASE as _;

const BL32_BASE: usize = 0x0e10_0000;
const BL33_BASE: usize = 0x6000_0000;

/// The number of CPU clusters.
const CLUSTER_COUNT: usize = 1;
const PLATFORM_CPU_PER_CLUSTER_SHIFT: usize = 2;
/// The maximum number of CPUs in each cluster.
const MAX_CPUS_PER_CLUSTER: usize = 1 << PLATFORM_CPU_PER_CLUSTER_SHIFT;

/// The aarch64 'virt' machine of the QEMU emulator.
pub struct Qemu;

// SAFETY: `core_position` returns a unique index below `CORE_COUNT` for every MPIDR accepted by
// `mpidr_is_valid`, as long as `PLATFORM_CPU_PER_CLUSTER_SHIFT` is correct.
unsafe impl Platform for Qemu {
    const CORE_COUNT: usize = CLUSTER_COUNT * MAX_CPUS_PER_CLUSTER;

    type LogSinkImpl = LockedWriter<Uart<'static>>;

    fn init() {
        // SAFETY: `PL011_BASE_ADDRESS` is the base address of a PL011 device, and nothing else
        // accesses that address range.
        let uart_pointer =
            unsafe { UniqueMmioPointer::new(NonNull::new(PL011_BASE_ADDRESS).unwrap()) };
        logger::init(LockedWriter::new(Uart::new(uart_pointer)))
            .expect("Failed to initialise logger");
    }

    fn secure_entry_point() -> EntryPointInfo {
        let core_linear_id = CoresImpl::core_index() as u64;
        EntryPointInfo {
            pc: BL32_BASE,
            spsr: Spsr::D | Spsr::A | Spsr::I | Spsr::F | Spsr::M_AARCH64_EL1H,
            args: [0, 0, 0, 0, core_linear_id, 0, 0, 0],
        }
    }

    fn non_secure_entry_point() -> EntryPointInfo {
        EntryPointInfo {
            pc: BL33_BASE,
            spsr: Spsr::D | Spsr::A | Spsr::I | Spsr::F | Spsr::M_AARCH64_EL2H,
            args: Default::default(),
        }
    }

    fn mpidr_is_valid(mpidr: MpidrEl1) -> bool {
        mpidr.aff3() == 0
            && mpidr.aff2() == 0
            && usize::from(mpidr.aff1()) < CLUSTER_COUNT
            && usize::from(mpidr.aff0()) < MAX_CPUS_PER_CLUSTER
    }

    fn core_position(mpidr: u64) -> usize {
        let mpidr = MpidrEl1::from_bits_retain(mpidr);
        (usize::from(mpidr.aff1()) << PLATFORM_CPU_PER_CLUSTER_SHIFT) + usize::from(mpidr.aff0())
    }
}
