// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use crate::{
    interrupt_mgmt,
    platform::{Platform, PlatformImpl, exception_free},
    smccc::SmcReturn,
};
use arm_sysregs::{ScrEl3, SpsrEl3 as Spsr, read_mpidr_el1};
use core::{
    cell::{RefCell, RefMut},
    ops::{Index, IndexMut},
};
use percore::{Cores, ExceptionFree, ExceptionLock, PerCore};

/// The number of contexts to store for each CPU core, one per security state.
const CPU_DATA_CONTEXT_NUM: usize = if cfg!(feature = "rme") { 3 } else { 2 };

/// Per-core mutable state.
pub type PerCoreState<T> =
    PerCore<[ExceptionLock<RefCell<T>>; PlatformImpl::CORE_COUNT], CoresImpl>;

/// A security state of the lower exception levels.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum World {
    /// The secure world, i.e. S-EL1 and S-EL2.
    Secure = 0,
    /// The normal world, i.e. NS-EL1 and NS-EL2.
    NonSecure = 1,
    /// The realm world.
    #[cfg(feature = "rme")]
    Realm = 2,
}

impl World {
    fn index(self) -> usize {
        self as usize
    }
}

/// Implementation of the `Cores` trait to get the index of the current CPU core.
pub struct CoresImpl;

// SAFETY: This implementation never returns the same index for different cores because
// `core_position` is guaranteed not to.
unsafe impl Cores for CoresImpl {
    fn core_index() -> usize {
        PlatformImpl::core_position(read_mpidr_el1().bits())
    }
}

/// The state of a core at the next lower EL in a given security state.
#[derive(Clone, Debug)]
#[repr(C)]
pub struct CpuContext {
    pub gpregs: GpRegs,
    pub el3_state: El3State,
}

impl CpuContext {
    const EMPTY: Self = Self {
        gpregs: GpRegs::EMPTY,
        el3_state: El3State::EMPTY,
    };
}

/// AArch64 general purpose register context structure.
#[derive(Clone, Debug)]
#[repr(C, align(16))]
pub struct GpRegs {
    pub registers: [u64; Self::COUNT],
}

impl GpRegs {
    /// The number of (64-bit) registers included in `GpRegs`.
    const COUNT: usize = 32;

    const EMPTY: Self = Self {
        registers: [0; Self::COUNT],
    };

    /// Returns the registers which may carry SMC arguments, i.e. x0-x17.
    pub fn smc_args(&self) -> [u64; SmcReturn::MAX_VALUES] {
        core::array::from_fn(|i| self.registers[i])
    }

    /// Writes the given return value to the general-purpose registers.
    pub fn write_return_value(&mut self, value: &SmcReturn) {
        for (i, value) in value.values().iter().enumerate() {
            self.registers[i] = *value;
        }
    }
}

/// Registers used by EL3 firmware to return to the lower EL.
#[derive(Clone, Debug)]
#[repr(C, align(16))]
pub struct El3State {
    pub scr_el3: ScrEl3,
    pub spsr_el3: Spsr,
    pub elr_el3: usize,
}

impl El3State {
    const EMPTY: Self = Self {
        scr_el3: ScrEl3::empty(),
        spsr_el3: Spsr::empty(),
        elr_el3: 0,
    };
}

/// An array with one `T` for each world.
#[derive(Clone, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub struct PerWorld<T>([T; CPU_DATA_CONTEXT_NUM]);

impl<T> Index<World> for PerWorld<T> {
    type Output = T;

    fn index(&self, world: World) -> &Self::Output {
        &self.0[world.index()]
    }
}

impl<T> IndexMut<World> for PerWorld<T> {
    fn index_mut(&mut self, world: World) -> &mut Self::Output {
        &mut self.0[world.index()]
    }
}

pub type CpuState = PerWorld<CpuContext>;

impl CpuState {
    pub const EMPTY: Self = Self([CpuContext::EMPTY; CPU_DATA_CONTEXT_NUM]);
}

static CPU_STATE: PerCoreState<CpuState> = PerCore::new(
    [const { ExceptionLock::new(RefCell::new(CpuState::EMPTY)) }; PlatformImpl::CORE_COUNT],
);

/// Returns a reference to the `CpuState` for the current CPU.
///
/// Panics if the `CpuState` is already borrowed.
pub fn cpu_state(token: ExceptionFree) -> RefMut<CpuState> {
    CPU_STATE.get().borrow_mut(token)
}

/// Initialises all CPU contexts for this CPU, ready for first boot.
pub fn initialise_contexts(
    non_secure_entry_point: &EntryPointInfo,
    secure_entry_point: &EntryPointInfo,
    #[cfg(feature = "rme")] realm_entry_point: &EntryPointInfo,
) {
    exception_free(|token| {
        let mut cpu_state = cpu_state(token);
        initialise_nonsecure(&mut cpu_state[World::NonSecure], non_secure_entry_point);
        initialise_secure(&mut cpu_state[World::Secure], secure_entry_point);
        #[cfg(feature = "rme")]
        initialise_realm(&mut cpu_state[World::Realm], realm_entry_point);
    });
}

/// Initialises parts of the given CPU context that are the same for all worlds.
fn initialise_common(context: &mut CpuContext, entry_point: &EntryPointInfo) {
    context.el3_state.elr_el3 = entry_point.pc;
    context.el3_state.spsr_el3 = entry_point.spsr;
    context.gpregs.registers[..entry_point.args.len()].copy_from_slice(&entry_point.args);

    // All fields of SCR_EL3 are architecturally UNKNOWN on reset, so set them all here.
    //
    // SCR_EL3.SIF: Set to one to disable instruction fetches from Non-secure memory.
    //
    // SCR_EL3.EA: Set to one to route External Aborts and SError Interrupts to EL3 when executing
    // at any EL.
    //
    // SCR_EL3.IRQ and SCR_EL3.FIQ start clear and are set by the interrupt routing model of each
    // world.
    context.el3_state.scr_el3 = ScrEl3::RES1 | ScrEl3::HCE | ScrEl3::EA | ScrEl3::SIF | ScrEl3::RW;
}

/// Initialises the given CPU context ready for booting NS-EL2 or NS-EL1.
fn initialise_nonsecure(context: &mut CpuContext, entry_point: &EntryPointInfo) {
    initialise_common(context, entry_point);
    context.el3_state.scr_el3 |= ScrEl3::NS;
    context.el3_state.scr_el3 |= interrupt_mgmt::get_scr_el3_from_routing_model(World::NonSecure);
}

/// Initialises the given CPU context ready for booting S-EL2 or S-EL1.
fn initialise_secure(context: &mut CpuContext, entry_point: &EntryPointInfo) {
    initialise_common(context, entry_point);

    // Enable Secure EL1 access to timer registers.
    // Otherwise they would be accessible only at EL3.
    context.el3_state.scr_el3 |= ScrEl3::ST;
    context.el3_state.scr_el3 |= interrupt_mgmt::get_scr_el3_from_routing_model(World::Secure);
}

/// Initialises the given CPU context ready for booting Realm world
#[cfg(feature = "rme")]
fn initialise_realm(context: &mut CpuContext, entry_point: &EntryPointInfo) {
    initialise_common(context, entry_point);
    // SCR_NS + SCR_NSE = Realm state
    context.el3_state.scr_el3 |= ScrEl3::NS | ScrEl3::NSE;
}

/// Information about the entry point for a next stage (e.g. BL32 or BL33).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntryPointInfo {
    /// The entry point address.
    pub pc: usize,
    /// The `spsr_el3` value to set before `eret`, to set the appropriate PSTATE.
    pub spsr: Spsr,
    /// Boot arguments to pass in `x0`-`x7`.
    pub args: [u64; 8],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_point() -> EntryPointInfo {
        EntryPointInfo {
            pc: 0x8000_0000,
            spsr: Spsr::D | Spsr::A | Spsr::I | Spsr::F | Spsr::M_AARCH64_EL1H,
            args: [1, 2, 3, 4, 5, 6, 7, 8],
        }
    }

    #[test]
    fn secure_context() {
        let mut context = CpuContext::EMPTY;
        initialise_secure(&mut context, &entry_point());

        assert_eq!(context.el3_state.elr_el3, 0x8000_0000);
        assert_eq!(context.gpregs.registers[..8], [1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(context.el3_state.scr_el3.contains(ScrEl3::ST | ScrEl3::RW | ScrEl3::EA));
        assert!(!context.el3_state.scr_el3.contains(ScrEl3::NS));
    }

    #[test]
    fn nonsecure_context() {
        let mut context = CpuContext::EMPTY;
        initialise_nonsecure(&mut context, &entry_point());

        assert!(context.el3_state.scr_el3.contains(ScrEl3::NS));
        assert!(!context.el3_state.scr_el3.contains(ScrEl3::ST));
    }

    #[test]
    fn smc_args_and_return_value() {
        let mut regs = GpRegs::EMPTY;
        regs.registers[0] = 0x8400_ff01;
        regs.registers[17] = 17;
        regs.registers[18] = 18;
        let args = regs.smc_args();
        assert_eq!(args[0], 0x8400_ff01);
        assert_eq!(args[17], 17);

        regs.write_return_value(&SmcReturn::from([4, 5]));
        assert_eq!(regs.registers[..3], [4, 5, 0]);
        assert_eq!(regs.registers[18], 18);
    }

    #[test]
    fn per_world_indexing() {
        let mut state = CpuState::EMPTY;
        state[World::NonSecure].el3_state.elr_el3 = 42;
        assert_eq!(state[World::NonSecure].el3_state.elr_el3, 42);
        assert_eq!(state[World::Secure].el3_state.elr_el3, 0);
    }
}
