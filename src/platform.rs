// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

macro_rules! select_platform {
    (platform = $condition:literal, $mod:ident::$plat_impl:ident) => {
        #[cfg(all(platform = $condition, not(test)))]
        mod $mod;

        #[cfg(all(platform = $condition, not(test)))]
        pub use $mod::$plat_impl as PlatformImpl;
    };
    (test, $mod:ident::$plat_impl:ident) => {
        #[cfg(test)]
        mod $mod;

        #[cfg(test)]
        pub use $mod::$plat_impl as PlatformImpl;
    };
}

select_platform!(platform = "qemu", qemu::Qemu);
select_platform!(test, test::TestPlatform);

#[cfg(not(any(test, platform = "qemu")))]
compile_error!("No platform selected, build with e.g. `--cfg platform=\"qemu\"`");

use crate::{context::EntryPointInfo, logger::LogSink};
use arm_sysregs::MpidrEl1;
#[cfg(not(test))]
pub use percore::exception_free;
#[cfg(test)]
pub use test::exception_free;

/// Type alias for convenience, to avoid having to use the complicated type name everywhere.
pub type LogSinkImpl = <PlatformImpl as Platform>::LogSinkImpl;

/// The hooks implemented by all platforms.
///
/// # Safety
///
/// `core_position` must never return the same index for two different valid MPIDR values, and must
/// never return a value greater than or equal to `CORE_COUNT`.
pub unsafe trait Platform {
    /// The number of CPU cores.
    const CORE_COUNT: usize;

    /// Platform dependent LogSink implementation type for Logger.
    type LogSinkImpl: LogSink;

    /// Initialises the logger and anything else the platform needs, on the primary core before any
    /// runtime service is initialised.
    ///
    /// Any logs sent before this is called will be ignored.
    fn init();

    /// Returns the entry point for the secure world, i.e. BL32.
    fn secure_entry_point() -> EntryPointInfo;

    /// Returns the entry point for the non-secure world, i.e. BL33.
    fn non_secure_entry_point() -> EntryPointInfo;

    /// Returns the entry point for the realm world.
    #[cfg(feature = "rme")]
    fn realm_entry_point() -> EntryPointInfo;

    /// Returns whether the given MPIDR is valid for this platform.
    fn mpidr_is_valid(mpidr: MpidrEl1) -> bool;

    /// Given a valid MPIDR value, returns the corresponding linear core index.
    ///
    /// For an invalid MPIDR value no guarantees are made about the return value.
    fn core_position(mpidr: u64) -> usize;
}
