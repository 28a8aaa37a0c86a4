// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The EL3 runtime of RF-A: SMC routing to runtime services, and interrupt type routing.
//!
//! A platform boot path calls [`bl31_main`] on the primary core and [`bl31_warm_main`] on each
//! secondary core, then passes each SMC or interrupt trapped from a lower EL to [`handle_smc`] or
//! [`handle_interrupt`] with the world it came from, and resumes the world they return.

#![cfg_attr(not(test), no_std)]

mod context;
mod gicv3;
mod interrupt_mgmt;
mod logger;
mod platform;
mod services;
mod smccc;

pub use crate::{
    context::{EntryPointInfo, World},
    interrupt_mgmt::{
        EALREADY, EINVAL, InterruptError, InterruptHandler, InterruptType, RoutingModel,
        disable_intr_rm_local, enable_intr_rm_local, get_interrupt_type_handler,
        get_scr_el3_from_routing_model, handle_interrupt, register_interrupt_type_handler,
    },
    logger::{LockedWriter, LogSink},
    platform::Platform,
    services::{
        InitError, InitFn, InvalidDescriptor, RuntimeServices, ServiceDescriptor, ServiceOps,
        SmcFlags, SmcHandler, handle_smc, runtime_svc_init,
    },
    smccc::{
        CallType, FunctionId, INVALID_PARAMETER, MAX_RT_SVCS, NOT_REQUIRED, NOT_SUPPORTED,
        OEN_LIMIT, OwningEntity, OwningEntityNumber, SUCCESS, SmcConvention, SmcReturn, unique_oen,
    },
};

use crate::{context::initialise_contexts, platform::PlatformImpl};
use log::{debug, info};

/// Boots the EL3 runtime on the primary core.
///
/// Initialises the platform and logger, then the runtime services, then the saved contexts of each
/// world on this core. Must be called exactly once, before any other core is released.
pub fn bl31_main() {
    PlatformImpl::init();
    info!("Rust BL31 starting");

    services::runtime_svc_init();

    init_contexts();
    info!("Contexts initialised, ready to enter lower ELs");
}

/// Boots the EL3 runtime on a secondary core, after [`bl31_main`] has run on the primary core.
pub fn bl31_warm_main() {
    debug!("Warmboot");
    init_contexts();
}

fn init_contexts() {
    let non_secure_entry_point = PlatformImpl::non_secure_entry_point();
    let secure_entry_point = PlatformImpl::secure_entry_point();
    #[cfg(feature = "rme")]
    let realm_entry_point = PlatformImpl::realm_entry_point();

    initialise_contexts(
        &non_secure_entry_point,
        &secure_entry_point,
        #[cfg(feature = "rme")]
        &realm_entry_point,
    );
}
