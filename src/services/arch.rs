// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use crate::{
    context::World,
    services::{ServiceDescriptor, ServiceOps, SmcFlags},
    smccc::{CallType, FunctionId, NOT_SUPPORTED, OwningEntityNumber, SUCCESS, SmcReturn},
};

/// Function ID of `SMCCC_VERSION`.
pub(crate) const SMCCC_VERSION: u32 = 0x8000_0000;
const SMCCC_ARCH_FEATURES: u32 = 0x8000_0001;

/// SMCCC version 1.5, as returned by `SMCCC_VERSION`.
pub(crate) const SMCCC_VERSION_1_5: i32 = 0x0001_0005;

/// Arm architecture SMCs.
pub const ARM_ARCH_SVC: ServiceDescriptor = ServiceDescriptor::new(
    "arm_arch_svc",
    OwningEntityNumber::ARM_ARCHITECTURE.0,
    OwningEntityNumber::ARM_ARCHITECTURE.0,
    CallType::Fast,
    ServiceOps::Handle(handle_smc),
);

fn handle_smc(
    function: FunctionId,
    regs: &[u64; SmcReturn::MAX_VALUES],
    flags: SmcFlags,
) -> (SmcReturn, World) {
    let result: SmcReturn = match function.0 {
        SMCCC_VERSION => version().into(),
        SMCCC_ARCH_FEATURES => arch_features(regs[1] as u32).into(),
        _ => NOT_SUPPORTED.into(),
    };
    (result, flags.world())
}

fn version() -> i32 {
    SMCCC_VERSION_1_5
}

fn arch_features(arch_func_id: u32) -> i32 {
    match arch_func_id {
        SMCCC_VERSION | SMCCC_ARCH_FEATURES => SUCCESS,
        _ => NOT_SUPPORTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(function: u32, arg: u64, world: World) -> (SmcReturn, World) {
        let mut regs = [0; SmcReturn::MAX_VALUES];
        regs[1] = arg;
        handle_smc(FunctionId(function), &regs, SmcFlags::from_world(world))
    }

    #[test]
    fn version_from_both_worlds() {
        assert_eq!(
            call(SMCCC_VERSION, 0, World::Secure),
            (SmcReturn::from(0x0001_0005u64), World::Secure)
        );
        assert_eq!(
            call(SMCCC_VERSION, 0, World::NonSecure),
            (SmcReturn::from(0x0001_0005u64), World::NonSecure)
        );
    }

    #[test]
    fn features() {
        for (arch_func_id, expected) in [
            (SMCCC_VERSION, SUCCESS),
            (SMCCC_ARCH_FEATURES, SUCCESS),
            (0x8000_8000, NOT_SUPPORTED),
            (0x8400_0000, NOT_SUPPORTED),
        ] {
            assert_eq!(
                call(SMCCC_ARCH_FEATURES, arch_func_id.into(), World::NonSecure).0,
                SmcReturn::from(expected),
                "{arch_func_id:#x}"
            );
        }
    }

    #[test]
    fn unknown_function() {
        assert_eq!(
            call(0x8000_00ff, 0, World::NonSecure).0,
            SmcReturn::from(NOT_SUPPORTED)
        );
    }
}
