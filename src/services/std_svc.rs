// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! General queries of the Standard Secure service.

use crate::{
    context::World,
    services::{ServiceDescriptor, ServiceOps, SmcFlags},
    smccc::{CallType, FunctionId, NOT_SUPPORTED, OwningEntityNumber, SmcReturn},
};
use uuid::Uuid;

const ARM_STD_SVC_CALL_COUNT: u32 = 0x8400_ff00;
const ARM_STD_SVC_UID: u32 = 0x8400_ff01;
const ARM_STD_SVC_VERSION: u32 = 0x8400_ff03;

/// The number of calls implemented by this service.
const STD_SVC_CALL_COUNT: u32 = 3;

const STD_SVC_VERSION_MAJOR: u64 = 0;
const STD_SVC_VERSION_MINOR: u64 = 1;

/// UUID of the Standard Secure service implementation.
const ARM_STD_SVC_UUID: Uuid = Uuid::from_u128(0x108d_905b_f863_47e8_ae2d_c0fb_5641_f6e2);

/// Standard Secure service calls.
pub const STD_SVC: ServiceDescriptor = ServiceDescriptor::new(
    "std_svc",
    OwningEntityNumber::STANDARD_SECURE.0,
    OwningEntityNumber::STANDARD_SECURE.0,
    CallType::Fast,
    ServiceOps::Handle(handle_smc),
);

fn handle_smc(
    function: FunctionId,
    _regs: &[u64; SmcReturn::MAX_VALUES],
    flags: SmcFlags,
) -> (SmcReturn, World) {
    let result: SmcReturn = match function.0 {
        ARM_STD_SVC_CALL_COUNT => STD_SVC_CALL_COUNT.into(),
        ARM_STD_SVC_UID => ARM_STD_SVC_UUID.into(),
        ARM_STD_SVC_VERSION => [STD_SVC_VERSION_MAJOR, STD_SVC_VERSION_MINOR].into(),
        _ => NOT_SUPPORTED.into(),
    };
    (result, flags.world())
}
