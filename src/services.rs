// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Registration and dispatch of runtime services.
//!
//! Each service is described by a [`ServiceDescriptor`] in a table fixed at build time, claiming a
//! contiguous range of Owning Entity Numbers for one call type. At boot [`runtime_svc_init`]
//! validates and initialises every service and builds an index from each (call type, OEN) routing
//! key to the service which owns it, so that dispatching an SMC is a single table lookup.

pub mod arch;
pub mod std_svc;

use crate::{
    context::{World, cpu_state},
    platform::exception_free,
    smccc::{CallType, FunctionId, MAX_RT_SVCS, NOT_SUPPORTED, OEN_LIMIT, SmcReturn, unique_oen},
};
use bitflags::bitflags;
use log::{error, info};
use spin::Once;
use thiserror::Error;

/// The built-in runtime services.
static RT_SVC_DESCS: [ServiceDescriptor; 2] = [arch::ARM_ARCH_SVC, std_svc::STD_SVC];

static RUNTIME_SERVICES: Once<RuntimeServices> = Once::new();

/// Initialises a service, once at boot before any SMC is dispatched to it.
pub type InitFn = fn() -> Result<(), InitError>;

/// Handles an SMC for a service.
///
/// It is passed the function ID with the SVE hint bit cleared, the caller's x0-x17, and flags
/// describing the call. It returns the values to write to the registers of the world to resume,
/// and that world.
pub type SmcHandler = fn(FunctionId, &[u64; SmcReturn::MAX_VALUES], SmcFlags) -> (SmcReturn, World);

/// The callbacks a runtime service provides.
///
/// A service must have at least one of the two.
#[derive(Clone, Copy, Debug)]
pub enum ServiceOps {
    /// The service only needs initialising, and handles no SMCs.
    Init(InitFn),
    /// The service handles SMCs and needs no initialisation.
    Handle(SmcHandler),
    /// The service needs initialising and then handles SMCs.
    InitAndHandle(InitFn, SmcHandler),
}

/// Describes a runtime service and the SMC function IDs it handles.
#[derive(Clone, Copy, Debug)]
pub struct ServiceDescriptor {
    /// Name of the service, for logging.
    pub name: &'static str,
    /// The first Owning Entity Number handled by the service.
    pub start_oen: u8,
    /// The last Owning Entity Number handled by the service, inclusive.
    pub end_oen: u8,
    /// The raw call type of the calls handled by the service, as in bit 31 of the function ID.
    pub call_type: u8,
    /// The initialisation and SMC handler callbacks.
    pub ops: ServiceOps,
}

impl ServiceDescriptor {
    /// Creates a descriptor for a service handling the OENs `start_oen..=end_oen` of the given call
    /// type.
    pub const fn new(
        name: &'static str,
        start_oen: u8,
        end_oen: u8,
        call_type: CallType,
        ops: ServiceOps,
    ) -> Self {
        Self {
            name,
            start_oen,
            end_oen,
            call_type: call_type as u8,
            ops,
        }
    }

    /// Checks that the descriptor is well-formed, and returns its call type if so.
    pub fn validate(&self) -> Result<CallType, InvalidDescriptor> {
        if self.end_oen >= OEN_LIMIT {
            return Err(InvalidDescriptor::EndOutOfRange(self.end_oen));
        }
        if self.start_oen > self.end_oen {
            return Err(InvalidDescriptor::StartAfterEnd {
                start: self.start_oen,
                end: self.end_oen,
            });
        }
        CallType::try_from(self.call_type)
            .map_err(|_| InvalidDescriptor::UnknownCallType(self.call_type))
    }

    /// Returns the init callback, if the service has one.
    pub fn init(&self) -> Option<InitFn> {
        match self.ops {
            ServiceOps::Init(init) | ServiceOps::InitAndHandle(init, _) => Some(init),
            ServiceOps::Handle(_) => None,
        }
    }

    /// Returns the SMC handler, if the service has one.
    pub fn handler(&self) -> Option<SmcHandler> {
        match self.ops {
            ServiceOps::Handle(handler) | ServiceOps::InitAndHandle(_, handler) => Some(handler),
            ServiceOps::Init(_) => None,
        }
    }
}

/// A reason why a service descriptor is malformed.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum InvalidDescriptor {
    /// The end OEN is beyond the 6-bit OEN field.
    #[error("end OEN {0} is out of range")]
    EndOutOfRange(u8),
    /// The OEN range is empty.
    #[error("start OEN {start} is after end OEN {end}")]
    StartAfterEnd {
        /// The first OEN of the range.
        start: u8,
        /// The last OEN of the range.
        end: u8,
    },
    /// The call type is neither fast nor yielding.
    #[error("unknown call type {0}")]
    UnknownCallType(u8),
}

/// An error initialising a runtime service.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum InitError {
    /// Something the service depends on is not present.
    #[error("not present")]
    NotPresent,
    /// The service failed with the given error code.
    #[error("error code {0}")]
    Code(i32),
}

bitflags! {
    /// Information about an SMC passed to the service handling it.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct SmcFlags: u32 {
        /// The call came from the normal world.
        const NON_SECURE = 1 << 0;
        /// The call came from the realm world.
        #[cfg(feature = "rme")]
        const REALM = 1 << 5;
        /// The caller set the SVE hint bit in the function ID, so SVE state beyond the SIMD
        /// registers need not be preserved.
        const SVE_HINT = 1 << 16;
    }
}

impl SmcFlags {
    /// Returns the flags recording that a call came from the given world.
    pub fn from_world(world: World) -> Self {
        match world {
            World::Secure => Self::empty(),
            World::NonSecure => Self::NON_SECURE,
            #[cfg(feature = "rme")]
            World::Realm => Self::REALM,
        }
    }

    /// Returns the world which made the call.
    pub fn world(self) -> World {
        #[cfg(feature = "rme")]
        if self.contains(Self::REALM) {
            return World::Realm;
        }
        if self.contains(Self::NON_SECURE) {
            World::NonSecure
        } else {
            World::Secure
        }
    }
}

/// A table of runtime services, with the index mapping each routing key to the service owning it.
pub struct RuntimeServices {
    descs: &'static [ServiceDescriptor],
    /// Index into `descs` for each routing key, or `None` if no service owns it.
    indices: [Option<u8>; MAX_RT_SVCS],
    /// The number of services which were initialised successfully.
    installed: usize,
}

impl RuntimeServices {
    /// Validates and initialises the given services, and builds the routing index for them.
    ///
    /// Panics if any descriptor is malformed. A service whose init callback fails is logged and
    /// left out of the index, so that calls to it are reported as unknown. Services which only
    /// have an init callback own no routing keys. Where the OEN ranges of services for the same
    /// call type overlap, the later service in the table owns the shared keys.
    pub fn new(descs: &'static [ServiceDescriptor]) -> Self {
        assert!(
            descs.len() < MAX_RT_SVCS,
            "Too many runtime services: {}",
            descs.len()
        );

        let mut indices = [None; MAX_RT_SVCS];
        let mut installed = 0;
        for (index, desc) in descs.iter().enumerate() {
            let call_type = match desc.validate() {
                Ok(call_type) => call_type,
                Err(e) => {
                    error!("Invalid runtime service descriptor {}: {e}", desc.name);
                    panic!("Invalid runtime service descriptor {}: {e}", desc.name);
                }
            };

            if let Some(init) = desc.init()
                && let Err(e) = init()
            {
                error!("Error initializing runtime service {}: {e}", desc.name);
                continue;
            }
            installed += 1;

            if desc.handler().is_none() {
                continue;
            }
            for oen in desc.start_oen..=desc.end_oen {
                indices[unique_oen(oen, call_type)] = Some(index as u8);
            }
        }

        Self {
            descs,
            indices,
            installed,
        }
    }

    /// Returns the number of services which passed initialisation, including those which handle no
    /// SMCs.
    pub fn installed(&self) -> usize {
        self.installed
    }

    /// Returns the service which owns the routing key of the given function ID, if any.
    pub fn lookup(&self, function: FunctionId) -> Option<&ServiceDescriptor> {
        let index = self.indices[function.unique_oen()]?;
        Some(&self.descs[usize::from(index)])
    }

    /// Dispatches an SMC with the given x0-x17 from the given world to the service which owns it.
    ///
    /// Returns the values to write to the registers of the world to resume, and that world. Calls
    /// which no service handles return `NOT_SUPPORTED` to the caller.
    pub fn handle_smc(
        &self,
        regs: &[u64; SmcReturn::MAX_VALUES],
        world: World,
    ) -> (SmcReturn, World) {
        let mut function = FunctionId(regs[0] as u32);
        let mut flags = SmcFlags::from_world(world);
        if function.sve_hint() {
            flags |= SmcFlags::SVE_HINT;
            function.clear_sve_hint();
        }

        if !function.valid() {
            return (NOT_SUPPORTED.into(), world);
        }

        match self.lookup(function).and_then(ServiceDescriptor::handler) {
            Some(handler) => handler(function, regs, flags),
            None => (NOT_SUPPORTED.into(), world),
        }
    }
}

/// Validates and initialises the built-in runtime services, and builds the global routing index.
///
/// This must be called exactly once, on the primary core before any SMC is handled. Panics if
/// called again.
pub fn runtime_svc_init() {
    let mut built = false;
    let services = RUNTIME_SERVICES.call_once(|| {
        built = true;
        RuntimeServices::new(&RT_SVC_DESCS)
    });
    assert!(built, "Runtime services already initialised");
    info!(
        "Initialised {} of {} runtime services",
        services.installed(),
        RT_SVC_DESCS.len()
    );
}

/// Handles an SMC made by the given world on the current core.
///
/// The arguments are read from the saved context of the calling world, and the results are written
/// to the saved context of the world to resume, which is returned.
pub fn handle_smc(world: World) -> World {
    let services = RUNTIME_SERVICES
        .get()
        .expect("SMC handled before runtime services were initialised");
    let regs = exception_free(|token| cpu_state(token)[world].gpregs.smc_args());

    let (result, next_world) = services.handle_smc(&regs, world);

    exception_free(|token| {
        cpu_state(token)[next_world]
            .gpregs
            .write_return_value(&result);
    });
    next_world
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::arch::{SMCCC_VERSION, SMCCC_VERSION_1_5},
        smccc::{OwningEntityNumber, SmcConvention},
    };

    fn echo_function(
        function: FunctionId,
        _regs: &[u64; SmcReturn::MAX_VALUES],
        flags: SmcFlags,
    ) -> (SmcReturn, World) {
        (
            [u64::from(function.0), u64::from(flags.bits())].into(),
            flags.world(),
        )
    }

    fn first(
        _function: FunctionId,
        _regs: &[u64; SmcReturn::MAX_VALUES],
        flags: SmcFlags,
    ) -> (SmcReturn, World) {
        (SmcReturn::from(1u64), flags.world())
    }

    fn second(
        _function: FunctionId,
        _regs: &[u64; SmcReturn::MAX_VALUES],
        flags: SmcFlags,
    ) -> (SmcReturn, World) {
        (SmcReturn::from(2u64), flags.world())
    }

    fn unreachable_handler(
        function: FunctionId,
        _regs: &[u64; SmcReturn::MAX_VALUES],
        _flags: SmcFlags,
    ) -> (SmcReturn, World) {
        panic!("Handler called for {function:?}");
    }

    fn init_ok() -> Result<(), InitError> {
        Ok(())
    }

    fn init_fails() -> Result<(), InitError> {
        Err(InitError::Code(-5))
    }

    fn regs_for(function: u32) -> [u64; SmcReturn::MAX_VALUES] {
        let mut regs = [0; SmcReturn::MAX_VALUES];
        regs[0] = function.into();
        regs
    }

    fn fast(oen: OwningEntityNumber, number: u16) -> FunctionId {
        FunctionId::new(CallType::Fast, SmcConvention::Smc32, oen, number)
    }

    #[test]
    fn validate() {
        let valid = ServiceDescriptor::new(
            "valid",
            50,
            63,
            CallType::Yielding,
            ServiceOps::Init(init_ok),
        );
        assert_eq!(valid.validate(), Ok(CallType::Yielding));

        let reversed = ServiceDescriptor {
            start_oen: 5,
            end_oen: 4,
            ..valid
        };
        assert_eq!(
            reversed.validate(),
            Err(InvalidDescriptor::StartAfterEnd { start: 5, end: 4 })
        );

        let too_big = ServiceDescriptor {
            end_oen: 64,
            ..valid
        };
        assert_eq!(too_big.validate(), Err(InvalidDescriptor::EndOutOfRange(64)));

        let bad_type = ServiceDescriptor {
            call_type: 2,
            ..valid
        };
        assert_eq!(bad_type.validate(), Err(InvalidDescriptor::UnknownCallType(2)));
    }

    #[test]
    fn empty_table() {
        static DESCS: [ServiceDescriptor; 0] = [];
        let services = RuntimeServices::new(&DESCS);
        assert!(services.indices.iter().all(Option::is_none));
        assert_eq!(
            services.handle_smc(&regs_for(SMCCC_VERSION), World::NonSecure),
            (SmcReturn::from(NOT_SUPPORTED), World::NonSecure)
        );
    }

    #[test]
    fn builds_index() {
        static DESCS: [ServiceDescriptor; 2] = [
            ServiceDescriptor::new("first", 2, 3, CallType::Fast, ServiceOps::Handle(first)),
            ServiceDescriptor::new(
                "second",
                50,
                63,
                CallType::Yielding,
                ServiceOps::Handle(second),
            ),
        ];
        let services = RuntimeServices::new(&DESCS);

        let claimed = services
            .indices
            .iter()
            .enumerate()
            .filter_map(|(key, index)| Some((key, index.as_ref()?)))
            .collect::<Vec<_>>();
        let mut expected = vec![(64 + 2, &0), (64 + 3, &0)];
        expected.extend((50..=63).map(|key| (key, &1)));
        expected.sort();
        assert_eq!(claimed, expected);
    }

    #[test]
    fn last_registered_wins() {
        static DESCS: [ServiceDescriptor; 2] = [
            ServiceDescriptor::new("first", 2, 4, CallType::Fast, ServiceOps::Handle(first)),
            ServiceDescriptor::new("second", 4, 5, CallType::Fast, ServiceOps::Handle(second)),
        ];
        let services = RuntimeServices::new(&DESCS);

        let call = |oen| {
            let function = fast(OwningEntityNumber(oen), 0);
            services.handle_smc(&regs_for(function.0), World::NonSecure).0
        };
        assert_eq!(call(2), SmcReturn::from(1u64));
        assert_eq!(call(4), SmcReturn::from(2u64));
        assert_eq!(call(5), SmcReturn::from(2u64));
        assert_eq!(call(6), SmcReturn::from(NOT_SUPPORTED));
    }

    #[test]
    fn init_failure_is_not_fatal() {
        static DESCS: [ServiceDescriptor; 2] = [
            ServiceDescriptor::new(
                "broken",
                2,
                2,
                CallType::Fast,
                ServiceOps::InitAndHandle(init_fails, unreachable_handler),
            ),
            ServiceDescriptor::new(
                "working",
                3,
                3,
                CallType::Fast,
                ServiceOps::InitAndHandle(init_ok, first),
            ),
        ];
        let services = RuntimeServices::new(&DESCS);

        assert_eq!(services.installed(), 1);
        assert!(services.lookup(fast(OwningEntityNumber(2), 0)).is_none());
        assert_eq!(
            services.lookup(fast(OwningEntityNumber(3), 0)).map(|desc| desc.name),
            Some("working")
        );
        assert_eq!(
            services
                .handle_smc(&regs_for(fast(OwningEntityNumber(2), 7).0), World::NonSecure)
                .0,
            SmcReturn::from(NOT_SUPPORTED)
        );
    }

    #[test]
    fn init_only_service_owns_no_keys() {
        static DESCS: [ServiceDescriptor; 1] = [ServiceDescriptor::new(
            "init_only",
            4,
            4,
            CallType::Fast,
            ServiceOps::Init(init_ok),
        )];
        let services = RuntimeServices::new(&DESCS);

        assert_eq!(services.installed(), 1);
        assert!(services.indices.iter().all(Option::is_none));
    }

    #[test]
    #[should_panic(expected = "Invalid runtime service descriptor bad: end OEN 64 is out of range")]
    fn invalid_descriptor_panics() {
        static DESCS: [ServiceDescriptor; 2] = [
            ServiceDescriptor::new("good", 2, 2, CallType::Fast, ServiceOps::Handle(first)),
            ServiceDescriptor::new("bad", 63, 64, CallType::Fast, ServiceOps::Handle(first)),
        ];
        RuntimeServices::new(&DESCS);
    }

    #[test]
    fn unknown_function_invokes_no_handler() {
        static DESCS: [ServiceDescriptor; 1] = [ServiceDescriptor::new(
            "std",
            4,
            4,
            CallType::Fast,
            ServiceOps::Handle(unreachable_handler),
        )];
        let services = RuntimeServices::new(&DESCS);

        // OEN 4 but yielding, OEN 5 fast.
        for function in [0x0400_0000, 0x8500_0000] {
            assert_eq!(
                services.handle_smc(&regs_for(function), World::NonSecure),
                (SmcReturn::from(NOT_SUPPORTED), World::NonSecure)
            );
        }
    }

    #[test]
    fn handler_gets_function_id() {
        static DESCS: [ServiceDescriptor; 1] = [ServiceDescriptor::new(
            "std",
            4,
            4,
            CallType::Fast,
            ServiceOps::Handle(echo_function),
        )];
        let services = RuntimeServices::new(&DESCS);

        let (result, world) = services.handle_smc(&regs_for(0x8400_ff01), World::NonSecure);
        assert_eq!(world, World::NonSecure);
        assert_eq!(
            result.values(),
            [0x8400_ff01, u64::from(SmcFlags::NON_SECURE.bits())]
        );

        let (result, world) = services.handle_smc(&regs_for(0xc400_0003), World::Secure);
        assert_eq!(world, World::Secure);
        assert_eq!(result.values(), [0xc400_0003, 0]);
    }

    #[test]
    fn fast_and_yielding_are_separate() {
        static DESCS: [ServiceDescriptor; 2] = [
            ServiceDescriptor::new("tos_fast", 50, 63, CallType::Fast, ServiceOps::Handle(first)),
            ServiceDescriptor::new(
                "tos_yielding",
                50,
                63,
                CallType::Yielding,
                ServiceOps::Handle(second),
            ),
        ];
        let services = RuntimeServices::new(&DESCS);

        assert_eq!(
            services.handle_smc(&regs_for(0xb200_0000), World::NonSecure).0,
            SmcReturn::from(1u64)
        );
        assert_eq!(
            services.handle_smc(&regs_for(0x3200_0000), World::NonSecure).0,
            SmcReturn::from(2u64)
        );
    }

    #[test]
    fn reserved_bits_are_unknown() {
        static DESCS: [ServiceDescriptor; 1] = [ServiceDescriptor::new(
            "std",
            4,
            4,
            CallType::Fast,
            ServiceOps::Handle(unreachable_handler),
        )];
        let services = RuntimeServices::new(&DESCS);

        assert_eq!(
            services.handle_smc(&regs_for(0x8402_0000), World::NonSecure),
            (SmcReturn::from(NOT_SUPPORTED), World::NonSecure)
        );
    }

    #[test]
    fn sve_hint_is_passed_as_flag() {
        static DESCS: [ServiceDescriptor; 1] = [ServiceDescriptor::new(
            "std",
            4,
            4,
            CallType::Fast,
            ServiceOps::Handle(echo_function),
        )];
        let services = RuntimeServices::new(&DESCS);

        let mut function = fast(OwningEntityNumber::STANDARD_SECURE, 0xff01);
        function.set_sve_hint();
        let (result, _) = services.handle_smc(&regs_for(function.0), World::NonSecure);
        assert_eq!(
            result.values(),
            [
                0x8400_ff01,
                u64::from((SmcFlags::NON_SECURE | SmcFlags::SVE_HINT).bits())
            ]
        );
    }

    #[test]
    fn flags_world() {
        assert_eq!(SmcFlags::from_world(World::Secure).world(), World::Secure);
        assert_eq!(
            SmcFlags::from_world(World::NonSecure).world(),
            World::NonSecure
        );
        assert_eq!(SmcFlags::SVE_HINT.world(), World::Secure);
    }

    /// Tests the SMCCC arch version call through the built-in services as a simple example of SMC
    /// dispatch.
    #[test]
    fn handle_smc_arch_version() {
        let services = RuntimeServices::new(&RT_SVC_DESCS);

        let mut function = FunctionId(SMCCC_VERSION);
        function.set_sve_hint();

        let (result, new_world) = services.handle_smc(&regs_for(function.0), World::NonSecure);

        assert_eq!(new_world, World::NonSecure);
        assert_eq!(result.values(), [SMCCC_VERSION_1_5 as u64]);
    }

}
