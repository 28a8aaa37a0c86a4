// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Routing of interrupts which arrive while a lower EL is running.
//!
//! Each of the three interrupt types has a routing model, which says whether the interrupt traps to
//! EL3 while the core is in each security state, and a handler which EL3 calls when it does.

use crate::{
    context::{CpuState, World, cpu_state},
    gicv3,
    platform::exception_free,
};
use arm_sysregs::ScrEl3;
use bitflags::bitflags;
use log::{debug, error};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use spin::Once;
use thiserror::Error;

/// Invalid argument.
pub const EINVAL: i32 = 22;
/// Operation already in progress.
pub const EALREADY: i32 = 114;

const INTERRUPT_TYPE_COUNT: usize = 3;

/// The type of an interrupt, which decides which software is expected to handle it.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum InterruptType {
    /// An interrupt for the secure world, i.e. Secure EL1 or EL2.
    SecureEl1 = 0,
    /// An interrupt for EL3 firmware.
    El3 = 1,
    /// An interrupt for the normal world.
    NonSecure = 2,
}

impl InterruptType {
    const ALL: [Self; INTERRUPT_TYPE_COUNT] = [Self::SecureEl1, Self::El3, Self::NonSecure];

    fn index(self) -> usize {
        self as usize
    }
}

bitflags! {
    /// The routing model of an interrupt type.
    ///
    /// Each bit is set if the interrupt should be taken to EL3 while the core is executing in the
    /// corresponding security state, or clear if it should be taken at the lower EL directly.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct RoutingModel: u32 {
        /// Route to EL3 while in the secure world.
        const FROM_SECURE = 1 << 0;
        /// Route to EL3 while in the normal world.
        const FROM_NON_SECURE = 1 << 1;
    }
}

impl RoutingModel {
    /// Returns whether an interrupt with this routing model traps to EL3 while in the given world.
    pub fn routes_to_el3(self, world: World) -> bool {
        match world {
            World::Secure => self.contains(Self::FROM_SECURE),
            World::NonSecure => self.contains(Self::FROM_NON_SECURE),
            #[cfg(feature = "rme")]
            World::Realm => false,
        }
    }
}

/// An error registering or configuring an interrupt type handler.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum InterruptError {
    /// The flags had bits set other than the routing model.
    #[error("Interrupt flags {0:#x} have reserved bits set")]
    InvalidFlags(u32),
    /// The routing model is not permitted for the interrupt type.
    #[error("Routing model {model:#04b} is not valid for {interrupt_type:?} interrupts")]
    InvalidRoutingModel {
        /// The interrupt type being registered.
        interrupt_type: InterruptType,
        /// The rejected routing model.
        model: u32,
    },
    /// A handler was already registered for the interrupt type.
    #[error("A handler is already registered for {0:?} interrupts")]
    AlreadyRegistered(InterruptType),
    /// No handler has been registered for the interrupt type.
    #[error("No handler is registered for {0:?} interrupts")]
    NoHandler(InterruptType),
}

impl InterruptError {
    /// Returns the negative errno value used by the C interface for this error.
    pub fn errno(self) -> i32 {
        match self {
            Self::AlreadyRegistered(_) => -EALREADY,
            Self::InvalidFlags(_) | Self::InvalidRoutingModel { .. } | Self::NoHandler(_) => -EINVAL,
        }
    }
}

/// A handler for interrupts of a particular type which have been routed to EL3.
///
/// It is passed the world which was interrupted, and returns the world to resume.
pub type InterruptHandler = fn(World) -> World;

#[derive(Clone, Copy, Debug)]
struct InterruptTypeDesc {
    routing_model: RoutingModel,
    handler: InterruptHandler,
}

/// The routing model and handler registered for each interrupt type.
pub struct InterruptTypeRegistry {
    descs: [Once<InterruptTypeDesc>; INTERRUPT_TYPE_COUNT],
    el3_exception_handling: bool,
}

static INTERRUPT_TYPES: InterruptTypeRegistry =
    InterruptTypeRegistry::new(cfg!(feature = "el3_exception_handling"));

impl InterruptTypeRegistry {
    /// Creates a registry with no handlers.
    ///
    /// If `el3_exception_handling` is true, EL3 interrupts must always be routed to EL3.
    pub const fn new(el3_exception_handling: bool) -> Self {
        Self {
            descs: [const { Once::new() }; INTERRUPT_TYPE_COUNT],
            el3_exception_handling,
        }
    }

    /// Registers the handler and routing model for the given interrupt type.
    ///
    /// Only bits 1:0 of `flags` may be set, holding the routing model.
    pub fn register(
        &self,
        interrupt_type: InterruptType,
        handler: InterruptHandler,
        flags: u32,
    ) -> Result<RoutingModel, InterruptError> {
        let routing_model =
            RoutingModel::from_bits(flags).ok_or(InterruptError::InvalidFlags(flags))?;
        let desc = &self.descs[interrupt_type.index()];
        if desc.get().is_some() {
            return Err(InterruptError::AlreadyRegistered(interrupt_type));
        }
        self.validate_routing_model(interrupt_type, routing_model)?;

        let mut registered = false;
        desc.call_once(|| {
            registered = true;
            InterruptTypeDesc {
                routing_model,
                handler,
            }
        });
        if registered {
            Ok(routing_model)
        } else {
            Err(InterruptError::AlreadyRegistered(interrupt_type))
        }
    }

    fn validate_routing_model(
        &self,
        interrupt_type: InterruptType,
        routing_model: RoutingModel,
    ) -> Result<(), InterruptError> {
        let valid = match interrupt_type {
            // Secure EL1 interrupts always trap to EL3 from the normal world.
            InterruptType::SecureEl1 => routing_model.contains(RoutingModel::FROM_NON_SECURE),
            // Non-secure interrupts are never taken to EL3 from the normal world.
            InterruptType::NonSecure => !routing_model.contains(RoutingModel::FROM_NON_SECURE),
            InterruptType::El3 if self.el3_exception_handling => {
                routing_model == RoutingModel::all()
            }
            InterruptType::El3 => routing_model.contains(RoutingModel::FROM_NON_SECURE),
        };
        if valid {
            Ok(())
        } else {
            Err(InterruptError::InvalidRoutingModel {
                interrupt_type,
                model: routing_model.bits(),
            })
        }
    }

    /// Returns the handler registered for the given interrupt type, if any.
    pub fn handler(&self, interrupt_type: InterruptType) -> Option<InterruptHandler> {
        Some(self.descs[interrupt_type.index()].get()?.handler)
    }

    /// Returns the `SCR_EL3` interrupt routing bits to use while in the given world.
    ///
    /// Interrupt types with no registered handler don't trap to EL3.
    pub fn scr_el3(&self, world: World) -> ScrEl3 {
        InterruptType::ALL
            .into_iter()
            .filter(|&interrupt_type| {
                self.descs[interrupt_type.index()]
                    .get()
                    .is_some_and(|desc| desc.routing_model.routes_to_el3(world))
            })
            .map(|interrupt_type| gicv3::interrupt_type_to_line(interrupt_type, world))
            .fold(ScrEl3::empty(), |scr_el3, line| scr_el3 | line)
    }

    /// Returns the `SCR_EL3` bit for the given interrupt type in the given world, and whether it
    /// should be set to follow the registered routing model (if `enable` is true) or the default
    /// model where nothing traps to EL3 (if `enable` is false).
    fn local_routing(
        &self,
        interrupt_type: InterruptType,
        world: World,
        enable: bool,
    ) -> Result<(ScrEl3, bool), InterruptError> {
        let desc = self.descs[interrupt_type.index()]
            .get()
            .ok_or(InterruptError::NoHandler(interrupt_type))?;
        Ok((
            gicv3::interrupt_type_to_line(interrupt_type, world),
            enable && desc.routing_model.routes_to_el3(world),
        ))
    }

    fn dispatch(&self, interrupt_type: Option<InterruptType>, world: World) -> World {
        let Some(interrupt_type) = interrupt_type else {
            debug!("Spurious interrupt from {world:?}");
            return world;
        };
        match self.handler(interrupt_type) {
            Some(handler) => handler(world),
            None => {
                // The interrupt is still pending, so resuming would trap straight back here.
                error!("No handler for {interrupt_type:?} interrupt from {world:?}");
                panic!("No handler for {interrupt_type:?} interrupt from {world:?}");
            }
        }
    }
}

/// Sets the routing bits for the given interrupt type in the secure and non-secure contexts.
fn apply_routing_model(
    cpu_state: &mut CpuState,
    interrupt_type: InterruptType,
    routing_model: RoutingModel,
) {
    for world in [World::Secure, World::NonSecure] {
        cpu_state[world].el3_state.scr_el3.set(
            gicv3::interrupt_type_to_line(interrupt_type, world),
            routing_model.routes_to_el3(world),
        );
    }
}

/// Registers a handler for the given type of interrupt, with the routing model in bits 1:0 of
/// `flags`.
///
/// The routing model is applied to the saved contexts of the current core straight away. Other
/// cores pick it up when their contexts are initialised.
///
/// Fails if the routing model isn't allowed for the type, any other bits of `flags` are set, or a
/// handler is already registered for the type.
pub fn register_interrupt_type_handler(
    interrupt_type: InterruptType,
    handler: InterruptHandler,
    flags: u32,
) -> Result<(), InterruptError> {
    let routing_model = INTERRUPT_TYPES.register(interrupt_type, handler, flags)?;
    exception_free(|token| {
        apply_routing_model(&mut cpu_state(token), interrupt_type, routing_model);
    });
    Ok(())
}

/// Returns the handler registered for the given type of interrupt, if any.
pub fn get_interrupt_type_handler(interrupt_type: InterruptType) -> Option<InterruptHandler> {
    INTERRUPT_TYPES.handler(interrupt_type)
}

/// Returns the `SCR_EL3` IRQ and FIQ routing bits to use while the given world is running,
/// according to the routing models registered so far.
pub fn get_scr_el3_from_routing_model(world: World) -> ScrEl3 {
    INTERRUPT_TYPES.scr_el3(world)
}

/// Applies the registered routing model for the given interrupt type to the saved context of the
/// given world on the current core only.
pub fn enable_intr_rm_local(
    interrupt_type: InterruptType,
    world: World,
) -> Result<(), InterruptError> {
    set_local_routing(interrupt_type, world, true)
}

/// Stops the given interrupt type trapping to EL3 from the given world on the current core only.
pub fn disable_intr_rm_local(
    interrupt_type: InterruptType,
    world: World,
) -> Result<(), InterruptError> {
    set_local_routing(interrupt_type, world, false)
}

fn set_local_routing(
    interrupt_type: InterruptType,
    world: World,
    enable: bool,
) -> Result<(), InterruptError> {
    let (line, value) = INTERRUPT_TYPES.local_routing(interrupt_type, world, enable)?;
    exception_free(|token| {
        cpu_state(token)[world].el3_state.scr_el3.set(line, value);
    });
    Ok(())
}

/// Handles an interrupt which was routed to EL3 while the given world was running.
///
/// Calls the handler registered for the type of the highest priority pending interrupt, and returns
/// the world to resume. Spurious interrupts resume the interrupted world.
///
/// Panics if no handler is registered for the type of the pending interrupt.
pub fn handle_interrupt(world: World) -> World {
    INTERRUPT_TYPES.dispatch(gicv3::get_pending_interrupt_type(), world)
}
