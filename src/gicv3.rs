// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use crate::{context::World, interrupt_mgmt::InterruptType};
use arm_gic::{
    IntId,
    InterruptGroup,
    gicv3::GicCpuInterface,
};
use arm_sysregs::ScrEl3;

/// Returns the type of the highest priority pending group 0 interrupt, or `None` if it is spurious.
pub fn get_pending_interrupt_type() -> Option<InterruptType> {
    interrupt_type_of(GicCpuInterface::get_pending_interrupt(InterruptGroup::Group0))
}

fn interrupt_type_of(int_id: Option<IntId>) -> Option<InterruptType> {
    match int_id? {
        IntId::SPECIAL_SECURE => Some(InterruptType::SecureEl1),
        IntId::SPECIAL_NONSECURE => Some(InterruptType::NonSecure),
        _ => Some(InterruptType::El3),
    }
}

/// Returns the `SCR_EL3` bit of the exception line on which an interrupt of the given type is
/// signalled while the core runs in the given world.
///
/// With GICv3:
/// - Secure EL1 interrupts are group 1 secure, signalled as IRQ in the secure world and FIQ in the
///   normal world.
/// - Non-secure interrupts are group 1 non-secure, signalled as FIQ in the secure world and IRQ in
///   the normal world.
/// - EL3 interrupts are group 0, always signalled as FIQ.
pub fn interrupt_type_to_line(interrupt_type: InterruptType, world: World) -> ScrEl3 {
    match (interrupt_type, world) {
        (InterruptType::El3, _) => ScrEl3::FIQ,
        (InterruptType::SecureEl1, World::Secure) | (InterruptType::NonSecure, World::NonSecure) => {
            ScrEl3::IRQ
        }
        _ => ScrEl3::FIQ,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_interrupt_types() {
        assert_eq!(interrupt_type_of(None), None);
        assert_eq!(
            interrupt_type_of(Some(IntId::SPECIAL_SECURE)),
            Some(InterruptType::SecureEl1)
        );
        assert_eq!(
            interrupt_type_of(Some(IntId::SPECIAL_NONSECURE)),
            Some(InterruptType::NonSecure)
        );
        assert_eq!(
            interrupt_type_of(Some(IntId::ppi(13))),
            Some(InterruptType::El3)
        );
    }

    #[test]
    fn lines() {
        assert_eq!(
            interrupt_type_to_line(InterruptType::SecureEl1, World::Secure),
            ScrEl3::IRQ
        );
        assert_eq!(
            interrupt_type_to_line(InterruptType::SecureEl1, World::NonSecure),
            ScrEl3::FIQ
        );
        assert_eq!(
            interrupt_type_to_line(InterruptType::NonSecure, World::Secure),
            ScrEl3::FIQ
        );
        assert_eq!(
            interrupt_type_to_line(InterruptType::NonSecure, World::NonSecure),
            ScrEl3::IRQ
        );
        assert_eq!(
            interrupt_type_to_line(InterruptType::El3, World::Secure),
            ScrEl3::FIQ
        );
        assert_eq!(
            interrupt_type_to_line(InterruptType::El3, World::NonSecure),
            ScrEl3::FIQ
        );
    }
}
