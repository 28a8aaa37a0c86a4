// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Types and helpers related to the SMC Calling Convention.

use core::fmt::{self, Debug, Display, Formatter};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use uuid::Uuid;

const FAST_CALL: u32 = 0x8000_0000;
const SMC64: u32 = 0x4000_0000;
const OEN_MASK: u32 = 0x3f00_0000;
const OEN_SHIFT: u8 = 24;
const OEN_WIDTH: u8 = 6;
const NUMBER_MASK: u32 = 0x0000_ffff;
const SVE_HINT: u32 = 1 << 16;
const RESERVED_BITS: u32 = 0x7f << 17;

/// The number of distinct Owning Entity Numbers.
pub const OEN_LIMIT: u8 = 1 << OEN_WIDTH;

/// The number of distinct (OEN, call type) routing keys.
pub const MAX_RT_SVCS: usize = (OEN_LIMIT as usize) << 1;

/// The call completed successfully.
pub const SUCCESS: i32 = 0;

/// The call is not supported by the implementation.
///
/// This is also the "unknown function" result returned for function IDs which no service claims.
pub const NOT_SUPPORTED: i32 = -1;

/// The call is deemed not required by the implementation.
pub const NOT_REQUIRED: i32 = -2;

/// One of the call parameters has a non-supported value.
pub const INVALID_PARAMETER: i32 = -3;

/// Whether an SMC is a fast call or a standard (yielding) call.
///
/// The discriminants are the value of bit 31 of the function ID.
#[derive(Copy, Clone, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum CallType {
    /// A standard call, which may be long-running and may yield.
    Yielding = 0,
    /// A fast call, which runs to completion.
    Fast = 1,
}

/// Which calling convention an SMC uses, from bit 30 of the function ID.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SmcConvention {
    /// SMC32/HVC32: arguments and results are 32 bits wide.
    Smc32,
    /// SMC64/HVC64: arguments and results are 64 bits wide.
    Smc64,
}

/// The kind of entity which owns a range of function IDs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OwningEntity {
    /// Arm Architecture calls.
    ArmArchitectureService,
    /// CPU service calls.
    CPUService,
    /// Silicon partner (SiP) service calls.
    SiPService,
    /// OEM service calls.
    OEMService,
    /// Standard secure service calls.
    StandardSecureService,
    /// Standard hypervisor service calls.
    StandardHypervisorService,
    /// Vendor specific hypervisor service calls.
    VendorSpecificHypervisorService,
    /// Vendor specific EL3 monitor calls.
    VendorSpecificEL3MonitorService,
    /// Trusted application calls.
    TrustedApplications,
    /// Trusted OS calls.
    TrustedOS,
    /// Reserved for future use.
    Unknown,
}

/// Owning Entity Number (OEN)
#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct OwningEntityNumber(pub u8);

impl OwningEntityNumber {
    /// Arm Architecture calls.
    pub const ARM_ARCHITECTURE: Self = Self(0);
    /// CPU service calls.
    pub const CPU: Self = Self(1);
    /// SiP service calls.
    pub const SIP: Self = Self(2);
    /// OEM service calls.
    pub const OEM: Self = Self(3);
    /// Standard secure service calls.
    pub const STANDARD_SECURE: Self = Self(4);
    /// Standard hypervisor service calls.
    pub const STANDARD_HYPERVISOR: Self = Self(5);
    /// Vendor specific hypervisor service calls.
    pub const VENDOR_SPECIFIC_HYPERVISOR: Self = Self(6);
    /// Vendor specific EL3 monitor calls.
    pub const VENDOR_SPECIFIC_EL3_MONITOR: Self = Self(7);
    /// First OEN of the trusted application range.
    pub const TRUSTED_APP_START: Self = Self(48);
    /// Last OEN of the trusted application range.
    pub const TRUSTED_APP_END: Self = Self(49);
    /// First OEN of the trusted OS range.
    pub const TRUSTED_OS_START: Self = Self(50);
    /// Last OEN of the trusted OS range.
    pub const TRUSTED_OS_END: Self = Self(63);

    /// Returns which kind of entity owns this OEN.
    pub fn oe(self) -> OwningEntity {
        match self {
            Self::ARM_ARCHITECTURE => OwningEntity::ArmArchitectureService,
            Self::CPU => OwningEntity::CPUService,
            Self::SIP => OwningEntity::SiPService,
            Self::OEM => OwningEntity::OEMService,
            Self::STANDARD_SECURE => OwningEntity::StandardSecureService,
            Self::STANDARD_HYPERVISOR => OwningEntity::StandardHypervisorService,
            Self::VENDOR_SPECIFIC_HYPERVISOR => OwningEntity::VendorSpecificHypervisorService,
            Self::VENDOR_SPECIFIC_EL3_MONITOR => OwningEntity::VendorSpecificEL3MonitorService,
            Self(48..=49) => OwningEntity::TrustedApplications,
            Self(50..=63) => OwningEntity::TrustedOS,
            _ => OwningEntity::Unknown,
        }
    }
}

impl Display for OwningEntityNumber {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the index into the runtime service routing table for the given OEN and call type.
///
/// Fast calls occupy the upper half of the table and yielding calls the lower half, so the mapping
/// is injective over all valid OENs. Bits of `oen` above the 6-bit OEN field are ignored.
pub const fn unique_oen(oen: u8, call_type: CallType) -> usize {
    ((call_type as usize) << OEN_WIDTH) | (oen as usize & (OEN_LIMIT as usize - 1))
}

/// An SMCCC function ID.
#[derive(Copy, Clone, Eq, PartialEq)]
#[repr(transparent)]
pub struct FunctionId(pub u32);

impl FunctionId {
    /// Creates a new `FunctionId` from its components.
    pub const fn new(
        call_type: CallType,
        convention: SmcConvention,
        oen: OwningEntityNumber,
        number: u16,
    ) -> Self {
        let type_bits = match call_type {
            CallType::Fast => FAST_CALL,
            CallType::Yielding => 0,
        };
        let convention_bits = match convention {
            SmcConvention::Smc32 => 0,
            SmcConvention::Smc64 => SMC64,
        };
        Self(
            type_bits
                | convention_bits
                | (((oen.0 as u32) << OEN_SHIFT) & OEN_MASK)
                | (number as u32),
        )
    }

    /// Returns the Owning Entity Number of the function ID.
    pub fn oen(self) -> OwningEntityNumber {
        OwningEntityNumber(((self.0 & OEN_MASK) >> OEN_SHIFT) as u8)
    }

    /// Returns the lower 16 bits of the function ID.
    pub fn number(self) -> u16 {
        (self.0 & NUMBER_MASK) as u16
    }

    /// Returns whether this is a fast call or a yielding call.
    pub fn call_type(self) -> CallType {
        if self.0 & FAST_CALL != 0 {
            CallType::Fast
        } else {
            CallType::Yielding
        }
    }

    /// Returns which calling convention the call uses.
    pub fn convention(self) -> SmcConvention {
        if self.0 & SMC64 != 0 {
            SmcConvention::Smc64
        } else {
            SmcConvention::Smc32
        }
    }

    /// Returns the index of the routing table slot for this function ID.
    pub fn unique_oen(self) -> usize {
        unique_oen(self.oen().0, self.call_type())
    }

    /// Returns whether the SVE hint bit is set.
    ///
    /// If this is true, the caller asserts that P0-P15, FFR and the bits with index greater than
    /// 127 in the Z0-Z31 registers do not contain any live state.
    pub fn sve_hint(self) -> bool {
        self.0 & SVE_HINT != 0
    }

    /// Sets the SVE hint bit.
    pub fn set_sve_hint(&mut self) {
        self.0 |= SVE_HINT
    }

    /// Clears the SVE hint bit.
    pub fn clear_sve_hint(&mut self) {
        self.0 &= !SVE_HINT
    }

    /// Returns false if this is a fast call but has any of bits 17-23 set.
    ///
    /// They are reserved for future use and should always be 0.
    pub fn valid(self) -> bool {
        self.call_type() == CallType::Yielding || self.0 & RESERVED_BITS == 0
    }
}

impl Display for FunctionId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl Debug for FunctionId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{:#010x} ({:?} {:?} OEN {} {:?} function {:#06x})",
            self.0,
            self.call_type(),
            self.convention(),
            self.oen(),
            self.oen().oe(),
            self.number(),
        )
    }
}

/// A value which can be returned from an SMC call by writing to the caller's registers.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct SmcReturn {
    /// The number of elements from `values` that are actually used for this return.
    used: usize,
    values: [u64; Self::MAX_VALUES],
}

impl SmcReturn {
    /// The maximum number of registers which an SMC can return.
    pub const MAX_VALUES: usize = 18;

    /// A return which doesn't modify any of the caller's registers.
    pub const EMPTY: Self = Self {
        used: 0,
        values: [0; Self::MAX_VALUES],
    };

    /// Returns a slice containing the used values.
    pub fn values(&self) -> &[u64] {
        &self.values[0..self.used]
    }

    /// Returns true if no values are used.
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }
}

impl Debug for SmcReturn {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "SmcReturn([")?;
        let values = self.values();
        if let Some(first) = values.first() {
            write!(f, "{first:#x}")?;
            for value in &values[1..] {
                write!(f, ", {value:#x}")?;
            }
        }
        write!(f, "])")?;
        Ok(())
    }
}

impl From<()> for SmcReturn {
    fn from(_: ()) -> Self {
        Self::EMPTY
    }
}

impl From<u64> for SmcReturn {
    fn from(value: u64) -> Self {
        let mut values = [0; Self::MAX_VALUES];
        values[0] = value;
        Self { used: 1, values }
    }
}

impl From<i64> for SmcReturn {
    fn from(value: i64) -> Self {
        Self::from(value as u64)
    }
}

impl From<u32> for SmcReturn {
    fn from(value: u32) -> Self {
        Self::from(u64::from(value))
    }
}

impl From<i32> for SmcReturn {
    fn from(value: i32) -> Self {
        Self::from(i64::from(value))
    }
}

/// Acccording to section 5.3 of the SMCCC, UUIDs are returned as a single
/// 128-bit value using the SMC32 calling convention. This value is mapped to
/// argument registers x0-x3 on AArch64 (resp. r0-r3 on AArch32). x0 for example
/// shall hold bytes 0 to 3, with byte 0 in the low-order bits.
impl From<Uuid> for SmcReturn {
    fn from(value: Uuid) -> Self {
        let bytes = value.as_bytes();
        Self::from([
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
            u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as u64,
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as u64,
            u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as u64,
        ])
    }
}

impl<const N: usize> From<[u64; N]> for SmcReturn {
    fn from(value: [u64; N]) -> Self {
        const { assert!(N <= SmcReturn::MAX_VALUES) };
        let mut values = [0; Self::MAX_VALUES];
        values[..N].copy_from_slice(&value);
        Self { used: N, values }
    }
}
