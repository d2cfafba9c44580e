// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared types for the PM8921 charger driver.
//!
//! These are the property values the charger exposes to the platform power
//! framework, the named PMIC interrupt lines, and the driver's error
//! taxonomy. They are plain data so that clients (power-supply consumers,
//! the USB stack, board glue) can depend on this crate without pulling in
//! the driver itself.

#![no_std]

use hubpack::SerializedSize;
use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Logical charging status projected from the hardware charging FSM.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    FromPrimitive,
    Serialize,
    Deserialize,
    SerializedSize,
)]
#[repr(u8)]
pub enum BatteryStatus {
    Unknown = 0,
    Charging,
    Discharging,
    NotCharging,
    Full,
}

#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    FromPrimitive,
    Serialize,
    Deserialize,
    SerializedSize,
)]
#[repr(u8)]
pub enum ChargeType {
    None = 0,
    Trickle,
    Fast,
}

#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    FromPrimitive,
    Serialize,
    Deserialize,
    SerializedSize,
)]
#[repr(u8)]
pub enum BatteryHealth {
    Good = 0,
    Overheat,
    Cold,
}

/// Battery chemistry reported through the property facade. The PM8921
/// charges single-cell lithium-ion packs only.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    FromPrimitive,
    Serialize,
    Deserialize,
    SerializedSize,
)]
#[repr(u8)]
pub enum BatteryTechnology {
    LithiumIon = 0,
}

/// The three power-supply endpoints the charger reports through.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    FromPrimitive,
    Serialize,
    Deserialize,
    SerializedSize,
)]
#[repr(u8)]
pub enum Supply {
    Battery = 0,
    Usb,
    Dc,
}

/// Which input is charging the battery. DC has priority when both inputs
/// are valid.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    FromPrimitive,
    Serialize,
    Deserialize,
    SerializedSize,
)]
#[repr(u8)]
pub enum ChargingSource {
    None = 0,
    Usb,
    Dc,
}

/// The PMIC charger block's interrupt lines, in hardware numbering order.
///
/// All lines are requested at attach; only a subset stays armed in steady
/// state. `Psi` exists in the hardware but carries no handler.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum IrqLine {
    UsbinValid = 0,
    UsbinOv,
    BattInserted,
    VbatdetLow,
    UsbinUv,
    VbatOv,
    ChgWdog,
    Vcp,
    AtcDone,
    AtcFail,
    ChgDone,
    ChgFail,
    ChgState,
    LoopChange,
    FastChg,
    TrklChg,
    BattRemoved,
    BattTempHot,
    ChgHot,
    BattTempCold,
    ChgGone,
    BatTempOk,
    CoarseDetLow,
    VddLoop,
    VregOv,
    Vbatdet,
    Batfet,
    Psi,
    DcinValid,
    DcinOv,
    DcinUv,
}

impl IrqLine {
    pub const COUNT: usize = 31;

    pub fn mask(self) -> u32 {
        1 << (self as u32)
    }
}

/// Edge configuration for an interrupt line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trigger {
    Rising,
    Falling,
    Both,
}

/// ADC channels the charger samples through the PMIC's arbiter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum AdcChannel {
    BatteryVoltage = 0,
    BatteryTemp,
    BatteryId,
}

/// A failed 8-bit register transaction on the PMIC bus.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum BusError {
    ReadFault = 1,
    WriteFault,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum ChargerError {
    /// Operation attempted before the driver context was attached.
    NotReady = 1,
    /// Requested physical setpoint is outside the calibrated hardware
    /// range; rejected before any bus access.
    OutOfRange,
    /// A thermal-mitigation level was requested but the board supplied no
    /// mitigation table.
    ConfigMissing,
    /// A register transaction failed; the enclosing step was aborted.
    BusFault,
    /// An interrupt line could not be requested at attach.
    IrqUnavailable,
}

impl From<BusError> for ChargerError {
    fn from(_: BusError) -> Self {
        ChargerError::BusFault
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn irq_line_numbering_matches_hardware() {
        assert_eq!(IrqLine::UsbinValid as u8, 0);
        assert_eq!(IrqLine::FastChg as u8, 14);
        assert_eq!(IrqLine::BatTempOk as u8, 21);
        assert_eq!(IrqLine::DcinUv as u8, 30);
        assert_eq!(IrqLine::from_u8(30), Some(IrqLine::DcinUv));
        assert_eq!(IrqLine::from_u8(31), None);
    }

    #[test]
    fn bus_error_coarsens() {
        assert_eq!(
            ChargerError::from(BusError::ReadFault),
            ChargerError::BusFault
        );
    }
}
