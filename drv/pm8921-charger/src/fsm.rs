// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hardware charging FSM observer.
//!
//! The charger sequencer runs entirely in hardware; software can only
//! capture its current state through the test mux and project it onto the
//! logical status reported to the power framework. The projection is a pure
//! table so it can be tested without hardware.

use bitflags::bitflags;
use drv_pm8921_charger_api::BatteryStatus;
use num_derive::FromPrimitive;

/// States of the hardware charging FSM, by capture code.
///
/// Codes 17 and 19 are unused by the silicon; an unrecognized code is
/// projected as `Discharging` rather than trusted.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum FsmState {
    Off = 0,
    /// Battery full, charger keeping it topped off.
    OnChgHighI = 1,
    Atc2a = 2,
    OnBat = 3,
    AtcFail = 4,
    Delay = 5,
    OnChgAndBat = 6,
    FastChg = 7,
    TrklChg = 8,
    ChgFail = 9,
    Eoc = 10,
    OnChgVregOk = 11,
    BatfetDetStart = 12,
    AtcPause = 13,
    FastChgPause = 14,
    TrklChgPause = 15,
    BatfetDetEnd = 16,
    Atc2b = 18,
    StartBoot = 20,
    FlcbVregOk = 21,
    Flcb = 22,
}

impl FsmState {
    /// Logical battery status for this state.
    ///
    /// `OnChgHighI` reports `Full` here; the caller downgrades it to
    /// `NotCharging` when the battery is missing, out of temperature
    /// range, or the charger overheated, since the FSM parks in the same
    /// state for those.
    pub fn battery_status(self) -> BatteryStatus {
        use BatteryStatus::*;
        match self {
            Self::Off
            | Self::BatfetDetStart
            | Self::BatfetDetEnd
            | Self::Delay => Unknown,
            Self::OnChgHighI | Self::Eoc => Full,
            Self::Atc2a
            | Self::Atc2b
            | Self::OnChgAndBat
            | Self::FastChg
            | Self::TrklChg => Charging,
            Self::OnBat | Self::AtcFail | Self::ChgFail => Discharging,
            Self::OnChgVregOk
            | Self::AtcPause
            | Self::FastChgPause
            | Self::TrklChgPause
            | Self::StartBoot
            | Self::FlcbVregOk
            | Self::Flcb => NotCharging,
        }
    }

    /// Whether the internal charger is actively pushing current into the
    /// battery in this state.
    pub fn is_charging(self) -> bool {
        matches!(
            self,
            Self::Atc2a
                | Self::Atc2b
                | Self::OnChgAndBat
                | Self::FastChg
                | Self::TrklChg
        )
    }
}

/// Projects a raw capture code. Unrecognized codes come out `Discharging`.
pub fn status_from_code(code: u8) -> BatteryStatus {
    match num_traits::FromPrimitive::from_u8(code) {
        Some(state) => FsmState::battery_status(state),
        None => BatteryStatus::Discharging,
    }
}

/// Whether a raw capture code is one of the actively-charging states.
pub fn code_is_charging(code: u8) -> bool {
    matches!(
        num_traits::FromPrimitive::from_u8(code),
        Some(state) if FsmState::is_charging(state)
    )
}

bitflags! {
    /// Which control loop the buck converter is currently regulating on,
    /// captured from test bank 6.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct RegulationLoop: u8 {
        const VDD_LOOP = 1 << 3;
        const BAT_CURRENT_LOOP = 1 << 2;
        const INPUT_CURRENT_LOOP = 1 << 1;
        const INPUT_VOLTAGE_LOOP = 1 << 0;
    }
}
