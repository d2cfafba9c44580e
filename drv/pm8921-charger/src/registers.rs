// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PM8921 charger block register map and setpoint encodings.
//!
//! Setpoints with a linear millivolt/milliamp encoding are described by a
//! [`LinearSetpoint`] table entry; everything goes through its `encode`, so
//! range validation happens in exactly one place and always before any bus
//! traffic.

use drv_pm8921_charger_api::ChargerError;

/// Registers of interest in the charger block, by SSBI address.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(dead_code, non_camel_case_types)]
#[repr(u16)]
pub enum Register {
    /// Boot/enumeration control shared with the bootloader.
    PBL_ACCESS2 = 0x005,
    /// System configuration; carries the boot-done handshake bit.
    SYS_CONFIG_2 = 0x007,
    /// Buck converter clock control.
    CHG_BUCK_CLOCK_CTRL = 0x014,
    /// Charger control; battery FET forcing lives here.
    CHG_CNTRL = 0x204,
    /// Fast-charge current setpoint.
    CHG_IBAT_MAX = 0x205,
    /// Test mux; gateway for FSM and regulation-loop captures.
    CHG_TEST = 0x206,
    CHG_BUCK_CTRL_TEST2 = 0x208,
    CHG_BUCK_CTRL_TEST3 = 0x209,
    PSI_TXRX_SAMPLE_DATA_0 = 0x20b,
    PSI_TXRX_SAMPLE_DATA_1 = 0x20c,
    PSI_TXRX_SAMPLE_DATA_2 = 0x20d,
    PSI_TXRX_SAMPLE_DATA_3 = 0x20e,
    PSI_CONFIG_STATUS = 0x20f,
    /// Absolute battery-current ceiling; clamps `CHG_IBAT_MAX`.
    CHG_IBAT_SAFE = 0x210,
    /// Trickle-charge current setpoint.
    CHG_ITRICKLE = 0x211,
    /// Charger control 2; temperature comparator configuration.
    CHG_CNTRL_2 = 0x212,
    /// Charge-resume voltage comparator threshold.
    CHG_VBAT_DET = 0x213,
    /// Trickle and weak voltage thresholds share this register.
    CHG_VTRICKLE = 0x214,
    /// Termination current setpoint.
    CHG_ITERM = 0x215,
    /// Charger control 3; enable, USB suspend, failure latches.
    CHG_CNTRL_3 = 0x216,
    /// Input voltage regulation point.
    CHG_VIN_MIN = 0x217,
    /// Charger watchdog.
    CHG_TWDOG = 0x218,
    /// Trickle-charge safety timer.
    CHG_TTRKL_MAX = 0x219,
    /// Fast-charge safety timer.
    CHG_TCHG_MAX = 0x21b,
    /// Charge voltage setpoint.
    CHG_VDD_MAX = 0x220,
    /// Absolute charge-voltage ceiling; clamps `CHG_VDD_MAX`.
    CHG_VDD_SAFE = 0x221,
}

// CHG_CNTRL
pub const CHG_CHARGE_DIS_BIT: u8 = 1 << 1;

// CHG_CNTRL_2
pub const CHG_BAT_TEMP_DIS_BIT: u8 = 1 << 2;
pub const COLD_THR_BIT: u8 = 1 << 1;
pub const HOT_THR_BIT: u8 = 1 << 0;

// CHG_CNTRL_3
pub const CHG_EN_BIT: u8 = 1 << 7;
pub const CHG_USB_SUSPEND_BIT: u8 = 1 << 2;
pub const ATC_FAILED_CLEAR_BIT: u8 = 1 << 1;
pub const CHG_FAILED_CLEAR_BIT: u8 = 1 << 0;

// PBL_ACCESS2
pub const ENUM_TIMER_STOP_BIT: u8 = 1 << 1;
pub const USB_OVP_CONTROL_MASK: u8 = 0x1c;
pub const USB_OVP_CONTROL_SHIFT: u8 = 2;

// SYS_CONFIG_2
pub const BOOT_DONE_BIT: u8 = 1 << 6;

// CHG_TWDOG
pub const CHG_WD_MASK: u8 = 0x1f;

// CHG_TEST capture commands. Writing one latches the selected bank into
// the test register for readback.
pub const CAPTURE_FSM_STATE_CMD: u8 = 0xc2;
pub const READ_BANK_4: u8 = 0x40;
pub const READ_BANK_6: u8 = 0x60;
pub const READ_BANK_7: u8 = 0x70;

/// A register field with a linear physical encoding:
/// `raw = (value - base) / step`, stored shifted under `mask`.
///
/// `min`/`max` bound the values callers may request, which is narrower than
/// what the raw field could express where the electrical envelope demands
/// it (e.g. charge voltage tops out at the safe ceiling).
pub struct LinearSetpoint {
    pub reg: Register,
    pub min: u16,
    pub max: u16,
    pub base: u16,
    pub step: u16,
    pub mask: u8,
    pub shift: u8,
}

impl LinearSetpoint {
    /// Encodes a physical value, rejecting anything outside the accepted
    /// range before it can reach the bus.
    pub const fn encode(&self, value: u16) -> Result<u8, ChargerError> {
        if value < self.min || value > self.max {
            return Err(ChargerError::OutOfRange);
        }
        let raw = ((value - self.base) / self.step) as u8;
        Ok((raw << self.shift) & self.mask)
    }

    /// Decodes the field back to a physical value.
    pub const fn decode(&self, raw: u8) -> u16 {
        let field = ((raw & self.mask) >> self.shift) as u16;
        self.base + field * self.step
    }
}

/// Charge voltage, mV.
pub const VDD_MAX: LinearSetpoint = LinearSetpoint {
    reg: Register::CHG_VDD_MAX,
    min: 3400,
    max: 4500,
    base: 3240,
    step: 20,
    mask: 0x7f,
    shift: 0,
};

/// Charge voltage safety ceiling, mV. Same encoding as `VDD_MAX`.
pub const VDD_SAFE: LinearSetpoint = LinearSetpoint {
    reg: Register::CHG_VDD_SAFE,
    min: 3400,
    max: 4500,
    base: 3240,
    step: 20,
    mask: 0x7f,
    shift: 0,
};

/// Charge-resume threshold, mV.
pub const VBAT_DET: LinearSetpoint = LinearSetpoint {
    reg: Register::CHG_VBAT_DET,
    min: 3240,
    max: 5780,
    base: 3240,
    step: 20,
    mask: 0x7f,
    shift: 0,
};

/// Input voltage regulation point, mV. The field can encode down to
/// 3800mV but the regulator is only usable from 4300mV.
pub const VIN_MIN: LinearSetpoint = LinearSetpoint {
    reg: Register::CHG_VIN_MIN,
    min: 4300,
    max: 6500,
    base: 3800,
    step: 100,
    mask: 0x1f,
    shift: 0,
};

/// Fast-charge current, mA.
pub const IBAT_MAX: LinearSetpoint = LinearSetpoint {
    reg: Register::CHG_IBAT_MAX,
    min: 325,
    max: 2000,
    base: 225,
    step: 50,
    mask: 0x3f,
    shift: 0,
};

/// Battery-current safety ceiling, mA.
pub const IBAT_SAFE: LinearSetpoint = LinearSetpoint {
    reg: Register::CHG_IBAT_SAFE,
    min: 225,
    max: 3375,
    base: 225,
    step: 50,
    mask: 0x3f,
    shift: 0,
};

/// Termination current, mA.
pub const ITERM: LinearSetpoint = LinearSetpoint {
    reg: Register::CHG_ITERM,
    min: 50,
    max: 200,
    base: 50,
    step: 10,
    mask: 0x0f,
    shift: 0,
};

/// Trickle-charge current, mA.
pub const ITRKL: LinearSetpoint = LinearSetpoint {
    reg: Register::CHG_ITRICKLE,
    min: 50,
    max: 200,
    base: 50,
    step: 10,
    mask: 0x0f,
    shift: 0,
};

/// Trickle-to-fast transition voltage, mV. High nibble of `CHG_VTRICKLE`.
pub const VTRKL: LinearSetpoint = LinearSetpoint {
    reg: Register::CHG_VTRICKLE,
    min: 2050,
    max: 2800,
    base: 2050,
    step: 50,
    mask: 0xf0,
    shift: 4,
};

/// Weak-battery threshold voltage, mV. Low nibble of `CHG_VTRICKLE`.
pub const VWEAK: LinearSetpoint = LinearSetpoint {
    reg: Register::CHG_VTRICKLE,
    min: 2100,
    max: 3600,
    base: 2100,
    step: 100,
    mask: 0x0f,
    shift: 0,
};

/// Fast-charge safety time, minutes, in 4-minute units offset by one.
pub const TCHG_MAX: LinearSetpoint = LinearSetpoint {
    reg: Register::CHG_TCHG_MAX,
    min: 4,
    max: 512,
    base: 1,
    step: 4,
    mask: 0x7f,
    shift: 0,
};

/// Trickle-charge safety time, minutes.
pub const TTRKL_MAX: LinearSetpoint = LinearSetpoint {
    reg: Register::CHG_TTRKL_MAX,
    min: 1,
    max: 64,
    base: 1,
    step: 1,
    mask: 0x1f,
    shift: 0,
};

// Weak-battery current is a single comparator select bit, not a linear
// field; it does not fit the table above.
pub const IWEAK_MIN_MA: u16 = 325;
pub const IWEAK_MAX_MA: u16 = 525;
pub const IWEAK_BIT: u8 = 1 << 7;
pub const IWEAK_REG: Register = Register::CHG_ITRICKLE;

/// Encodes the weak-battery current comparator select.
pub const fn iweak_encode(ma: u16) -> Result<u8, ChargerError> {
    if ma < IWEAK_MIN_MA || ma > IWEAK_MAX_MA {
        return Err(ChargerError::OutOfRange);
    }
    if ma < IWEAK_MAX_MA {
        Ok(0)
    } else {
        Ok(IWEAK_BIT)
    }
}

use crate::{Charger, ExternalCharger, Platform};

/// Setpoint accessors. Thin wrappers over the descriptor table so the
/// rest of the driver deals in physical units only.
impl<P: Platform, X: ExternalCharger> Charger<P, X> {
    fn setpoint_write(
        &mut self,
        sp: &LinearSetpoint,
        value: u16,
    ) -> Result<(), ChargerError> {
        let raw = sp.encode(value)?;
        self.masked_write(sp.reg, sp.mask, raw)?;
        Ok(())
    }

    fn setpoint_read(
        &mut self,
        sp: &LinearSetpoint,
    ) -> Result<u16, ChargerError> {
        let raw = self.read_reg(sp.reg)?;
        Ok(sp.decode(raw))
    }

    pub(crate) fn vddmax_set(&mut self, mv: u16) -> Result<(), ChargerError> {
        self.setpoint_write(&VDD_MAX, mv)
    }

    pub(crate) fn vddmax_get(&mut self) -> Result<u16, ChargerError> {
        self.setpoint_read(&VDD_MAX)
    }

    pub(crate) fn vddsafe_set(&mut self, mv: u16) -> Result<(), ChargerError> {
        self.setpoint_write(&VDD_SAFE, mv)
    }

    pub(crate) fn vbatdet_set(&mut self, mv: u16) -> Result<(), ChargerError> {
        self.setpoint_write(&VBAT_DET, mv)
    }

    pub(crate) fn vinmin_set(&mut self, mv: u16) -> Result<(), ChargerError> {
        self.setpoint_write(&VIN_MIN, mv)
    }

    pub(crate) fn ibatmax_set(&mut self, ma: u16) -> Result<(), ChargerError> {
        self.setpoint_write(&IBAT_MAX, ma)
    }

    pub(crate) fn ibatsafe_set(&mut self, ma: u16) -> Result<(), ChargerError> {
        self.setpoint_write(&IBAT_SAFE, ma)
    }

    pub(crate) fn iterm_set(&mut self, ma: u16) -> Result<(), ChargerError> {
        self.setpoint_write(&ITERM, ma)
    }

    pub(crate) fn iterm_get(&mut self) -> Result<u16, ChargerError> {
        self.setpoint_read(&ITERM)
    }

    pub(crate) fn itrkl_set(&mut self, ma: u16) -> Result<(), ChargerError> {
        self.setpoint_write(&ITRKL, ma)
    }

    pub(crate) fn vtrkl_low_set(
        &mut self,
        mv: u16,
    ) -> Result<(), ChargerError> {
        self.setpoint_write(&VTRKL, mv)
    }

    pub(crate) fn vweak_set(&mut self, mv: u16) -> Result<(), ChargerError> {
        self.setpoint_write(&VWEAK, mv)
    }

    pub(crate) fn tchg_max_set(
        &mut self,
        minutes: u16,
    ) -> Result<(), ChargerError> {
        self.setpoint_write(&TCHG_MAX, minutes)
    }

    pub(crate) fn ttrkl_max_set(
        &mut self,
        minutes: u16,
    ) -> Result<(), ChargerError> {
        self.setpoint_write(&TTRKL_MAX, minutes)
    }

    pub(crate) fn iweak_set(&mut self, ma: u16) -> Result<(), ChargerError> {
        let raw = iweak_encode(ma)?;
        self.masked_write(IWEAK_REG, IWEAK_BIT, raw)?;
        Ok(())
    }

    /// Programs the USB input current limit by table step index (0..=7).
    pub(crate) fn iusbmax_set(&mut self, step: u8) -> Result<(), ChargerError> {
        if step > 7 {
            return Err(ChargerError::OutOfRange);
        }
        self.masked_write(
            Register::PBL_ACCESS2,
            USB_OVP_CONTROL_MASK,
            step << USB_OVP_CONTROL_SHIFT,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vdd_max_encoding() {
        // 4000mV is 38 steps of 20mV above the 3240mV base.
        assert_eq!(VDD_MAX.encode(4000), Ok(38));
        assert_eq!(VDD_MAX.encode(3400), Ok(8));
        assert_eq!(VDD_MAX.encode(4500), Ok(63));
        assert_eq!(VDD_MAX.decode(38), 4000);
    }

    #[test]
    fn vdd_max_rejects_out_of_range() {
        assert_eq!(VDD_MAX.encode(3000), Err(ChargerError::OutOfRange));
        assert_eq!(VDD_MAX.encode(3399), Err(ChargerError::OutOfRange));
        assert_eq!(VDD_MAX.encode(4501), Err(ChargerError::OutOfRange));
    }

    #[test]
    fn shifted_field_encodes_under_its_mask() {
        // VTRKL lives in the high nibble; VWEAK in the low nibble.
        assert_eq!(VTRKL.encode(2200), Ok(0x30));
        assert_eq!(VWEAK.encode(3100), Ok(0x0a));
        assert_eq!(VTRKL.decode(0x30), 2200);
        assert_eq!(VWEAK.decode(0x3a), 3100);
    }

    #[test]
    fn timer_encodings() {
        assert_eq!(TCHG_MAX.encode(512), Ok(127));
        assert_eq!(TCHG_MAX.encode(4), Ok(0));
        assert_eq!(TTRKL_MAX.encode(64), Ok(63 & 0x1f));
        assert_eq!(TTRKL_MAX.encode(16), Ok(15));
    }

    #[test]
    fn iweak_is_a_comparator_select() {
        assert_eq!(iweak_encode(325), Ok(0));
        assert_eq!(iweak_encode(524), Ok(0));
        assert_eq!(iweak_encode(525), Ok(IWEAK_BIT));
        assert_eq!(iweak_encode(200), Err(ChargerError::OutOfRange));
        assert_eq!(iweak_encode(600), Err(ChargerError::OutOfRange));
    }

    #[test]
    fn decode_round_trips_masked_values() {
        for mv in (3400..=4500).step_by(20) {
            let raw = VDD_MAX.encode(mv).unwrap();
            assert_eq!(VDD_MAX.decode(raw), mv);
        }
    }
}
