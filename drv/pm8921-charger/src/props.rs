// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Battery and input properties exposed to the power framework, plus the
//! USB draw-limit path.
//!
//! Properties are computed on read from hardware status; nothing here is
//! cached, so a read after a `supply_changed` notification always sees
//! the current state.

use drv_pm8921_charger_api::{
    AdcChannel, BatteryHealth, BatteryStatus, BatteryTechnology, ChargeType,
    ChargerError, IrqLine,
};

use crate::fsm::{self, FsmState};
use crate::{Charger, ExternalCharger, Platform, Trace};

/// USB input current steps the hardware can limit to, as (mA, register
/// step) pairs in ascending order. A requested draw picks the largest
/// step not above it.
pub(crate) const USB_MA_TABLE: [(u16, u8); 8] = [
    (100, 0),
    (500, 1),
    (700, 2),
    (850, 3),
    (900, 4),
    (1100, 5),
    (1300, 6),
    (1500, 7),
];

/// A draw request at or below this many mA means "suspend the USB
/// input": the host is asleep and we may not draw from it.
pub const USB_SUSPEND_DRAW_MA: u16 = 2;

/// Mailbox for USB draw requests, shared with the USB stack.
///
/// The USB stack learns the negotiated current budget on its own
/// schedule, possibly before the charger has attached. Requests park
/// here; the driver consumes them at attach and applies later ones
/// directly via [`Charger::set_usb_max_draw`].
pub struct VbusDraw(spin::Mutex<Option<u16>>);

impl VbusDraw {
    pub const fn new() -> Self {
        Self(spin::Mutex::new(None))
    }

    /// Parks a draw request, replacing any unconsumed one.
    pub fn request(&self, ma: u16) {
        *self.0.lock() = Some(ma);
    }

    /// Takes the pending request, if any.
    pub fn take(&self) -> Option<u16> {
        self.0.lock().take()
    }
}

impl Default for VbusDraw {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform, X: ExternalCharger> Charger<P, X> {
    /// Applies a USB draw budget from the USB stack. Requests at or
    /// below [`USB_SUSPEND_DRAW_MA`] suspend the USB input entirely;
    /// anything else picks the largest hardware step that fits.
    pub fn set_usb_max_draw(&mut self, ma: u16) -> Result<(), ChargerError> {
        self.apply_usb_draw(ma)
    }

    pub(crate) fn apply_usb_draw(
        &mut self,
        ma: u16,
    ) -> Result<(), ChargerError> {
        if ma > 0 && ma <= USB_SUSPEND_DRAW_MA {
            self.iusbmax_set(USB_MA_TABLE[0].1)?;
            self.usb_suspend_enable(true)?;
            self.trace.record(Trace::UsbSuspended);
        } else {
            self.usb_suspend_enable(false)?;
            let step = USB_MA_TABLE
                .iter()
                .rev()
                .find(|&&(table_ma, _)| table_ma <= ma)
                .map(|&(_, step)| step)
                .unwrap_or(USB_MA_TABLE[0].1);
            self.iusbmax_set(step)?;
            self.trace.record(Trace::UsbDraw(ma));
        }
        Ok(())
    }

    /// Logical charging status. A bound external charger takes
    /// precedence over the hardware FSM; a full-by-keepalive FSM state
    /// is downgraded when the battery is actually missing, out of
    /// temperature range, or the charger overheated.
    pub fn battery_status(&mut self) -> Result<BatteryStatus, ChargerError> {
        if self.ext.is_some() {
            if self.ext_charge_done {
                return Ok(BatteryStatus::Full);
            }
            if self.ext_charging {
                return Ok(BatteryStatus::Charging);
            }
        }

        let code = self.fsm_code()?;
        let mut status = fsm::status_from_code(code);

        if code == FsmState::OnChgHighI as u8
            && (!self.line_high(IrqLine::BattInserted)?
                || !self.line_high(IrqLine::BatTempOk)?
                || !self.line_high(IrqLine::ChgHot)?)
        {
            status = BatteryStatus::NotCharging;
        }
        Ok(status)
    }

    pub fn charge_type(&mut self) -> Result<ChargeType, ChargerError> {
        if !self.line_high(IrqLine::BattInserted)? {
            return Ok(ChargeType::None);
        }

        if self.is_ext_trickle() {
            return Ok(ChargeType::Trickle);
        }
        if self.is_ext_charging() {
            return Ok(ChargeType::Fast);
        }

        if self.line_high(IrqLine::TrklChg)? {
            return Ok(ChargeType::Trickle);
        }
        if self.line_high(IrqLine::FastChg)? {
            return Ok(ChargeType::Fast);
        }
        Ok(ChargeType::None)
    }

    pub fn battery_health(&mut self) -> Result<BatteryHealth, ChargerError> {
        if self.line_high(IrqLine::BattTempHot)? {
            return Ok(BatteryHealth::Overheat);
        }
        if self.line_high(IrqLine::BattTempCold)? {
            return Ok(BatteryHealth::Cold);
        }
        Ok(BatteryHealth::Good)
    }

    /// Battery terminal voltage, mV.
    pub fn battery_mv(&mut self) -> Result<i32, ChargerError> {
        self.adc(AdcChannel::BatteryVoltage)
    }

    /// Battery temperature, tenths of a degree C.
    pub fn battery_temp_dc(&mut self) -> Result<i32, ChargerError> {
        self.adc(AdcChannel::BatteryTemp)
    }

    fn adc(&mut self, channel: AdcChannel) -> Result<i32, ChargerError> {
        self.platform.adc_read(channel).map_err(|e| {
            self.trace.record(Trace::AdcFault(channel, e));
            e.into()
        })
    }

    /// State of charge, percent. Prefers the fuel gauge; boards without
    /// one get a linear interpolation over the voltage envelope.
    pub fn battery_capacity_percent(&mut self) -> Result<u8, ChargerError> {
        let percent = match self.platform.gauge_percent_charge() {
            Some(p) => p,
            None => self.voltage_based_capacity()?,
        };
        if percent <= 10 {
            self.trace.record(Trace::LowBattery(percent));
        }
        Ok(percent)
    }

    fn voltage_based_capacity(&mut self) -> Result<u8, ChargerError> {
        let mv = self.battery_mv()?;
        let low = i32::from(self.config.min_voltage_mv);
        let high = i32::from(self.config.max_voltage_mv);

        let percent = if mv <= low {
            0
        } else if mv >= high {
            100
        } else {
            (mv - low) * 100 / (high - low)
        };
        Ok(percent as u8)
    }

    /// Battery current, mA, negative while charging. Gauge first, then
    /// the coulomb counter.
    pub fn battery_current_ma(&mut self) -> Result<i32, ChargerError> {
        if let Some(ma) = self.platform.gauge_battery_current_ma() {
            return Ok(ma);
        }
        Ok(self.platform.ccadc_battery_current_ma()?)
    }

    /// Full charge capacity from the gauge, if the board has one.
    pub fn battery_fcc_mah(&mut self) -> Option<i32> {
        self.platform.gauge_full_charge_capacity_mah()
    }

    pub fn battery_technology(&self) -> BatteryTechnology {
        BatteryTechnology::LithiumIon
    }

    /// Design voltage limits from the board calibration, mV.
    pub fn min_design_mv(&self) -> u16 {
        self.config.min_voltage_mv
    }

    pub fn max_design_mv(&self) -> u16 {
        self.config.max_voltage_mv
    }
}
