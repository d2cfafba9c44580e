// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interrupt dispatch for the charger block.
//!
//! Every line the driver handles appears in [`IRQ_TABLE`] with its edge
//! configuration; attach claims them all (masked) and arms only
//! [`STEADY_STATE_LINES`]. `Psi` exists in hardware but has no row, so it
//! is never claimed.
//!
//! Handlers run with `&mut self` from the owner's interrupt lane. They do
//! presence bookkeeping, consumer notification, and external-charger
//! handoff; anything slower is pushed onto the deferred-work timer.

use drv_pm8921_charger_api::{
    BusError, ChargerError, IrqLine, Supply, Trigger,
};

use crate::{fsm, Charger, ExternalCharger, Platform, Trace, Work};

/// Claimed lines and their triggers, in hardware numbering order.
pub(crate) const IRQ_TABLE: [(IrqLine, Trigger); 30] = [
    (IrqLine::UsbinValid, Trigger::Both),
    (IrqLine::UsbinOv, Trigger::Rising),
    (IrqLine::BattInserted, Trigger::Both),
    (IrqLine::VbatdetLow, Trigger::Both),
    (IrqLine::UsbinUv, Trigger::Both),
    (IrqLine::VbatOv, Trigger::Rising),
    (IrqLine::ChgWdog, Trigger::Rising),
    (IrqLine::Vcp, Trigger::Rising),
    (IrqLine::AtcDone, Trigger::Rising),
    (IrqLine::AtcFail, Trigger::Rising),
    (IrqLine::ChgDone, Trigger::Rising),
    (IrqLine::ChgFail, Trigger::Rising),
    (IrqLine::ChgState, Trigger::Rising),
    (IrqLine::LoopChange, Trigger::Rising),
    (IrqLine::FastChg, Trigger::Both),
    (IrqLine::TrklChg, Trigger::Rising),
    (IrqLine::BattRemoved, Trigger::Rising),
    (IrqLine::BattTempHot, Trigger::Rising),
    (IrqLine::ChgHot, Trigger::Rising),
    (IrqLine::BattTempCold, Trigger::Rising),
    (IrqLine::ChgGone, Trigger::Rising),
    (IrqLine::BatTempOk, Trigger::Both),
    (IrqLine::CoarseDetLow, Trigger::Rising),
    (IrqLine::VddLoop, Trigger::Rising),
    (IrqLine::VregOv, Trigger::Rising),
    (IrqLine::Vbatdet, Trigger::Rising),
    (IrqLine::Batfet, Trigger::Both),
    (IrqLine::DcinValid, Trigger::Both),
    (IrqLine::DcinOv, Trigger::Both),
    (IrqLine::DcinUv, Trigger::Rising),
];

// Every line except Psi has a row.
static_assertions::const_assert_eq!(IRQ_TABLE.len(), IrqLine::COUNT - 1);

/// Lines left armed after attach. The rest stay masked until something
/// arms them explicitly.
pub(crate) const STEADY_STATE_LINES: [IrqLine; 12] = [
    IrqLine::DcinValid,
    IrqLine::UsbinValid,
    IrqLine::BattRemoved,
    IrqLine::BattInserted,
    IrqLine::UsbinOv,
    IrqLine::UsbinUv,
    IrqLine::DcinOv,
    IrqLine::DcinUv,
    IrqLine::ChgFail,
    IrqLine::FastChg,
    IrqLine::VbatdetLow,
    IrqLine::BatTempOk,
];

/// Lines that wake the system from suspend.
pub(crate) const WAKE_LINES: [IrqLine; 3] =
    [IrqLine::UsbinValid, IrqLine::UsbinOv, IrqLine::UsbinUv];

impl<P: Platform, X: ExternalCharger> Charger<P, X> {
    /// Dispatches one charger interrupt. `now` is the owner's clock, used
    /// for scheduling deferred work.
    pub fn handle_irq(
        &mut self,
        line: IrqLine,
        now: u64,
    ) -> Result<(), ChargerError> {
        self.trace.record(Trace::Irq(line));
        match line {
            IrqLine::UsbinValid => self.on_usb_insertion_removal(now)?,
            IrqLine::UsbinOv => self.trace.record(Trace::UsbOverVoltage),
            IrqLine::BattInserted => self.on_batt_inserted(now)?,
            IrqLine::VbatdetLow => self.on_vbatdet_low()?,
            IrqLine::UsbinUv => self.trace.record(Trace::UsbUnderVoltage),
            IrqLine::Vcp => {
                self.trace.record(Trace::VcpTriggered);
                self.trace_fsm()?;
            }
            IrqLine::VbatOv
            | IrqLine::ChgWdog
            | IrqLine::AtcDone
            | IrqLine::AtcFail
            | IrqLine::LoopChange
            | IrqLine::CoarseDetLow
            | IrqLine::VddLoop
            | IrqLine::VregOv
            | IrqLine::Vbatdet => self.trace_fsm()?,
            IrqLine::ChgDone => self.on_chgdone(now)?,
            IrqLine::ChgFail => self.on_chgfail()?,
            IrqLine::ChgState => self.on_chgstate(now)?,
            IrqLine::FastChg => self.on_fastchg(now)?,
            IrqLine::TrklChg => {
                self.platform.supply_changed(Supply::Battery)
            }
            IrqLine::BattRemoved => self.on_batt_removed()?,
            IrqLine::BattTempHot => {
                self.stop_external();
                self.platform.supply_changed(Supply::Battery);
            }
            IrqLine::ChgHot => {
                self.trace_fsm()?;
                self.all_supplies_changed();
            }
            IrqLine::BattTempCold => {
                self.trace_fsm()?;
                self.stop_external();
                self.all_supplies_changed();
            }
            IrqLine::ChgGone => {
                self.trace_fsm()?;
                self.all_supplies_changed();
            }
            IrqLine::BatTempOk => self.on_bat_temp_ok(now)?,
            IrqLine::Batfet => {
                self.platform.supply_changed(Supply::Battery)
            }
            // Not claimed; nothing to do if the owner calls us anyway.
            IrqLine::Psi => {}
            IrqLine::DcinValid => self.on_dcin_valid(now)?,
            IrqLine::DcinOv => self.on_dcin_ov(now)?,
            IrqLine::DcinUv => {
                self.charge_dis(false)?;
                self.stop_external();
            }
        }
        Ok(())
    }

    fn trace_fsm(&mut self) -> Result<(), BusError> {
        let code = self.fsm_code()?;
        self.trace.record(Trace::Fsm(code));
        Ok(())
    }

    fn all_supplies_changed(&mut self) {
        self.platform.supply_changed(Supply::Battery);
        self.platform.supply_changed(Supply::Usb);
        self.platform.supply_changed(Supply::Dc);
    }

    fn on_usb_insertion_removal(
        &mut self,
        now: u64,
    ) -> Result<(), BusError> {
        let present = self.line_high(IrqLine::UsbinValid)?;
        if present != self.usb_present {
            self.platform.vbus_present(present);
            self.usb_present = present;
            self.trace.record(Trace::UsbPresent(present));
            self.platform.supply_changed(Supply::Usb);
            self.platform.supply_changed(Supply::Battery);
        }
        self.bms_notify_check(now)
    }

    fn on_batt_inserted(&mut self, now: u64) -> Result<(), BusError> {
        let present = self.line_high(IrqLine::BattInserted)?;
        self.trace.record(Trace::BatteryPresent(present));
        // Validation needs an ADC conversion; defer it.
        self.work.schedule_at(Work::BatteryIdCheck, now);
        self.start_external(now);
        self.platform.supply_changed(Supply::Battery);
        Ok(())
    }

    /// The battery voltage fell below the resume threshold; let the
    /// sequencer charge again (unless administratively disabled).
    ///
    /// No external-charger start here: with DC present VBAT cannot sag,
    /// so after an external end-of-charge this fires only once DC has
    /// been unplugged, used, and replugged.
    fn on_vbatdet_low(&mut self) -> Result<(), BusError> {
        let high = self.line_high(IrqLine::VbatdetLow)?;
        if high {
            let enable = !self.charging_disabled;
            self.auto_enable(enable)?;
        }
        self.trace_fsm()?;
        self.all_supplies_changed();
        Ok(())
    }

    pub(crate) fn on_chgdone(&mut self, now: u64) -> Result<(), BusError> {
        self.trace_fsm()?;
        self.trace.record(Trace::ChargingDone);

        self.stop_external();
        self.all_supplies_changed();

        self.bms_notify.is_battery_full = true;
        self.bms_notify_check(now)
    }

    fn on_chgfail(&mut self) -> Result<(), BusError> {
        self.failed_clear(true)?;

        let batt_present =
            self.line_high(IrqLine::BattInserted).unwrap_or(false);
        let temp_ok = self.line_high(IrqLine::BatTempOk).unwrap_or(false);
        self.trace.record(Trace::ChargeFailed {
            batt_present,
            temp_ok,
        });

        self.all_supplies_changed();
        Ok(())
    }

    fn on_chgstate(&mut self, now: u64) -> Result<(), BusError> {
        self.trace_fsm()?;
        self.all_supplies_changed();
        self.bms_notify_check(now)
    }

    /// Entering fast charge starts the end-of-charge monitor; leaving it
    /// lets the monitor wind itself down on its next pass.
    pub(crate) fn on_fastchg(&mut self, now: u64) -> Result<(), BusError> {
        let high = self.line_high(IrqLine::FastChg)?;
        if high && !self.work.is_pending(Work::EocCheck) {
            self.eoc_hold_wake();
            self.schedule_eoc_check(now);
        }
        self.platform.supply_changed(Supply::Battery);
        self.bms_notify_check(now)
    }

    fn on_batt_removed(&mut self) -> Result<(), BusError> {
        let removed = self.line_high(IrqLine::BattRemoved)?;
        self.trace.record(Trace::BatteryPresent(!removed));
        self.stop_external();
        self.platform.supply_changed(Supply::Battery);
        Ok(())
    }

    /// Edge-triggered both ways: high means temperature came back into
    /// range and charging may begin, low means it left range.
    fn on_bat_temp_ok(&mut self, now: u64) -> Result<(), BusError> {
        let ok = self.line_high(IrqLine::BatTempOk)?;
        self.trace_fsm()?;

        if ok {
            self.start_external(now);
        } else {
            self.stop_external();
        }

        self.all_supplies_changed();
        self.bms_notify_check(now)
    }

    fn on_dcin_valid(&mut self, now: u64) -> Result<(), BusError> {
        // Force the battery FET closed so the external charger owns the
        // input path.
        self.charge_dis(true)?;
        self.on_dc_removal_insertion(now)?;
        self.start_external(now);
        Ok(())
    }

    fn on_dcin_ov(&mut self, now: u64) -> Result<(), BusError> {
        self.charge_dis(false)?;
        self.on_dc_removal_insertion(now)?;
        self.stop_external();
        Ok(())
    }

    fn on_dc_removal_insertion(&mut self, now: u64) -> Result<(), BusError> {
        let present = self.line_high(IrqLine::DcinValid)?;
        if present != self.dc_present {
            self.dc_present = present;
            self.trace.record(Trace::DcPresent(present));
            self.platform.supply_changed(Supply::Dc);
            self.platform.supply_changed(Supply::Battery);
        }
        self.bms_notify_check(now)
    }

    /// Lets the fuel gauge know when the battery starts or stops
    /// charging. The notification itself is deferred work; this only
    /// detects the transition.
    pub(crate) fn bms_notify_check(&mut self, now: u64) -> Result<(), BusError> {
        let code = self.fsm_code()?;
        let charging = self.is_ext_charging() || fsm::code_is_charging(code);

        if charging != self.bms_notify.is_charging {
            self.bms_notify.is_charging = charging;
            self.work.schedule_at(Work::BmsNotify, now);
        }
        Ok(())
    }
}
