// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handoff to an external DC charger.
//!
//! Some boards pair the PMIC with a higher-power charger behind the DC
//! input. Once bound, the driver starts it whenever DC power, a healthy
//! battery, and a closed battery FET line up, and stops it the moment any
//! of that stops being true. While the external charger runs, the
//! end-of-charge monitor keeps sampling so software still decides when the
//! battery is full.

use drv_pm8921_charger_api::{BusError, ChargerError, IrqLine};

use crate::{Charger, ExternalCharger, Platform, Trace};

/// Why a start attempt was refused. Traced rather than returned: starts
/// are triggered by interrupts, and the condition usually fixes itself.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExtRefusal {
    NoDcPower,
    NoBattery,
    BatteryTempOutOfRange,
    BatteryOverVoltage,
    BatfetOpen,
}

impl<P: Platform, X: ExternalCharger> Charger<P, X> {
    /// Binds an external charger and, if DC power is already present,
    /// forces the battery FET closed and tries to start it right away.
    pub fn bind_external(
        &mut self,
        ext: X,
        now: u64,
    ) -> Result<(), ChargerError> {
        self.ext = Some(ext);
        self.ext_charging = false;

        if self.line_high(IrqLine::DcinValid)? {
            self.charge_dis(true)?;
        }
        self.start_external(now);
        Ok(())
    }

    /// Stops the external charger if running and returns it to the
    /// caller.
    pub fn unbind_external(&mut self) -> Option<X> {
        self.stop_external();
        self.ext.take()
    }

    pub(crate) fn is_ext_charging(&self) -> bool {
        self.ext.is_some() && self.ext_charging
    }

    pub(crate) fn is_ext_trickle(&mut self) -> bool {
        match &mut self.ext {
            Some(ext) => ext.is_trickle(),
            None => false,
        }
    }

    /// Starts the external charger if one is bound, idle, and every
    /// hardware precondition holds. Also kicks the end-of-charge monitor,
    /// since the internal fast-charge interrupt will not fire for an
    /// external charge cycle.
    pub(crate) fn start_external(&mut self, now: u64) {
        if self.ext.is_none() || self.ext_charging {
            return;
        }

        match self.external_preconditions() {
            Ok(None) => (),
            Ok(Some(refusal)) => {
                self.trace.record(Trace::ExtStartRefused(refusal));
                return;
            }
            // Fault already traced; with the battery state unknown,
            // starting is the wrong bet.
            Err(_) => return,
        }

        if let Some(ext) = &mut self.ext {
            ext.start_charging();
        }
        self.ext_charging = true;
        self.ext_charge_done = false;
        self.trace.record(Trace::ExtStarted);

        self.schedule_eoc_check(now);
        self.eoc_hold_wake();
    }

    fn external_preconditions(
        &mut self,
    ) -> Result<Option<ExtRefusal>, BusError> {
        if !self.line_high(IrqLine::DcinValid)? {
            return Ok(Some(ExtRefusal::NoDcPower));
        }
        if !self.line_high(IrqLine::BattInserted)? {
            return Ok(Some(ExtRefusal::NoBattery));
        }
        if !self.line_high(IrqLine::BatTempOk)? {
            return Ok(Some(ExtRefusal::BatteryTempOutOfRange));
        }
        if self.line_high(IrqLine::VbatOv)? {
            return Ok(Some(ExtRefusal::BatteryOverVoltage));
        }
        if !self.line_high(IrqLine::Batfet)? {
            return Ok(Some(ExtRefusal::BatfetOpen));
        }
        Ok(None)
    }

    /// Stops the external charger if it is running. Idempotent.
    pub(crate) fn stop_external(&mut self) {
        if !self.ext_charging {
            return;
        }
        if let Some(ext) = &mut self.ext {
            ext.stop_charging();
        }
        self.ext_charging = false;
        self.ext_charge_done = false;
        self.trace.record(Trace::ExtStopped);
    }
}
