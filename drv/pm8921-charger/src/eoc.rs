// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Software end-of-charge detection.
//!
//! The hardware FSM is kept out of termination decisions (see the init
//! sequence); instead this monitor samples every [`EOC_CHECK_PERIOD_MS`]
//! while fast charge (or an external charger) is active. Charging is
//! declared done only after [`CONSECUTIVE_COUNT`] consecutive qualifying
//! samples: battery at voltage, taper current at or below the termination
//! setpoint, and the buck riding the voltage loop. Any disqualifying
//! sample, including a failed measurement, resets the streak.
//!
//! The monitor holds the platform wake while it runs, since sampling a
//! suspended PMIC would defeat the point.

use drv_pm8921_charger_api::{AdcChannel, IrqLine};

use crate::fsm::RegulationLoop;
use crate::{Charger, ExternalCharger, Platform, Trace, Work};

/// Sampling period for the monitor.
pub const EOC_CHECK_PERIOD_MS: u64 = 10_000;
/// Qualifying samples needed, back to back, to declare end of charge.
pub const CONSECUTIVE_COUNT: u8 = 3;
/// How far below the programmed charge voltage the battery may sit and
/// still count as "at voltage".
pub const VBAT_TOLERANCE_MV: u16 = 70;

enum Verdict {
    /// Nothing is charging; wind the monitor down.
    Stop,
    /// Conditions not met this sample; reset the streak and keep going.
    Disqualified,
    Qualified,
}

impl<P: Platform, X: ExternalCharger> Charger<P, X> {
    pub(crate) fn schedule_eoc_check(&mut self, now: u64) {
        self.work.schedule_at(Work::EocCheck, now + EOC_CHECK_PERIOD_MS);
    }

    pub(crate) fn eoc_hold_wake(&mut self) {
        if !self.wake_held {
            self.wake_held = true;
            self.platform.wake_hold();
        }
    }

    fn eoc_release_wake(&mut self) {
        if self.wake_held {
            self.wake_held = false;
            self.platform.wake_release();
        }
    }

    /// One monitor pass, run as deferred work.
    pub(crate) fn eoc_check(&mut self, now: u64) {
        match self.evaluate_eoc() {
            Verdict::Stop => {
                self.eoc_count = 0;
                self.trace.record(Trace::EocStopped);
                self.eoc_release_wake();
            }
            Verdict::Disqualified => {
                self.eoc_count = 0;
                self.schedule_eoc_check(now);
            }
            Verdict::Qualified => {
                self.eoc_count += 1;
                if self.eoc_count == CONSECUTIVE_COUNT {
                    self.eoc_count = 0;

                    // Errors past this point are traced by the register
                    // layer; the end-of-charge declaration stands.
                    let _ = self.auto_enable(false);

                    let was_ext = self.is_ext_charging();

                    // Declare end of charging the same way the hardware
                    // would, so consumers and the gauge hear about it
                    // through one path.
                    let _ = self.on_chgdone(now);

                    if was_ext {
                        self.ext_charge_done = true;
                    }

                    self.eoc_release_wake();
                } else {
                    self.trace.record(Trace::EocCount(self.eoc_count));
                    self.schedule_eoc_check(now);
                }
            }
        }
    }

    fn evaluate_eoc(&mut self) -> Verdict {
        if !self.is_ext_charging() {
            // The internal charger must be fast charging; trickle never
            // terminates by taper.
            match self.line_high(IrqLine::FastChg) {
                Ok(false) => return Verdict::Stop,
                Ok(true) => (),
                Err(_) => return Verdict::Disqualified,
            }

            // Voltage-collapse protection active means the reading is
            // meaningless.
            match self.line_high(IrqLine::Vcp) {
                Ok(true) | Err(_) => return Verdict::Disqualified,
                Ok(false) => (),
            }

            match self.line_high(IrqLine::BatTempOk) {
                Ok(false) | Err(_) => return Verdict::Disqualified,
                Ok(true) => (),
            }

            let vbat = match self.platform.adc_read(AdcChannel::BatteryVoltage)
            {
                Ok(mv) => mv,
                Err(e) => {
                    self.trace
                        .record(Trace::AdcFault(AdcChannel::BatteryVoltage, e));
                    return Verdict::Disqualified;
                }
            };
            let vddmax = match self.vddmax_get() {
                Ok(mv) => mv,
                Err(_) => return Verdict::Disqualified,
            };
            if vbat < i32::from(vddmax) - i32::from(VBAT_TOLERANCE_MV) {
                return Verdict::Disqualified;
            }
        }

        let iterm = match self.iterm_get() {
            Ok(ma) => ma,
            Err(_) => return Verdict::Disqualified,
        };

        let ichg = match self.battery_current_sample() {
            Some(ma) => ma,
            None => return Verdict::Disqualified,
        };

        // Negative current is charge going into the battery. A battery
        // that is supplying current, or still drawing more than the
        // termination current, is not done.
        if ichg > 0 {
            return Verdict::Disqualified;
        }
        if -ichg > i32::from(iterm) {
            return Verdict::Disqualified;
        }

        if !self.is_ext_charging() {
            let reg_loop = match self.regulation_loop() {
                Ok(l) => l,
                Err(_) => return Verdict::Disqualified,
            };
            // Taper is only meaningful once the buck regulates on
            // battery voltage alone.
            if !reg_loop.is_empty() && reg_loop != RegulationLoop::VDD_LOOP {
                return Verdict::Disqualified;
            }
        }

        Verdict::Qualified
    }

    /// Battery current from the gauge, falling back to the coulomb
    /// counter. `None` means no usable measurement this pass.
    fn battery_current_sample(&mut self) -> Option<i32> {
        if let Some(ma) = self.platform.gauge_battery_current_ma() {
            return Some(ma);
        }
        match self.platform.ccadc_battery_current_ma() {
            Ok(ma) => Some(ma),
            Err(_) => None,
        }
    }
}
