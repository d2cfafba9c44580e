// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Warm/cool battery derating (JEITA) and thermal mitigation.
//!
//! The battery-temperature monitor in the PMIC's ADC arbiter watches two
//! thresholds and calls back on crossings; the owner routes those callbacks
//! into [`Charger::battery_cool`] and [`Charger::battery_warm`]. Entering a
//! zone derates charge current and voltage and moves the crossed threshold
//! inward by [`TEMP_HYSTERESIS_DEGC`], so a battery sitting right at a
//! boundary does not flap between zones.
//!
//! Threshold updates are pushed to the monitor as deferred work because
//! the callback may arrive in a context where the monitor cannot be
//! reconfigured reentrantly.

use drv_pm8921_charger_api::ChargerError;

use crate::{Charger, ExternalCharger, Platform, Trace, Work};

/// Margin a threshold moves inward on a zone entry.
pub const TEMP_HYSTERESIS_DEGC: i16 = 2;

impl<P: Platform, X: ExternalCharger> Charger<P, X> {
    /// Cool-zone crossing from the temperature monitor. `enter` is true
    /// when the battery dropped below the cool threshold. Repeated
    /// notifications for the current zone state are no-ops.
    pub fn battery_cool(
        &mut self,
        enter: bool,
        now: u64,
    ) -> Result<(), ChargerError> {
        if enter == self.is_bat_cool {
            return Ok(());
        }
        self.is_bat_cool = enter;
        self.trace.record(Trace::BatteryCool(enter));

        if enter {
            self.btm.low_thr_temp_dc =
                self.config.cool_temp_dc + TEMP_HYSTERESIS_DEGC;
            self.set_appropriate_battery_current()?;
            self.vddmax_set(self.config.cool_bat_voltage_mv)?;
            self.vbatdet_set(
                self.config.cool_bat_voltage_mv
                    - self.config.resume_voltage_delta_mv,
            )?;
        } else {
            self.btm.low_thr_temp_dc = self.config.cool_temp_dc;
            self.set_appropriate_battery_current()?;
            self.vddmax_set(self.config.max_voltage_mv)?;
            self.vbatdet_set(
                self.config.max_voltage_mv
                    - self.config.resume_voltage_delta_mv,
            )?;
        }

        self.work.schedule_at(Work::BtmRearm, now);
        Ok(())
    }

    /// Warm-zone crossing; mirror image of [`Charger::battery_cool`].
    pub fn battery_warm(
        &mut self,
        enter: bool,
        now: u64,
    ) -> Result<(), ChargerError> {
        if enter == self.is_bat_warm {
            return Ok(());
        }
        self.is_bat_warm = enter;
        self.trace.record(Trace::BatteryWarm(enter));

        if enter {
            self.btm.high_thr_temp_dc =
                self.config.warm_temp_dc - TEMP_HYSTERESIS_DEGC;
            self.set_appropriate_battery_current()?;
            self.vddmax_set(self.config.warm_bat_voltage_mv)?;
            self.vbatdet_set(
                self.config.warm_bat_voltage_mv
                    - self.config.resume_voltage_delta_mv,
            )?;
        } else {
            self.btm.high_thr_temp_dc = self.config.warm_temp_dc;
            self.set_appropriate_battery_current()?;
            self.vddmax_set(self.config.max_voltage_mv)?;
            self.vbatdet_set(
                self.config.max_voltage_mv
                    - self.config.resume_voltage_delta_mv,
            )?;
        }

        self.work.schedule_at(Work::BtmRearm, now);
        Ok(())
    }

    /// Programs the fast-charge current as the tightest of the board
    /// maximum, any active temperature-zone cap, and any active
    /// mitigation cap.
    pub(crate) fn set_appropriate_battery_current(
        &mut self,
    ) -> Result<(), ChargerError> {
        let mut ma = self.config.max_bat_chg_current_ma;

        if self.is_bat_cool {
            ma = ma.min(self.config.cool_bat_chg_current_ma);
        }
        if self.is_bat_warm {
            ma = ma.min(self.config.warm_bat_chg_current_ma);
        }
        if self.mitigation_level != 0 {
            if let Some(table) = self.config.thermal_mitigation_ma {
                ma = ma.min(table[usize::from(self.mitigation_level)]);
            }
        }

        self.ibatmax_set(ma)
    }

    /// Initial monitor setup at attach, with the configured (unshifted)
    /// zone boundaries.
    pub(crate) fn configure_btm(&mut self) -> Result<(), ChargerError> {
        let btm = self.btm;
        self.platform.btm_configure(&btm)?;
        self.platform.btm_start()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChargerConfig;
    use crate::registers::Register;
    use crate::testutil::*;

    #[test]
    fn cool_entry_derates_and_shifts_the_threshold() {
        let (mut chg, _) = attached_charger(ChargerConfig::default());

        chg.battery_cool(true, 100).unwrap();

        // 350mA cool cap, 4100mV cool voltage, resume 100mV below that.
        assert_eq!(chg.platform.reg(Register::CHG_IBAT_MAX) & 0x3f, 2);
        assert_eq!(chg.platform.reg(Register::CHG_VDD_MAX) & 0x7f, 43);
        assert_eq!(chg.platform.reg(Register::CHG_VBAT_DET) & 0x7f, 38);
        // Cool boundary at 10C moves up by the hysteresis margin.
        assert_eq!(chg.btm.low_thr_temp_dc, 12);

        // The monitor hears about it on the next poll.
        chg.poll(100);
        assert_eq!(chg.platform.last_btm_config().unwrap().low_thr_temp_dc, 12);
    }

    #[test]
    fn cool_exit_restores_the_envelope() {
        let (mut chg, _) = attached_charger(ChargerConfig::default());
        chg.battery_cool(true, 0).unwrap();
        chg.battery_cool(false, 1).unwrap();

        assert_eq!(chg.platform.reg(Register::CHG_IBAT_MAX) & 0x3f, 17);
        assert_eq!(chg.platform.reg(Register::CHG_VDD_MAX) & 0x7f, 48);
        assert_eq!(chg.platform.reg(Register::CHG_VBAT_DET) & 0x7f, 43);
        assert_eq!(chg.btm.low_thr_temp_dc, 10);
    }

    #[test]
    fn zone_entry_is_idempotent() {
        let (mut chg, _) = attached_charger(ChargerConfig::default());
        chg.battery_cool(true, 0).unwrap();
        let writes = chg.platform.write_count();

        chg.battery_cool(true, 1).unwrap();
        assert_eq!(chg.platform.write_count(), writes);
        assert_eq!(chg.trace.occurrences(Trace::BatteryCool(true)), 1);
    }

    #[test]
    fn warm_entry_lowers_the_high_threshold() {
        let (mut chg, _) = attached_charger(ChargerConfig::default());
        chg.battery_warm(true, 0).unwrap();

        assert_eq!(chg.btm.high_thr_temp_dc, 38);
        assert_eq!(chg.platform.reg(Register::CHG_IBAT_MAX) & 0x3f, 2);

        chg.battery_warm(false, 1).unwrap();
        assert_eq!(chg.btm.high_thr_temp_dc, 40);
    }

    #[test]
    fn both_zones_take_the_tighter_cap() {
        let cfg = ChargerConfig {
            cool_bat_chg_current_ma: 500,
            warm_bat_chg_current_ma: 350,
            ..ChargerConfig::default()
        };
        let (mut chg, _) = attached_charger(cfg);
        chg.battery_cool(true, 0).unwrap();
        chg.battery_warm(true, 1).unwrap();

        // min(1100, 500, 350) = 350.
        assert_eq!(chg.platform.reg(Register::CHG_IBAT_MAX) & 0x3f, 2);
    }

    #[test]
    fn mitigation_caps_and_level_zero_lifts() {
        static TABLE: [u16; 3] = [1100, 700, 325];
        let cfg = ChargerConfig {
            thermal_mitigation_ma: Some(&TABLE),
            ..ChargerConfig::default()
        };
        let (mut chg, _) = attached_charger(cfg);

        chg.set_thermal_mitigation_level(1).unwrap();
        assert_eq!(chg.platform.reg(Register::CHG_IBAT_MAX) & 0x3f, 9);

        chg.set_thermal_mitigation_level(0).unwrap();
        assert_eq!(chg.platform.reg(Register::CHG_IBAT_MAX) & 0x3f, 17);

        assert_eq!(
            chg.set_thermal_mitigation_level(3),
            Err(ChargerError::OutOfRange)
        );
    }

    #[test]
    fn attach_configures_and_starts_the_monitor() {
        let (chg, _) = attached_charger(ChargerConfig::default());
        let cfg = chg.platform.last_btm_config().unwrap();
        assert_eq!(cfg.low_thr_temp_dc, 10);
        assert_eq!(cfg.high_thr_temp_dc, 40);
        assert_eq!(cfg.interval_ms, 1000);
        assert_eq!(chg.platform.btm_starts(), 1);
    }

    #[test]
    fn jeita_disabled_skips_the_monitor() {
        let cfg = ChargerConfig {
            cool_temp_dc: 0,
            warm_temp_dc: 0,
            ..ChargerConfig::default()
        };
        let (chg, _) = attached_charger(cfg);
        assert_eq!(chg.platform.last_btm_config(), None);
    }
}
