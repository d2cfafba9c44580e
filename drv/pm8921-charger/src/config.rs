// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board calibration data for the charger.
//!
//! A `ChargerConfig` is the platform-data equivalent: everything the board
//! knows about its battery and charging envelope. Fields that the hardware
//! treats as optional use 0 to mean "leave the hardware default alone",
//! matching how boards that don't populate them behave.

/// Silicon revision of the PMIC die. Early revisions need buck-converter
/// workarounds during hardware init.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum DieRevision {
    V1_0,
    V1_1,
    V2_0,
    V3_0,
    V3_1,
}

/// Hardware comparator threshold for the battery-cold trip.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ColdThreshold {
    Deg5 = 0,
    Deg10 = 1,
}

/// Hardware comparator threshold for the battery-hot trip.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum HotThreshold {
    Deg40 = 0,
    Deg45 = 1,
}

/// Thresholds armed on the battery-temperature monitor. The low threshold
/// is the cool-zone boundary, the high threshold the warm-zone boundary;
/// zone transitions shift them by the hysteresis margin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BtmConfig {
    pub low_thr_temp_dc: i16,
    pub high_thr_temp_dc: i16,
    pub interval_ms: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct ChargerConfig {
    /// Maximum charge time in minutes; 0 leaves the hardware default.
    pub safety_time_min: u16,
    /// Maximum trickle-charge time in minutes; 0 leaves the default.
    pub ttrkl_time_min: u16,
    /// Heartbeat period for unsolicited battery property refreshes;
    /// 0 disables the heartbeat.
    pub update_period_ms: u64,
    /// Voltage the battery is charged up to.
    pub max_voltage_mv: u16,
    /// Minimum battery voltage, used for voltage-based capacity.
    pub min_voltage_mv: u16,
    /// Delta below max voltage at which charging resumes.
    pub resume_voltage_delta_mv: u16,
    /// Charge termination current.
    pub term_current_ma: u16,
    /// Maximum battery charge current in the normal temperature zone.
    pub max_bat_chg_current_ma: u16,

    /// Cool-zone boundary in degrees C. `cool_temp_dc` and `warm_temp_dc`
    /// both 0 means the board does not care for JEITA compliance.
    pub cool_temp_dc: i16,
    /// Warm-zone boundary in degrees C.
    pub warm_temp_dc: i16,
    /// How often the temperature monitor polls.
    pub temp_check_period_ms: u32,
    pub cool_bat_chg_current_ma: u16,
    pub warm_bat_chg_current_ma: u16,
    pub cool_bat_voltage_mv: u16,
    pub warm_bat_voltage_mv: u16,

    /// Accepted battery-id window; both 0 disables the check.
    pub batt_id_min: i32,
    pub batt_id_max: i32,

    /// Trickle/weak setpoints; 0 leaves the hardware defaults.
    pub trkl_voltage_mv: u16,
    pub weak_voltage_mv: u16,
    pub trkl_current_ma: u16,
    pub weak_current_ma: u16,
    /// Input voltage regulation point; 0 leaves the default.
    pub vin_min_mv: u16,

    /// Charge-current caps indexed by mitigation level; level 0 means no
    /// mitigation. Absent on boards without thermal management.
    pub thermal_mitigation_ma: Option<&'static [u16]>,

    pub cold_thr: ColdThreshold,
    pub hot_thr: HotThreshold,
    pub die_revision: DieRevision,

    /// Ship with charging administratively disabled (factory mode).
    pub charging_disabled: bool,
}

impl ChargerConfig {
    /// Whether the board asked for JEITA warm/cool handling.
    pub fn jeita_in_use(&self) -> bool {
        !(self.cool_temp_dc == 0 && self.warm_temp_dc == 0)
    }
}

impl Default for ChargerConfig {
    /// Representative single-cell Li-ion calibration, handy for tests.
    fn default() -> Self {
        Self {
            safety_time_min: 180,
            ttrkl_time_min: 15,
            update_period_ms: 60_000,
            max_voltage_mv: 4200,
            min_voltage_mv: 3200,
            resume_voltage_delta_mv: 100,
            term_current_ma: 100,
            max_bat_chg_current_ma: 1100,
            cool_temp_dc: 10,
            warm_temp_dc: 40,
            temp_check_period_ms: 1000,
            cool_bat_chg_current_ma: 350,
            warm_bat_chg_current_ma: 350,
            cool_bat_voltage_mv: 4100,
            warm_bat_voltage_mv: 4100,
            batt_id_min: 0,
            batt_id_max: 0,
            trkl_voltage_mv: 0,
            weak_voltage_mv: 0,
            trkl_current_ma: 0,
            weak_current_ma: 0,
            vin_min_mv: 0,
            thermal_mitigation_ma: None,
            cold_thr: ColdThreshold::Deg5,
            hot_thr: HotThreshold::Deg40,
            die_revision: DieRevision::V3_1,
            charging_disabled: false,
        }
    }
}
