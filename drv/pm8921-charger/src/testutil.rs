// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fake platform and external charger for host-side tests.
//!
//! `FakePlatform` models just enough of the PMIC to run the driver:
//! a register file, real-time interrupt status, the test-mux command
//! register (so FSM captures read back the code a test injected), the
//! ADC, and call counters for everything the driver is expected to
//! drive exactly once.

use std::collections::BTreeMap;
use std::rc::Rc;

use core::cell::RefCell;

use drv_pm8921_charger_api::{
    AdcChannel, BusError, ChargerError, IrqLine, Supply, Trigger,
};

use crate::config::{BtmConfig, ChargerConfig};
use crate::registers::{self, Register};
use crate::{Charger, ExternalCharger, Platform, VbusDraw};

pub(crate) type TestCharger = Charger<FakePlatform, FakeExt>;

/// Attaches a charger to a fresh fake platform. Panics on failure, which
/// a fresh fake never produces.
pub(crate) fn attached_charger(
    config: ChargerConfig,
) -> (TestCharger, VbusDraw) {
    let draw = VbusDraw::new();
    let chg = Charger::attach(FakePlatform::new(), config, &draw, 0)
        .expect("attach on a fresh fake platform");
    (chg, draw)
}

pub(crate) struct FakePlatform {
    regs: BTreeMap<u16, u8>,
    writes: usize,

    irq_status: [bool; IrqLine::COUNT],
    enabled: [bool; IrqLine::COUNT],
    enable_calls: [usize; IrqLine::COUNT],
    disable_calls: [usize; IrqLine::COUNT],
    requested: Vec<IrqLine>,
    fail_request: Option<IrqLine>,
    fail_write: Option<Register>,

    // Test-mux model: the last command written to CHG_TEST selects what
    // a read returns.
    chg_test_cmd: u8,
    fsm_code: u8,
    regulation: u8,

    adc: [Result<i32, BusError>; 3],
    gauge_percent: Option<u8>,
    gauge_current: Option<i32>,
    gauge_fcc: Option<i32>,
    ccadc: Result<i32, BusError>,
    gauge_began: usize,
    gauge_ends: usize,
    last_end_full: bool,

    btm_configs: Vec<BtmConfig>,
    btm_starts: usize,

    wake_held: bool,
    changed: [usize; 3],
    vbus: Vec<bool>,
}

impl FakePlatform {
    pub(crate) fn new() -> Self {
        Self {
            regs: BTreeMap::new(),
            writes: 0,
            irq_status: [false; IrqLine::COUNT],
            enabled: [false; IrqLine::COUNT],
            enable_calls: [0; IrqLine::COUNT],
            disable_calls: [0; IrqLine::COUNT],
            requested: Vec::new(),
            fail_request: None,
            fail_write: None,
            chg_test_cmd: 0,
            fsm_code: 0,
            regulation: 0,
            adc: [Ok(3700), Ok(250), Ok(0)],
            gauge_percent: None,
            gauge_current: None,
            gauge_fcc: None,
            ccadc: Ok(0),
            gauge_began: 0,
            gauge_ends: 0,
            last_end_full: false,
            btm_configs: Vec::new(),
            btm_starts: 0,
            wake_held: false,
            changed: [0; 3],
            vbus: Vec::new(),
        }
    }

    pub(crate) fn reg(&self, reg: Register) -> u8 {
        self.regs.get(&(reg as u16)).copied().unwrap_or(0)
    }

    pub(crate) fn write_count(&self) -> usize {
        self.writes
    }

    pub(crate) fn set_irq_status(&mut self, line: IrqLine, high: bool) {
        self.irq_status[line as usize] = high;
    }

    pub(crate) fn set_fsm_code(&mut self, code: u8) {
        self.fsm_code = code;
    }

    pub(crate) fn set_regulation_loop(&mut self, raw: u8) {
        self.regulation = raw;
    }

    pub(crate) fn set_adc(
        &mut self,
        channel: AdcChannel,
        reading: Result<i32, BusError>,
    ) {
        self.adc[channel as usize] = reading;
    }

    pub(crate) fn set_gauge_percent(&mut self, percent: Option<u8>) {
        self.gauge_percent = percent;
    }

    pub(crate) fn set_gauge_current(&mut self, ma: Option<i32>) {
        self.gauge_current = ma;
    }

    pub(crate) fn set_ccadc(&mut self, ma: Result<i32, BusError>) {
        self.ccadc = ma;
    }

    pub(crate) fn fail_irq_request(&mut self, line: IrqLine) {
        self.fail_request = Some(line);
    }

    pub(crate) fn fail_writes_to(&mut self, reg: Register) {
        self.fail_write = Some(reg);
    }

    pub(crate) fn requested_irqs(&self) -> usize {
        self.requested.len()
    }

    pub(crate) fn irq_enabled(&self, line: IrqLine) -> bool {
        self.enabled[line as usize]
    }

    pub(crate) fn enable_calls(&self, line: IrqLine) -> usize {
        self.enable_calls[line as usize]
    }

    pub(crate) fn disable_calls(&self, line: IrqLine) -> usize {
        self.disable_calls[line as usize]
    }

    pub(crate) fn wake_held(&self) -> bool {
        self.wake_held
    }

    pub(crate) fn changed_count(&self, supply: Supply) -> usize {
        self.changed[supply as usize]
    }

    pub(crate) fn vbus_events(&self) -> &[bool] {
        &self.vbus
    }

    pub(crate) fn gauge_began_calls(&self) -> usize {
        self.gauge_began
    }

    pub(crate) fn gauge_end_calls(&self) -> usize {
        self.gauge_ends
    }

    pub(crate) fn gauge_last_end_full(&self) -> bool {
        self.last_end_full
    }

    pub(crate) fn last_btm_config(&self) -> Option<BtmConfig> {
        self.btm_configs.last().copied()
    }

    pub(crate) fn btm_starts(&self) -> usize {
        self.btm_starts
    }
}

impl Platform for FakePlatform {
    fn read_reg(&mut self, reg: Register) -> Result<u8, BusError> {
        if reg == Register::CHG_TEST {
            return Ok(match self.chg_test_cmd {
                registers::READ_BANK_7 => self.fsm_code & 0x0f,
                registers::READ_BANK_4 => (self.fsm_code >> 4) & 0x01,
                registers::READ_BANK_6 => self.regulation,
                _ => 0,
            });
        }
        Ok(self.reg(reg))
    }

    fn write_reg(&mut self, reg: Register, value: u8) -> Result<(), BusError> {
        if self.fail_write == Some(reg) {
            return Err(BusError::WriteFault);
        }
        self.writes += 1;
        if reg == Register::CHG_TEST {
            self.chg_test_cmd = value;
        } else {
            self.regs.insert(reg as u16, value);
        }
        Ok(())
    }

    fn irq_status(&mut self, line: IrqLine) -> Result<bool, BusError> {
        Ok(self.irq_status[line as usize])
    }

    fn request_irq(
        &mut self,
        line: IrqLine,
        _trigger: Trigger,
    ) -> Result<(), ChargerError> {
        if self.fail_request == Some(line) {
            return Err(ChargerError::IrqUnavailable);
        }
        self.requested.push(line);
        // Claimed lines start enabled; masking is the driver's job.
        self.enabled[line as usize] = true;
        Ok(())
    }

    fn free_irq(&mut self, line: IrqLine) {
        self.requested.retain(|&l| l != line);
        self.enabled[line as usize] = false;
    }

    fn enable_irq(&mut self, line: IrqLine) {
        self.enabled[line as usize] = true;
        self.enable_calls[line as usize] += 1;
    }

    fn disable_irq(&mut self, line: IrqLine) {
        self.enabled[line as usize] = false;
        self.disable_calls[line as usize] += 1;
    }

    fn enable_irq_wake(&mut self, _line: IrqLine) {}

    fn adc_read(&mut self, channel: AdcChannel) -> Result<i32, BusError> {
        self.adc[channel as usize]
    }

    fn gauge_charging_began(&mut self) {
        self.gauge_began += 1;
    }

    fn gauge_charging_end(&mut self, is_full: bool) {
        self.gauge_ends += 1;
        self.last_end_full = is_full;
    }

    fn gauge_percent_charge(&mut self) -> Option<u8> {
        self.gauge_percent
    }

    fn gauge_battery_current_ma(&mut self) -> Option<i32> {
        self.gauge_current
    }

    fn gauge_full_charge_capacity_mah(&mut self) -> Option<i32> {
        self.gauge_fcc
    }

    fn ccadc_battery_current_ma(&mut self) -> Result<i32, BusError> {
        self.ccadc
    }

    fn btm_configure(&mut self, config: &BtmConfig) -> Result<(), BusError> {
        self.btm_configs.push(*config);
        Ok(())
    }

    fn btm_start(&mut self) -> Result<(), BusError> {
        self.btm_starts += 1;
        Ok(())
    }

    fn wake_hold(&mut self) {
        assert!(!self.wake_held, "nested wake hold");
        self.wake_held = true;
    }

    fn wake_release(&mut self) {
        assert!(self.wake_held, "release without hold");
        self.wake_held = false;
    }

    fn supply_changed(&mut self, supply: Supply) {
        self.changed[supply as usize] += 1;
    }

    fn vbus_present(&mut self, present: bool) {
        self.vbus.push(present);
    }

    fn delay_us(&mut self, _us: u32) {}
}

/// What the fake external charger has been told to do.
#[derive(Default)]
pub(crate) struct ExtLog {
    pub(crate) starts: usize,
    pub(crate) stops: usize,
    pub(crate) trickle: bool,
}

/// External charger whose call log outlives the driver owning it.
pub(crate) struct FakeExt {
    log: Rc<RefCell<ExtLog>>,
}

impl FakeExt {
    pub(crate) fn new() -> (Self, Rc<RefCell<ExtLog>>) {
        let log = Rc::new(RefCell::new(ExtLog::default()));
        (Self { log: Rc::clone(&log) }, log)
    }
}

impl ExternalCharger for FakeExt {
    fn start_charging(&mut self) {
        self.log.borrow_mut().starts += 1;
    }

    fn stop_charging(&mut self) {
        self.log.borrow_mut().stops += 1;
    }

    fn is_trickle(&mut self) -> bool {
        self.log.borrow().trickle
    }
}
