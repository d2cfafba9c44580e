// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for the charger block of the PM8921 PMIC.
//!
//! The charging sequencer itself runs in hardware; this driver programs its
//! setpoints, watches it through interrupts and the test mux, decides end of
//! charge by software measurement, handles warm/cool battery derating, and
//! can hand the battery over to an external DC charger.
//!
//! The driver is a plain state machine around a [`Platform`] implementation
//! supplied by board glue: register access, interrupt plumbing, ADC reads,
//! fuel-gauge calls, and wake control all go through it. Nothing here
//! depends on an OS, which is also what makes the logic testable off
//! target.
//!
//! Execution model: the owner calls [`Charger::handle_irq`] for each PMIC
//! interrupt and [`Charger::poll`] whenever `now` reaches
//! [`Charger::next_deadline`]. Both take `&mut self`; serialization is the
//! owner's problem, which keeps the driver free of locks. The one
//! exception is [`VbusDraw`], which the USB stack may poke from another
//! context before or after attach.

#![cfg_attr(target_os = "none", no_std)]

pub mod config;
pub mod eoc;
pub mod ext;
pub mod fsm;
pub mod irq;
pub mod props;
pub mod registers;
pub mod thermal;

#[cfg(test)]
pub(crate) mod testutil;

use core::sync::atomic::{AtomicU32, Ordering};

use enum_map::Enum;
use tracebuf::TraceBuf;
use worktimer::WorkTimer;

use config::{BtmConfig, ChargerConfig, DieRevision};
use registers::Register;

pub use drv_pm8921_charger_api::{
    AdcChannel, BatteryHealth, BatteryStatus, BusError, ChargeType,
    ChargerError, ChargingSource, IrqLine, Supply, Trigger,
};
pub use ext::ExtRefusal;
pub use props::VbusDraw;

/// Everything the driver needs from the board and the rest of the PMIC.
///
/// Bus faults from register access are reported as [`BusError`]; the
/// driver decides per call site whether a fault aborts the operation or
/// merely disqualifies a measurement.
pub trait Platform {
    fn read_reg(&mut self, reg: Register) -> Result<u8, BusError>;
    fn write_reg(&mut self, reg: Register, value: u8) -> Result<(), BusError>;

    /// Real-time (unlatched) status of an interrupt line.
    fn irq_status(&mut self, line: IrqLine) -> Result<bool, BusError>;

    /// Claims an interrupt line with the given edge configuration. The
    /// line starts enabled; the driver masks it right after claiming.
    fn request_irq(
        &mut self,
        line: IrqLine,
        trigger: Trigger,
    ) -> Result<(), ChargerError>;
    fn free_irq(&mut self, line: IrqLine);
    fn enable_irq(&mut self, line: IrqLine);
    fn disable_irq(&mut self, line: IrqLine);
    /// Marks a line as a system wakeup source.
    fn enable_irq_wake(&mut self, line: IrqLine);

    /// One-shot ADC conversion; voltage in mV, temperature in tenths of a
    /// degree C, battery id in channel units.
    fn adc_read(&mut self, channel: AdcChannel) -> Result<i32, BusError>;

    // Fuel gauge. `None` means the board has no gauge and the caller
    // falls back to coarser sources.
    fn gauge_charging_began(&mut self);
    fn gauge_charging_end(&mut self, is_full: bool);
    fn gauge_percent_charge(&mut self) -> Option<u8>;
    fn gauge_battery_current_ma(&mut self) -> Option<i32>;
    fn gauge_full_charge_capacity_mah(&mut self) -> Option<i32>;
    /// Coulomb-counter current, the fallback when the gauge is absent.
    fn ccadc_battery_current_ma(&mut self) -> Result<i32, BusError>;

    // Battery temperature monitor, the hardware comparator that drives
    // the warm/cool callbacks.
    fn btm_configure(&mut self, config: &BtmConfig) -> Result<(), BusError>;
    fn btm_start(&mut self) -> Result<(), BusError>;

    /// Keeps the system awake while the end-of-charge monitor needs to
    /// sample. Calls are never nested; the driver guards that.
    fn wake_hold(&mut self);
    fn wake_release(&mut self);

    /// A property of `supply` may have changed; consumers should re-read.
    fn supply_changed(&mut self, supply: Supply);
    /// VBUS presence notification for the USB stack.
    fn vbus_present(&mut self, present: bool);

    fn delay_us(&mut self, us: u32);
}

/// An external DC charger that can take over the battery, e.g. one in a
/// desktop dock.
pub trait ExternalCharger {
    fn start_charging(&mut self);
    fn stop_charging(&mut self);
    fn is_trickle(&mut self) -> bool;
}

/// Placeholder for boards with no external charger.
pub struct NoExternalCharger;

impl ExternalCharger for NoExternalCharger {
    fn start_charging(&mut self) {}
    fn stop_charging(&mut self) {}
    fn is_trickle(&mut self) -> bool {
        false
    }
}

/// Deferred work items, one timer slot each. These run from `poll`, off
/// the interrupt path.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum Work {
    /// Periodic end-of-charge evaluation.
    EocCheck,
    /// Push updated warm/cool thresholds to the temperature monitor.
    BtmRearm,
    /// Re-validate the battery id after an insertion.
    BatteryIdCheck,
    /// Tell the fuel gauge charging started or stopped.
    BmsNotify,
    /// Unsolicited property refresh for userspace.
    Heartbeat,
}

/// Trace ring payloads. These are the driver's only instrumentation;
/// entries are inspected with a debugger or asserted on in tests.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trace {
    Attached { usb_present: bool, dc_present: bool },
    Irq(IrqLine),
    Fsm(u8),
    UsbPresent(bool),
    DcPresent(bool),
    BatteryPresent(bool),
    UsbDraw(u16),
    UsbSuspended,
    EocCount(u8),
    ChargingDone,
    EocStopped,
    UsbOverVoltage,
    UsbUnderVoltage,
    VcpTriggered,
    ChargeFailed { batt_present: bool, temp_ok: bool },
    BatteryCool(bool),
    BatteryWarm(bool),
    MitigationLevel(u8),
    ExtStarted,
    ExtStopped,
    ExtStartRefused(ExtRefusal),
    ChargingDisabled(bool),
    BatteryIdInvalid,
    BusFault(Register, BusError),
    IrqFault(IrqLine, BusError),
    AdcFault(AdcChannel, BusError),
    BtmFault,
    LowBattery(u8),
}

/// Ceiling on battery current regardless of what the board asks for.
pub const SAFE_CURRENT_MA: u16 = 1500;

const ALL_IRQ_LINES_MASK: u32 = (1 << IrqLine::COUNT) - 1;

/// Fuel-gauge notification state, latched between the event that changed
/// it and the deferred `BmsNotify` work that delivers it.
#[derive(Default)]
pub(crate) struct BmsNotify {
    pub(crate) is_charging: bool,
    pub(crate) is_battery_full: bool,
}

/// An attached charger context. Constructing one (via [`Charger::attach`])
/// initializes the hardware and claims all interrupt lines; there is no
/// half-attached state for callers to misuse.
pub struct Charger<P: Platform, X: ExternalCharger> {
    pub(crate) platform: P,
    pub(crate) config: ChargerConfig,

    pub(crate) usb_present: bool,
    pub(crate) dc_present: bool,
    pub(crate) is_bat_cool: bool,
    pub(crate) is_bat_warm: bool,
    pub(crate) charging_disabled: bool,
    pub(crate) mitigation_level: u8,

    pub(crate) ext: Option<X>,
    pub(crate) ext_charging: bool,
    pub(crate) ext_charge_done: bool,

    /// Which lines are currently unmasked. Atomic so the enable/disable
    /// test-and-set is race-free against a re-entrant caller.
    pub(crate) armed: AtomicU32,

    pub(crate) eoc_count: u8,
    pub(crate) wake_held: bool,
    pub(crate) bms_notify: BmsNotify,

    /// Live monitor thresholds; zone transitions edit these before
    /// scheduling a rearm.
    pub(crate) btm: BtmConfig,

    pub(crate) work: WorkTimer<Work>,
    pub(crate) trace: TraceBuf<Trace, 64>,
}

impl<P: Platform, X: ExternalCharger> Charger<P, X> {
    /// Brings up the charger: programs every setpoint from `config`,
    /// applies die-revision workarounds, claims all interrupt lines,
    /// determines the initial input/battery state, and replays any USB
    /// draw request that arrived before attach.
    ///
    /// Fails without leaking interrupt lines; a failed attach leaves the
    /// platform as if the driver never loaded.
    pub fn attach(
        platform: P,
        config: ChargerConfig,
        pending_draw: &VbusDraw,
        now: u64,
    ) -> Result<Self, ChargerError> {
        let mut chg = Self {
            platform,
            charging_disabled: config.charging_disabled,
            btm: BtmConfig {
                low_thr_temp_dc: config.cool_temp_dc,
                high_thr_temp_dc: config.warm_temp_dc,
                interval_ms: config.temp_check_period_ms,
            },
            config,
            usb_present: false,
            dc_present: false,
            is_bat_cool: false,
            is_bat_warm: false,
            mitigation_level: 0,
            ext: None,
            ext_charging: false,
            ext_charge_done: false,
            armed: AtomicU32::new(0),
            eoc_count: 0,
            wake_held: false,
            bms_notify: BmsNotify::default(),
            work: WorkTimer::new(),
            trace: TraceBuf::new(),
        };

        chg.hw_init()?;
        chg.request_irqs()?;

        match chg.finish_attach(pending_draw, now) {
            Ok(()) => Ok(chg),
            Err(e) => {
                chg.free_irqs();
                Err(e)
            }
        }
    }

    fn finish_attach(
        &mut self,
        pending_draw: &VbusDraw,
        now: u64,
    ) -> Result<(), ChargerError> {
        for line in irq::WAKE_LINES {
            self.platform.enable_irq_wake(line);
        }

        if self.config.jeita_in_use() {
            self.configure_btm()?;
        }

        self.determine_initial_state(pending_draw, now)?;

        if self.config.update_period_ms != 0 {
            self.work
                .schedule_at(Work::Heartbeat, now + self.config.update_period_ms);
        }

        self.trace.record(Trace::Attached {
            usb_present: self.usb_present,
            dc_present: self.dc_present,
        });
        Ok(())
    }

    /// Tears the context down and hands the platform back. The external
    /// charger, if one is running, is stopped first.
    pub fn detach(mut self) -> P {
        self.unbind_external();
        self.free_irqs();
        if self.wake_held {
            self.platform.wake_release();
        }
        self.platform
    }

    /// One-time hardware setup, in the order the sequencer expects it.
    fn hw_init(&mut self) -> Result<(), ChargerError> {
        self.masked_write(
            Register::SYS_CONFIG_2,
            registers::BOOT_DONE_BIT,
            registers::BOOT_DONE_BIT,
        )?;

        // Voltage envelope first: ceiling, resume threshold, setpoint.
        self.vddsafe_set(self.config.max_voltage_mv)?;
        self.vbatdet_set(
            self.config.max_voltage_mv - self.config.resume_voltage_delta_mv,
        )?;
        self.vddmax_set(self.config.max_voltage_mv)?;

        self.ibatsafe_set(SAFE_CURRENT_MA)?;
        self.ibatmax_set(self.config.max_bat_chg_current_ma)?;
        self.iterm_set(self.config.term_current_ma)?;

        // The enumeration timer would cut USB power to an un-enumerated
        // device; we handle enumeration policy in software.
        self.masked_write(
            Register::PBL_ACCESS2,
            registers::ENUM_TIMER_STOP_BIT,
            registers::ENUM_TIMER_STOP_BIT,
        )?;

        // Lowest USB draw until the USB stack tells us otherwise.
        self.iusbmax_set(props::USB_MA_TABLE[0].1)?;

        if self.config.safety_time_min != 0 {
            self.tchg_max_set(self.config.safety_time_min)?;
        }
        if self.config.ttrkl_time_min != 0 {
            self.ttrkl_max_set(self.config.ttrkl_time_min)?;
        }
        if self.config.vin_min_mv != 0 {
            self.vinmin_set(self.config.vin_min_mv)?;
        }

        self.wd_disable()?;

        // 0 enables the hardware battery-temperature comparator.
        self.masked_write(
            Register::CHG_CNTRL_2,
            registers::CHG_BAT_TEMP_DIS_BIT,
            0,
        )?;

        // Switch the buck to 3.2MHz.
        self.write_reg(Register::CHG_BUCK_CLOCK_CTRL, 0x15)?;

        if self.config.trkl_voltage_mv != 0 {
            self.vtrkl_low_set(self.config.trkl_voltage_mv)?;
        }
        if self.config.weak_voltage_mv != 0 {
            self.vweak_set(self.config.weak_voltage_mv)?;
        }
        if self.config.trkl_current_ma != 0 {
            self.itrkl_set(self.config.trkl_current_ma)?;
        }
        if self.config.weak_current_ma != 0 {
            self.iweak_set(self.config.weak_current_ma)?;
        }

        self.cold_temp_config(self.config.cold_thr)?;
        self.hot_temp_config(self.config.hot_thr)?;

        self.die_workarounds()?;

        self.charge_dis(self.charging_disabled)?;
        self.auto_enable(!self.charging_disabled)?;

        Ok(())
    }

    fn die_workarounds(&mut self) -> Result<(), ChargerError> {
        let rev = self.config.die_revision;

        if rev < DieRevision::V2_0 {
            self.write_reg(Register::CHG_BUCK_CTRL_TEST2, 0xf1)?;
            self.write_reg(Register::CHG_BUCK_CTRL_TEST3, 0xce)?;
            self.write_reg(Register::CHG_BUCK_CTRL_TEST3, 0xd8)?;

            // Battery-id detection needs the PSI sample registers primed
            // on these revisions.
            self.write_reg(Register::PSI_TXRX_SAMPLE_DATA_0, 0xff)?;
            self.write_reg(Register::PSI_TXRX_SAMPLE_DATA_1, 0xff)?;
            self.write_reg(Register::PSI_TXRX_SAMPLE_DATA_2, 0xff)?;
            self.write_reg(Register::PSI_TXRX_SAMPLE_DATA_3, 0xff)?;
            self.write_reg(Register::PSI_CONFIG_STATUS, 0x0d)?;
            self.platform.delay_us(100);
            self.write_reg(Register::PSI_CONFIG_STATUS, 0x0c)?;
        }

        if rev == DieRevision::V3_0 {
            self.write_reg(Register::CHG_BUCK_CTRL_TEST3, 0xac)?;
        }

        self.write_reg(Register::CHG_BUCK_CTRL_TEST3, 0xd9)?;

        // Keep the FSM out of end-of-charge decisions; software owns
        // termination.
        self.write_reg(Register::CHG_BUCK_CTRL_TEST3, 0x91)?;

        Ok(())
    }

    /// Claims every line in the dispatch table, masked, all-or-nothing.
    fn request_irqs(&mut self) -> Result<(), ChargerError> {
        // Start from all-enabled so the per-line disarm below actually
        // masks each freshly claimed line.
        self.armed.store(ALL_IRQ_LINES_MASK, Ordering::Relaxed);

        for (i, &(line, trigger)) in irq::IRQ_TABLE.iter().enumerate() {
            if let Err(e) = self.platform.request_irq(line, trigger) {
                for &(claimed, _) in &irq::IRQ_TABLE[..i] {
                    self.platform.free_irq(claimed);
                }
                self.armed.store(0, Ordering::Relaxed);
                return Err(e);
            }
            self.disarm_irq(line);
        }
        Ok(())
    }

    fn free_irqs(&mut self) {
        for &(line, _) in irq::IRQ_TABLE.iter() {
            self.platform.free_irq(line);
        }
        self.armed.store(0, Ordering::Relaxed);
    }

    /// Figures out what the charger was already doing before we attached
    /// and replays the pending USB draw request, if any.
    fn determine_initial_state(
        &mut self,
        pending_draw: &VbusDraw,
        now: u64,
    ) -> Result<(), ChargerError> {
        self.dc_present = self.line_high(IrqLine::DcinValid)?;
        self.usb_present = self.line_high(IrqLine::UsbinValid)?;

        self.platform.vbus_present(self.usb_present);

        for line in irq::STEADY_STATE_LINES {
            self.arm_irq(line);
        }

        if let Some(ma) = pending_draw.take() {
            // Draw failures are traced and non-fatal here, as they are
            // when the USB stack asks at runtime.
            let _ = self.apply_usb_draw(ma);
            // The charger may already be fast-charging off this input;
            // run the same path the interrupt would.
            self.on_fastchg(now)?;
        }

        let code = self.fsm_code()?;
        if fsm::code_is_charging(code) {
            self.bms_notify.is_charging = true;
            self.platform.gauge_charging_began();
        }

        self.check_battery_valid();
        self.trace.record(Trace::Fsm(code));
        Ok(())
    }

    /// Runs any deferred work whose deadline has passed. Errors inside
    /// work items are traced and swallowed; the lane must keep running.
    pub fn poll(&mut self, now: u64) {
        self.work.poll(now);

        let mut fired = [None; <Work as Enum>::LENGTH];
        let mut n = 0;
        for which in self.work.iter_fired() {
            fired[n] = Some(which);
            n += 1;
        }

        for which in fired.iter().flatten() {
            match which {
                Work::EocCheck => self.eoc_check(now),
                Work::BtmRearm => {
                    let btm = self.btm;
                    if self.platform.btm_configure(&btm).is_err() {
                        self.trace.record(Trace::BtmFault);
                    }
                }
                Work::BatteryIdCheck => self.check_battery_valid(),
                Work::BmsNotify => {
                    if self.bms_notify.is_charging {
                        self.platform.gauge_charging_began();
                    } else {
                        self.platform
                            .gauge_charging_end(self.bms_notify.is_battery_full);
                        self.bms_notify.is_battery_full = false;
                    }
                }
                Work::Heartbeat => {
                    self.platform.supply_changed(Supply::Battery);
                    self.work.schedule_at(
                        Work::Heartbeat,
                        now + self.config.update_period_ms,
                    );
                }
            }
        }
    }

    /// Earliest pending deferred-work deadline, for the owner's sleep.
    pub fn next_deadline(&self) -> Option<u64> {
        self.work.next_deadline()
    }

    /// The trace ring, for debugger inspection.
    pub fn trace(&self) -> &TraceBuf<Trace, 64> {
        &self.trace
    }

    // Register access with fault tracing. All bus traffic funnels
    // through these.

    pub(crate) fn read_reg(&mut self, reg: Register) -> Result<u8, BusError> {
        self.platform.read_reg(reg).map_err(|e| {
            self.trace.record(Trace::BusFault(reg, e));
            e
        })
    }

    pub(crate) fn write_reg(
        &mut self,
        reg: Register,
        value: u8,
    ) -> Result<(), BusError> {
        self.platform.write_reg(reg, value).map_err(|e| {
            self.trace.record(Trace::BusFault(reg, e));
            e
        })
    }

    /// Read-modify-write of the bits under `mask`.
    pub(crate) fn masked_write(
        &mut self,
        reg: Register,
        mask: u8,
        value: u8,
    ) -> Result<(), BusError> {
        let mut v = self.read_reg(reg)?;
        v &= !mask;
        v |= value & mask;
        self.write_reg(reg, v)
    }

    pub(crate) fn line_high(
        &mut self,
        line: IrqLine,
    ) -> Result<bool, BusError> {
        self.platform.irq_status(line).map_err(|e| {
            self.trace.record(Trace::IrqFault(line, e));
            e
        })
    }

    /// Unmasks a line unless it already is unmasked.
    pub(crate) fn arm_irq(&mut self, line: IrqLine) {
        let prev = self.armed.fetch_or(line.mask(), Ordering::Relaxed);
        if prev & line.mask() == 0 {
            self.platform.enable_irq(line);
        }
    }

    /// Masks a line unless it already is masked.
    pub(crate) fn disarm_irq(&mut self, line: IrqLine) {
        let prev = self.armed.fetch_and(!line.mask(), Ordering::Relaxed);
        if prev & line.mask() != 0 {
            self.platform.disable_irq(line);
        }
    }

    // Control bits.

    /// Lets the hardware sequencer charge when its own conditions allow.
    pub(crate) fn auto_enable(&mut self, enable: bool) -> Result<(), BusError> {
        self.masked_write(
            Register::CHG_CNTRL_3,
            registers::CHG_EN_BIT,
            if enable { registers::CHG_EN_BIT } else { 0 },
        )
    }

    /// Forces the battery FET closed so no current is drawn from the
    /// charger input; the device then runs off (or is charged into) the
    /// battery by something else.
    pub(crate) fn charge_dis(&mut self, disable: bool) -> Result<(), BusError> {
        self.masked_write(
            Register::CHG_CNTRL,
            registers::CHG_CHARGE_DIS_BIT,
            if disable { registers::CHG_CHARGE_DIS_BIT } else { 0 },
        )
    }

    pub(crate) fn usb_suspend_enable(
        &mut self,
        enable: bool,
    ) -> Result<(), BusError> {
        self.masked_write(
            Register::CHG_CNTRL_3,
            registers::CHG_USB_SUSPEND_BIT,
            if enable { registers::CHG_USB_SUSPEND_BIT } else { 0 },
        )
    }

    /// Clears the ATC-failed and charge-failed latches so the sequencer
    /// may retry.
    pub(crate) fn failed_clear(&mut self, clear: bool) -> Result<(), BusError> {
        let mask =
            registers::ATC_FAILED_CLEAR_BIT | registers::CHG_FAILED_CLEAR_BIT;
        self.masked_write(
            Register::CHG_CNTRL_3,
            mask,
            if clear { mask } else { 0 },
        )
    }

    fn wd_disable(&mut self) -> Result<(), BusError> {
        self.masked_write(Register::CHG_TWDOG, registers::CHG_WD_MASK, 0)
    }

    fn cold_temp_config(
        &mut self,
        thr: config::ColdThreshold,
    ) -> Result<(), BusError> {
        self.masked_write(
            Register::CHG_CNTRL_2,
            registers::COLD_THR_BIT,
            (thr as u8) << 1,
        )
    }

    fn hot_temp_config(
        &mut self,
        thr: config::HotThreshold,
    ) -> Result<(), BusError> {
        self.masked_write(
            Register::CHG_CNTRL_2,
            registers::HOT_THR_BIT,
            thr as u8,
        )
    }

    // Test-mux captures.

    /// Captures the sequencer's current state code. The capture command
    /// latches all banks at once, so the two bank reads are coherent.
    pub(crate) fn fsm_code(&mut self) -> Result<u8, BusError> {
        self.write_reg(Register::CHG_TEST, registers::CAPTURE_FSM_STATE_CMD)?;

        self.write_reg(Register::CHG_TEST, registers::READ_BANK_7)?;
        let low = self.read_reg(Register::CHG_TEST)? & 0x0f;

        self.write_reg(Register::CHG_TEST, registers::READ_BANK_4)?;
        let high = self.read_reg(Register::CHG_TEST)? & 0x01;

        Ok((high << 4) | low)
    }

    /// Which regulation loop the buck is riding, from test bank 6.
    pub(crate) fn regulation_loop(
        &mut self,
    ) -> Result<fsm::RegulationLoop, BusError> {
        self.write_reg(Register::CHG_TEST, registers::READ_BANK_6)?;
        let raw = self.read_reg(Register::CHG_TEST)?;
        Ok(fsm::RegulationLoop::from_bits_truncate(raw))
    }

    // Battery-id validation.

    fn is_battery_valid(&mut self) -> bool {
        if self.config.batt_id_min == 0 && self.config.batt_id_max == 0 {
            return true;
        }
        let id = match self.platform.adc_read(AdcChannel::BatteryId) {
            Ok(id) => id,
            Err(e) => {
                // Assume valid on ADC error rather than refusing to
                // charge a good battery.
                self.trace.record(Trace::AdcFault(AdcChannel::BatteryId, e));
                return true;
            }
        };
        id >= self.config.batt_id_min && id <= self.config.batt_id_max
    }

    pub(crate) fn check_battery_valid(&mut self) {
        let enable = if self.is_battery_valid() {
            !self.charging_disabled
        } else {
            self.trace.record(Trace::BatteryIdInvalid);
            false
        };
        // Fault already traced; the next id check retries.
        let _ = self.auto_enable(enable);
    }

    // Public control surface, the operations board and power-management
    // code call on a live context.

    /// Administratively enables or disables charging. Disabling also
    /// stops drawing from the input, forcing the device onto battery.
    pub fn set_charging_enabled(
        &mut self,
        enable: bool,
    ) -> Result<(), ChargerError> {
        self.charging_disabled = !enable;
        self.trace.record(Trace::ChargingDisabled(!enable));
        self.auto_enable(enable)?;
        self.charge_dis(!enable)?;
        Ok(())
    }

    pub fn usb_plugged_in(&mut self) -> Result<bool, ChargerError> {
        Ok(self.line_high(IrqLine::UsbinValid)?)
    }

    pub fn dc_plugged_in(&mut self) -> Result<bool, ChargerError> {
        Ok(self.line_high(IrqLine::DcinValid)?)
    }

    pub fn battery_present(&mut self) -> Result<bool, ChargerError> {
        Ok(self.line_high(IrqLine::BattInserted)?)
    }

    /// Removes input current monitoring entirely. Only safe with a
    /// supply that can sustain VIN_MIN at high current.
    pub fn disable_input_current_limit(
        &mut self,
        disable: bool,
    ) -> Result<(), ChargerError> {
        if disable {
            self.write_reg(Register::CHG_BUCK_CTRL_TEST3, 0xf2)?;
        }
        Ok(())
    }

    pub fn set_max_battery_charge_current(
        &mut self,
        ma: u16,
    ) -> Result<(), ChargerError> {
        self.ibatmax_set(ma)
    }

    /// Stops drawing current from the charger input; the battery powers
    /// the device (and an external charger may feed the battery).
    pub fn disable_source_current(
        &mut self,
        disable: bool,
    ) -> Result<(), ChargerError> {
        Ok(self.charge_dis(disable)?)
    }

    pub fn regulate_input_voltage(
        &mut self,
        mv: u16,
    ) -> Result<(), ChargerError> {
        self.vinmin_set(mv)
    }

    /// Whether the battery is charging, and from which input. DC wins
    /// when both are valid.
    pub fn charging_source(
        &mut self,
    ) -> Result<(bool, ChargingSource), ChargerError> {
        let code = self.fsm_code()?;
        let charging = self.ext_charging || fsm::code_is_charging(code);
        if !charging {
            return Ok((false, ChargingSource::None));
        }

        let dc = self.line_high(IrqLine::DcinValid)?;
        let usb = self.line_high(IrqLine::UsbinValid)?;
        let source = match (dc, usb) {
            (true, _) => ChargingSource::Dc,
            (false, true) => ChargingSource::Usb,
            (false, false) => ChargingSource::None,
        };
        Ok((true, source))
    }

    /// Caps charge current for thermal reasons; level 0 lifts the cap.
    pub fn set_thermal_mitigation_level(
        &mut self,
        level: u8,
    ) -> Result<(), ChargerError> {
        let table = self
            .config
            .thermal_mitigation_ma
            .ok_or(ChargerError::ConfigMissing)?;
        if usize::from(level) >= table.len() {
            return Err(ChargerError::OutOfRange);
        }
        self.mitigation_level = level;
        self.trace.record(Trace::MitigationLevel(level));
        self.set_appropriate_battery_current()
    }
}
