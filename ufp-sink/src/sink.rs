//! Sink policy engine.
//!
//! Drives the protocol engine from a single `run` tick: attach handling,
//! Get_Src_Cap retries, the Request/PS_RDY window, periodic PPS refresh and
//! the hard-reset escape hatch. The PHY sits behind the [`Driver`] trait;
//! board IO (load switch, indicator LEDs) sits behind [`BoardIo`]. The stack
//! never installs an interrupt handler — the caller invokes `run` on a poll
//! cadence and passes the observed level of the PHY interrupt line.

use {
    crate::{
        header::Header,
        log::{SliceWriter, StatusKind, StatusLog},
        pdo::PdoKind,
        protocol::{self, Events as ProtocolEvents, PowerOption, Protocol, MAX_OBJECTS},
        timers::{elapsed, timer_values::*},
        units, CcLevel, Instant, PhyError,
    },
    core::fmt::Write as _,
    proc_bitfield::bitfield,
};

bitfield! {
    /// Events reported by the PHY's `alert` scan.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PhyEvents(pub u8): Debug, FromRaw, IntoRaw {
        pub good_crc_sent: bool @ 3,
        pub rx_sop: bool @ 2,
        pub detached: bool @ 1,
        pub attached: bool @ 0,
    }
}

/// PD PHY contract consumed by the policy engine.
pub trait Driver {
    fn init(&mut self) -> Result<(), PhyError>;

    /// Run the PHY's attach state machine and interrupt scan once.
    fn alert(&mut self) -> Result<PhyEvents, PhyError>;

    /// CC levels latched during the last attach.
    fn cc_levels(&self) -> (CcLevel, CcLevel);

    /// Copy out the most recently received SOP message.
    fn message(&mut self, objects: &mut [u32; MAX_OBJECTS]) -> Header;

    fn transmit(&mut self, header: Header, objects: &[u32]) -> Result<(), PhyError>;

    /// Send a hard-reset ordered set; the source answers by power-cycling
    /// VBUS.
    fn transmit_hard_reset(&mut self) -> Result<(), PhyError>;

    /// Gate detach detection on the VBUSOK comparator.
    fn set_vbus_sense(&mut self, enable: bool) -> Result<(), PhyError>;

    fn delay_ms(&mut self, ms: u32);
}

/// Board collaborators: a load switch and two indicator LED groups. The
/// stack decides levels; pin access stays outside the core.
pub trait BoardIo {
    fn set_load_switch(&mut self, on: bool);
    fn set_voltage_led(&mut self, level: VoltageLed);
    fn set_current_led(&mut self, level: CurrentLed);
}

impl BoardIo for () {
    fn set_load_switch(&mut self, _on: bool) {}
    fn set_voltage_led(&mut self, _level: VoltageLed) {}
    fn set_current_led(&mut self, _level: CurrentLed) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VoltageLed {
    Off,
    V5,
    V9,
    V12,
    V15,
    V20,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CurrentLed {
    Off,
    Le1A5,
    Le3A0,
    Gt3A0,
}

/// Kind of contract currently in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerStatus {
    NotAvailable,
    Typical,
    Pps,
}

bitfield! {
    /// Events surfaced to the application from one `run` tick.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Events(pub u16): Debug, FromRaw, IntoRaw {
        pub msg_rx: bool @ 11,
        pub msg_tx: bool @ 10,
        pub cc_reported: bool @ 9,
        pub src_cap_received: bool @ 8,
        pub load_switch_off: bool @ 7,
        pub load_switch_on: bool @ 6,
        pub power_rejected: bool @ 5,
        pub pps_startup: bool @ 4,
        pub power_ready_pps: bool @ 3,
        pub power_ready: bool @ 2,
        pub detached: bool @ 1,
        pub attached: bool @ 0,
    }
}

#[derive(Debug, Clone, Copy)]
struct PpsSetting {
    voltage: u16,
    current: u8,
}

/// Two-stage startup default: request 5.0 V first when the target is below
/// it (20 mV units).
const DEFAULT_PPS_STARTUP_THRESHOLD: u16 = 250;

pub struct Sink<DRIVER, IO = ()> {
    driver: DRIVER,
    io: IO,
    protocol: Protocol,
    log: StatusLog,
    log_line: u8,

    ready_voltage: u16,
    ready_current: u16,
    power_status: PowerStatus,

    pps_next: Option<PpsSetting>,
    pps_startup_threshold: u16,

    time_polling: u16,
    time_wait_src_cap: u16,
    time_wait_ps_rdy: u16,
    time_pps_request: u16,
    last_tick: u16,
    wait_src_cap: bool,
    wait_ps_rdy: bool,
    send_request: bool,
    get_src_cap_retry_count: u8,
    clock_prescaler: u8,

    led_enabled: bool,
    led_blink_enable: bool,
    led_blink_on: bool,
    time_led_blink: u16,
    period_led_blink: u16,
    led_auto_voltage: VoltageLed,
    led_auto_current: CurrentLed,
    load_switch_on: bool,
    pending_events: Events,
}

impl<DRIVER: Driver, IO: BoardIo> Sink<DRIVER, IO> {
    pub fn new(driver: DRIVER, io: IO) -> Self {
        Self {
            driver,
            io,
            protocol: Protocol::new(),
            log: StatusLog::new(),
            log_line: 0,
            ready_voltage: 0,
            ready_current: 0,
            power_status: PowerStatus::NotAvailable,
            pps_next: None,
            pps_startup_threshold: DEFAULT_PPS_STARTUP_THRESHOLD,
            time_polling: 0,
            time_wait_src_cap: 0,
            time_wait_ps_rdy: 0,
            time_pps_request: 0,
            last_tick: 0,
            wait_src_cap: false,
            wait_ps_rdy: false,
            send_request: false,
            get_src_cap_retry_count: 0,
            clock_prescaler: 1,
            led_enabled: false,
            led_blink_enable: false,
            led_blink_on: false,
            time_led_blink: 0,
            period_led_blink: 0,
            led_auto_voltage: VoltageLed::Off,
            led_auto_current: CurrentLed::Off,
            load_switch_on: false,
            pending_events: Events(0),
        }
    }

    /// Initialise the PHY and negotiate under `option` alone.
    pub fn init(&mut self, option: PowerOption) -> Result<(), PhyError> {
        self.init_pps(0, 0, option)
    }

    /// Initialise the PHY with a PPS operating point (20 mV / 50 mA units)
    /// plus a fallback power option for non-PPS sources.
    ///
    /// Targets below the startup threshold take the two-stage path: the
    /// first request asks for the threshold voltage, the true target goes
    /// out after the first PS_RDY.
    pub fn init_pps(
        &mut self,
        pps_voltage: u16,
        pps_current: u8,
        option: PowerOption,
    ) -> Result<(), PhyError> {
        self.driver.init()?;

        let (voltage, current) = if pps_voltage != 0 && pps_voltage < self.pps_startup_threshold {
            self.pps_next = Some(PpsSetting { voltage: pps_voltage, current: pps_current });
            (self.pps_startup_threshold, pps_current)
        } else {
            self.pps_next = None;
            (pps_voltage, pps_current)
        };

        self.protocol = Protocol::new();
        self.protocol.set_power_option(option);
        self.protocol.set_pps(voltage, current, false);

        self.ready_voltage = 0;
        self.ready_current = 0;
        self.power_status = PowerStatus::NotAvailable;
        self.wait_src_cap = false;
        self.wait_ps_rdy = false;
        self.send_request = false;
        self.get_src_cap_retry_count = 0;

        self.log.push(self.last_tick, StatusKind::Device, 0);
        Ok(())
    }

    /// The single tick. Call on the polling cadence or whenever the PHY
    /// interrupt line is observed low; `interrupt` carries that observation.
    pub fn run(&mut self, now: Instant, interrupt: bool) -> Result<Events, PhyError> {
        let mut events = core::mem::replace(&mut self.pending_events, Events(0));
        let t = self.clock_ms(now);
        self.last_tick = t;

        let polling_due = self.timer(t, &mut events)?;
        if polling_due || interrupt {
            let phy_events = self.alert()?;
            if phy_events.0 != 0 {
                self.handle_phy_events(t, phy_events, &mut events)?;
            }
        }
        self.handle_led(t);
        Ok(events)
    }

    /// Re-request a PPS operating point on a live PPS contract. Returns
    /// false when no PPS contract is active or the point is outside the
    /// advertised range.
    pub fn set_pps(&mut self, voltage: u16, current: u8) -> bool {
        if self.power_status == PowerStatus::Pps && self.protocol.set_pps(voltage, current, true) {
            self.send_request = true;
            return true;
        }
        false
    }

    pub fn set_power_option(&mut self, option: PowerOption) {
        if self.protocol.set_power_option(option) {
            self.send_request = true;
        }
    }

    /// Threshold for the two-stage PPS startup, in 20 mV units. Configure
    /// before `init_pps`.
    pub fn set_pps_startup_threshold(&mut self, voltage: u16) {
        if voltage != 0 {
            self.pps_startup_threshold = voltage;
        }
    }

    /// Divisor applied to the host millisecond clock for every timestamp
    /// and delay conversion.
    pub fn set_clock_prescaler(&mut self, prescaler: u8) {
        if prescaler != 0 {
            self.clock_prescaler = prescaler;
        }
    }

    pub fn set_output(&mut self, enable: bool) {
        self.io.set_load_switch(enable);
        if self.load_switch_on != enable {
            self.load_switch_on = enable;
            if enable {
                self.pending_events.set_load_switch_on(true);
                self.log.push(self.last_tick, StatusKind::LoadSwitchOn, 0);
            } else {
                self.pending_events.set_load_switch_off(true);
                self.log.push(self.last_tick, StatusKind::LoadSwitchOff, 0);
            }
        }
    }

    pub fn set_led(&mut self, enable: bool) {
        self.led_blink_enable = false;
        self.led_enabled = enable;
        self.apply_led(enable);
    }

    /// Manual LED override; disables blinking and auto levels.
    pub fn set_led_levels(&mut self, voltage: VoltageLed, current: CurrentLed) {
        self.led_blink_enable = false;
        self.led_enabled = true;
        self.io.set_voltage_led(voltage);
        self.io.set_current_led(current);
    }

    pub fn blink_led(&mut self, period: u16) {
        self.led_blink_enable = true;
        self.period_led_blink = period >> 1;
    }

    /// Negotiated voltage: 50 mV units on a typical contract, 20 mV units
    /// on PPS.
    pub fn voltage(&self) -> u16 {
        self.ready_voltage
    }

    /// Negotiated current: 10 mA units on a typical contract, 50 mA units
    /// on PPS.
    pub fn current(&self) -> u16 {
        self.ready_current
    }

    pub fn is_power_ready(&self) -> bool {
        self.power_status == PowerStatus::Typical
    }

    pub fn is_pps_ready(&self) -> bool {
        self.power_status == PowerStatus::Pps
    }

    /// A request is in flight or queued.
    pub fn is_ps_transition(&self) -> bool {
        self.send_request || self.wait_ps_rdy
    }

    pub fn power_status(&self) -> PowerStatus {
        self.power_status
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn driver(&mut self) -> &mut DRIVER {
        &mut self.driver
    }

    fn clock_ms(&self, now: Instant) -> u16 {
        (now.ticks() / self.clock_prescaler as u64) as u16
    }

    fn delay_ms(&mut self, ms: u32) {
        self.driver.delay_ms(ms / self.clock_prescaler as u32);
    }

    fn alert(&mut self) -> Result<PhyEvents, PhyError> {
        let mut result = Err(PhyError::Busy);
        for _ in 0..3 {
            match self.driver.alert() {
                Ok(events) => return Ok(events),
                Err(error) => result = Err(error),
            }
        }
        result
    }

    /// Evaluate the policy timers. Returns true once per polling interval;
    /// that return drives whether the PHY is scanned on interrupt-less
    /// ticks.
    fn timer(&mut self, t: u16, events: &mut Events) -> Result<bool, PhyError> {
        if self.wait_src_cap && elapsed(t, self.time_wait_src_cap) > tTypeCSinkWaitCap {
            self.time_wait_src_cap = t;
            if self.get_src_cap_retry_count < 3 {
                self.get_src_cap_retry_count += 1;
                // Nudge the source; this does not power-cycle VBUS.
                let header = self.protocol.create_get_src_cap();
                self.transmit(t, header, &[], events)?;
            } else {
                self.get_src_cap_retry_count = 0;
                // Maximal escape hatch: the source power-cycles VBUS.
                self.driver.transmit_hard_reset()?;
                self.protocol.reset();
            }
        }
        if self.wait_ps_rdy {
            if elapsed(t, self.time_wait_ps_rdy) > tRequestToPSReady {
                self.wait_ps_rdy = false;
                self.set_default_power(t, events);
            }
        } else if self.send_request
            || (self.power_status == PowerStatus::Pps
                && elapsed(t, self.time_pps_request) > tPPSRequest)
        {
            // Request on demand, and periodically on PPS to keep the
            // contract alive.
            self.send_request = false;
            self.time_pps_request = t;
            if let Some(message) = self.protocol.create_request() {
                self.wait_ps_rdy = true;
                self.time_wait_ps_rdy = t;
                self.transmit(t, message.header, &message.objects, events)?;
            }
        }
        if elapsed(t, self.time_polling) > tPdPolling {
            self.time_polling = t;
            return Ok(true);
        }
        Ok(false)
    }

    fn handle_phy_events(
        &mut self,
        t: u16,
        phy_events: PhyEvents,
        events: &mut Events,
    ) -> Result<(), PhyError> {
        if phy_events.detached() {
            self.protocol.reset();
            self.wait_src_cap = false;
            self.wait_ps_rdy = false;
            self.send_request = false;
            self.get_src_cap_retry_count = 0;
            self.ready_voltage = 0;
            self.ready_current = 0;
            self.power_status = PowerStatus::NotAvailable;
            events.set_detached(true);
            return Ok(());
        }
        if phy_events.attached() {
            let (cc1, cc2) = self.driver.cc_levels();
            self.protocol.reset();
            let cc = if cc1.is_present() && !cc2.is_present() {
                cc1
            } else if cc2.is_present() && !cc1.is_present() {
                cc2
            } else {
                CcLevel::Ra
            };
            if cc.supports_pd() {
                self.wait_src_cap = true;
            } else {
                // Source without PD: settle for the Type-C default.
                self.set_default_power(t, events);
            }
            self.log.push(t, StatusKind::Cc, cc1 as u16 | (cc2 as u16) << 8);
            events.set_attached(true);
            events.set_cc_reported(true);
        }
        if phy_events.rx_sop() {
            let mut objects = [0u32; MAX_OBJECTS];
            let header = self.driver.message(&mut objects);
            let count = (header.num_objects() as usize).min(MAX_OBJECTS);
            let protocol_events = self.protocol.handle_msg(header, &objects[..count]);
            self.log.push_message(t, StatusKind::MsgRx, header.0, &objects[..count]);
            events.set_msg_rx(true);
            if protocol_events.any() {
                self.handle_protocol_events(t, protocol_events, events)?;
            }
        }
        if phy_events.good_crc_sent() {
            // Hold the reply back past the source's retry window.
            self.delay_ms(2);
            if let Some(message) = self.protocol.respond() {
                self.transmit(t, message.header, &message.objects, events)?;
            }
        }
        Ok(())
    }

    fn handle_protocol_events(
        &mut self,
        t: u16,
        protocol_events: ProtocolEvents,
        events: &mut Events,
    ) -> Result<(), PhyError> {
        if protocol_events.src_cap() {
            self.wait_src_cap = false;
            self.get_src_cap_retry_count = 0;
            self.wait_ps_rdy = true;
            self.time_wait_ps_rdy = t;
            self.log.push(t, StatusKind::SrcCap, 0);
            events.set_src_cap_received(true);
        }
        if protocol_events.reject() && self.wait_ps_rdy {
            // A rejected PPS refresh drops us from the contract; the caller
            // decides what to do next.
            self.wait_ps_rdy = false;
            self.log.push(t, StatusKind::PowerReject, 0);
            events.set_power_rejected(true);
        }
        if protocol_events.ps_rdy() {
            self.wait_ps_rdy = false;
            let selected = self.protocol.selected_index();
            match self.protocol.power_info(selected) {
                Some(info) if info.kind == PdoKind::Augmented => {
                    // A PPS rail below 4 V would trip the PHY's VBUSOK
                    // threshold and read as a detach.
                    self.driver.set_vbus_sense(false)?;
                    if let Some(next) = self.pps_next.take() {
                        self.protocol.set_pps(next.voltage, next.current, false);
                        self.send_request = true;
                        self.log.push(t, StatusKind::PpsStartup, 0);
                        events.set_pps_startup(true);
                    } else {
                        self.time_pps_request = t;
                        self.power_ready(
                            PowerStatus::Pps,
                            self.protocol.pps_voltage(),
                            self.protocol.pps_current() as u16,
                        );
                        self.log.push(t, StatusKind::PowerReady, 0);
                        events.set_power_ready_pps(true);
                    }
                }
                Some(info) => {
                    self.driver.set_vbus_sense(true)?;
                    self.power_ready(PowerStatus::Typical, info.max_v, info.max_i);
                    self.log.push(t, StatusKind::PowerReady, 0);
                    events.set_power_ready(true);
                }
                None => {}
            }
        }
        Ok(())
    }

    fn transmit(
        &mut self,
        t: u16,
        header: Header,
        objects: &[u32],
        events: &mut Events,
    ) -> Result<(), PhyError> {
        self.log.push_message(t, StatusKind::MsgTx, header.0, objects);
        events.set_msg_tx(true);
        self.driver.transmit(header, objects)
    }

    fn set_default_power(&mut self, t: u16, events: &mut Events) {
        self.power_ready(
            PowerStatus::Typical,
            units::pd_voltage(5_000),
            units::pd_current(1_000),
        );
        self.log.push(t, StatusKind::PowerReady, 0);
        events.set_power_ready(true);
    }

    fn power_ready(&mut self, status: PowerStatus, voltage: u16, current: u16) {
        self.ready_voltage = voltage;
        self.ready_current = current;
        self.power_status = status;
        if status == PowerStatus::Pps {
            self.calculate_led_pps(voltage, current as u8);
        } else {
            self.calculate_led(voltage, current);
        }
        if self.led_enabled && !self.led_blink_enable {
            self.apply_led(true);
        }
    }

    fn calculate_led(&mut self, voltage: u16, current: u16) {
        const VOLTAGE_LEVELS: [u16; 4] = [180, 240, 300, 400]; // 9/12/15/20 V
        const CURRENT_LEVELS: [u16; 2] = [150, 300]; // 1.5/3.0 A
        self.led_auto_voltage = voltage_led_index(voltage, &VOLTAGE_LEVELS);
        self.led_auto_current = current_led_index(current, &CURRENT_LEVELS);
    }

    fn calculate_led_pps(&mut self, voltage: u16, current: u8) {
        const VOLTAGE_LEVELS: [u16; 4] = [450, 600, 750, 1000]; // 9/12/15/20 V
        const CURRENT_LEVELS: [u16; 2] = [30, 60]; // 1.5/3.0 A
        self.led_auto_voltage = voltage_led_index(voltage, &VOLTAGE_LEVELS);
        self.led_auto_current = current_led_index(current as u16, &CURRENT_LEVELS);
    }

    fn apply_led(&mut self, on: bool) {
        if on {
            self.io.set_voltage_led(self.led_auto_voltage);
            self.io.set_current_led(self.led_auto_current);
        } else {
            self.io.set_voltage_led(VoltageLed::Off);
            self.io.set_current_led(CurrentLed::Off);
        }
    }

    fn handle_led(&mut self, t: u16) {
        if self.led_blink_enable && elapsed(t, self.time_led_blink) > self.period_led_blink {
            self.time_led_blink = t;
            self.led_blink_on = !self.led_blink_on;
            let on = self.led_blink_on;
            self.apply_led(on);
        }
    }

    /// Render one pending status-log line into `buf`. Returns the number of
    /// bytes written; 0 once the log is drained. Multi-line records (object
    /// dumps, the capability listing) emit one line per call.
    pub fn readline(&mut self, buf: &mut [u8]) -> usize {
        let Some(entry) = self.log.front().copied() else {
            return 0;
        };
        let mut w = SliceWriter::new(buf);
        let mut done = true;
        match entry.kind {
            StatusKind::MsgTx | StatusKind::MsgRx => {
                if self.log_line == 0 {
                    let info = protocol::msg_info(Header(entry.msg_header));
                    let direction = if entry.kind == StatusKind::MsgTx { 'T' } else { 'R' };
                    let _ = write!(
                        w,
                        "{:04}: {}X {} id={} raw={:#06x}\n",
                        entry.time, direction, info.name, info.id, entry.msg_header
                    );
                    if entry.obj_count > 0 {
                        self.log_line = 1;
                        done = false;
                    }
                } else {
                    let object = self.log.pop_object().unwrap_or(0);
                    let _ = write!(
                        w,
                        "{:04}:   obj{}={:#010x}\n",
                        entry.time,
                        self.log_line - 1,
                        object
                    );
                    done = self.log_line >= entry.obj_count;
                    if !done {
                        self.log_line += 1;
                    }
                }
            }
            StatusKind::Device => {
                let _ = write!(w, "{:04}: sink initialised\n", entry.time);
            }
            StatusKind::Cc => {
                let cc1 = entry.msg_header as u8 & 0x3;
                let cc2 = (entry.msg_header >> 8) as u8 & 0x3;
                let level = ["USB", "1.5", "3.0"];
                let _ = match (cc1, cc2) {
                    (0, 0) => write!(w, "{:04}: attached vRa\n", entry.time),
                    (cc1, 0) => write!(
                        w,
                        "{:04}: attached CC1 vRd-{}\n",
                        entry.time,
                        level[cc1 as usize - 1]
                    ),
                    (0, cc2) => write!(
                        w,
                        "{:04}: attached CC2 vRd-{}\n",
                        entry.time,
                        level[cc2 as usize - 1]
                    ),
                    _ => write!(w, "{:04}: attached unknown\n", entry.time),
                };
            }
            StatusKind::SrcCap => {
                let index = self.log_line as usize;
                if let Some(info) = self.protocol.power_info(index) {
                    let _ = write!(w, "{:04}:   [{}] ", entry.time, index);
                    if info.min_v > 0 {
                        let _ = write_scaled(&mut w, info.min_v as u32 * 50, "V-");
                    }
                    let _ = write_scaled(&mut w, info.max_v as u32 * 50, "V ");
                    if info.max_i > 0 {
                        let _ = write_scaled(&mut w, info.max_i as u32 * 10, "A");
                    } else {
                        let _ = write_scaled(&mut w, info.max_p as u32 * 250, "W");
                    }
                    let suffix = match info.kind {
                        PdoKind::Fixed => "",
                        PdoKind::Battery => " BAT",
                        PdoKind::Variable => " VAR",
                        PdoKind::Augmented => " PPS",
                    };
                    let marker =
                        if index == self.protocol.selected_index() { " *" } else { "" };
                    let _ = write!(w, "{}{}\n", suffix, marker);
                    done = index + 1 >= self.protocol.pdo_count();
                    if !done {
                        self.log_line += 1;
                    }
                } else {
                    let _ = write!(w, "{:04}:   (no capabilities)\n", entry.time);
                }
            }
            StatusKind::PowerReady => match self.power_status {
                PowerStatus::Pps => {
                    let _ = write!(w, "{:04}: PPS ", entry.time);
                    let _ = write_scaled(&mut w, self.ready_voltage as u32 * 20, "V ");
                    let _ = write_scaled(&mut w, self.ready_current as u32 * 50, "A");
                    let _ = w.write_str(" supply ready\n");
                }
                _ => {
                    let _ = write!(w, "{:04}: ", entry.time);
                    let _ = write_scaled(&mut w, self.ready_voltage as u32 * 50, "V ");
                    let _ = write_scaled(&mut w, self.ready_current as u32 * 10, "A");
                    let _ = w.write_str(" supply ready\n");
                }
            },
            StatusKind::PpsStartup => {
                let _ = write!(w, "{:04}: PPS two-stage startup\n", entry.time);
            }
            StatusKind::PowerReject => {
                let _ = write!(w, "{:04}: request rejected\n", entry.time);
            }
            StatusKind::LoadSwitchOn => {
                let _ = write!(w, "{:04}: load switch on\n", entry.time);
            }
            StatusKind::LoadSwitchOff => {
                let _ = write!(w, "{:04}: load switch off\n", entry.time);
            }
        }
        if done {
            self.log_line = 0;
            self.log.pop_front();
        }
        w.len()
    }
}

/// Write a millivalue as "x.yyU".
fn write_scaled(w: &mut SliceWriter, millis: u32, unit: &str) -> core::fmt::Result {
    write!(w, "{}.{:02}{}", millis / 1000, (millis % 1000) / 10, unit)
}

fn voltage_led_index(voltage: u16, levels: &[u16; 4]) -> VoltageLed {
    const LEDS: [VoltageLed; 5] =
        [VoltageLed::V5, VoltageLed::V9, VoltageLed::V12, VoltageLed::V15, VoltageLed::V20];
    let index = levels.iter().take_while(|&&level| voltage >= level).count();
    LEDS[index]
}

fn current_led_index(current: u16, levels: &[u16; 2]) -> CurrentLed {
    const LEDS: [CurrentLed; 3] = [CurrentLed::Le1A5, CurrentLed::Le3A0, CurrentLed::Gt3A0];
    let index = levels.iter().take_while(|&&level| current >= level).count();
    LEDS[index]
}
