//! FUSB302 PHY driver for a USB PD sink.
//!
//! Drives the transceiver over blocking I²C: detached/attached lifecycle
//! with CC polarity discovery, SOP-framed FIFO transmit and receive, and the
//! interrupt scan surfaced through [`ufp_sink::sink::Driver`].
//!
//! Two chip quirks shape the stack above: the RX FIFO cannot hold unchunked
//! extended messages (the protocol engine only speaks chunked ones), and the
//! VBUSOK comparator sits at 4 V, so VBUS sensing is switched off for PPS
//! contracts below that.

#![cfg_attr(not(test), no_std)]

pub mod registers;

use {
    crate::registers::{
        Mask1, MaskA, MaskB, Measure, Power, Register, Registers, Reset, Switches0, Switches1,
    },
    embedded_hal::blocking::{
        delay::DelayMs,
        i2c::{Write, WriteRead},
    },
    ufp_sink::{
        header::Header,
        protocol::MAX_OBJECTS,
        sink::{Driver, PhyEvents},
        token::Token,
        CcLevel, PhyError,
    },
};

/// I²C address of the FUSB302B.
pub const DEVICE_ADDRESS: u8 = 0x22;

/// Spec-revision value for the chip's GoodCRC headers (revision 2.0).
const SWITCHES1_SPECREV: u8 = 0b01;

/// MDAC code 49: comparator reference near 1.6 V, well inside the vRd-3.0
/// band.
const MDAC_REFERENCE: u8 = 49;

/// Passes of five identical BC_LVL reads before a flapping CC line is
/// reported as busy.
const CC_SETTLE_PASSES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachState {
    Unattached,
    Attached,
}

pub struct Fusb302<I2C, DELAY> {
    registers: Registers<I2C>,
    delay: DELAY,
    state: AttachState,
    vbus_sense: bool,
    cc1: CcLevel,
    cc2: CcLevel,
    interrupt_a: u8,
    interrupt_b: u8,
    rx_header: u16,
    rx_buffer: [u8; 32],
}

impl<I2C, DELAY, E> Fusb302<I2C, DELAY>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    DELAY: DelayMs<u32>,
{
    pub fn new(i2c: I2C, delay: DELAY) -> Self {
        Self::with_address(i2c, delay, DEVICE_ADDRESS)
    }

    pub fn with_address(i2c: I2C, delay: DELAY, address: u8) -> Self {
        Self {
            registers: Registers::new(i2c, address),
            delay,
            state: AttachState::Unattached,
            vbus_sense: true,
            cc1: CcLevel::Ra,
            cc2: CcLevel::Ra,
            interrupt_a: 0,
            interrupt_b: 0,
            rx_header: 0,
            rx_buffer: [0; 32],
        }
    }

    pub fn release(self) -> (I2C, DELAY) {
        (self.registers.release(), self.delay)
    }

    /// Verify the device, reset it and bring it into the canonical sink
    /// configuration: both CC pins pulled down, measure block referenced at
    /// ~1.6 V, three automatic retries, the attach-machine interrupts
    /// unmasked and VBUS sensing enabled.
    pub fn init(&mut self) -> Result<(), PhyError> {
        if self.registers.address() == 0 {
            return Err(PhyError::Param);
        }

        let mut id = [0u8; 1];
        self.registers.read_raw(Register::DeviceId, &mut id)?;
        if id[0] & 0x80 == 0 {
            return Err(PhyError::BadDeviceId);
        }

        self.state = AttachState::Unattached;
        self.rx_header = 0;
        self.rx_buffer = [0; 32];
        self.interrupt_a = 0;
        self.interrupt_b = 0;

        // Restore power-on defaults, then pick up the whole control bank.
        self.registers.set_reset(Reset(0).with_sw_reset(true));
        self.registers.commit_control(Register::Reset, 1)?;
        self.registers.fetch_control(Register::DeviceId, 15)?;

        // Pull-downs on both CC pins, comparator reference for Rd levels.
        self.registers
            .set_switches0(Switches0(0).with_pdwn1(true).with_pdwn2(true));
        self.registers
            .set_switches1(Switches1(0).with_specrev(SWITCHES1_SPECREV));
        self.registers.set_measure(Measure(0).with_mdac(MDAC_REFERENCE));
        self.registers.commit_control(Register::Switches0, 3)?;

        let control3 = self.registers.control3().with_n_retries(3).with_auto_retry(true);
        self.registers.set_control3(control3);
        self.registers.commit_control(Register::Control3, 1)?;

        self.registers.set_mask1(
            Mask1(0xff)
                .with_m_vbusok(false)
                .with_m_activity(false)
                .with_m_collision(false)
                .with_m_alert(false)
                .with_m_crc_chk(false),
        );
        self.registers.commit_control(Register::Mask1, 1)?;

        self.registers.set_mask_a(
            MaskA(0xff)
                .with_m_retryfail(false)
                .with_m_hardsent(false)
                .with_m_txsent(false)
                .with_m_hardrst(false),
        );
        self.registers.commit_control(Register::MaskA, 1)?;
        self.registers.set_mask_b(MaskB(0xff).with_m_gcrcsent(false));
        self.registers.commit_control(Register::MaskB, 1)?;

        let control0 = self.registers.control0().with_int_mask(false);
        self.registers.set_control0(control0);
        self.registers.commit_control(Register::Control0, 1)?;

        // Bandgap, receiver and measure on; the oscillator waits for attach.
        self.registers.set_power(
            Power(0).with_bandgap(true).with_receiver(true).with_measure_block(true),
        );
        self.registers.commit_control(Register::Power, 1)?;

        self.vbus_sense = true;
        Ok(())
    }

    /// Version and revision from the device-id register fetched at init.
    pub fn device_version(&self) -> (u8, u8) {
        let id = self.registers.device_id();
        (id.version_id(), id.revision_id())
    }

    /// Reset the chip's PD logic (MessageID tracking, FIFOs).
    pub fn pd_reset(&mut self) -> Result<(), PhyError> {
        self.registers.write_raw(Register::Reset, &[Reset(0).with_pd_reset(true).0])
    }

    /// Enable or drop the CC pull-downs.
    pub fn pdwn_cc(&mut self, enable: bool) -> Result<(), PhyError> {
        let switches0 =
            if enable { Switches0(0).with_pdwn1(true).with_pdwn2(true) } else { Switches0(0) };
        self.registers.set_switches0(switches0);
        self.registers.commit_control(Register::Switches0, 1)
    }

    /// Gate detach detection on the VBUSOK comparator. Disabled for PPS
    /// contracts below the 4 V threshold.
    pub fn set_vbus_sense(&mut self, enable: bool) -> Result<(), PhyError> {
        if self.vbus_sense != enable {
            let mask1 = self.registers.mask1().with_m_vbusok(!enable);
            self.registers.set_mask1(mask1);
            self.registers.commit_control(Register::Mask1, 1)?;
            self.vbus_sense = enable;
        }
        Ok(())
    }

    /// CC levels latched during the last attach.
    pub fn cc_levels(&self) -> (CcLevel, CcLevel) {
        (self.cc1, self.cc2)
    }

    /// Live VBUSOK comparator reading.
    pub fn vbus_level(&mut self) -> Result<bool, PhyError> {
        Ok(self.registers.read_status0()?.vbusok())
    }

    /// Copy out the most recently drained SOP message.
    pub fn message(&mut self, objects: &mut [u32; MAX_OBJECTS]) -> Header {
        let header = Header(self.rx_header);
        let count = (header.num_objects() as usize).min(MAX_OBJECTS);
        for (index, slot) in objects.iter_mut().take(count).enumerate() {
            let bytes = &self.rx_buffer[index * 4..index * 4 + 4];
            *slot = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        header
    }

    /// Pack an SOP frame into the TX FIFO and start the transmitter in a
    /// single burst.
    pub fn transmit(&mut self, header: Header, objects: &[u32]) -> Result<(), PhyError> {
        let count = header.num_objects() as usize;
        let mut buf = [0u8; 39];
        buf[0] = Token::Sop1 as u8;
        buf[1] = Token::Sop1 as u8;
        buf[2] = Token::Sop1 as u8;
        buf[3] = Token::Sop2 as u8;
        buf[4] = Token::PackSym as u8 | (count * 4 + 2) as u8;
        header.to_bytes(&mut buf[5..7]);
        let mut n = 7;
        for &object in objects.iter().take(count) {
            buf[n..n + 4].copy_from_slice(&object.to_le_bytes());
            n += 4;
        }
        buf[n] = Token::JamCrc as u8;
        buf[n + 1] = Token::Eop as u8;
        buf[n + 2] = Token::TxOff as u8;
        buf[n + 3] = Token::TxOn as u8;
        n += 4;
        self.registers.write_raw(Register::Fifo, &buf[..n])?;
        self.delay.delay_ms(1);
        Ok(())
    }

    /// Send a hard-reset ordered set, then clear the chip's PD logic once
    /// the ordered set is on the wire.
    pub fn transmit_hard_reset(&mut self) -> Result<(), PhyError> {
        let control3 = self.registers.control3().with_send_hard_reset(true);
        self.registers.write_raw(Register::Control3, &[control3.0])?;
        self.delay.delay_ms(5);
        self.pd_reset()
    }

    /// Run the attach state machine and interrupt scan once.
    pub fn alert(&mut self) -> Result<PhyEvents, PhyError> {
        match self.state {
            AttachState::Unattached => self.alert_unattached(),
            AttachState::Attached => self.alert_attached(),
        }
    }

    fn alert_unattached(&mut self) -> Result<PhyEvents, PhyError> {
        let mut events = PhyEvents(0);
        if !self.registers.read_status0()?.vbusok() {
            return Ok(events);
        }

        // BMC needs the internal oscillator from here on.
        self.registers.set_power(
            Power(0)
                .with_bandgap(true)
                .with_receiver(true)
                .with_measure_block(true)
                .with_int_osc(true),
        );
        self.registers.commit_control(Register::Power, 1)?;
        self.delay.delay_ms(1);

        // Measure each CC pin in turn, pull-downs kept asserted.
        self.registers.set_switches0(
            Switches0(0).with_pdwn1(true).with_pdwn2(true).with_meas_cc1(true),
        );
        self.registers
            .set_switches1(Switches1(0).with_specrev(SWITCHES1_SPECREV));
        self.registers.set_measure(Measure(0).with_mdac(MDAC_REFERENCE));
        self.registers.commit_control(Register::Switches0, 3)?;
        self.delay.delay_ms(1);
        self.cc1 = self.read_cc_level()?;

        self.registers.set_switches0(
            Switches0(0).with_pdwn1(true).with_pdwn2(true).with_meas_cc2(true),
        );
        self.registers.commit_control(Register::Switches0, 1)?;
        self.delay.delay_ms(1);
        self.cc2 = self.read_cc_level()?;

        // Drop interrupts that latched while unattached.
        let mut pending = [0u8; 2];
        self.registers.read_raw(Register::InterruptA, &mut pending)?;
        self.interrupt_a = 0;
        self.interrupt_b = 0;

        // Fix TX polarity onto the live CC pin and let the chip answer
        // GoodCRC on its own.
        if self.cc1.is_present() {
            self.registers.set_switches0(
                Switches0(0).with_pdwn1(true).with_pdwn2(true).with_meas_cc1(true),
            );
            self.registers.set_switches1(
                Switches1(0)
                    .with_specrev(SWITCHES1_SPECREV)
                    .with_auto_crc(true)
                    .with_txcc1(true),
            );
        } else if self.cc2.is_present() {
            self.registers.set_switches0(
                Switches0(0).with_pdwn1(true).with_pdwn2(true).with_meas_cc2(true),
            );
            self.registers.set_switches1(
                Switches1(0)
                    .with_specrev(SWITCHES1_SPECREV)
                    .with_auto_crc(true)
                    .with_txcc2(true),
            );
        } else {
            self.registers
                .set_switches0(Switches0(0).with_pdwn1(true).with_pdwn2(true));
            self.registers
                .set_switches1(Switches1(0).with_specrev(SWITCHES1_SPECREV));
        }
        self.registers.commit_control(Register::Switches0, 2)?;

        self.state = AttachState::Attached;
        events.set_attached(true);
        Ok(events)
    }

    fn alert_attached(&mut self) -> Result<PhyEvents, PhyError> {
        let mut events = PhyEvents(0);
        self.registers.refresh_status()?;
        self.interrupt_a |= self.registers.interrupta().0;
        self.interrupt_b |= self.registers.interruptb().0;

        if self.vbus_sense && !self.registers.status0().vbusok() {
            // Back to pull-down-only monitoring.
            self.registers
                .set_switches0(Switches0(0).with_pdwn1(true).with_pdwn2(true));
            self.registers
                .set_switches1(Switches1(0).with_specrev(SWITCHES1_SPECREV));
            self.registers.set_measure(Measure(0).with_mdac(MDAC_REFERENCE));
            self.registers.commit_control(Register::Switches0, 3)?;

            self.registers.set_power(
                Power(0).with_bandgap(true).with_receiver(true).with_measure_block(true),
            );
            self.registers.commit_control(Register::Power, 1)?;

            self.state = AttachState::Unattached;
            events.set_detached(true);
            return Ok(events);
        }

        if self.registers.status0a().hardrst() {
            self.pd_reset()?;
            return Ok(events);
        }

        if self.interrupt_b & 0x01 != 0 {
            self.interrupt_b &= !0x01;
            events.set_good_crc_sent(true);
        }

        if !self.registers.status1().rx_empty() {
            if self.read_incoming_packet().is_ok() {
                events.set_rx_sop(true);
            } else {
                // Drop whatever is left and resynchronise.
                let control1 = self.registers.control1().with_rx_flush(true);
                let _ = self.registers.write_raw(Register::Control1, &[control1.0]);
            }
        }
        Ok(events)
    }

    /// A CC reading counts only when five consecutive BC_LVL samples agree;
    /// LFPS and BMC transitions flap the comparator otherwise.
    fn read_cc_level(&mut self) -> Result<CcLevel, PhyError> {
        for _ in 0..CC_SETTLE_PASSES {
            if let Some(level) = self.sample_cc_level()? {
                return Ok(level);
            }
            self.delay.delay_ms(1);
        }
        Err(PhyError::Busy)
    }

    fn sample_cc_level(&mut self) -> Result<Option<CcLevel>, PhyError> {
        let first = self.registers.read_status0()?.bc_lvl();
        for _ in 0..5 {
            if self.registers.read_status0()?.bc_lvl() != first {
                return Ok(None);
            }
        }
        Ok(Some(first.into()))
    }

    fn read_incoming_packet(&mut self) -> Result<(), PhyError> {
        // Token plus the two header bytes.
        let mut head = [0u8; 3];
        self.registers.read_raw(Register::Fifo, &mut head)?;
        self.rx_header = u16::from_le_bytes([head[1], head[2]]);

        // Payload plus the four CRC bytes.
        let count = ((self.rx_header >> 12) & 0x7) as usize;
        let len = count * 4 + 4;
        let mut buf = [0u8; 32];
        self.registers.read_raw(Register::Fifo, &mut buf[..len])?;
        self.rx_buffer[..len].copy_from_slice(&buf[..len]);
        Ok(())
    }
}

impl<I2C, DELAY, E> Driver for Fusb302<I2C, DELAY>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    DELAY: DelayMs<u32>,
{
    fn init(&mut self) -> Result<(), PhyError> {
        Fusb302::init(self)
    }

    fn alert(&mut self) -> Result<PhyEvents, PhyError> {
        Fusb302::alert(self)
    }

    fn cc_levels(&self) -> (CcLevel, CcLevel) {
        Fusb302::cc_levels(self)
    }

    fn message(&mut self, objects: &mut [u32; MAX_OBJECTS]) -> Header {
        Fusb302::message(self, objects)
    }

    fn transmit(&mut self, header: Header, objects: &[u32]) -> Result<(), PhyError> {
        Fusb302::transmit(self, header, objects)
    }

    fn transmit_hard_reset(&mut self) -> Result<(), PhyError> {
        Fusb302::transmit_hard_reset(self)
    }

    fn set_vbus_sense(&mut self, enable: bool) -> Result<(), PhyError> {
        Fusb302::set_vbus_sense(self, enable)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use ufp_sink::header::{DataMessageType, SpecificationRevision};

    const PDWN_BOTH: u8 = 0x03;
    const MEAS_CC1: u8 = 0x04;
    const MEAS_CC2: u8 = 0x08;
    const SPECREV0: u8 = 0x20;
    const AUTO_CRC: u8 = 0x04;
    const TXCC1: u8 = 0x01;

    struct MockBus {
        regs: [u8; 0x50],
        fifo_rx: VecDeque<u8>,
        fifo_tx: Vec<u8>,
        writes: Vec<(u8, Vec<u8>)>,
        switches0: u8,
        vbusok: bool,
        cc1_lvl: u8,
        cc2_lvl: u8,
        cc_flap: bool,
        flip: bool,
    }

    impl MockBus {
        fn new() -> Self {
            let mut regs = [0u8; 0x50];
            regs[Register::DeviceId as usize] = 0x91;
            regs[Register::Status1 as usize] = 0x20; // RX FIFO empty
            Self {
                regs,
                fifo_rx: VecDeque::new(),
                fifo_tx: Vec::new(),
                writes: Vec::new(),
                switches0: 0,
                vbusok: false,
                cc1_lvl: 0,
                cc2_lvl: 0,
                cc_flap: false,
                flip: false,
            }
        }

        fn reg_value(&mut self, reg: u8) -> u8 {
            if reg == Register::Status0 as u8 {
                let bc_lvl = if self.cc_flap {
                    self.flip = !self.flip;
                    if self.flip {
                        1
                    } else {
                        2
                    }
                } else if self.switches0 & MEAS_CC1 != 0 {
                    self.cc1_lvl
                } else if self.switches0 & MEAS_CC2 != 0 {
                    self.cc2_lvl
                } else {
                    0
                };
                ((self.vbusok as u8) << 7) | bc_lvl
            } else {
                self.regs[reg as usize]
            }
        }
    }

    impl Write for MockBus {
        type Error = ();

        fn write(&mut self, _addr: u8, bytes: &[u8]) -> Result<(), ()> {
            let reg = bytes[0];
            self.writes.push((reg, bytes[1..].to_vec()));
            if reg == Register::Fifo as u8 {
                self.fifo_tx.extend_from_slice(&bytes[1..]);
            } else {
                for (offset, &value) in bytes[1..].iter().enumerate() {
                    let address = reg as usize + offset;
                    self.regs[address] = value;
                    if address == Register::Switches0 as usize {
                        self.switches0 = value;
                    }
                }
            }
            Ok(())
        }
    }

    impl WriteRead for MockBus {
        type Error = ();

        fn write_read(&mut self, _addr: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), ()> {
            let reg = bytes[0];
            if reg == Register::Fifo as u8 {
                for slot in buffer.iter_mut() {
                    *slot = self.fifo_rx.pop_front().unwrap_or(0);
                }
            } else {
                for (offset, slot) in buffer.iter_mut().enumerate() {
                    *slot = self.reg_value(reg + offset as u8);
                }
            }
            Ok(())
        }
    }

    struct MockDelay {
        total_ms: u32,
    }

    impl DelayMs<u32> for MockDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += ms;
        }
    }

    fn phy() -> Fusb302<MockBus, MockDelay> {
        Fusb302::new(MockBus::new(), MockDelay { total_ms: 0 })
    }

    fn bus(phy: &mut Fusb302<MockBus, MockDelay>) -> &mut MockBus {
        &mut phy.registers.i2c
    }

    #[test]
    fn init_writes_canonical_configuration() {
        let mut phy = phy();
        phy.init().unwrap();

        let writes = &bus(&mut phy).writes;
        assert!(writes.contains(&(Register::Reset as u8, vec![0x01])));
        // Switches0/1 and Measure in one burst: pull-downs, spec rev 2.0,
        // MDAC 49.
        assert!(writes.contains(&(Register::Switches0 as u8, vec![PDWN_BOTH, SPECREV0, 49])));
        assert!(writes.contains(&(Register::Control3 as u8, vec![0x07])));
        assert!(writes.contains(&(Register::Mask1 as u8, vec![0x25])));
        assert!(writes.contains(&(Register::MaskA as u8, vec![0xe2])));
        assert!(writes.contains(&(Register::MaskB as u8, vec![0xfe])));
        assert!(writes.contains(&(Register::Power as u8, vec![0x07])));
        assert_eq!(phy.device_version(), (0x9, 0x1));
    }

    #[test]
    fn init_rejects_bad_device_id() {
        let mut phy = phy();
        bus(&mut phy).regs[Register::DeviceId as usize] = 0x01;
        assert_eq!(phy.init(), Err(PhyError::BadDeviceId));
    }

    #[test]
    fn zero_address_is_a_parameter_error() {
        let mut phy = Fusb302::with_address(MockBus::new(), MockDelay { total_ms: 0 }, 0);
        assert_eq!(phy.init(), Err(PhyError::Param));
    }

    #[test]
    fn attach_selects_cc1_polarity() {
        let mut phy = phy();
        phy.init().unwrap();

        {
            let bus = bus(&mut phy);
            bus.vbusok = true;
            bus.cc1_lvl = 3;
            bus.cc2_lvl = 0;
        }
        let events = phy.alert().unwrap();
        assert!(events.attached());
        assert_eq!(phy.cc_levels(), (CcLevel::Rd3_0, CcLevel::Ra));

        // Final switch configuration: measure CC1, transmit on CC1 with
        // auto-CRC.
        let bus = bus(&mut phy);
        let last = bus
            .writes
            .iter()
            .rev()
            .find(|(reg, _)| *reg == Register::Switches0 as u8)
            .unwrap();
        assert_eq!(last.1, vec![PDWN_BOTH | MEAS_CC1, SPECREV0 | AUTO_CRC | TXCC1]);
    }

    #[test]
    fn flapping_cc_line_reports_busy() {
        let mut phy = phy();
        phy.init().unwrap();
        {
            let bus = bus(&mut phy);
            bus.vbusok = true;
            bus.cc_flap = true;
        }
        assert_eq!(phy.alert(), Err(PhyError::Busy));
        // Still unattached; the next poll restarts the measurement.
        bus(&mut phy).cc_flap = false;
        bus(&mut phy).cc1_lvl = 2;
        let events = phy.alert().unwrap();
        assert!(events.attached());
    }

    #[test]
    fn detach_on_vbus_loss() {
        let mut phy = phy();
        phy.init().unwrap();
        {
            let bus = bus(&mut phy);
            bus.vbusok = true;
            bus.cc1_lvl = 2;
        }
        assert!(phy.alert().unwrap().attached());

        bus(&mut phy).vbusok = false;
        let events = phy.alert().unwrap();
        assert!(events.detached());

        // Switches reverted to pull-down-only, oscillator off.
        let bus = bus(&mut phy);
        assert!(bus.writes.contains(&(Register::Switches0 as u8, vec![PDWN_BOTH, SPECREV0, 49])));
        let last_power = bus
            .writes
            .iter()
            .rev()
            .find(|(reg, _)| *reg == Register::Power as u8)
            .unwrap();
        assert_eq!(last_power.1, vec![0x07]);
    }

    #[test]
    fn tx_frame_parses_back_to_the_message() {
        let mut phy = phy();
        phy.init().unwrap();

        let header = Header(0)
            .with_message_type_raw(DataMessageType::Request as u8)
            .with_num_objects(1)
            .with_message_id(3)
            .with_spec_revision(u8::from(SpecificationRevision::R3_0));
        let objects = [0x1234_5678u32];
        phy.transmit(header, &objects).unwrap();

        let frame = bus(&mut phy).fifo_tx.clone();
        assert_eq!(&frame[0..4], &[0x12, 0x12, 0x12, 0x13]);
        assert_eq!(frame[4], 0x80 | 6); // PACKSYM with 4*1+2 bytes
        let parsed_header = Header(u16::from_le_bytes([frame[5], frame[6]]));
        assert_eq!(parsed_header, header);
        let parsed_object =
            u32::from_le_bytes([frame[7], frame[8], frame[9], frame[10]]);
        assert_eq!(parsed_object, objects[0]);
        assert_eq!(&frame[11..15], &[0xff, 0x14, 0xfe, 0xa1]);
    }

    #[test]
    fn hard_reset_sequence() {
        let mut phy = phy();
        phy.init().unwrap();
        bus(&mut phy).writes.clear();

        phy.transmit_hard_reset().unwrap();
        let writes = bus(&mut phy).writes.clone();
        assert_eq!(writes[0], (Register::Control3 as u8, vec![0x47]));
        assert_eq!(writes[1], (Register::Reset as u8, vec![0x02]));
    }

    #[test]
    fn rx_packet_and_good_crc_events() {
        let mut phy = phy();
        phy.init().unwrap();
        {
            let bus = bus(&mut phy);
            bus.vbusok = true;
            bus.cc1_lvl = 3;
        }
        assert!(phy.alert().unwrap().attached());

        // Source capabilities: two objects, GoodCRC already acknowledged in
        // hardware.
        let header: u16 = (DataMessageType::SourceCapabilities as u16) | (2 << 12) | (1 << 6);
        {
            let bus = bus(&mut phy);
            bus.regs[Register::InterruptB as usize] = 0x01;
            bus.regs[Register::Status1 as usize] = 0x00; // RX FIFO not empty
            bus.fifo_rx.push_back(0xe0); // SOP token
            bus.fifo_rx.extend(header.to_le_bytes());
            bus.fifo_rx.extend(0x0001_912cu32.to_le_bytes());
            bus.fifo_rx.extend(0x0006_40e1u32.to_le_bytes());
            bus.fifo_rx.extend([0u8; 4]); // CRC
        }

        let events = phy.alert().unwrap();
        assert!(events.rx_sop());
        assert!(events.good_crc_sent());

        let mut objects = [0u32; MAX_OBJECTS];
        let parsed = phy.message(&mut objects);
        assert_eq!(parsed.0, header);
        assert_eq!(objects[0], 0x0001_912c);
        assert_eq!(objects[1], 0x0006_40e1);
    }

    #[test]
    fn vbus_sense_toggles_the_vbusok_mask() {
        let mut phy = phy();
        phy.init().unwrap();
        bus(&mut phy).writes.clear();

        phy.set_vbus_sense(false).unwrap();
        phy.set_vbus_sense(false).unwrap(); // no-op, already disabled
        phy.set_vbus_sense(true).unwrap();

        let writes = bus(&mut phy).writes.clone();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], (Register::Mask1 as u8, vec![0xa5]));
        assert_eq!(writes[1], (Register::Mask1 as u8, vec![0x25]));
    }

    #[test]
    fn vbus_level_reads_status0() {
        let mut phy = phy();
        phy.init().unwrap();
        bus(&mut phy).vbusok = true;
        assert_eq!(phy.vbus_level(), Ok(true));
        bus(&mut phy).vbusok = false;
        assert_eq!(phy.vbus_level(), Ok(false));
    }
}
