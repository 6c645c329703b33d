//! FUSB302 register map.
//!
//! Fifteen R/W control registers at 0x01..=0x0F, seven R/O status registers
//! at 0x3C..=0x42 and the TX/RX FIFO at 0x43. Bit positions follow the
//! datasheet and must stay exact. The driver works against a shadow of both
//! banks: typed setters mutate the shadow, `commit_control` bursts a shadow
//! range onto the bus, `refresh_status` pulls the whole status bank in one
//! transaction.

use {
    embedded_hal::blocking::i2c::{Write, WriteRead},
    proc_bitfield::bitfield,
    ufp_sink::PhyError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    DeviceId = 0x01,
    Switches0 = 0x02,
    Switches1 = 0x03,
    Measure = 0x04,
    Slice = 0x05,
    Control0 = 0x06,
    Control1 = 0x07,
    Control2 = 0x08,
    Control3 = 0x09,
    Mask1 = 0x0A,
    Power = 0x0B,
    Reset = 0x0C,
    OcPreg = 0x0D,
    MaskA = 0x0E,
    MaskB = 0x0F,
    Status0A = 0x3C,
    Status1A = 0x3D,
    InterruptA = 0x3E,
    InterruptB = 0x3F,
    Status0 = 0x40,
    Status1 = 0x41,
    Interrupt = 0x42,
    Fifo = 0x43,
}

impl Register {
    fn control_index(self) -> usize {
        self as usize - Register::DeviceId as usize
    }

    fn status_index(self) -> usize {
        self as usize - Register::Status0A as usize
    }
}

pub const CONTROL_BANK_SIZE: usize = 15;
pub const STATUS_BANK_SIZE: usize = 7;

/// Largest single bus transaction: register address plus a full TX FIFO
/// burst (4 ordered-set tokens, packsym, 2 header bytes, 7 objects, 4 tail
/// tokens).
const MAX_TRANSFER: usize = 1 + 39;

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct DeviceId(pub u8): Debug, FromRaw, IntoRaw {
        pub version_id: u8 [read_only] @ 4..=7,
        pub product_id: u8 [read_only] @ 2..=3,
        pub revision_id: u8 [read_only] @ 0..=1,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Switches0(pub u8): Debug, FromRaw, IntoRaw {
        /// Host pull-up current on CC2.
        pub pu_en2: bool @ 7,
        /// Host pull-up current on CC1.
        pub pu_en1: bool @ 6,
        /// VCONN current to CC2.
        pub vconn_cc2: bool @ 5,
        /// VCONN current to CC1.
        pub vconn_cc1: bool @ 4,
        /// Route CC2 to the measure block.
        pub meas_cc2: bool @ 3,
        /// Route CC1 to the measure block.
        pub meas_cc1: bool @ 2,
        /// Device pull-down on CC2.
        pub pdwn2: bool @ 1,
        /// Device pull-down on CC1.
        pub pdwn1: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Switches1(pub u8): Debug, FromRaw, IntoRaw {
        /// Power-role bit placed into transmitted GoodCRC headers.
        pub powerrole: bool @ 7,
        /// Spec-revision bits placed into transmitted GoodCRC headers.
        pub specrev: u8 @ 5..=6,
        /// Data-role bit placed into transmitted GoodCRC headers.
        pub datarole: bool @ 4,
        /// Automatically reply GoodCRC to packets with a valid CRC.
        pub auto_crc: bool @ 2,
        /// BMC transmit driver on CC2.
        pub txcc2: bool @ 1,
        /// BMC transmit driver on CC1.
        pub txcc1: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Measure(pub u8): Debug, FromRaw, IntoRaw {
        /// Measure VBUS through the MDAC instead of a CC pin.
        pub meas_vbus: bool @ 6,
        /// Comparator reference, 42 mV steps (420 mV with meas_vbus).
        pub mdac: u8 @ 0..=5,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Slice(pub u8): Debug, FromRaw, IntoRaw {
        pub sdac_hys: u8 @ 6..=7,
        /// BMC slicer comparator reference.
        pub sdac: u8 @ 0..=5,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Control0(pub u8): Debug, FromRaw, IntoRaw {
        /// Clear the TX FIFO.
        pub tx_flush: bool @ 6,
        /// Mask the INT_N pin.
        pub int_mask: bool @ 5,
        /// Advertised host pull-up current (sourcing only).
        pub host_cur: u8 @ 2..=3,
        /// Start transmit on CRC_CHK.
        pub auto_pre: bool @ 1,
        /// Manually start the transmitter.
        pub tx_start: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Control1(pub u8): Debug, FromRaw, IntoRaw {
        pub ensop2db: bool @ 6,
        pub ensop1db: bool @ 5,
        pub bist_mode2: bool @ 4,
        /// Clear the RX FIFO.
        pub rx_flush: bool @ 2,
        pub ensop2: bool @ 1,
        pub ensop1: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Control2(pub u8): Debug, FromRaw, IntoRaw {
        pub tog_save_pwr: u8 @ 6..=7,
        pub tog_rd_only: bool @ 5,
        pub wake_en: bool @ 3,
        /// DRP/SNK/SRC polling mode for the toggle block.
        pub mode: u8 @ 1..=2,
        pub toggle: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Control3(pub u8): Debug, FromRaw, IntoRaw {
        /// Transmit a hard-reset ordered set.
        pub send_hard_reset: bool @ 6,
        pub bist_tmode: bool @ 5,
        pub auto_hardreset: bool @ 4,
        pub auto_softreset: bool @ 3,
        /// Retry count for auto-retry.
        pub n_retries: u8 @ 1..=2,
        /// Retransmit automatically when no GoodCRC arrives.
        pub auto_retry: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Mask1(pub u8): Debug, FromRaw, IntoRaw {
        pub m_vbusok: bool @ 7,
        pub m_activity: bool @ 6,
        pub m_comp_chng: bool @ 5,
        pub m_crc_chk: bool @ 4,
        pub m_alert: bool @ 3,
        pub m_wake: bool @ 2,
        pub m_collision: bool @ 1,
        pub m_bc_lvl: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Power(pub u8): Debug, FromRaw, IntoRaw {
        /// Internal oscillator.
        pub int_osc: bool @ 3,
        /// Measure block.
        pub measure_block: bool @ 2,
        /// Receiver and current references for the measure block.
        pub receiver: bool @ 1,
        /// Bandgap and wake circuitry.
        pub bandgap: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Reset(pub u8): Debug, FromRaw, IntoRaw {
        /// Reset just the PD logic.
        pub pd_reset: bool @ 1,
        /// Full software reset to power-on defaults.
        pub sw_reset: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct OcPreg(pub u8): Debug, FromRaw, IntoRaw {
        pub ocp_range: bool @ 3,
        pub ocp_cur: u8 @ 0..=2,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct MaskA(pub u8): Debug, FromRaw, IntoRaw {
        pub m_ocp_temp: bool @ 7,
        pub m_togdone: bool @ 6,
        pub m_softfail: bool @ 5,
        pub m_retryfail: bool @ 4,
        pub m_hardsent: bool @ 3,
        pub m_txsent: bool @ 2,
        pub m_softrst: bool @ 1,
        pub m_hardrst: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct MaskB(pub u8): Debug, FromRaw, IntoRaw {
        pub m_gcrcsent: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Status0A(pub u8): Debug, FromRaw, IntoRaw {
        pub softfail: bool @ 5,
        pub retryfail: bool @ 4,
        pub power: u8 @ 2..=3,
        pub softrst: bool @ 1,
        /// Hard-reset ordered set received.
        pub hardrst: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Status1A(pub u8): Debug, FromRaw, IntoRaw {
        pub togss: u8 @ 3..=5,
        pub rxsop2db: bool @ 2,
        pub rxsop1db: bool @ 1,
        pub rxsop: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct InterruptA(pub u8): Debug, FromRaw, IntoRaw {
        pub i_ocp_temp: bool @ 7,
        pub i_togdone: bool @ 6,
        pub i_softfail: bool @ 5,
        pub i_retryfail: bool @ 4,
        pub i_hardsent: bool @ 3,
        pub i_txsent: bool @ 2,
        pub i_softrst: bool @ 1,
        pub i_hardrst: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct InterruptB(pub u8): Debug, FromRaw, IntoRaw {
        /// GoodCRC acknowledge transmitted by the auto-CRC block.
        pub i_gcrcsent: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Status0(pub u8): Debug, FromRaw, IntoRaw {
        /// VBUS above the 4 V comparator threshold.
        pub vbusok: bool @ 7,
        pub activity: bool @ 6,
        pub comp: bool @ 5,
        pub crc_chk: bool @ 4,
        pub alert: bool @ 3,
        pub wake: bool @ 2,
        /// Voltage band on the measured CC pin.
        pub bc_lvl: u8 @ 0..=1,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Status1(pub u8): Debug, FromRaw, IntoRaw {
        pub rxsop2: bool @ 7,
        pub rxsop1: bool @ 6,
        pub rx_empty: bool @ 5,
        pub rx_full: bool @ 4,
        pub tx_empty: bool @ 3,
        pub tx_full: bool @ 2,
        pub ovrtemp: bool @ 1,
        pub ocp: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Interrupt(pub u8): Debug, FromRaw, IntoRaw {
        pub i_vbusok: bool @ 7,
        pub i_activity: bool @ 6,
        pub i_comp_chng: bool @ 5,
        pub i_crc_chk: bool @ 4,
        pub i_alert: bool @ 3,
        pub i_wake: bool @ 2,
        pub i_collision: bool @ 1,
        pub i_bc_lvl: bool @ 0,
    }
}

macro_rules! control_register_accessors {
    ($(($reg:ident, $fn:ident)),* $(,)?) => {
        $(
            paste::paste! {
                pub fn $fn(&self) -> $reg {
                    $reg(self.control[Register::$reg.control_index()])
                }

                pub fn [<set_ $fn>](&mut self, value: $reg) {
                    self.control[Register::$reg.control_index()] = value.0;
                }
            }
        )*
    };
}

macro_rules! status_register_accessors {
    ($(($reg:ident, $fn:ident)),* $(,)?) => {
        $(
            pub fn $fn(&self) -> $reg {
                $reg(self.status[Register::$reg.status_index()])
            }
        )*
    };
}

/// Shadowed register bank over a blocking I²C bus.
pub struct Registers<I2C> {
    pub(crate) i2c: I2C,
    address: u8,
    control: [u8; CONTROL_BANK_SIZE],
    status: [u8; STATUS_BANK_SIZE],
}

impl<I2C, E> Registers<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            control: [0; CONTROL_BANK_SIZE],
            status: [0; STATUS_BANK_SIZE],
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    control_register_accessors!(
        (DeviceId, device_id),
        (Switches0, switches0),
        (Switches1, switches1),
        (Measure, measure),
        (Slice, slice),
        (Control0, control0),
        (Control1, control1),
        (Control2, control2),
        (Control3, control3),
        (Mask1, mask1),
        (Power, power),
        (Reset, reset),
        (OcPreg, ocpreg),
        (MaskA, mask_a),
        (MaskB, mask_b),
    );

    status_register_accessors!(
        (Status0A, status0a),
        (Status1A, status1a),
        (InterruptA, interrupta),
        (InterruptB, interruptb),
        (Status0, status0),
        (Status1, status1),
        (Interrupt, interrupt),
    );

    /// Raw register read; auto-increments across consecutive addresses.
    pub fn read_raw(&mut self, register: Register, buf: &mut [u8]) -> Result<(), PhyError> {
        self.i2c
            .write_read(self.address, &[register as u8], buf)
            .map_err(|_| PhyError::BusRead)
    }

    /// Raw register write; auto-increments across consecutive addresses.
    pub fn write_raw(&mut self, register: Register, data: &[u8]) -> Result<(), PhyError> {
        let mut buf = [0u8; MAX_TRANSFER];
        buf[0] = register as u8;
        buf[1..=data.len()].copy_from_slice(data);
        self.i2c
            .write(self.address, &buf[..data.len() + 1])
            .map_err(|_| PhyError::BusWrite)
    }

    /// Fetch `count` control registers starting at `register` into the
    /// shadow.
    pub fn fetch_control(&mut self, register: Register, count: usize) -> Result<(), PhyError> {
        let mut buf = [0u8; CONTROL_BANK_SIZE];
        self.read_raw(register, &mut buf[..count])?;
        let index = register.control_index();
        self.control[index..index + count].copy_from_slice(&buf[..count]);
        Ok(())
    }

    /// Write `count` shadow bytes starting at `register` to the chip in one
    /// burst.
    pub fn commit_control(&mut self, register: Register, count: usize) -> Result<(), PhyError> {
        let index = register.control_index();
        let mut buf = [0u8; CONTROL_BANK_SIZE];
        buf[..count].copy_from_slice(&self.control[index..index + count]);
        self.write_raw(register, &buf[..count])
    }

    /// Pull the whole status bank (Status0A..Interrupt) in one transaction.
    /// Reading the interrupt registers clears them on the chip.
    pub fn refresh_status(&mut self) -> Result<(), PhyError> {
        let mut buf = [0u8; STATUS_BANK_SIZE];
        self.read_raw(Register::Status0A, &mut buf)?;
        self.status = buf;
        Ok(())
    }

    /// Single Status0 read with shadow update, for tight CC polling loops.
    pub fn read_status0(&mut self) -> Result<Status0, PhyError> {
        let mut buf = [0u8; 1];
        self.read_raw(Register::Status0, &mut buf)?;
        self.status[Register::Status0.status_index()] = buf[0];
        Ok(Status0(buf[0]))
    }
}
