#![cfg_attr(not(test), no_std)]

pub mod header;
pub mod log;
pub mod pdo;
pub mod protocol;
pub mod sink;
pub mod timers;
pub mod token;

pub type Instant = fugit::Instant<u64, 1, 1000>;
pub type Duration = fugit::Duration<u64, 1, 1000>;

/// Errors surfaced by a PD PHY.
///
/// Bus errors are propagated verbatim from the register layer. `Busy` is a
/// transient CC-level flap; the driver retries it internally and only
/// surfaces it once the retry budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhyError {
    /// Invalid construction parameter (e.g. zero bus address).
    Param,
    /// Register read failed on the bus.
    BusRead,
    /// Register write failed on the bus.
    BusWrite,
    /// Device identification register did not match.
    BadDeviceId,
    /// CC level did not settle within the retry budget.
    Busy,
}

/// Voltage band measured on a CC pin (the PHY's 2-bit BC_LVL reading).
///
/// Levels above `RdUsb` advertise a USB PD capable source (1.5 A or 3.0 A
/// at 5 V).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcLevel {
    /// < 200 mV: vRa or nothing attached.
    Ra = 0,
    /// 200..660 mV: vRd-USB (default USB current only).
    RdUsb = 1,
    /// 660 mV..1.23 V: vRd-1.5.
    Rd1_5 = 2,
    /// > 1.23 V: vRd-3.0.
    Rd3_0 = 3,
}

impl From<u8> for CcLevel {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0 => Self::Ra,
            1 => Self::RdUsb,
            2 => Self::Rd1_5,
            _ => Self::Rd3_0,
        }
    }
}

impl CcLevel {
    /// A sink termination is being driven on this pin.
    pub fn is_present(self) -> bool {
        self != Self::Ra
    }

    /// The advertised current is above default USB, i.e. the source talks PD.
    pub fn supports_pd(self) -> bool {
        self > Self::RdUsb
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerRole {
    Source,
    Sink,
}

impl From<bool> for PowerRole {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Sink,
            true => Self::Source,
        }
    }
}

impl From<PowerRole> for bool {
    fn from(role: PowerRole) -> bool {
        match role {
            PowerRole::Sink => false,
            PowerRole::Source => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataRole {
    Ufp,
    Dfp,
}

impl From<bool> for DataRole {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Ufp,
            true => Self::Dfp,
        }
    }
}

impl From<DataRole> for bool {
    fn from(role: DataRole) -> bool {
        match role {
            DataRole::Ufp => false,
            DataRole::Dfp => true,
        }
    }
}

/// Conversions from millivolts/milliamps to the wire scales used throughout
/// the stack. Fixed/variable/battery contracts use 50 mV and 10 mA units;
/// PPS requests use 20 mV and 50 mA units. Do not mix them up.
pub mod units {
    /// Voltage in 50 mV units (fixed/variable/battery PDOs).
    pub const fn pd_voltage(millivolts: u32) -> u16 {
        (millivolts / 50) as u16
    }

    /// Current in 10 mA units (fixed/variable PDOs).
    pub const fn pd_current(milliamps: u32) -> u16 {
        (milliamps / 10) as u16
    }

    /// Voltage in 20 mV units (programmable requests).
    pub const fn pps_voltage(millivolts: u32) -> u16 {
        (millivolts / 20) as u16
    }

    /// Current in 50 mA units (programmable requests).
    pub const fn pps_current(milliamps: u32) -> u8 {
        (milliamps / 50) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::units::*;
    use super::CcLevel;

    #[test]
    fn unit_scales() {
        assert_eq!(pd_voltage(5_000), 100);
        assert_eq!(pd_voltage(20_000), 400);
        assert_eq!(pd_current(1_000), 100);
        assert_eq!(pd_current(2_250), 225);
        assert_eq!(pps_voltage(3_300), 165);
        assert_eq!(pps_voltage(5_000), 250);
        assert_eq!(pps_current(2_000), 40);
    }

    #[test]
    fn cc_levels() {
        assert!(!CcLevel::Ra.is_present());
        assert!(CcLevel::RdUsb.is_present());
        assert!(!CcLevel::RdUsb.supports_pd());
        assert!(CcLevel::Rd1_5.supports_pd());
        assert!(CcLevel::Rd3_0.supports_pd());
        assert_eq!(CcLevel::from(2), CcLevel::Rd1_5);
    }
}
