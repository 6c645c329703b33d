use {
    byteorder::{ByteOrder, LittleEndian},
    proc_bitfield::bitfield,
};

/// 2-bit type tag in bits 31..30 of every power data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PdoKind {
    Fixed = 0,
    Battery = 1,
    Variable = 2,
    Augmented = 3,
}

impl From<u8> for PdoKind {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0 => Self::Fixed,
            1 => Self::Battery,
            2 => Self::Variable,
            _ => Self::Augmented,
        }
    }
}

impl PdoKind {
    pub fn of(raw: u32) -> Self {
        ((raw >> 30) as u8).into()
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct FixedSupply(pub u32): Debug, FromRaw, IntoRaw {
        pub kind: u8 @ 30..=31,
        pub dual_role_power: bool @ 29,
        pub usb_suspend_supported: bool @ 28,
        pub unconstrained_power: bool @ 27,
        pub usb_communications_capable: bool @ 26,
        pub dual_role_data: bool @ 25,
        pub unchunked_extended_messages_supported: bool @ 24,
        pub epr_mode_capable: bool @ 23,
        pub peak_current: u8 @ 20..=21,
        /// Voltage in 50 mV units.
        pub voltage: u16 @ 10..=19,
        /// Maximum current in 10 mA units.
        pub max_current: u16 @ 0..=9,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Battery(pub u32): Debug, FromRaw, IntoRaw {
        pub kind: u8 @ 30..=31,
        /// Maximum voltage in 50 mV units.
        pub max_voltage: u16 @ 20..=29,
        /// Minimum voltage in 50 mV units.
        pub min_voltage: u16 @ 10..=19,
        /// Maximum allowable power in 250 mW units.
        pub max_power: u16 @ 0..=9,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct VariableSupply(pub u32): Debug, FromRaw, IntoRaw {
        pub kind: u8 @ 30..=31,
        /// Maximum voltage in 50 mV units.
        pub max_voltage: u16 @ 20..=29,
        /// Minimum voltage in 50 mV units.
        pub min_voltage: u16 @ 10..=19,
        /// Maximum current in 10 mA units.
        pub max_current: u16 @ 0..=9,
    }
}

bitfield! {
    /// SPR programmable power supply APDO. Note the wire scales differ from
    /// the other PDO types: 100 mV voltage steps and 50 mA current steps.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Pps(pub u32): Debug, FromRaw, IntoRaw {
        pub kind: u8 @ 30..=31,
        pub supply: u8 @ 28..=29,
        pub pps_power_limited: bool @ 27,
        /// Maximum voltage in 100 mV units.
        pub max_voltage: u8 @ 17..=24,
        /// Minimum voltage in 100 mV units.
        pub min_voltage: u8 @ 8..=15,
        /// Maximum current in 50 mA units. The field is 7 bits wide.
        pub max_current: u8 @ 0..=6,
    }
}

bitfield! {
    /// Sink fixed supply PDO, advertised in Sink_Capabilities.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct SinkFixedSupply(pub u32): Debug, FromRaw, IntoRaw {
        pub kind: u8 @ 30..=31,
        pub dual_role_power: bool @ 29,
        pub higher_capability: bool @ 28,
        pub unconstrained_power: bool @ 27,
        pub usb_communications_capable: bool @ 26,
        pub dual_role_data: bool @ 25,
        /// Voltage in 50 mV units.
        pub voltage: u16 @ 10..=19,
        /// Operational current in 10 mA units.
        pub operational_current: u16 @ 0..=9,
    }
}

bitfield! {
    /// Request data object for fixed and variable supplies.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct FixedVariableRequest(pub u32): Debug, FromRaw, IntoRaw {
        /// 1-based index into the source capabilities.
        pub object_position: u8 @ 28..=30,
        pub giveback_flag: bool @ 27,
        pub capability_mismatch: bool @ 26,
        pub usb_communications_capable: bool @ 25,
        pub no_usb_suspend: bool @ 24,
        pub unchunked_extended_messages_supported: bool @ 23,
        /// Operating current in 10 mA units.
        pub operating_current: u16 @ 10..=19,
        /// Maximum operating current in 10 mA units.
        pub max_operating_current: u16 @ 0..=9,
    }
}

bitfield! {
    /// Request data object for battery supplies; same shape as the fixed
    /// request with power fields in 250 mW units.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct BatteryRequest(pub u32): Debug, FromRaw, IntoRaw {
        pub object_position: u8 @ 28..=30,
        pub giveback_flag: bool @ 27,
        pub capability_mismatch: bool @ 26,
        pub usb_communications_capable: bool @ 25,
        pub no_usb_suspend: bool @ 24,
        pub unchunked_extended_messages_supported: bool @ 23,
        /// Operating power in 250 mW units.
        pub operating_power: u16 @ 10..=19,
        /// Maximum operating power in 250 mW units.
        pub max_operating_power: u16 @ 0..=9,
    }
}

bitfield! {
    /// Programmable request data object (PPS).
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PpsRequest(pub u32): Debug, FromRaw, IntoRaw {
        pub object_position: u8 @ 28..=30,
        pub capability_mismatch: bool @ 26,
        pub usb_communications_capable: bool @ 25,
        pub no_usb_suspend: bool @ 24,
        pub unchunked_extended_messages_supported: bool @ 23,
        /// Output voltage in 20 mV units.
        pub output_voltage: u16 @ 9..=19,
        /// Operating current in 50 mA units.
        pub operating_current: u8 @ 0..=6,
    }
}

impl PpsRequest {
    pub fn to_bytes(self, buf: &mut [u8]) {
        LittleEndian::write_u32(buf, self.0);
    }
}

impl FixedVariableRequest {
    pub fn to_bytes(self, buf: &mut [u8]) {
        LittleEndian::write_u32(buf, self.0);
    }
}

/// A power data object decoded onto the shared 50 mV / 10 mA / 250 mW scale
/// used by the evaluator. Augmented objects are rescaled from their native
/// 100 mV / 50 mA encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerInfo {
    pub kind: PdoKind,
    /// Minimum voltage in 50 mV units (0 for fixed supplies).
    pub min_v: u16,
    /// Maximum voltage in 50 mV units.
    pub max_v: u16,
    /// Maximum current in 10 mA units (0 for battery supplies).
    pub max_i: u16,
    /// Maximum power in 250 mW units (battery supplies only).
    pub max_p: u16,
}

impl PowerInfo {
    pub fn parse(raw: u32) -> Self {
        match PdoKind::of(raw) {
            PdoKind::Fixed => {
                let pdo = FixedSupply(raw);
                Self {
                    kind: PdoKind::Fixed,
                    min_v: 0,
                    max_v: pdo.voltage(),
                    max_i: pdo.max_current(),
                    max_p: 0,
                }
            }
            PdoKind::Battery => {
                let pdo = Battery(raw);
                Self {
                    kind: PdoKind::Battery,
                    min_v: pdo.min_voltage(),
                    max_v: pdo.max_voltage(),
                    max_i: 0,
                    max_p: pdo.max_power(),
                }
            }
            PdoKind::Variable => {
                let pdo = VariableSupply(raw);
                Self {
                    kind: PdoKind::Variable,
                    min_v: pdo.min_voltage(),
                    max_v: pdo.max_voltage(),
                    max_i: pdo.max_current(),
                    max_p: 0,
                }
            }
            PdoKind::Augmented => {
                let pdo = Pps(raw);
                Self {
                    kind: PdoKind::Augmented,
                    min_v: pdo.min_voltage() as u16 * 2,
                    max_v: pdo.max_voltage() as u16 * 2,
                    max_i: pdo.max_current() as u16 * 5,
                    max_p: 0,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_supply_decode() {
        // 5 V / 3 A: voltage 100 << 10, current 300.
        let raw = (100u32 << 10) | 300;
        let info = PowerInfo::parse(raw);
        assert_eq!(info.kind, PdoKind::Fixed);
        assert_eq!(info.min_v, 0);
        assert_eq!(info.max_v, 100);
        assert_eq!(info.max_i, 300);
        assert_eq!(info.max_p, 0);
    }

    #[test]
    fn battery_decode() {
        let raw = (1u32 << 30) | (240u32 << 20) | (100u32 << 10) | 180;
        let info = PowerInfo::parse(raw);
        assert_eq!(info.kind, PdoKind::Battery);
        assert_eq!(info.min_v, 100);
        assert_eq!(info.max_v, 240);
        assert_eq!(info.max_i, 0);
        assert_eq!(info.max_p, 180);
    }

    #[test]
    fn variable_decode() {
        let raw = (2u32 << 30) | (240u32 << 20) | (100u32 << 10) | 300;
        let info = PowerInfo::parse(raw);
        assert_eq!(info.kind, PdoKind::Variable);
        assert_eq!(info.min_v, 100);
        assert_eq!(info.max_v, 240);
        assert_eq!(info.max_i, 300);
    }

    #[test]
    fn augmented_decode_rescales() {
        // PPS 3.3-11 V / 3 A: min 33 * 100 mV, max 110 * 100 mV, 60 * 50 mA.
        let raw = (3u32 << 30) | (110u32 << 17) | (33u32 << 8) | 60;
        let info = PowerInfo::parse(raw);
        assert_eq!(info.kind, PdoKind::Augmented);
        assert_eq!(info.min_v, 66); // 3.3 V in 50 mV units
        assert_eq!(info.max_v, 220); // 11 V in 50 mV units
        assert_eq!(info.max_i, 300); // 3 A in 10 mA units
    }

    #[test]
    fn encode_decode_round_trip() {
        let fixed = FixedSupply(0)
            .with_voltage(180)
            .with_max_current(225)
            .with_usb_communications_capable(true);
        let info = PowerInfo::parse(fixed.0);
        assert_eq!((info.max_v, info.max_i), (180, 225));

        let pps = Pps(0)
            .with_kind(3)
            .with_min_voltage(33)
            .with_max_voltage(110)
            .with_max_current(50);
        assert_eq!(PdoKind::of(pps.0), PdoKind::Augmented);
        assert_eq!(Pps(pps.0).max_current(), 50);
    }

    #[test]
    fn pps_request_layout() {
        let req = PpsRequest(0)
            .with_object_position(3)
            .with_output_voltage(165)
            .with_operating_current(40)
            .with_usb_communications_capable(true);
        // Current occupies bits 0..=6, voltage bits 9..=19.
        assert_eq!(req.0 & 0x7f, 40);
        assert_eq!((req.0 >> 9) & 0x7ff, 165);
        assert_eq!((req.0 >> 28) & 0x7, 3);
    }

    #[test]
    fn pps_current_field_is_seven_bits() {
        let req = PpsRequest(0).with_operating_current(0x7f);
        assert_eq!(req.operating_current(), 0x7f);
        assert_eq!(req.output_voltage(), 0);
    }
}
