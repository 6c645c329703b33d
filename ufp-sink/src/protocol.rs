//! PD protocol engine: message dispatch, request synthesis and PDO
//! selection.
//!
//! Received messages index into one of three constant dispatch tables
//! (control, data, extended) by message type. Each row names the message and
//! carries an optional handler (runs on reception) and an optional responder
//! (runs when the PHY reports that its GoodCRC for the message went out).
//! Out-of-range types clamp onto the tail reserved row, which answers
//! Not_Supported as PD 3.0 requires.

use {
    crate::{
        header::{
            ControlMessageType, DataMessageType, ExtendedHeader, ExtendedMessageType, Header,
            SpecificationRevision,
        },
        pdo::{
            BatteryRequest, FixedVariableRequest, PdoKind, PowerInfo, PpsRequest, SinkFixedSupply,
        },
        DataRole, PowerRole,
    },
    byteorder::{ByteOrder, LittleEndian},
    heapless::Vec,
    proc_bitfield::bitfield,
};

/// Sources advertise at most seven power data objects.
pub const MAX_OBJECTS: usize = 7;

bitfield! {
    /// Events emitted towards the policy engine. Protocol conditions are
    /// events, never error returns.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Events(pub u8): Debug, FromRaw, IntoRaw {
        pub pps_status: bool @ 4,
        pub reject: bool @ 3,
        pub accept: bool @ 2,
        pub ps_rdy: bool @ 1,
        pub src_cap: bool @ 0,
    }
}

impl Events {
    pub fn any(self) -> bool {
        self.0 != 0
    }
}

/// Power selection policy applied to advertised source capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerOption {
    Max5V = 0,
    Max9V = 1,
    Max12V = 2,
    Max15V = 3,
    Max20V = 4,
    MaxVoltage = 5,
    MaxCurrent = 6,
    MaxPower = 7,
}

struct PowerOptionSetting {
    limit: u16,
    use_voltage: bool,
    use_current: bool,
}

/// Limits are compared against a reduced product of `max_v >> 2` and
/// `max_i >> 2` so the evaluation stays within an 8x8 multiply on small
/// targets.
const POWER_OPTION_SETTINGS: [PowerOptionSetting; 8] = [
    PowerOptionSetting { limit: 25, use_voltage: true, use_current: false }, // Max5V
    PowerOptionSetting { limit: 45, use_voltage: true, use_current: false }, // Max9V
    PowerOptionSetting { limit: 60, use_voltage: true, use_current: false }, // Max12V
    PowerOptionSetting { limit: 75, use_voltage: true, use_current: false }, // Max15V
    PowerOptionSetting { limit: 100, use_voltage: true, use_current: false }, // Max20V
    PowerOptionSetting { limit: 100, use_voltage: true, use_current: false }, // MaxVoltage
    PowerOptionSetting { limit: 125, use_voltage: false, use_current: true }, // MaxCurrent
    PowerOptionSetting { limit: 12500, use_voltage: true, use_current: true }, // MaxPower
];

/// Flags reported by the source in a PPS status data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PresentTemperatureFlag {
    NotSupported = 0,
    Normal = 1,
    Warning = 2,
    OverTemperature = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingModeFlag {
    VoltageMode,
    CurrentLimitMode,
}

/// Decoded PPS status data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PpsStatus {
    /// Output voltage in 20 mV units; 0xFFFF when not supported.
    pub output_voltage: u16,
    /// Output current in 50 mA units; 0xFF when not supported.
    pub output_current: u8,
    pub temperature: PresentTemperatureFlag,
    pub mode: OperatingModeFlag,
}

/// Metadata about a message header, mainly for the status log.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MsgInfo {
    pub name: &'static str,
    pub id: u8,
    pub spec_rev: u8,
    pub num_objects: u8,
    pub extended: bool,
}

/// An outgoing message synthesised by the engine.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    pub header: Header,
    pub objects: Vec<u32, MAX_OBJECTS>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    GoodCrc,
    Accept,
    Reject,
    PsRdy,
    SoftReset,
    SourceCapabilities,
    Bist,
    Alert,
    VendorDefined,
    PpsStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Responder {
    Accept,
    Reject,
    NotSupported,
    SinkCapabilities,
    SinkCapabilitiesExtended,
    Request,
}

struct MsgRow {
    name: &'static str,
    handler: Option<Handler>,
    responder: Option<Responder>,
}

const fn row(
    name: &'static str,
    handler: Option<Handler>,
    responder: Option<Responder>,
) -> MsgRow {
    MsgRow { name, handler, responder }
}

static CTRL_MSG_TABLE: [MsgRow; 26] = [
    row("[CONTROL 0]", None, Some(Responder::NotSupported)),
    row("GoodCRC", Some(Handler::GoodCrc), None),
    row("GotoMin", None, Some(Responder::NotSupported)),
    row("Accept", Some(Handler::Accept), None),
    row("Reject", Some(Handler::Reject), None),
    row("Ping", None, Some(Responder::NotSupported)),
    row("PS_RDY", Some(Handler::PsRdy), None),
    row("Get_Src_Cap", None, Some(Responder::NotSupported)),
    row("Get_Sink_Cap", None, Some(Responder::SinkCapabilities)),
    row("DR_Swap", None, Some(Responder::Reject)),
    row("PR_Swap", None, Some(Responder::Reject)),
    row("VCONN_Swap", None, Some(Responder::Reject)),
    row("Wait", None, None),
    row("Soft_Reset", Some(Handler::SoftReset), Some(Responder::Accept)),
    row("Data_Reset", None, Some(Responder::NotSupported)),
    row("Data_Reset_Complete", None, None),
    row("Not_Supported", None, None),
    row("Get_Src_Cap_Ext", None, Some(Responder::NotSupported)),
    row("Get_Status", None, Some(Responder::NotSupported)),
    row("FR_Swap", None, Some(Responder::NotSupported)),
    row("Get_PPS_Status", None, Some(Responder::NotSupported)),
    row("Get_Country_Codes", None, Some(Responder::NotSupported)),
    row("Get_Sink_Cap_Ext", None, Some(Responder::SinkCapabilitiesExtended)),
    row("Get_Source_Info", None, Some(Responder::NotSupported)),
    row("Get_Revision", None, Some(Responder::NotSupported)),
    row("[CONTROL 25]", None, Some(Responder::NotSupported)),
];

static DATA_MSG_TABLE: [MsgRow; 16] = [
    row("[DATA 0]", None, Some(Responder::NotSupported)),
    row("Src_Cap", Some(Handler::SourceCapabilities), Some(Responder::Request)),
    row("Request", None, Some(Responder::NotSupported)),
    row("BIST", Some(Handler::Bist), None),
    row("Sink_Cap", None, Some(Responder::NotSupported)),
    row("Battery_Status", None, Some(Responder::NotSupported)),
    row("Alert", Some(Handler::Alert), None),
    row("Get_Country_Info", None, Some(Responder::NotSupported)),
    row("Enter_USB", None, Some(Responder::NotSupported)),
    row("EPR_Request", None, Some(Responder::NotSupported)),
    row("EPR_Mode", None, Some(Responder::NotSupported)),
    row("Source_Info", None, Some(Responder::NotSupported)),
    row("Revision", None, Some(Responder::NotSupported)),
    row("[DATA 13]", None, Some(Responder::NotSupported)),
    row("[DATA 14]", None, Some(Responder::NotSupported)),
    row("VDM", Some(Handler::VendorDefined), None),
];

static EXT_MSG_TABLE: [MsgRow; 16] = [
    row("[EXT 0]", None, Some(Responder::NotSupported)),
    row("Src_Cap_Ext", None, Some(Responder::NotSupported)),
    row("Status", None, Some(Responder::NotSupported)),
    row("Get_Battery_Cap", None, Some(Responder::NotSupported)),
    row("Get_Battery_Status", None, Some(Responder::NotSupported)),
    row("Battery_Cap", None, Some(Responder::NotSupported)),
    row("Get_Mfr_Info", None, Some(Responder::NotSupported)),
    row("Mfr_Info", None, Some(Responder::NotSupported)),
    row("Security_Request", None, Some(Responder::NotSupported)),
    row("Security_Response", None, Some(Responder::NotSupported)),
    row("FW_Update_Request", None, Some(Responder::NotSupported)),
    row("FW_Update_Response", None, Some(Responder::NotSupported)),
    row("PPS_Status", Some(Handler::PpsStatus), None),
    row("Country_Info", None, Some(Responder::NotSupported)),
    row("Country_Codes", None, Some(Responder::NotSupported)),
    row("Sink_Cap_Ext", None, Some(Responder::SinkCapabilitiesExtended)),
];

fn lookup_row(header: Header) -> &'static MsgRow {
    let table: &'static [MsgRow] = if header.extended() {
        &EXT_MSG_TABLE
    } else if header.num_objects() > 0 {
        &DATA_MSG_TABLE
    } else {
        &CTRL_MSG_TABLE
    };
    let index = header.message_type_raw() as usize;
    &table[index.min(table.len() - 1)]
}

/// Describe a header for logging purposes.
pub fn msg_info(header: Header) -> MsgInfo {
    let row = lookup_row(header);
    MsgInfo {
        name: row.name,
        id: header.message_id(),
        spec_rev: (header.0 >> 6) as u8 & 0x3,
        num_objects: header.num_objects(),
        extended: header.extended(),
    }
}

/// The protocol engine.
///
/// Owns the MessageID counter, the stored source capabilities and the
/// configured power selection. It is driven entirely by the policy engine:
/// `handle_msg` for every received SOP message, `respond` after the PHY
/// confirms its GoodCRC went out, and the `create_*` constructors for
/// unsolicited transmissions.
pub struct Protocol {
    msg_state: &'static MsgRow,
    tx_header: u16,
    rx_header: u16,
    message_id: u8,
    power_option: PowerOption,
    pdos: Vec<u32, MAX_OBJECTS>,
    selected: usize,
    pps_voltage: u16,
    pps_current: u8,
    pps_status_data: [u8; 4],
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol {
    pub fn new() -> Self {
        Self {
            msg_state: &CTRL_MSG_TABLE[0],
            tx_header: 0,
            rx_header: 0,
            message_id: 0,
            power_option: PowerOption::Max5V,
            pdos: Vec::new(),
            selected: 0,
            pps_voltage: 0,
            pps_current: 0,
            pps_status_data: [0; 4],
        }
    }

    /// Zero the MessageID counter and rebind the dispatch state to the
    /// control sentinel row. Runs on soft reset, hard reset and detach.
    pub fn reset(&mut self) {
        self.msg_state = &CTRL_MSG_TABLE[0];
        self.message_id = 0;
    }

    /// Dispatch a received message to its handler.
    pub fn handle_msg(&mut self, header: Header, objects: &[u32]) -> Events {
        let mut events = Events(0);
        self.rx_header = header.0;
        self.msg_state = lookup_row(header);
        if let Some(handler) = self.msg_state.handler {
            self.run_handler(handler, header, objects, &mut events);
        }
        events
    }

    /// Advance the MessageID counter. Called from the GoodCRC handler, or
    /// directly by the policy engine on PHYs that report the acknowledge as
    /// a hardware event instead of a decoded message.
    pub fn handle_good_crc(&mut self) {
        self.message_id = (self.message_id + 1) & 0x7;
    }

    fn run_handler(
        &mut self,
        handler: Handler,
        header: Header,
        objects: &[u32],
        events: &mut Events,
    ) {
        match handler {
            Handler::GoodCrc => self.handle_good_crc(),
            Handler::Accept => events.set_accept(true),
            Handler::Reject => events.set_reject(true),
            Handler::PsRdy => events.set_ps_rdy(true),
            Handler::SoftReset => self.message_id = 0,
            Handler::SourceCapabilities => {
                self.pdos.clear();
                for &obj in objects.iter().take(header.num_objects() as usize) {
                    let _ = self.pdos.push(obj);
                }
                self.evaluate_src_cap();
                events.set_src_cap(true);
            }
            // BIST, Alert and VDM are acknowledged but not interpreted.
            Handler::Bist | Handler::Alert | Handler::VendorDefined => {}
            Handler::PpsStatus => {
                // The status data block sits behind the 2-byte extended
                // header in the chunked payload.
                let mut bytes = [0u8; 8];
                for (i, &obj) in objects.iter().take(2).enumerate() {
                    LittleEndian::write_u32(&mut bytes[i * 4..i * 4 + 4], obj);
                }
                self.pps_status_data.copy_from_slice(&bytes[2..6]);
                events.set_pps_status(true);
            }
        }
    }

    /// Synthesise the reply for the last received message, if its dispatch
    /// row has one.
    pub fn respond(&mut self) -> Option<Message> {
        match self.msg_state.responder? {
            Responder::Accept => Some(self.control_message(ControlMessageType::Accept)),
            Responder::Reject => Some(self.control_message(ControlMessageType::Reject)),
            Responder::NotSupported => {
                Some(self.control_message(ControlMessageType::NotSupported))
            }
            Responder::SinkCapabilities => Some(self.sink_capabilities_message()),
            Responder::SinkCapabilitiesExtended => Some(self.sink_cap_extended_message()),
            Responder::Request => self.create_request(),
        }
    }

    pub fn create_get_src_cap(&mut self) -> Header {
        self.generate_header(ControlMessageType::GetSourceCap as u8, 0, false)
    }

    pub fn create_get_pps_status(&mut self) -> Header {
        self.generate_header(ControlMessageType::GetPpsStatus as u8, 0, false)
    }

    /// Build a Request for the currently selected PDO. Returns `None` while
    /// no source capabilities are stored.
    pub fn create_request(&mut self) -> Option<Message> {
        let info = self.power_info(self.selected)?;
        let position = self.selected as u8 + 1;
        let object = match info.kind {
            PdoKind::Fixed | PdoKind::Variable => FixedVariableRequest(0)
                .with_object_position(position)
                .with_operating_current(info.max_i)
                .with_max_operating_current(info.max_i)
                .with_usb_communications_capable(true)
                .0,
            PdoKind::Battery => BatteryRequest(0)
                .with_object_position(position)
                .with_operating_power(info.max_p)
                .with_max_operating_power(info.max_p)
                .with_usb_communications_capable(true)
                .0,
            // The unchunked-extended bit stays clear for PD 2.0 era PHYs.
            PdoKind::Augmented => PpsRequest(0)
                .with_object_position(position)
                .with_output_voltage(self.pps_voltage)
                .with_operating_current(self.pps_current)
                .with_usb_communications_capable(true)
                .0,
        };
        let header = self.generate_header(DataMessageType::Request as u8, 1, false);
        let mut objects = Vec::new();
        let _ = objects.push(object);
        Some(Message { header, objects })
    }

    fn control_message(&mut self, message_type: ControlMessageType) -> Message {
        let header = self.generate_header(message_type as u8, 0, false);
        Message { header, objects: Vec::new() }
    }

    fn sink_capabilities_message(&mut self) -> Message {
        // Single fixed PDO: 5 V / 1 A, USB communications, higher capability.
        let pdo = SinkFixedSupply(0)
            .with_kind(PdoKind::Fixed as u8)
            .with_voltage(100)
            .with_operational_current(100)
            .with_usb_communications_capable(true)
            .with_higher_capability(true);
        let header = self.generate_header(DataMessageType::SinkCapabilities as u8, 1, false);
        let mut objects = Vec::new();
        let _ = objects.push(pdo.0);
        Message { header, objects }
    }

    fn sink_cap_extended_message(&mut self) -> Message {
        const SKEDB_SIZE: u16 = 21;
        let mut bytes = [0u8; 24];
        let ext = ExtendedHeader(0).with_chunked(true).with_data_size(SKEDB_SIZE);
        LittleEndian::write_u16(&mut bytes[0..2], ext.0);
        bytes[2 + 10] = 1; // SKEDB version
        bytes[2 + 17] = 0x03; // sink modes: PPS charger, VBUS powered
        bytes[2 + 18] = 5; // minimum PDP, W
        bytes[2 + 19] = 5; // operational PDP, W
        bytes[2 + 20] = 100; // maximum PDP, W
        let mut objects = Vec::new();
        for chunk in bytes.chunks_exact(4) {
            let _ = objects.push(LittleEndian::read_u32(chunk));
        }
        let header =
            self.generate_header(ExtendedMessageType::SinkCapabilitiesExtended as u8, 6, true);
        Message { header, objects }
    }

    fn generate_header(&mut self, message_type: u8, num_objects: u8, extended: bool) -> Header {
        let header = Header(0)
            .with_message_type_raw(message_type)
            .with_spec_revision(u8::from(SpecificationRevision::R3_0))
            .with_message_id(self.message_id)
            .with_num_objects(num_objects)
            .with_extended(extended)
            .with_port_power_role(PowerRole::Sink)
            .with_port_data_role(DataRole::Ufp);
        self.tx_header = header.0;
        header
    }

    /// Pick a PDO under the configured power option. Augmented objects only
    /// qualify through the PPS setting; everything else runs through the
    /// reduced-product scan, keeping the highest index under the limit.
    /// Falls back to index 0, the mandatory vSafe5V fixed supply.
    fn evaluate_src_cap(&mut self) {
        if let Some(index) = self.find_pps(self.pps_voltage, self.pps_current) {
            self.selected = index;
            return;
        }
        let mut selected = 0;
        let setting = &POWER_OPTION_SETTINGS[self.power_option as usize];
        for index in 0..self.pdos.len() {
            let Some(info) = self.power_info(index) else {
                break;
            };
            if info.kind == PdoKind::Augmented {
                continue;
            }
            let v = if setting.use_voltage { (info.max_v >> 2) as u8 } else { 1 };
            let i = if setting.use_current { (info.max_i >> 2) as u8 } else { 1 };
            let power = v as u16 * i as u16;
            if power <= setting.limit {
                selected = index;
            }
        }
        self.selected = selected;
    }

    fn find_pps(&self, voltage: u16, current: u8) -> Option<usize> {
        if voltage == 0 {
            return None;
        }
        let v = pps_voltage_in_pd_units(voltage);
        let i = pps_current_in_pd_units(current);
        (0..self.pdos.len()).find(|&index| {
            self.power_info(index).map_or(false, |info| {
                info.kind == PdoKind::Augmented
                    && info.min_v <= v
                    && v <= info.max_v
                    && i <= info.max_i
            })
        })
    }

    /// Decode the PDO at `index` onto the shared 50 mV / 10 mA scale.
    pub fn power_info(&self, index: usize) -> Option<PowerInfo> {
        self.pdos.get(index).map(|&raw| PowerInfo::parse(raw))
    }

    /// Returns true when the selection changed and a new Request should go
    /// out.
    pub fn set_power_option(&mut self, option: PowerOption) -> bool {
        self.power_option = option;
        if !self.pdos.is_empty() {
            self.evaluate_src_cap();
            return true;
        }
        false
    }

    /// Force selection of a specific PDO index. Returns true when a new
    /// Request should go out.
    pub fn select_power(&mut self, index: usize) -> bool {
        if index < self.pdos.len() {
            self.selected = index;
            return true;
        }
        false
    }

    /// Configure the PPS operating point (20 mV / 50 mA units).
    ///
    /// Returns true when a new Request should go out. With `strict` set, an
    /// operating point outside every advertised APDO leaves the state
    /// untouched and returns false; otherwise the engine falls back to the
    /// regular power option.
    pub fn set_pps(&mut self, voltage: u16, current: u8, strict: bool) -> bool {
        if self.pdos.is_empty() {
            self.pps_voltage = voltage;
            self.pps_current = current;
            return false;
        }
        if let Some(index) = self.find_pps(voltage, current) {
            let changed = voltage != self.pps_voltage
                || current != self.pps_current
                || index != self.selected;
            self.pps_voltage = voltage;
            self.pps_current = current;
            self.selected = index;
            changed
        } else if strict {
            false
        } else {
            self.pps_voltage = voltage;
            self.pps_current = current;
            self.evaluate_src_cap();
            true
        }
    }

    /// Decode the last received PPS status data block.
    pub fn pps_status(&self) -> PpsStatus {
        let data = &self.pps_status_data;
        PpsStatus {
            output_voltage: LittleEndian::read_u16(&data[0..2]),
            output_current: data[2],
            temperature: match (data[3] >> 1) & 0x3 {
                0 => PresentTemperatureFlag::NotSupported,
                1 => PresentTemperatureFlag::Normal,
                2 => PresentTemperatureFlag::Warning,
                _ => PresentTemperatureFlag::OverTemperature,
            },
            mode: match (data[3] >> 3) & 0x1 {
                0 => OperatingModeFlag::VoltageMode,
                _ => OperatingModeFlag::CurrentLimitMode,
            },
        }
    }

    pub fn message_id(&self) -> u8 {
        self.message_id
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn pdo_count(&self) -> usize {
        self.pdos.len()
    }

    /// PPS voltage setting in 20 mV units.
    pub fn pps_voltage(&self) -> u16 {
        self.pps_voltage
    }

    /// PPS current setting in 50 mA units.
    pub fn pps_current(&self) -> u8 {
        self.pps_current
    }

    pub fn tx_header(&self) -> u16 {
        self.tx_header
    }

    pub fn rx_header(&self) -> u16 {
        self.rx_header
    }
}

/// 20 mV units to 50 mV units.
fn pps_voltage_in_pd_units(voltage: u16) -> u16 {
    (voltage as u32 * 2 / 5) as u16
}

/// 50 mA units to 10 mA units.
fn pps_current_in_pd_units(current: u8) -> u16 {
    current as u16 * 5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::MessageType;

    fn ctrl_header(message_type: ControlMessageType, id: u8) -> Header {
        Header(0)
            .with_message_type_raw(message_type as u8)
            .with_message_id(id)
            .with_spec_revision(u8::from(SpecificationRevision::R3_0))
    }

    fn data_header(message_type: DataMessageType, num_objects: u8) -> Header {
        Header(0)
            .with_message_type_raw(message_type as u8)
            .with_num_objects(num_objects)
            .with_spec_revision(u8::from(SpecificationRevision::R3_0))
    }

    fn fixed(voltage: u16, current: u16) -> u32 {
        ((voltage as u32) << 10) | current as u32
    }

    fn pps(min_v_100mv: u8, max_v_100mv: u8, max_i_50ma: u8) -> u32 {
        (3u32 << 30) | ((max_v_100mv as u32) << 17) | ((min_v_100mv as u32) << 8) | max_i_50ma as u32
    }

    /// PDO list from a typical 65 W source.
    fn typical_caps() -> [u32; 4] {
        [fixed(100, 300), fixed(180, 300), fixed(300, 300), fixed(400, 225)]
    }

    fn engine_with_caps(option: PowerOption, caps: &[u32]) -> Protocol {
        let mut p = Protocol::new();
        p.set_power_option(option);
        p.handle_msg(
            data_header(DataMessageType::SourceCapabilities, caps.len() as u8),
            caps,
        );
        p
    }

    #[test]
    fn message_id_follows_good_crc_count() {
        let mut p = Protocol::new();
        for n in 1..=20u8 {
            p.handle_msg(ctrl_header(ControlMessageType::GoodCRC, 0), &[]);
            assert_eq!(p.message_id(), n & 0x7);
        }
    }

    #[test]
    fn selects_highest_pdo_under_limit() {
        let p = engine_with_caps(PowerOption::Max20V, &typical_caps());
        assert_eq!(p.selected_index(), 3);

        let p = engine_with_caps(PowerOption::Max9V, &typical_caps());
        assert_eq!(p.selected_index(), 1);

        let p = engine_with_caps(PowerOption::Max5V, &typical_caps());
        assert_eq!(p.selected_index(), 0);
    }

    #[test]
    fn selection_falls_back_to_vsafe5v() {
        // A hypothetical list whose every object busts the 5 V budget.
        let caps = [fixed(180, 300), fixed(400, 225)];
        let p = engine_with_caps(PowerOption::Max5V, &caps);
        assert_eq!(p.selected_index(), 0);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let mut p = engine_with_caps(PowerOption::Max15V, &typical_caps());
        let first = p.selected_index();
        p.evaluate_src_cap();
        p.evaluate_src_cap();
        assert_eq!(p.selected_index(), first);
    }

    #[test]
    fn request_for_fixed_contract() {
        let mut p = engine_with_caps(PowerOption::Max20V, &typical_caps());
        let message = p.create_request().unwrap();
        assert_eq!(
            message.header.message_type(),
            MessageType::Data(DataMessageType::Request)
        );
        assert_eq!(message.header.num_objects(), 1);
        let request = FixedVariableRequest(message.objects[0]);
        assert_eq!(request.object_position(), 4);
        assert_eq!(request.operating_current(), 225);
        assert_eq!(request.max_operating_current(), 225);
        assert!(request.usb_communications_capable());
    }

    #[test]
    fn no_request_without_capabilities() {
        let mut p = Protocol::new();
        assert!(p.create_request().is_none());
        assert!(p.respond().is_none());
    }

    #[test]
    fn pps_setting_selects_apdo() {
        let caps = [fixed(100, 300), fixed(180, 300), pps(33, 110, 60)];
        let mut p = Protocol::new();
        p.set_power_option(PowerOption::Max20V);
        // 3.3 V / 2.0 A configured before capabilities arrive.
        assert!(!p.set_pps(165, 40, false));
        p.handle_msg(data_header(DataMessageType::SourceCapabilities, 3), &caps);
        assert_eq!(p.selected_index(), 2);

        let message = p.create_request().unwrap();
        let request = PpsRequest(message.objects[0]);
        assert_eq!(request.object_position(), 3);
        assert_eq!(request.output_voltage(), 165);
        assert_eq!(request.operating_current(), 40);
    }

    #[test]
    fn pps_out_of_range_strict_changes_nothing() {
        let caps = [fixed(100, 300), pps(33, 110, 60)];
        let mut p = engine_with_caps(PowerOption::Max20V, &caps);
        assert!(p.set_pps(250, 40, false));
        assert_eq!(p.selected_index(), 1);
        // 21 V is outside the 3.3-11 V APDO.
        assert!(!p.set_pps(1050, 40, true));
        assert_eq!(p.pps_voltage(), 250);
        assert_eq!(p.selected_index(), 1);
    }

    #[test]
    fn pps_out_of_range_lenient_falls_back() {
        let caps = [fixed(100, 300), fixed(180, 300), pps(33, 110, 60)];
        let mut p = engine_with_caps(PowerOption::Max9V, &caps);
        assert!(p.set_pps(1050, 40, false));
        // Regular option takes over: 9 V fixed.
        assert_eq!(p.selected_index(), 1);
    }

    #[test]
    fn soft_reset_zeroes_message_id_and_accepts() {
        let mut p = engine_with_caps(PowerOption::Max20V, &typical_caps());
        for _ in 0..3 {
            p.handle_msg(ctrl_header(ControlMessageType::GoodCRC, 0), &[]);
        }
        assert_eq!(p.message_id(), 3);

        p.handle_msg(ctrl_header(ControlMessageType::SoftReset, 0), &[]);
        assert_eq!(p.message_id(), 0);
        let reply = p.respond().unwrap();
        assert_eq!(
            reply.header.message_type(),
            MessageType::Control(ControlMessageType::Accept)
        );
        assert_eq!(reply.header.message_id(), 0);
        assert!(reply.objects.is_empty());
    }

    #[test]
    fn sink_capabilities_response() {
        let mut p = Protocol::new();
        p.handle_msg(ctrl_header(ControlMessageType::GetSinkCap, 0), &[]);
        let reply = p.respond().unwrap();
        assert_eq!(
            reply.header.message_type(),
            MessageType::Data(DataMessageType::SinkCapabilities)
        );
        let pdo = SinkFixedSupply(reply.objects[0]);
        assert_eq!(pdo.voltage(), 100);
        assert_eq!(pdo.operational_current(), 100);
        assert!(pdo.usb_communications_capable());
        assert!(pdo.higher_capability());
    }

    #[test]
    fn swap_requests_are_rejected() {
        for swap in [
            ControlMessageType::DrSwap,
            ControlMessageType::PrSwap,
            ControlMessageType::VconnSwap,
        ] {
            let mut p = Protocol::new();
            p.handle_msg(ctrl_header(swap, 0), &[]);
            let reply = p.respond().unwrap();
            assert_eq!(
                reply.header.message_type(),
                MessageType::Control(ControlMessageType::Reject)
            );
        }
    }

    #[test]
    fn unimplemented_messages_get_not_supported() {
        let mut p = Protocol::new();
        p.handle_msg(ctrl_header(ControlMessageType::GetStatus, 0), &[]);
        let reply = p.respond().unwrap();
        assert_eq!(
            reply.header.message_type(),
            MessageType::Control(ControlMessageType::NotSupported)
        );

        // Out-of-range control type clamps onto the reserved tail row.
        let mut p = Protocol::new();
        p.handle_msg(Header(0).with_message_type_raw(0x1f), &[]);
        let reply = p.respond().unwrap();
        assert_eq!(
            reply.header.message_type(),
            MessageType::Control(ControlMessageType::NotSupported)
        );
    }

    #[test]
    fn sink_cap_extended_response() {
        let mut p = Protocol::new();
        let request = Header(0)
            .with_message_type_raw(ExtendedMessageType::SinkCapabilitiesExtended as u8)
            .with_num_objects(1)
            .with_extended(true);
        p.handle_msg(request, &[0x8002]);
        let reply = p.respond().unwrap();
        assert!(reply.header.extended());
        assert_eq!(
            reply.header.message_type(),
            MessageType::Extended(ExtendedMessageType::SinkCapabilitiesExtended)
        );
        assert_eq!(reply.header.num_objects(), 6);

        let mut bytes = [0u8; 24];
        for (i, &obj) in reply.objects.iter().enumerate() {
            LittleEndian::write_u32(&mut bytes[i * 4..i * 4 + 4], obj);
        }
        let ext = ExtendedHeader(LittleEndian::read_u16(&bytes[0..2]));
        assert!(ext.chunked());
        assert_eq!(ext.data_size(), 21);
        assert_eq!(ext.chunk_number(), 0);
        assert_eq!(bytes[2 + 10], 1); // SKEDB version
        assert_eq!(bytes[2 + 17], 0x03); // sink modes
        assert_eq!(&bytes[2 + 18..2 + 21], &[5, 5, 100]); // PDP min/op/max
    }

    #[test]
    fn pps_status_block_is_extracted() {
        let mut p = Protocol::new();
        // Extended header (2 bytes) then SDB: 3.304 V, 1.0 A, normal, CL mode.
        let voltage = 1652u16;
        let mut payload = [0u8; 8];
        LittleEndian::write_u16(&mut payload[0..2], ExtendedHeader(0).with_chunked(true).with_data_size(4).0);
        LittleEndian::write_u16(&mut payload[2..4], voltage);
        payload[4] = 20;
        payload[5] = (1 << 1) | (1 << 3);
        let objects = [
            LittleEndian::read_u32(&payload[0..4]),
            LittleEndian::read_u32(&payload[4..8]),
        ];
        let header = Header(0)
            .with_message_type_raw(ExtendedMessageType::PpsStatus as u8)
            .with_num_objects(2)
            .with_extended(true);
        let events = p.handle_msg(header, &objects);
        assert!(events.pps_status());

        let status = p.pps_status();
        assert_eq!(status.output_voltage, voltage);
        assert_eq!(status.output_current, 20);
        assert_eq!(status.temperature, PresentTemperatureFlag::Normal);
        assert_eq!(status.mode, OperatingModeFlag::CurrentLimitMode);
    }

    #[test]
    fn reject_emits_reject_event() {
        let mut p = Protocol::new();
        let events = p.handle_msg(ctrl_header(ControlMessageType::Reject, 0), &[]);
        assert!(events.reject());
        assert!(!events.ps_rdy());
    }

    #[test]
    fn get_src_cap_header() {
        let mut p = Protocol::new();
        let header = p.create_get_src_cap();
        assert_eq!(
            header.message_type(),
            MessageType::Control(ControlMessageType::GetSourceCap)
        );
        assert_eq!(header.num_objects(), 0);
        assert_eq!(header.spec_revision(), SpecificationRevision::R3_0);
        assert_eq!(header.0 & (1 << 8), 0);
        assert_eq!(header.0 & (1 << 5), 0);
    }

    #[test]
    fn headers_carry_current_message_id() {
        let mut p = engine_with_caps(PowerOption::Max20V, &typical_caps());
        p.handle_msg(ctrl_header(ControlMessageType::GoodCRC, 0), &[]);
        p.handle_msg(ctrl_header(ControlMessageType::GoodCRC, 0), &[]);
        let header = p.create_get_src_cap();
        assert_eq!(header.message_id(), 2);
    }

    #[test]
    fn power_option_change_requests_resend_only_with_caps() {
        let mut p = Protocol::new();
        assert!(!p.set_power_option(PowerOption::Max9V));
        p.handle_msg(
            data_header(DataMessageType::SourceCapabilities, 4),
            &typical_caps(),
        );
        assert!(p.set_power_option(PowerOption::Max15V));
        assert_eq!(p.selected_index(), 2);
    }

    #[test]
    fn select_power_bounds_checked() {
        let mut p = engine_with_caps(PowerOption::Max5V, &typical_caps());
        assert!(p.select_power(2));
        assert_eq!(p.selected_index(), 2);
        assert!(!p.select_power(7));
        assert_eq!(p.selected_index(), 2);
    }
}
