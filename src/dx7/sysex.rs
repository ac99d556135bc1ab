use std::convert::{
    From,
    TryFrom
};

use std::fmt;
use log::{debug, warn};

use crate::{
    ChecksumMismatch,
    Error,
};

use crate::dx7::{
    MidiChannel,
    FUNCTION_BASE_ADDRESS,
    LAST_VOICE_ADDRESS,
};

use crate::dx7::transport::Transport;
use crate::dx7::voice::NAME_SIZE;

pub const SYSEX_START: u8 = 0xf0;
pub const SYSEX_END: u8 = 0xf7;
pub const YAMAHA_ID: u8 = 0x43;

/// Length of a parameter change message.
pub const PARAMETER_CHANGE_SIZE: usize = 7;

/// Parsing and generating MIDI System Exclusive data.
pub trait SystemExclusiveData: Sized {
    fn from_bytes(data: &[u8]) -> Result<Self, Error>;
    fn to_bytes(&self) -> Vec<u8>;

    const DATA_SIZE: usize;
}

/// Checks that a slice has exactly the size a decoder expects.
pub fn check_length(data: &[u8], expected: usize) -> Result<(), Error> {
    if data.len() == expected {
        Ok(())
    }
    else {
        Err(Error::Length { actual: data.len(), expected })
    }
}

/// Sub-status nibble of the status byte.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum SubStatus {
    Dump = 0,
    Parameter = 1,
}

/// Format number of a bulk data dump.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum Format {
    Voice = 0,
    Cartridge = 9,
}

impl Format {
    /// Number of payload bytes in a dump of this format.
    pub fn byte_count(&self) -> usize {
        match self {
            Format::Voice => 155,
            Format::Cartridge => 4096,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f, "{}",
            match *self {
                Format::Voice => "voice",
                Format::Cartridge => "cartridge"
            })
    }
}

impl TryFrom<u8> for Format {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Format::Voice),
            9 => Ok(Format::Cartridge),
            _ => Err(Error::Format(format!("unknown format number {}", value)))
        }
    }
}

impl From<Format> for u8 {
    fn from(f: Format) -> u8 {
        f as u8
    }
}

/// Makes the status byte from the sub-status and the channel.
pub fn status_byte(sub_status: SubStatus, channel: MidiChannel) -> u8 {
    ((sub_status as u8) << 4) | (channel.as_byte() & 0x0f)
}

/// Header of a bulk data dump.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Header {
    pub channel: MidiChannel,
    pub format: Format,
}

impl Header {
    pub fn new(channel: MidiChannel, format: Format) -> Self {
        Header { channel, format }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Format = {}, channel = {}, length = {} bytes",
            self.format, self.channel, self.format.byte_count())
    }
}

impl SystemExclusiveData for Header {
    fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        check_length(data, Self::DATA_SIZE)?;

        if data[0] != SYSEX_START {
            return Err(Error::Format(format!("expected {:02X}H at start, got {:02X}H", SYSEX_START, data[0])));
        }
        if data[1] != YAMAHA_ID {
            return Err(Error::Format(format!("manufacturer {:02X}H is not Yamaha", data[1])));
        }
        if data[2] >> 4 != SubStatus::Dump as u8 {
            return Err(Error::Format(format!("status byte {:02X}H is not a bulk dump", data[2])));
        }

        let format = Format::try_from(data[3])?;

        // 14-bit number distributed evenly over two bytes:
        // voice = 155 appears as "01 1B", cartridge = 4096 as "20 00"
        let byte_count = ((data[4] as usize) << 7) | (data[5] as usize);
        if byte_count != format.byte_count() {
            return Err(Error::Format(format!("byte count {} does not match {} format", byte_count, format)));
        }

        Ok(Header { channel: MidiChannel::from(data[2]), format })
    }

    fn to_bytes(&self) -> Vec<u8> {
        let count = self.format.byte_count();
        vec![
            SYSEX_START,
            YAMAHA_ID,
            status_byte(SubStatus::Dump, self.channel),
            self.format.into(),
            ((count >> 7) & 0x7f) as u8,
            (count & 0x7f) as u8,
        ]
    }

    const DATA_SIZE: usize = 6;
}

/// Two's complement checksum: `(sum + checksum) & 0x7F == 0`.
pub fn checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |sum, b| sum.wrapping_add(*b));
    sum.wrapping_neg() & 0x7f
}

/// Plain sum of the data masked to seven bits. Receivers that verify
/// the standard checksum will reject dumps carrying this one.
pub fn masked_sum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |sum, b| sum.wrapping_add(*b));
    sum & 0x7f
}

/// Checksum formula for single voice dumps.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum ChecksumStyle {
    #[default]
    TwosComplement,
    MaskedSum,
}

impl ChecksumStyle {
    pub fn compute(&self, data: &[u8]) -> u8 {
        match self {
            ChecksumStyle::TwosComplement => checksum(data),
            ChecksumStyle::MaskedSum => masked_sum(data),
        }
    }
}

/// Order of the oscillators in a single voice dump payload.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum OscillatorOrder {
    #[default]
    Ascending,  // OP1 first
    Descending,  // OP6 first, as in the bulk dump and the address space
}

/// Options for building a single voice dump.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct DumpOptions {
    pub checksum: ChecksumStyle,
    pub order: OscillatorOrder,
}

/// Value carried by parameter change messages.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ParameterValue<'a> {
    Byte(i32),
    Bytes(&'a [u8]),  // one message per byte
    Name([u8; NAME_SIZE], usize),  // name characters and their count
}

impl From<i32> for ParameterValue<'_> {
    fn from(value: i32) -> Self {
        ParameterValue::Byte(value)
    }
}

impl From<u8> for ParameterValue<'_> {
    fn from(value: u8) -> Self {
        ParameterValue::Byte(value as i32)
    }
}

/// Converts a name character to the byte stored in voice data.
/// Anything but printable ASCII becomes '?'.
pub fn name_byte(ch: char) -> u8 {
    if ch.is_ascii() && !ch.is_ascii_control() {
        ch as u8
    }
    else {
        warn!("replacing {:?} in voice name with '?'", ch);
        b'?'
    }
}

impl From<&str> for ParameterValue<'_> {
    /// Takes the first ten characters of a name, one byte each.
    fn from(name: &str) -> Self {
        let mut bytes = [b' '; NAME_SIZE];
        let mut count = 0;
        for (b, ch) in bytes.iter_mut().zip(name.chars()) {
            *b = name_byte(ch);
            count += 1;
        }
        ParameterValue::Name(bytes, count)
    }
}

fn value_byte(value: i32, address: u16) -> u8 {
    let byte = (value & 0x7f) as u8;
    if !(0..=0x7f).contains(&value) {
        warn!("value {} for address {} does not fit in seven bits, sending {}", value, address, byte);
    }
    byte
}

/// Builds the parameter change messages for a value, one message per byte,
/// with the address advancing by one for each byte.
pub fn parameter_change(channel: MidiChannel, address: u16, value: ParameterValue, function: bool) -> Result<Vec<Vec<u8>>, Error> {
    let values: Vec<i32> = match value {
        ParameterValue::Byte(b) => vec![b],
        ParameterValue::Bytes(bytes) => bytes.iter().map(|b| *b as i32).collect(),
        ParameterValue::Name(bytes, count) => bytes[..count].iter().map(|b| *b as i32).collect(),
    };

    let last_address = address as usize + values.len().max(1) - 1;
    if last_address > LAST_VOICE_ADDRESS as usize {
        return Err(Error::Range {
            name: "parameter address",
            value: last_address as i32,
            first: 0,
            last: LAST_VOICE_ADDRESS as i32,
        });
    }

    if function && !(FUNCTION_BASE_ADDRESS..FUNCTION_BASE_ADDRESS + 14).contains(&address) {
        warn!("function parameter address {} is outside {}...{}", address, FUNCTION_BASE_ADDRESS, FUNCTION_BASE_ADDRESS + 13);
    }

    let status = status_byte(SubStatus::Parameter, channel);
    let group: u8 = if function { 0x08 } else { 0x00 };

    let messages = values.iter().enumerate().map(|(index, value)| {
        let address = address + index as u16;
        vec![
            SYSEX_START,
            YAMAHA_ID,
            status,
            group | ((address >> 7) & 0x03) as u8,
            (address & 0x7f) as u8,
            value_byte(*value, address),
            SYSEX_END,
        ]
    }).collect();

    Ok(messages)
}

fn dump(channel: MidiChannel, format: Format, payload: &[u8], checksum: u8) -> Result<Vec<u8>, Error> {
    check_length(payload, format.byte_count())?;

    let mut result = Header::new(channel, format).to_bytes();
    result.extend(payload);
    result.push(checksum);
    result.push(SYSEX_END);
    Ok(result)
}

/// Wraps 155 bytes of unpacked voice data into a single voice dump.
pub fn voice_dump(channel: MidiChannel, payload: &[u8], style: ChecksumStyle) -> Result<Vec<u8>, Error> {
    dump(channel, Format::Voice, payload, style.compute(payload))
}

/// Wraps 4096 bytes of packed voice data into a cartridge bulk dump.
pub fn cartridge_dump(channel: MidiChannel, payload: &[u8]) -> Result<Vec<u8>, Error> {
    dump(channel, Format::Cartridge, payload, checksum(payload))
}

/// A parsed bulk dump.
#[derive(Debug)]
pub struct Dump<'a> {
    pub header: Header,
    pub payload: &'a [u8],
    pub checksum: Option<ChecksumMismatch>,  // set if the checksum did not match
}

/// Checks the framing of a bulk dump and verifies its checksum.
/// A checksum mismatch is logged and reported, but is not an error.
pub fn parse_dump(data: &[u8], format: Format) -> Result<Dump<'_>, Error> {
    if data.len() < Header::DATA_SIZE {
        return Err(Error::Length { actual: data.len(), expected: Header::DATA_SIZE });
    }

    let header = Header::from_bytes(&data[..Header::DATA_SIZE])?;
    if header.format != format {
        return Err(Error::Format(format!("expected {} dump, got {}", format, header.format)));
    }

    let size = format.byte_count();
    let expected = Header::DATA_SIZE + size + 2;
    if data.len() < expected {
        return Err(Error::Length { actual: data.len(), expected });
    }
    if data[expected - 1] != SYSEX_END {
        return Err(Error::Format(format!("expected {:02X}H at offset {}", SYSEX_END, expected - 1)));
    }
    if data.len() > expected {
        warn!("ignoring {} bytes after the {} dump", data.len() - expected, format);
    }

    let payload = &data[Header::DATA_SIZE..Header::DATA_SIZE + size];
    let actual = data[Header::DATA_SIZE + size];
    let computed = checksum(payload);
    let mismatch = if actual == computed {
        None
    }
    else {
        let mismatch = ChecksumMismatch { actual, expected: computed };
        warn!("{} dump: {}", format, mismatch);
        Some(mismatch)
    };

    debug!("{}", header);
    Ok(Dump { header, payload, checksum: mismatch })
}

/// Sends a parameter change to the synth, one message per value byte.
pub fn send_parameter<'a, T, V>(port: &mut T, channel: MidiChannel, address: u16, value: V, function: bool) -> Result<(), Error>
where
    T: Transport + ?Sized,
    V: Into<ParameterValue<'a>>,
{
    for message in parameter_change(channel, address, value.into(), function)? {
        port.send(&message)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ranged;
    use crate::dx7::transport::MessageLog;

    fn channel(n: i32) -> MidiChannel {
        MidiChannel::new(n).unwrap()
    }

    #[test]
    fn test_header_bytes() {
        let voice = Header::new(channel(0), Format::Voice);
        assert_eq!(voice.to_bytes(), vec![0xf0, 0x43, 0x00, 0x00, 0x01, 0x1b]);

        let cartridge = Header::new(channel(3), Format::Cartridge);
        assert_eq!(cartridge.to_bytes(), vec![0xf0, 0x43, 0x03, 0x09, 0x20, 0x00]);
    }

    #[test]
    fn test_header_from_bytes() {
        let header = Header::from_bytes(&[0xf0, 0x43, 0x05, 0x09, 0x20, 0x00]).unwrap();
        assert_eq!(header.format, Format::Cartridge);
        assert_eq!(header.channel.value(), 5);

        assert!(matches!(Header::from_bytes(&[0xf0, 0x41, 0x00, 0x09, 0x20, 0x00]), Err(Error::Format(_))));
        assert!(matches!(Header::from_bytes(&[0xf0, 0x43, 0x10, 0x09, 0x20, 0x00]), Err(Error::Format(_))));
        assert!(matches!(Header::from_bytes(&[0xf0, 0x43, 0x00, 0x09, 0x01, 0x1b]), Err(Error::Format(_))));
        assert!(matches!(Header::from_bytes(&[0xf0, 0x43, 0x00, 0x09]), Err(Error::Length { .. })));
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[1]), 0x7f);
        assert_eq!(checksum(&[0x40, 0x40]), 0);
        assert_eq!(masked_sum(&[0x7f, 0x02]), 0x01);
    }

    #[test]
    fn test_checksum_sums_to_zero() {
        let mut payload = vec![0u8; 4096];
        for (index, b) in payload.iter_mut().enumerate() {
            *b = ((index * 37 + 11) % 128) as u8;
        }
        let sum: u32 = payload.iter().map(|b| *b as u32).sum();
        assert_eq!((sum + checksum(&payload) as u32) % 128, 0);
    }

    #[test]
    fn test_parameter_change() {
        // Oscillator 1 mode is at address 122
        let messages = parameter_change(channel(0), 122, ParameterValue::Byte(1), false).unwrap();
        assert_eq!(messages, vec![vec![0xf0, 0x43, 0x10, 0x00, 0x7a, 0x01, 0xf7]]);

        let messages = parameter_change(channel(2), 155, ParameterValue::Byte(0x3f), false).unwrap();
        assert_eq!(messages[0], vec![0xf0, 0x43, 0x12, 0x01, 0x1b, 0x3f, 0xf7]);
    }

    #[test]
    fn test_function_parameter_change() {
        let messages = parameter_change(channel(0), 77, ParameterValue::Byte(7), true).unwrap();
        assert_eq!(messages[0], vec![0xf0, 0x43, 0x10, 0x08, 0x4d, 0x07, 0xf7]);
    }

    #[test]
    fn test_parameter_change_masks_value() {
        let messages = parameter_change(channel(0), 0, ParameterValue::Byte(0xc5), false).unwrap();
        assert_eq!(messages[0][5], 0x45);
    }

    #[test]
    fn test_parameter_change_name() {
        let messages = parameter_change(channel(0), 145, "BRASS 1 LONGER".into(), false).unwrap();
        assert_eq!(messages.len(), 10);
        assert_eq!(messages[0][4], 145 & 0x7f);
        assert_eq!(messages[0][5], b'B');
        assert_eq!(messages[9][3], 0x01);
        assert_eq!(messages[9][4], (154 & 0x7f) as u8);
        assert_eq!(messages[9][5], b'O');
        for m in &messages {
            assert_eq!(m.len(), PARAMETER_CHANGE_SIZE);
        }
    }

    #[test]
    fn test_parameter_change_address_range() {
        assert!(matches!(
            parameter_change(channel(0), 156, ParameterValue::Byte(0), false),
            Err(Error::Range { .. })));
        assert!(parameter_change(channel(0), 150, "ABCDEFGHIJ".into(), false).is_err());
    }

    #[test]
    fn test_voice_dump_framing() {
        let payload = [1u8; 155];
        let message = voice_dump(channel(0), &payload, ChecksumStyle::TwosComplement).unwrap();
        assert_eq!(message.len(), 163);
        assert_eq!(&message[..6], &[0xf0, 0x43, 0x00, 0x00, 0x01, 0x1b]);
        assert_eq!(message[161], checksum(&payload));
        assert_eq!(message[162], 0xf7);

        let message = voice_dump(channel(0), &payload, ChecksumStyle::MaskedSum).unwrap();
        assert_eq!(message[161], 155 & 0x7f);

        assert!(matches!(
            voice_dump(channel(0), &payload[1..], ChecksumStyle::default()),
            Err(Error::Length { actual: 154, expected: 155 })));
    }

    #[test]
    fn test_parse_cartridge_dump() {
        let payload = vec![5u8; 4096];
        let message = cartridge_dump(channel(1), &payload).unwrap();
        assert_eq!(message.len(), 4104);

        let dump = parse_dump(&message, Format::Cartridge).unwrap();
        assert_eq!(dump.payload, &payload[..]);
        assert_eq!(dump.header.channel.value(), 1);
        assert!(dump.checksum.is_none());
    }

    #[test]
    fn test_parse_dump_checksum_mismatch() {
        let payload = vec![5u8; 4096];
        let mut message = cartridge_dump(channel(0), &payload).unwrap();
        let good = message[4102];
        message[4102] = (good + 1) & 0x7f;

        let dump = parse_dump(&message, Format::Cartridge).unwrap();
        assert_eq!(dump.checksum, Some(ChecksumMismatch { actual: (good + 1) & 0x7f, expected: good }));
    }

    #[test]
    fn test_parse_dump_errors() {
        let payload = vec![0u8; 4096];
        let message = cartridge_dump(channel(0), &payload).unwrap();

        assert!(matches!(parse_dump(&message[..4000], Format::Cartridge), Err(Error::Length { .. })));
        assert!(matches!(parse_dump(&message, Format::Voice), Err(Error::Format(_))));

        let mut bad_end = message.clone();
        bad_end[4103] = 0;
        assert!(matches!(parse_dump(&bad_end, Format::Cartridge), Err(Error::Format(_))));
    }

    #[test]
    fn test_send_parameter() {
        let mut port = MessageLog::new();
        send_parameter(&mut port, channel(0), 145, "AB", false).unwrap();
        assert_eq!(port.messages().len(), 2);
        assert_eq!(port.messages()[1][5], b'B');
    }

    #[test]
    fn test_send_parameter_non_ascii_name() {
        let mut port = MessageLog::new();
        send_parameter(&mut port, channel(0), 145, "\u{c4}BCDE", false).unwrap();
        let values: Vec<u8> = port.messages().iter().map(|m| m[5]).collect();
        assert_eq!(values, vec![b'?', b'B', b'C', b'D', b'E']);

        port.clear();
        send_parameter(&mut port, channel(0), 145, "\u{c4}".repeat(12).as_str(), false).unwrap();
        assert_eq!(port.messages().len(), 10);
        assert_eq!(port.messages()[9][4], (154 & 0x7f) as u8);
    }
}
