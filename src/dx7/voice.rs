use std::fmt;
use log::debug;
use rand::Rng;

use crate::{
    ChecksumMismatch,
    Error,
};

use crate::dx7::{
    MidiChannel,
    OSCILLATOR_COUNT,
    VOICE_BASE_ADDRESS,
    VOICE_COUNT,
};

use crate::dx7::oscillator::Oscillator;
use crate::dx7::packing::{self, OSCILLATOR_SIZE, VOICE_SIZE, VOICE_TAIL_SIZE};
use crate::dx7::parameter::{
    parameter_table,
    Field,
    FieldKind,
    ParameterRecord,
};
use crate::dx7::sysex::{
    self,
    check_length,
    DumpOptions,
    Format,
    OscillatorOrder,
    SystemExclusiveData,
};
use crate::dx7::transport::Transport;

/// Number of characters in a voice name.
pub const NAME_SIZE: usize = 10;

const NAME_OFFSET: usize = 19;

parameter_table! {
    /// Voice parameters, in address order starting from 126.
    VoiceParameter {
        PitchEgRate1 => Field::value("PITCH_EG_RATE_1", 0, 0, 99),
        PitchEgRate2 => Field::value("PITCH_EG_RATE_2", 1, 0, 99),
        PitchEgRate3 => Field::value("PITCH_EG_RATE_3", 2, 0, 99),
        PitchEgRate4 => Field::value("PITCH_EG_RATE_4", 3, 0, 99),
        PitchEgLevel1 => Field::value("PITCH_EG_LEVEL_1", 4, 0, 99),
        PitchEgLevel2 => Field::value("PITCH_EG_LEVEL_2", 5, 0, 99),
        PitchEgLevel3 => Field::value("PITCH_EG_LEVEL_3", 6, 0, 99),
        PitchEgLevel4 => Field::value("PITCH_EG_LEVEL_4", 7, 0, 99),
        Algorithm => Field::value("Algorithm", 8, 0, 31),
        Feedback => Field::value("Feedback", 9, 0, 7),
        OscillatorKeySync => Field::value("Oscillator_Key_Sync", 10, 0, 1),
        LfoSpeed => Field::value("LFO_Speed", 11, 0, 99),
        LfoDelay => Field::value("LFO_Delay", 12, 0, 99),
        LfoPitchModDepth => Field::value("LFO_Pitch_Mod_Depth", 13, 0, 99),
        LfoAmpModDepth => Field::value("LFO_Amp_Mod_Depth", 14, 0, 99),
        LfoKeySync => Field::value("LFO_Key_Sync", 15, 0, 1),
        LfoWaveform => Field::value("LFO_Waveform", 16, 0, 5),  // TRI, SAW-, SAW+, SQR, SIN, S/H
        PitchModSensitivity => Field::value("Pitch_Mod_Sensitivity", 17, 0, 7),
        Transpose => Field::value("Transpose", 18, 0, 48),  // 24 = C3
        Name => Field::text("Voice_Name", NAME_OFFSET, NAME_SIZE),
        ActiveOscillators => Field::derived("ActiveOscillators", 29, 0, 0b111111),
    }
}

/// A voice: six oscillators plus the parameters they share.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Voice {
    number: usize,  // 0...31
    oscillators: [Oscillator; OSCILLATOR_COUNT],  // OP1 first
    data: [u8; VOICE_TAIL_SIZE],
}

fn check_number(number: usize) -> Result<(), Error> {
    if number < VOICE_COUNT {
        Ok(())
    }
    else {
        Err(Error::Range { name: "voice number", value: number as i32, first: 0, last: VOICE_COUNT as i32 - 1 })
    }
}

fn oscillator_index(number: usize) -> Result<usize, Error> {
    if (1..=OSCILLATOR_COUNT).contains(&number) {
        Ok(number - 1)
    }
    else {
        Err(Error::NotFound(format!("oscillator {}", number)))
    }
}

impl Voice {
    /// Creates a new voice with every parameter at zero and a blank name.
    pub fn new(number: usize) -> Result<Self, Error> {
        check_number(number)?;
        let mut voice = Voice::default();
        voice.number = number;
        Ok(voice)
    }

    /// Makes a new voice with random parameters and a random name.
    pub fn random(number: usize) -> Result<Self, Error> {
        let mut voice = Voice::new(number)?;
        for (index, osc) in voice.oscillators.iter_mut().enumerate() {
            *osc = Oscillator::random(index + 1)?;
        }

        let mut rng = rand::rng();
        for field in VoiceParameter::FIELDS.iter().filter(|f| f.kind == FieldKind::Value) {
            voice.data[field.offset] = rng.random_range(field.first..=field.last) as u8;
        }
        let name: String = (0..NAME_SIZE).map(|_| rng.random_range(b'A'..=b'Z') as char).collect();
        voice.set_name(&name);

        Ok(voice)
    }

    pub fn number(&self) -> usize {
        self.number
    }

    // Only the owning cartridge renumbers its voices.
    pub(crate) fn stamp(&mut self, number: usize) {
        self.number = number;
    }

    /// Gets the voice name, including any padding.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.data[NAME_OFFSET..NAME_OFFSET + NAME_SIZE]).into_owned()
    }

    /// Sets the voice name. Longer names are cut to ten characters,
    /// shorter ones padded with spaces.
    pub fn set_name(&mut self, name: &str) {
        let mut bytes = [b' '; NAME_SIZE];
        for (b, ch) in bytes.iter_mut().zip(name.chars()) {
            *b = sysex::name_byte(ch);
        }
        self.data[NAME_OFFSET..NAME_OFFSET + NAME_SIZE].copy_from_slice(&bytes);
    }

    /// Gets an oscillator by its number (1...6).
    pub fn oscillator(&self, number: usize) -> Result<&Oscillator, Error> {
        Ok(&self.oscillators[oscillator_index(number)?])
    }

    pub fn oscillator_mut(&mut self, number: usize) -> Result<&mut Oscillator, Error> {
        Ok(&mut self.oscillators[oscillator_index(number)?])
    }

    /// Puts an oscillator into the given slot, renumbering it to match.
    pub fn set_oscillator(&mut self, number: usize, mut oscillator: Oscillator) -> Result<(), Error> {
        let index = oscillator_index(number)?;
        oscillator.stamp(number);
        self.oscillators[index] = oscillator;
        Ok(())
    }

    /// The oscillators, OP1 first.
    pub fn oscillators(&self) -> &[Oscillator; OSCILLATOR_COUNT] {
        &self.oscillators
    }

    /// Mask of the oscillators that are on: OP1 is bit 5, OP6 is bit 0.
    pub fn active_oscillators(&self) -> u8 {
        self.oscillators.iter().fold(0u8, |mask, osc| {
            if osc.active {
                mask | (1 << (OSCILLATOR_COUNT - osc.number()))
            }
            else {
                mask
            }
        })
    }

    /// Gets the 155 unpacked bytes of the voice with the oscillators in the given order.
    pub fn voice_data(&self, order: OscillatorOrder) -> Vec<u8> {
        let mut data: Vec<u8> = Vec::with_capacity(VOICE_SIZE);
        match order {
            OscillatorOrder::Ascending => self.oscillators.iter().for_each(|osc| data.extend(osc.to_bytes())),
            OscillatorOrder::Descending => self.oscillators.iter().rev().for_each(|osc| data.extend(osc.to_bytes())),
        }
        data.extend(&self.data);
        data
    }

    /// Packs the voice into the 128 bytes it takes in a cartridge.
    pub fn packed(&self) -> Vec<u8> {
        let mut data = [0u8; VOICE_SIZE];
        for (chunk, osc) in data.chunks_mut(OSCILLATOR_SIZE).zip(self.oscillators.iter()) {
            chunk.copy_from_slice(osc.data());
        }
        data[OSCILLATOR_COUNT * OSCILLATOR_SIZE..].copy_from_slice(&self.data);
        packing::pack_voice_data(&data)
    }

    fn from_voice_data(data: &[u8], order: OscillatorOrder) -> Result<Self, Error> {
        check_length(data, VOICE_SIZE)?;

        let mut voice = Voice::default();
        for (index, chunk) in data[..OSCILLATOR_COUNT * OSCILLATOR_SIZE].chunks(OSCILLATOR_SIZE).enumerate() {
            let number = match order {
                OscillatorOrder::Ascending => index + 1,
                OscillatorOrder::Descending => OSCILLATOR_COUNT - index,
            };
            voice.set_oscillator(number, Oscillator::from_bytes(chunk)?)?;
        }
        voice.data.copy_from_slice(&data[OSCILLATOR_COUNT * OSCILLATOR_SIZE..]);
        Ok(voice)
    }

    /// Builds the single voice dump, followed by the parameter change
    /// carrying the `ActiveOscillators` mask, which the dump does not contain.
    pub fn dump_messages(&self, channel: MidiChannel, options: DumpOptions) -> Result<Vec<Vec<u8>>, Error> {
        let mut messages = vec![
            sysex::voice_dump(channel, &self.voice_data(options.order), options.checksum)?
        ];
        messages.extend(self.parameter_messages(VoiceParameter::ActiveOscillators, channel)?);
        Ok(messages)
    }

    /// Sends this voice to the synth's edit buffer.
    pub fn send<T: Transport + ?Sized>(&self, port: &mut T, channel: MidiChannel, options: DumpOptions) -> Result<(), Error> {
        for message in self.dump_messages(channel, options)? {
            port.send(&message)?;
        }
        debug!("sent voice #{} '{}'", self.number, self.name());
        Ok(())
    }

    /// Parses a single voice dump. The voice is numbered 0
    /// and all of its oscillators are on.
    pub fn from_voice_dump(data: &[u8], order: OscillatorOrder) -> Result<(Self, Option<ChecksumMismatch>), Error> {
        let dump = sysex::parse_dump(data, Format::Voice)?;
        let voice = Voice::from_voice_data(dump.payload, order)?;
        Ok((voice, dump.checksum))
    }
}

impl Default for Voice {
    fn default() -> Self {
        let mut data = [0u8; VOICE_TAIL_SIZE];
        data[NAME_OFFSET..NAME_OFFSET + NAME_SIZE].fill(b' ');
        Voice {
            number: 0,
            oscillators: std::array::from_fn(|index| {
                let mut osc = Oscillator::default();
                osc.stamp(index + 1);
                osc
            }),
            data,
        }
    }
}

impl ParameterRecord for Voice {
    const FIELDS: &'static [Field] = VoiceParameter::FIELDS;

    fn base_address(&self) -> u16 {
        VOICE_BASE_ADDRESS
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn derived_value(&self, field: &Field) -> Result<i32, Error> {
        if field.name == VoiceParameter::ActiveOscillators.name() {
            Ok(self.active_oscillators() as i32)
        }
        else {
            Err(Error::NotFound(field.name.to_string()))
        }
    }
}

impl SystemExclusiveData for Voice {
    /// Makes a voice from 155 unpacked bytes, OP1 first.
    fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        Voice::from_voice_data(data, OscillatorOrder::Ascending)
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.voice_data(OscillatorOrder::Ascending)
    }

    const DATA_SIZE: usize = VOICE_SIZE;
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let d = &self.data;
        write!(f, "==========
#{} {}
==========
{}{}{}{}{}{}PEG: R1={} R2={} R3={} R4={} L1={} L2={} L3={} L4={}
ALG: {}, feedback = {}, osc sync = {}
LFO: speed = {}, delay = {}, PMD = {}, AMD = {}, sync = {}, waveform = {}
PMS = {}, transpose = {}, active = {:06b}
",
            self.number, self.name(),
            self.oscillators[0],
            self.oscillators[1],
            self.oscillators[2],
            self.oscillators[3],
            self.oscillators[4],
            self.oscillators[5],
            d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7],
            d[8] as i32 + 1, d[9], d[10],
            d[11], d[12], d[13], d[14], d[15], d[16],
            d[17], d[18] as i32 - 24, self.active_oscillators())
    }
}
