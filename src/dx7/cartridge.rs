use std::fs;
use std::path::Path;
use log::{debug, info};

use crate::{
    ChecksumMismatch,
    Error,
};

use crate::dx7::{MidiChannel, VOICE_COUNT};
use crate::dx7::packing::{self, PACKED_CARTRIDGE_SIZE, VOICE_SIZE};
use crate::dx7::sysex::{self, check_length, Format, SystemExclusiveData};
use crate::dx7::transport::Transport;
use crate::dx7::voice::Voice;

/// A cartridge with 32 voices.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Cartridge {
    voices: [Voice; VOICE_COUNT],
    /// Channel in the status byte of the bulk dump.
    pub channel: MidiChannel,
}

fn voice_index(index: usize) -> Result<usize, Error> {
    if index < VOICE_COUNT {
        Ok(index)
    }
    else {
        Err(Error::NotFound(format!("voice {}", index)))
    }
}

impl Default for Cartridge {
    fn default() -> Self {
        Cartridge {
            voices: std::array::from_fn(|index| {
                let mut voice = Voice::default();
                voice.stamp(index);
                voice
            }),
            channel: MidiChannel::default(),
        }
    }
}

impl Cartridge {
    /// Creates a cartridge of 32 blank voices.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voice(&self, index: usize) -> Result<&Voice, Error> {
        Ok(&self.voices[voice_index(index)?])
    }

    pub fn voice_mut(&mut self, index: usize) -> Result<&mut Voice, Error> {
        Ok(&mut self.voices[voice_index(index)?])
    }

    pub fn voices(&self) -> &[Voice; VOICE_COUNT] {
        &self.voices
    }

    /// Stores a voice into a slot, renumbering it to match.
    pub fn set_voice(&mut self, index: usize, mut voice: Voice) -> Result<(), Error> {
        let index = voice_index(index)?;
        voice.stamp(index);
        self.voices[index] = voice;
        Ok(())
    }

    /// Builds the complete bulk dump message for the cartridge.
    pub fn to_sysex(&self) -> Result<Vec<u8>, Error> {
        sysex::cartridge_dump(self.channel, &self.to_bytes())
    }

    /// Parses a bulk dump message. A checksum mismatch does not prevent
    /// parsing and is handed back with the cartridge.
    pub fn from_sysex(data: &[u8]) -> Result<(Self, Option<ChecksumMismatch>), Error> {
        let dump = sysex::parse_dump(data, Format::Cartridge)?;
        let mut cartridge = Cartridge::from_bytes(dump.payload)?;
        cartridge.channel = dump.header.channel;
        Ok((cartridge, dump.checksum))
    }

    /// Replaces the voices with those in a cartridge file.
    /// Nothing is changed if the file cannot be read or parsed.
    pub fn read_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Option<ChecksumMismatch>, Error> {
        let data = fs::read(path.as_ref())?;
        let (cartridge, mismatch) = Cartridge::from_sysex(&data)?;
        *self = cartridge;
        info!("read cartridge from {}", path.as_ref().display());
        Ok(mismatch)
    }

    /// Reads a cartridge file. A checksum mismatch is only logged.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let mut cartridge = Cartridge::new();
        cartridge.read_from_file(path)?;
        Ok(cartridge)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        fs::write(path.as_ref(), self.to_sysex()?)?;
        info!("saved cartridge to {}", path.as_ref().display());
        Ok(())
    }

    /// Sends the whole cartridge to the synth as one bulk dump.
    pub fn send<T: Transport + ?Sized>(&self, port: &mut T) -> Result<(), Error> {
        port.send(&self.to_sysex()?)?;
        debug!("sent cartridge on channel {}", self.channel);
        Ok(())
    }
}

impl SystemExclusiveData for Cartridge {
    /// Makes a cartridge from the 4096 bytes of packed voice data.
    fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        check_length(data, Self::DATA_SIZE)?;

        let unpacked = packing::unpack_cartridge(data)?;
        let mut cartridge = Cartridge::new();
        for (index, voice_data) in unpacked.chunks(VOICE_SIZE).enumerate() {
            cartridge.set_voice(index, Voice::from_bytes(voice_data)?)?;
        }
        Ok(cartridge)
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut data: Vec<u8> = Vec::with_capacity(Self::DATA_SIZE);

        for voice in self.voices.iter() {
            data.extend(voice.packed());
        }

        data
    }

    const DATA_SIZE: usize = PACKED_CARTRIDGE_SIZE;
}
