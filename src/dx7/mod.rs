pub mod parameter;
pub mod oscillator;
pub mod voice;
pub mod function;
pub mod packing;
pub mod sysex;
pub mod cartridge;
pub mod transport;

/// Number of oscillators (operators) in a voice.
pub const OSCILLATOR_COUNT: usize = 6;

/// Number of voices in a cartridge.
pub const VOICE_COUNT: usize = 32;

/// Parameter address of the first voice parameter.
/// Oscillator 6 starts at address 0, oscillator 1 at 105.
pub const VOICE_BASE_ADDRESS: u16 = 126;

/// Parameter address of the first function parameter.
pub const FUNCTION_BASE_ADDRESS: u16 = 64;

/// Highest address reachable with a voice parameter change (ActiveOscillators).
pub const LAST_VOICE_ADDRESS: u16 = 155;

/// MIDI channel (0...15) used in the status byte of every message.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MidiChannel(i32);

crate::ranged_impl!(MidiChannel, "MIDI channel", 0, 15, 0);

impl MidiChannel {
    pub fn as_byte(&self) -> u8 {
        self.0 as u8
    }
}

impl From<u8> for MidiChannel {
    /// Takes the channel from the low nibble of a status byte.
    fn from(item: u8) -> Self {
        MidiChannel((item & 0x0f) as i32)
    }
}

// Finds the first offset where the two slices differ.
// Returns None if no differences are found, or if the slices
// are different lengths, Some<usize> with the offset otherwise.
pub fn first_different_offset(v1: &[u8], v2: &[u8]) -> Option<usize> {
    if v1.len() != v2.len() {
        return None;
    }

    v1.iter().zip(v2.iter()).position(|(a, b)| a != b)
}
