//! Conversion between the unpacked voice layout (one parameter per byte)
//! and the packed layout used in 32-voice cartridge dumps.
//!
//! Unpacked voices keep their oscillators in record order, OP1 first.
//! Packed voices have them in hardware dump order, OP6 first.

use bit::BitIndex;
use log::debug;

use crate::Error;
use crate::dx7::{OSCILLATOR_COUNT, VOICE_COUNT};
use crate::dx7::sysex::check_length;

pub const OSCILLATOR_SIZE: usize = 21;
pub const PACKED_OSCILLATOR_SIZE: usize = 17;
pub const VOICE_TAIL_SIZE: usize = 29;
pub const PACKED_VOICE_TAIL_SIZE: usize = 26;
pub const VOICE_SIZE: usize = OSCILLATOR_COUNT * OSCILLATOR_SIZE + VOICE_TAIL_SIZE;  // 155
pub const PACKED_VOICE_SIZE: usize = OSCILLATOR_COUNT * PACKED_OSCILLATOR_SIZE + PACKED_VOICE_TAIL_SIZE;  // 128
pub const CARTRIDGE_SIZE: usize = VOICE_COUNT * VOICE_SIZE;
pub const PACKED_CARTRIDGE_SIZE: usize = VOICE_COUNT * PACKED_VOICE_SIZE;  // 4096

/// Packs the 21 bytes of one oscillator into 17.
pub fn pack_oscillator(data: &[u8]) -> Result<Vec<u8>, Error> {
    check_length(data, OSCILLATOR_SIZE)?;
    Ok(pack_oscillator_bytes(data))
}

fn pack_oscillator_bytes(data: &[u8]) -> Vec<u8> {
    let mut result: Vec<u8> = Vec::with_capacity(PACKED_OSCILLATOR_SIZE);

    // EG rates and levels, breakpoint, left and right depths as is.
    result.extend(&data[0..11]);

    let mut curves = 0u8;
    curves.set_bit_range(0..2, data[11] & 0b11);  // left curve
    curves.set_bit_range(2..4, data[12] & 0b11);  // right curve
    result.push(curves);

    let mut detune_rs = 0u8;
    detune_rs.set_bit_range(0..3, data[13] & 0b111);  // rate scaling
    detune_rs.set_bit_range(3..7, data[20] & 0b1111);  // detune
    result.push(detune_rs);

    let mut sens = 0u8;
    sens.set_bit_range(0..2, data[14] & 0b11);  // amp mod sensitivity
    sens.set_bit_range(2..5, data[15] & 0b111);  // key velocity
    result.push(sens);

    result.push(data[16]);  // output level

    let mut coarse_mode = 0u8;
    coarse_mode.set_bit_range(0..1, data[17] & 0b1);  // mode
    coarse_mode.set_bit_range(1..6, data[18] & 0b11111);  // coarse
    result.push(coarse_mode);

    result.push(data[19]);  // fine

    result
}

/// Unpacks the 17 bytes of one oscillator into 21. Unused bits are ignored.
pub fn unpack_oscillator(data: &[u8]) -> Result<Vec<u8>, Error> {
    check_length(data, PACKED_OSCILLATOR_SIZE)?;

    let mut result: Vec<u8> = Vec::with_capacity(OSCILLATOR_SIZE);

    result.extend(&data[0..11]);

    result.push(data[11].bit_range(0..2));  // left curve
    result.push(data[11].bit_range(2..4));  // right curve
    result.push(data[12].bit_range(0..3));  // rate scaling
    result.push(data[13].bit_range(0..2));  // amp mod sensitivity
    result.push(data[13].bit_range(2..5));  // key velocity
    result.push(data[14]);  // output level
    result.push(data[15].bit_range(0..1));  // mode
    result.push(data[15].bit_range(1..6));  // coarse
    result.push(data[16]);  // fine
    result.push(data[12].bit_range(3..7));  // detune

    Ok(result)
}

fn pack_voice_tail(data: &[u8]) -> Vec<u8> {
    let mut result: Vec<u8> = Vec::with_capacity(PACKED_VOICE_TAIL_SIZE);

    // Pitch EG rates and levels.
    result.extend(&data[0..8]);

    result.push(data[8] & 0b11111);  // algorithm

    let mut feedback_sync = 0u8;
    feedback_sync.set_bit_range(0..3, data[9] & 0b111);  // feedback
    feedback_sync.set_bit_range(3..4, data[10] & 0b1);  // oscillator key sync
    result.push(feedback_sync);

    // LFO speed, delay, PMD, AMD
    result.extend(&data[11..15]);

    let mut lfo = 0u8;
    lfo.set_bit_range(0..1, data[15] & 0b1);  // LFO key sync
    lfo.set_bit_range(1..4, data[16] & 0b111);  // LFO waveform
    lfo.set_bit_range(4..7, data[17] & 0b111);  // pitch mod sensitivity
    result.push(lfo);

    // Transpose and the ten characters of the name.
    result.extend(&data[18..29]);

    result
}

fn unpack_voice_tail(data: &[u8]) -> Vec<u8> {
    let mut result: Vec<u8> = Vec::with_capacity(VOICE_TAIL_SIZE);

    result.extend(&data[0..8]);
    result.push(data[8].bit_range(0..5));
    result.push(data[9].bit_range(0..3));
    result.push(data[9].bit_range(3..4));
    result.extend(&data[10..14]);
    result.push(data[14].bit_range(0..1));
    result.push(data[14].bit_range(1..4));
    result.push(data[14].bit_range(4..7));
    result.extend(&data[15..26]);

    result
}

/// Packs one voice (OP1...OP6 followed by the voice parameters)
/// into the 128 bytes used in a cartridge, with OP6 first.
pub fn pack_voice(data: &[u8]) -> Result<Vec<u8>, Error> {
    let voice: &[u8; VOICE_SIZE] = data.try_into()
        .map_err(|_| Error::Length { actual: data.len(), expected: VOICE_SIZE })?;
    Ok(pack_voice_data(voice))
}

/// Packs one voice whose length is already known to be right.
pub fn pack_voice_data(data: &[u8; VOICE_SIZE]) -> Vec<u8> {
    let mut result: Vec<u8> = Vec::with_capacity(PACKED_VOICE_SIZE);

    for chunk in data[..OSCILLATOR_COUNT * OSCILLATOR_SIZE].chunks(OSCILLATOR_SIZE).rev() {  // NOTE: reverse order!
        result.extend(pack_oscillator_bytes(chunk));
    }
    result.extend(pack_voice_tail(&data[OSCILLATOR_COUNT * OSCILLATOR_SIZE..]));

    result
}

/// Unpacks a 128-byte voice from a cartridge, putting OP1 first.
pub fn unpack_voice(data: &[u8]) -> Result<Vec<u8>, Error> {
    check_length(data, PACKED_VOICE_SIZE)?;

    let mut result: Vec<u8> = Vec::with_capacity(VOICE_SIZE);

    let oscillators = &data[..OSCILLATOR_COUNT * PACKED_OSCILLATOR_SIZE];
    for chunk in oscillators.chunks(PACKED_OSCILLATOR_SIZE).rev() {  // NOTE: reverse order!
        result.extend(unpack_oscillator(chunk)?);
    }
    result.extend(unpack_voice_tail(&data[OSCILLATOR_COUNT * PACKED_OSCILLATOR_SIZE..]));

    Ok(result)
}

/// Packs 32 unpacked voices into the 4096-byte cartridge payload.
pub fn pack_cartridge(data: &[u8]) -> Result<Vec<u8>, Error> {
    check_length(data, CARTRIDGE_SIZE)?;

    let mut result: Vec<u8> = Vec::with_capacity(PACKED_CARTRIDGE_SIZE);
    for (index, voice) in data.chunks(VOICE_SIZE).enumerate() {
        let packed = pack_voice(voice)?;
        debug!("voice #{} packed into {} bytes", index, packed.len());
        result.extend(packed);
    }
    Ok(result)
}

/// Unpacks the 4096-byte cartridge payload into 32 voices of 155 bytes.
pub fn unpack_cartridge(data: &[u8]) -> Result<Vec<u8>, Error> {
    check_length(data, PACKED_CARTRIDGE_SIZE)?;

    let mut result: Vec<u8> = Vec::with_capacity(CARTRIDGE_SIZE);
    for (index, packed) in data.chunks(PACKED_VOICE_SIZE).enumerate() {
        let voice = unpack_voice(packed)?;
        debug!("voice #{} unpacked into {} bytes", index, voice.len());
        result.extend(voice);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dx7::first_different_offset;

    // OP6 of "BRASS 1" from the DX7 ROM1A cartridge, unpacked.
    fn brass1_op6() -> Vec<u8> {
        vec![
            49, 99, 28, 68, 98, 98, 91, 0,  // EG
            39, 54, 50,  // breakpoint C3, depths
            1, 1,  // -EXP curves
            4, 0, 2,  // rate scaling, AMS, key velocity
            82, 0, 1, 0, 7,  // output level, mode, coarse, fine, detune
        ]
    }

    fn sample_voice() -> Vec<u8> {
        let mut data = Vec::new();
        for op in 1..=6u8 {
            let mut osc = brass1_op6();
            osc[8] = op;  // tell the oscillators apart
            data.extend(osc);
        }
        data.extend([
            84, 95, 95, 60, 50, 50, 50, 50,  // pitch EG
            21, 7, 1,  // algorithm 22, feedback, sync
            37, 0, 5, 0, 0, 4, 3, 24,  // LFO, PMS, transpose
        ]);
        data.extend(b"BRASS   1 ");
        data
    }

    #[test]
    fn test_pack_oscillator() {
        let packed = pack_oscillator(&brass1_op6()).unwrap();
        let expected = vec![
            0x31u8, 0x63, 0x1c, 0x44, 0x62, 0x62, 0x5b, 0x00,
            0x27, 0x36, 0x32, 0x05, 0x3c, 0x08, 0x52, 0x02, 0x00];

        if let Some(offset) = first_different_offset(&expected, &packed) {
            println!("Expected = {}, actual = {} at offset {}", expected[offset], packed[offset], offset);
        }
        assert_eq!(packed, expected);
    }

    #[test]
    fn test_pack_rate_and_detune() {
        let mut data = vec![0u8; OSCILLATOR_SIZE];
        data[0] = 99;
        data[20] = 14;
        let packed = pack_oscillator(&data).unwrap();
        assert_eq!(packed, vec![99, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 14 << 3, 0, 0, 0, 0]);
        assert_eq!(packed[12], 0x70);
    }

    #[test]
    fn test_unpack_oscillator_ignores_padding() {
        let mut packed = pack_oscillator(&brass1_op6()).unwrap();
        packed[11] |= 0b1111_0000;
        packed[15] |= 0b1100_0000;
        assert_eq!(unpack_oscillator(&packed).unwrap(), brass1_op6());
    }

    #[test]
    fn test_oscillator_round_trip() {
        let data = brass1_op6();
        assert_eq!(unpack_oscillator(&pack_oscillator(&data).unwrap()).unwrap(), data);
    }

    #[test]
    fn test_voice_packed_length() {
        assert_eq!(pack_voice(&sample_voice()).unwrap().len(), 128);
    }

    #[test]
    fn test_voice_oscillator_order() {
        let packed = pack_voice(&sample_voice()).unwrap();
        // OP6 comes first in the packed data, OP1 last.
        assert_eq!(packed[8], 6);
        assert_eq!(packed[5 * PACKED_OSCILLATOR_SIZE + 8], 1);
    }

    #[test]
    fn test_voice_tail_bits() {
        let packed = pack_voice(&sample_voice()).unwrap();
        let tail = &packed[102..];
        assert_eq!(tail[8], 21);
        assert_eq!(tail[9], 0x0f);  // feedback 7 + sync
        assert_eq!(tail[14], 0b0011_1000);  // no sync, sine, PMS 3
        assert_eq!(tail[15], 24);
        assert_eq!(&tail[16..], b"BRASS   1 ");
    }

    #[test]
    fn test_voice_round_trip() {
        let data = sample_voice();
        let packed = pack_voice(&data).unwrap();
        assert_eq!(unpack_voice(&packed).unwrap(), data);
        assert_eq!(pack_voice(&unpack_voice(&packed).unwrap()).unwrap(), packed);
    }

    #[test]
    fn test_voice_round_trip_extremes() {
        let mut data = Vec::new();
        for _ in 0..6 {
            data.extend([99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 3, 3, 7, 3, 7, 99, 1, 31, 99, 14]);
        }
        data.extend([99, 99, 99, 99, 99, 99, 99, 99, 31, 7, 1, 99, 99, 99, 99, 1, 5, 7, 48]);
        data.extend(b"~~~~~~~~~~");
        assert_eq!(unpack_voice(&pack_voice(&data).unwrap()).unwrap(), data);
    }

    #[test]
    fn test_cartridge_round_trip() {
        let mut data = Vec::new();
        for _ in 0..VOICE_COUNT {
            data.extend(sample_voice());
        }
        let packed = pack_cartridge(&data).unwrap();
        assert_eq!(packed.len(), 4096);
        assert_eq!(unpack_cartridge(&packed).unwrap(), data);
    }

    #[test]
    fn test_wrong_lengths() {
        assert!(matches!(pack_oscillator(&[0; 20]), Err(Error::Length { actual: 20, expected: 21 })));
        assert!(matches!(unpack_oscillator(&[0; 21]), Err(Error::Length { .. })));
        assert!(matches!(pack_voice(&[0; 128]), Err(Error::Length { expected: 155, .. })));
        assert!(matches!(unpack_voice(&[0; 155]), Err(Error::Length { expected: 128, .. })));
        assert!(pack_cartridge(&[0; 4096]).is_err());
        assert!(unpack_cartridge(&[0; 4095]).is_err());
    }
}
