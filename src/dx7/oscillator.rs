use std::fmt;
use rand::Rng;

use crate::Error;

use crate::dx7::OSCILLATOR_COUNT;
use crate::dx7::packing::OSCILLATOR_SIZE;
use crate::dx7::parameter::{
    parameter_table,
    Field,
    ParameterRecord,
};
use crate::dx7::sysex::{check_length, SystemExclusiveData};

parameter_table! {
    /// Oscillator (operator) parameters, in address order.
    OscillatorParameter {
        EgRate1 => Field::value("EG_RATE_1", 0, 0, 99),
        EgRate2 => Field::value("EG_RATE_2", 1, 0, 99),
        EgRate3 => Field::value("EG_RATE_3", 2, 0, 99),
        EgRate4 => Field::value("EG_RATE_4", 3, 0, 99),
        EgLevel1 => Field::value("EG_LEVEL_1", 4, 0, 99),
        EgLevel2 => Field::value("EG_LEVEL_2", 5, 0, 99),
        EgLevel3 => Field::value("EG_LEVEL_3", 6, 0, 99),
        EgLevel4 => Field::value("EG_LEVEL_4", 7, 0, 99),
        Breakpoint => Field::value("Breakpoint", 8, 0, 99),  // A-1 ~ C8
        LeftDepth => Field::value("Left_Depth", 9, 0, 99),
        RightDepth => Field::value("Right_Depth", 10, 0, 99),
        LeftCurve => Field::value("Left_Curve", 11, 0, 3),  // -LIN, -EXP, +EXP, +LIN
        RightCurve => Field::value("Right_Curve", 12, 0, 3),
        RateScaling => Field::value("Rate_Scaling", 13, 0, 7),
        AmpModSensitivity => Field::value("Amp_Mod_Sensitivity", 14, 0, 3),
        KeyVelocity => Field::value("Key_Velocity", 15, 0, 7),
        OutputLevel => Field::value("Output_Level", 16, 0, 99),
        OscillatorMode => Field::value("Oscillator_Mode", 17, 0, 1),  // ratio, fixed
        FrequencyCoarse => Field::value("Frequency_Coarse", 18, 0, 31),
        FrequencyFine => Field::value("Frequency_Fine", 19, 0, 99),
        Detune => Field::value("Detune", 20, 0, 14),  // 7 is center
    }
}

/// One of the six oscillators of a voice.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Oscillator {
    number: usize,  // 1...6
    data: [u8; OSCILLATOR_SIZE],
    /// Whether the oscillator is switched on. Not part of the voice data,
    /// only of the voice's `ActiveOscillators` mask.
    pub active: bool,
}

fn check_number(number: usize) -> Result<(), Error> {
    if (1..=OSCILLATOR_COUNT).contains(&number) {
        Ok(())
    }
    else {
        Err(Error::Range { name: "oscillator number", value: number as i32, first: 1, last: OSCILLATOR_COUNT as i32 })
    }
}

impl Oscillator {
    /// Creates a new oscillator with all parameters at zero.
    pub fn new(number: usize) -> Result<Self, Error> {
        check_number(number)?;
        Ok(Self { number, data: [0; OSCILLATOR_SIZE], active: true })
    }

    /// Makes a new oscillator with every parameter set to a random valid value.
    pub fn random(number: usize) -> Result<Self, Error> {
        let mut osc = Oscillator::new(number)?;
        let mut rng = rand::rng();
        for field in OscillatorParameter::FIELDS {
            osc.data[field.offset] = rng.random_range(field.first..=field.last) as u8;
        }
        Ok(osc)
    }

    pub fn number(&self) -> usize {
        self.number
    }

    // Only the owning voice renumbers its oscillators.
    pub(crate) fn stamp(&mut self, number: usize) {
        self.number = number;
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self { number: 1, data: [0; OSCILLATOR_SIZE], active: true }
    }
}

impl ParameterRecord for Oscillator {
    const FIELDS: &'static [Field] = OscillatorParameter::FIELDS;

    /// OP6 is at address 0, OP1 at 105.
    fn base_address(&self) -> u16 {
        (OSCILLATOR_SIZE * (OSCILLATOR_COUNT - self.number)) as u16
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl SystemExclusiveData for Oscillator {
    /// Makes an oscillator from its 21 unpacked bytes.
    /// The result is numbered 1 until it is placed into a voice.
    fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        check_length(data, Self::DATA_SIZE)?;
        let mut osc = Oscillator::default();
        osc.data.copy_from_slice(data);
        Ok(osc)
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    const DATA_SIZE: usize = OSCILLATOR_SIZE;
}

impl fmt::Display for Oscillator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let d = &self.data;
        write!(f, "OP{}{}
EG: R1={} R2={} R3={} R4={} L1={} L2={} L3={} L4={}
Kbd level scaling: breakpoint = {}, left = {}/{}, right = {}/{}, rate scaling = {}
Amp mod sens = {}, Key vel sens = {}
Level = {}, Mode = {}
Coarse = {}, Fine = {}, Detune = {}
",
            self.number, if self.active { "" } else { " (off)" },
            d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7],
            d[8], d[9], d[11], d[10], d[12], d[13],
            d[14], d[15],
            d[16], if d[17] == 1 { "fixed" } else { "ratio" },
            d[18], d[19], d[20] as i32 - 7)
    }
}

#[cfg(test)]
mod tests {
    // Note this useful idiom: importing names from outer (for mod tests) scope.
    use super::*;
    use crate::dx7::packing::pack_oscillator;
    use crate::dx7::parameter::FieldKind;

    #[test]
    fn test_new_is_zeroed() {
        let osc = Oscillator::new(3).unwrap();
        assert_eq!(osc.number(), 3);
        assert!(osc.to_bytes().iter().all(|b| *b == 0));
        assert!(osc.active);
        assert!(Oscillator::new(0).is_err());
        assert!(Oscillator::new(7).is_err());
    }

    #[test]
    fn test_field_count() {
        assert_eq!(OscillatorParameter::FIELDS.len(), 21);
        assert!(OscillatorParameter::FIELDS.iter().all(|f| f.kind == FieldKind::Value));
    }

    #[test]
    fn test_every_field_range() {
        let mut osc = Oscillator::default();
        for parameter in OscillatorParameter::ALL {
            let field = parameter.field();
            assert!(osc.set(*parameter, field.first).is_ok());
            assert!(osc.set(*parameter, field.last).is_ok());
            assert_eq!(osc.get(*parameter).unwrap(), field.last);
            assert!(matches!(osc.set(*parameter, field.first - 1), Err(Error::Range { .. })));
            assert!(matches!(osc.set(*parameter, field.last + 1), Err(Error::Range { .. })));
        }
    }

    #[test]
    fn test_set_by_name() {
        let mut osc = Oscillator::default();
        osc.set("Frequency_Coarse", 31).unwrap();
        assert_eq!(osc.get(OscillatorParameter::FrequencyCoarse).unwrap(), 31);
        assert_eq!(osc.get(18usize).unwrap(), 31);
        assert!(matches!(osc.set("Frequency_Coarser", 1), Err(Error::NotFound(_))));
        assert!(matches!(osc.get(21usize), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_address_of() {
        let op1 = Oscillator::new(1).unwrap();
        assert_eq!(op1.address_of("Oscillator_Mode").unwrap(), 122);

        let op6 = Oscillator::new(6).unwrap();
        assert_eq!(op6.address_of(OscillatorParameter::EgRate1).unwrap(), 0);
        assert_eq!(op6.address_of(OscillatorParameter::Detune).unwrap(), 20);
    }

    #[test]
    fn test_raw_bypasses_range() {
        let mut osc = Oscillator::default();
        osc.set_raw(20, 120).unwrap();
        assert_eq!(osc.get(OscillatorParameter::Detune).unwrap(), 120);
        osc.set_raw(0, -99).unwrap();
        assert_eq!(osc.raw(0).unwrap(), 99);
        assert!(osc.set_raw(21, 0).is_err());
    }

    #[test]
    fn test_pack_rate_and_detune() {
        let mut osc = Oscillator::default();
        osc.set(OscillatorParameter::EgRate1, 99).unwrap();
        osc.set(OscillatorParameter::Detune, 14).unwrap();
        let packed = pack_oscillator(&osc.to_bytes()).unwrap();
        assert_eq!(packed, vec![99, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x70, 0, 0, 0, 0]);
    }

    #[test]
    fn test_random_in_range() {
        let osc = Oscillator::random(2).unwrap();
        for field in OscillatorParameter::FIELDS {
            assert!(field.contains(osc.get(field.name).unwrap()));
        }
    }

    #[test]
    fn test_from_bytes() {
        let data: Vec<u8> = (0..21).collect();
        let osc = Oscillator::from_bytes(&data).unwrap();
        assert_eq!(osc.to_bytes(), data);
        assert!(Oscillator::from_bytes(&data[1..]).is_err());
    }
}
