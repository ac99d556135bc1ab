use std::fmt;
use log::debug;
use rand::Rng;

use crate::Error;

use crate::dx7::{MidiChannel, FUNCTION_BASE_ADDRESS};
use crate::dx7::parameter::{
    parameter_table,
    Field,
    ParameterRecord,
};
use crate::dx7::sysex::{check_length, SystemExclusiveData};
use crate::dx7::transport::Transport;

const FUNCTION_SIZE: usize = 14;

parameter_table! {
    /// Function parameters, in address order starting from 64.
    FunctionParameter {
        MonoPoly => Field::value("Mono_Poly", 0, 0, 1),
        PitchBendRange => Field::value("Pitch_Bend_Range", 1, 0, 12),
        PitchBendStep => Field::value("Pitch_Bend_Step", 2, 0, 12),
        PortamentoMode => Field::value("Portamento_Mode", 3, 0, 1),  // retain, follow
        PortamentoGliss => Field::value("Portamento_Gliss", 4, 0, 1),
        PortamentoTime => Field::value("Portamento_Time", 5, 0, 99),
        ModWheelRange => Field::value("Mod_Wheel_Range", 6, 0, 99),
        ModWheelAssign => Field::value("Mod_Wheel_Assign", 7, 0, 7),  // pitch, amp, EG bias
        FootControlRange => Field::value("Foot_Control_Range", 8, 0, 99),
        FootControlAssign => Field::value("Foot_Control_Assign", 9, 0, 7),
        BreathControlRange => Field::value("Breath_Control_Range", 10, 0, 99),
        BreathControlAssign => Field::value("Breath_Control_Assign", 11, 0, 7),
        AftertouchRange => Field::value("Aftertouch_Range", 12, 0, 99),
        AftertouchAssign => Field::value("Aftertouch_Assign", 13, 0, 7),
    }
}

/// Global settings of the synth, not stored with any voice.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct Function {
    data: [u8; FUNCTION_SIZE],
}

impl Function {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn random() -> Self {
        let mut function = Function::new();
        let mut rng = rand::rng();
        for field in FunctionParameter::FIELDS {
            function.data[field.offset] = rng.random_range(field.first..=field.last) as u8;
        }
        function
    }

    /// Sends every function parameter to the synth.
    pub fn send<T: Transport + ?Sized>(&self, port: &mut T, channel: MidiChannel) -> Result<(), Error> {
        for parameter in FunctionParameter::ALL {
            self.send_parameter(port, *parameter, channel)?;
        }
        debug!("sent {} function parameters", FunctionParameter::ALL.len());
        Ok(())
    }
}

impl ParameterRecord for Function {
    const FIELDS: &'static [Field] = FunctionParameter::FIELDS;
    const FUNCTION: bool = true;

    fn base_address(&self) -> u16 {
        FUNCTION_BASE_ADDRESS
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl SystemExclusiveData for Function {
    fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        check_length(data, Self::DATA_SIZE)?;
        let mut function = Function::new();
        function.data.copy_from_slice(data);
        Ok(function)
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    const DATA_SIZE: usize = FUNCTION_SIZE;
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, field) in FunctionParameter::FIELDS.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", field.name, self.data[field.offset])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dx7::transport::MessageLog;

    #[test]
    fn test_addresses() {
        let function = Function::new();
        assert_eq!(function.address_of(FunctionParameter::MonoPoly).unwrap(), 64);
        assert_eq!(function.address_of("Aftertouch_Assign").unwrap(), 77);

        let mut addresses: Vec<u16> = FunctionParameter::ALL.iter()
            .map(|p| function.address_of(*p).unwrap())
            .collect();
        addresses.dedup();
        assert_eq!(addresses, (64..=77).collect::<Vec<u16>>());
    }

    #[test]
    fn test_every_field_range() {
        let mut function = Function::new();
        for parameter in FunctionParameter::ALL {
            let field = parameter.field();
            assert!(function.set(*parameter, field.first).is_ok());
            assert!(function.set(*parameter, field.last).is_ok());
            assert!(matches!(function.set(*parameter, field.first - 1), Err(Error::Range { .. })));
            assert!(matches!(function.set(*parameter, field.last + 1), Err(Error::Range { .. })));
        }
    }

    #[test]
    fn test_function_flag_in_messages() {
        let mut function = Function::new();
        function.set(FunctionParameter::PitchBendRange, 12).unwrap();
        let messages = function.parameter_messages(FunctionParameter::PitchBendRange, MidiChannel::default()).unwrap();
        assert_eq!(messages, vec![vec![0xf0, 0x43, 0x10, 0x08, 65, 12, 0xf7]]);
    }

    #[test]
    fn test_send_all() {
        let function = Function::random();
        let mut port = MessageLog::new();
        function.send(&mut port, MidiChannel::default()).unwrap();
        assert_eq!(port.messages().len(), 14);
        assert_eq!(port.messages()[13][4], 77);
        assert!(port.messages().iter().all(|m| m[3] == 0x08));
    }

    #[test]
    fn test_display() {
        let function = Function::new();
        assert!(function.to_string().starts_with("Mono_Poly = 0, Pitch_Bend_Range = 0"));
    }
}
