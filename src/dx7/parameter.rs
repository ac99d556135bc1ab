//! Table-driven parameter records.
//!
//! Every record (oscillator, voice, function) is a fixed run of bytes.
//! A static table of [`Field`] descriptors maps each parameter name to its
//! byte offset and valid range, and the same table drives the validated
//! setters, the raw byte view and the MIDI address lookup.

use std::fmt;
use log::warn;

use crate::Error;
use crate::dx7::MidiChannel;
use crate::dx7::sysex::{self, ParameterValue};
use crate::dx7::transport::Transport;

/// How the bytes of a field are interpreted.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FieldKind {
    Value,  // one byte, range checked
    Text,  // ASCII, space padded
    Derived,  // computed from other state, read-only
}

/// Descriptor of one parameter.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,  // from the start of the record
    pub size: usize,
    pub first: i32,
    pub last: i32,
    pub kind: FieldKind,
}

impl Field {
    pub const fn value(name: &'static str, offset: usize, first: i32, last: i32) -> Self {
        Field { name, offset, size: 1, first, last, kind: FieldKind::Value }
    }

    pub const fn text(name: &'static str, offset: usize, size: usize) -> Self {
        Field { name, offset, size, first: 0x20, last: 0x7e, kind: FieldKind::Text }
    }

    pub const fn derived(name: &'static str, offset: usize, first: i32, last: i32) -> Self {
        Field { name, offset, size: 1, first, last, kind: FieldKind::Derived }
    }

    pub fn contains(&self, value: i32) -> bool {
        value >= self.first && value <= self.last
    }

    fn check(&self, value: i32) -> Result<(), Error> {
        if self.contains(value) {
            Ok(())
        }
        else {
            Err(Error::Range { name: self.name, value, first: self.first, last: self.last })
        }
    }
}

/// Reference to a field, either by name or by its byte offset in the record.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FieldRef<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for FieldRef<'a> {
    fn from(name: &'a str) -> Self {
        FieldRef::Name(name)
    }
}

impl From<usize> for FieldRef<'_> {
    fn from(index: usize) -> Self {
        FieldRef::Index(index)
    }
}

impl fmt::Display for FieldRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldRef::Name(name) => write!(f, "{}", name),
            FieldRef::Index(index) => write!(f, "#{}", index),
        }
    }
}

// Generates a parameter enum together with its descriptor table.
// The variants must be listed in the same order as the table entries.
macro_rules! parameter_table {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $field:expr,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// Descriptors of all the parameters, in address order.
            pub const FIELDS: &'static [$crate::dx7::parameter::Field] = &[
                $($field,)+
            ];

            pub const ALL: &'static [$name] = &[
                $($name::$variant,)+
            ];

            pub fn field(self) -> &'static $crate::dx7::parameter::Field {
                &Self::FIELDS[self as usize]
            }

            pub fn name(self) -> &'static str {
                self.field().name
            }
        }

        impl From<$name> for $crate::dx7::parameter::FieldRef<'static> {
            fn from(parameter: $name) -> Self {
                $crate::dx7::parameter::FieldRef::Index(parameter.field().offset)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.name())
            }
        }
    };
}

pub(crate) use parameter_table;

/// A fixed-layout record of synthesizer parameters.
pub trait ParameterRecord {
    /// Descriptors of the record's parameters.
    const FIELDS: &'static [Field];

    /// Function parameters are flagged in parameter change messages.
    const FUNCTION: bool = false;

    /// Address of the byte at offset zero.
    fn base_address(&self) -> u16;

    fn data(&self) -> &[u8];
    fn data_mut(&mut self) -> &mut [u8];

    /// Value of a derived parameter. Records without any need not override this.
    fn derived_value(&self, field: &Field) -> Result<i32, Error> {
        Err(Error::NotFound(field.name.to_string()))
    }

    /// Finds the descriptor of a field by name or by offset.
    fn lookup<'a, K: Into<FieldRef<'a>>>(key: K) -> Result<&'static Field, Error> {
        let key = key.into();
        let found = match key {
            FieldRef::Name(name) => Self::FIELDS.iter().find(|f| f.name.eq_ignore_ascii_case(name)),
            FieldRef::Index(index) => Self::FIELDS.iter().find(|f| f.offset == index),
        };
        found.ok_or_else(|| Error::NotFound(key.to_string()))
    }

    fn get<'a, K: Into<FieldRef<'a>>>(&self, key: K) -> Result<i32, Error> {
        let field = Self::lookup(key)?;
        match field.kind {
            FieldKind::Value => Ok(self.data()[field.offset] as i32),
            FieldKind::Text => Err(Error::Length { actual: 1, expected: field.size }),
            FieldKind::Derived => self.derived_value(field),
        }
    }

    /// Sets a parameter, rejecting values outside of its range.
    fn set<'a, K: Into<FieldRef<'a>>>(&mut self, key: K, value: i32) -> Result<(), Error> {
        let field = Self::lookup(key)?;
        match field.kind {
            FieldKind::Value => {
                field.check(value)?;
                self.data_mut()[field.offset] = value as u8;
                Ok(())
            },
            FieldKind::Text => Err(Error::Length { actual: 1, expected: field.size }),
            FieldKind::Derived => Err(Error::ReadOnly(field.name)),
        }
    }

    /// Gets the absolute MIDI parameter address of a field.
    fn address_of<'a, K: Into<FieldRef<'a>>>(&self, key: K) -> Result<u16, Error> {
        let field = Self::lookup(key)?;
        Ok(self.base_address() + field.offset as u16)
    }

    /// Reads one byte of the record without regard to the field layout.
    fn raw(&self, index: usize) -> Result<u8, Error> {
        self.data()
            .get(index)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("byte index {}", index)))
    }

    /// Writes one byte of the record. The value is not range checked,
    /// only reduced to a byte as `abs(value) & 0xFF`.
    fn set_raw(&mut self, index: usize, value: i32) -> Result<(), Error> {
        let byte = (value.unsigned_abs() & 0xff) as u8;
        match self.data_mut().get_mut(index) {
            Some(b) => {
                if value.unsigned_abs() > 0x7f {
                    warn!("raw value {} at index {} is outside 0...127, stored as {}", value, index, byte);
                }
                *b = byte;
                Ok(())
            },
            None => Err(Error::NotFound(format!("byte index {}", index))),
        }
    }

    /// Builds the parameter change messages carrying the current value of a field.
    fn parameter_messages<'a, K: Into<FieldRef<'a>>>(&self, key: K, channel: MidiChannel) -> Result<Vec<Vec<u8>>, Error> {
        let field = Self::lookup(key)?;
        let address = self.base_address() + field.offset as u16;
        let value = match field.kind {
            FieldKind::Text => ParameterValue::Bytes(&self.data()[field.offset..field.offset + field.size]),
            FieldKind::Value => ParameterValue::Byte(self.data()[field.offset] as i32),
            FieldKind::Derived => ParameterValue::Byte(self.derived_value(field)?),
        };
        sysex::parameter_change(channel, address, value, Self::FUNCTION)
    }

    /// Sends the current value of a field to the synth.
    fn send_parameter<'a, K, T>(&self, port: &mut T, key: K, channel: MidiChannel) -> Result<(), Error>
    where
        K: Into<FieldRef<'a>>,
        T: Transport + ?Sized,
    {
        for message in self.parameter_messages(key, channel)? {
            port.send(&message)?;
        }
        Ok(())
    }
}
