use std::{
    fmt::Display,
    ops::{Add, AddAssign, Deref},
};

/// A packet sequence number, wrapping back to 0 past 255.
///
/// One sequence value associates a request with its response; the dispatcher
/// allows a single request in flight, so the full 8 bit space is only a
/// correlation id, not a window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceNumber(u8);

impl SequenceNumber {
    pub fn new(value: u8) -> SequenceNumber {
        SequenceNumber(value)
    }

    pub fn zero() -> SequenceNumber {
        SequenceNumber(0)
    }
}

impl Deref for SequenceNumber {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<SequenceNumber> for u8 {
    fn from(val: SequenceNumber) -> Self {
        val.0
    }
}

impl From<u8> for SequenceNumber {
    fn from(value: u8) -> Self {
        SequenceNumber(value)
    }
}

impl Add<u8> for SequenceNumber {
    type Output = SequenceNumber;

    fn add(self, rhs: u8) -> Self::Output {
        SequenceNumber(self.0.wrapping_add(rhs))
    }
}

impl AddAssign<u8> for SequenceNumber {
    fn add_assign(&mut self, rhs: u8) {
        self.0 = self.0.wrapping_add(rhs);
    }
}

impl Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}
