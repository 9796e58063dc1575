//! CSI parameter accumulation
//!
//! Turns a run of digit and `;` code points into an ordered list of optional
//! integers. An explicitly empty slot (`1;;3`) is kept apart from an explicit
//! zero so that every command can apply its own default.

use std::collections::VecDeque;
use std::fmt;

/// Parameter list for one escape sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamAccumulator {
    slots: VecDeque<Option<u16>>,
    current: Option<u16>,
}

impl ParamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new sequence
    pub fn start(&mut self) {
        self.slots.clear();
        self.current = None;
    }

    /// Feed one code point.
    ///
    /// Returns `Some(ch)` with the terminating code point once a byte other
    /// than a digit or `;` arrives; the final slot is closed at that point.
    pub fn feed(&mut self, ch: char) -> Option<char> {
        match ch {
            '0'..='9' => {
                let digit = ch as u16 - '0' as u16;
                self.current = Some(
                    self.current
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
                None
            }
            ';' => {
                self.slots.push_back(self.current.take());
                None
            }
            _ => {
                self.slots.push_back(self.current.take());
                Some(ch)
            }
        }
    }

    /// Parameter at `index`, or `default` when missing or empty. Does not consume.
    pub fn get_or(&self, index: usize, default: u16) -> u16 {
        self.slots.get(index).copied().flatten().unwrap_or(default)
    }

    /// Remove the first slot. `None` if it was empty or nothing is left.
    pub fn pop(&mut self) -> Option<u16> {
        self.slots.pop_front().flatten()
    }

    /// Remove the first slot, substituting `default` when missing or empty.
    pub fn pop_or(&mut self, default: u16) -> u16 {
        self.pop().unwrap_or(default)
    }

    pub fn has_remaining(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Slots not yet consumed, in order
    pub fn remaining(&self) -> Vec<Option<u16>> {
        self.slots.iter().copied().collect()
    }
}

/// Canonical form: empty slots render as nothing between semicolons.
impl fmt::Display for ParamAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            if let Some(value) = slot {
                write!(f, "{}", value)?;
            }
        }
        Ok(())
    }
}
