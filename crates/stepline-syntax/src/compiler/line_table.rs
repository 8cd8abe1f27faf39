//! Compact address to line mapping.
//!
//! A table is a run of `(address_delta, line_delta)` steps relative to the
//! unit's first line and address zero. A step is recorded each time an
//! instruction lands on a different line than the previous one. Deltas that
//! do not fit a byte are split over several steps: the address first, in
//! `(255, 0)` chunks, then the line in `(0, ±127)` chunks.

use std::fmt;

/// Bytes per instruction.
pub const INSTRUCTION_SIZE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStep {
    pub address_delta: u8,
    pub line_delta: i8,
}

impl fmt::Display for LineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:+}", self.address_delta, self.line_delta)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineTable {
    steps: Vec<LineStep>,
}

impl LineTable {
    #[must_use]
    pub fn steps(&self) -> &[LineStep] {
        &self.steps
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Absolute `(address, line)` pairs reached by each step.
    pub fn entries(&self, first_line: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.steps
            .iter()
            .scan((0u32, i64::from(first_line)), |(address, line), step| {
                *address += u32::from(step.address_delta);
                *line += i64::from(step.line_delta);
                Some((*address, u32::try_from(*line).unwrap_or(0)))
            })
    }
}

/// Records instructions and produces a [`LineTable`].
#[derive(Debug)]
pub struct LineTableBuilder {
    steps: Vec<LineStep>,
    last_line: u32,
    last_address: u32,
    address: u32,
}

impl LineTableBuilder {
    #[must_use]
    pub fn new(first_line: u32) -> Self {
        Self {
            steps: Vec::new(),
            last_line: first_line,
            last_address: 0,
            address: 0,
        }
    }

    /// Line of the most recently emitted instruction.
    #[must_use]
    pub fn current_line(&self) -> u32 {
        self.last_line
    }

    /// Emit `count` instructions attributed to `line`.
    pub fn emit(&mut self, line: u32, count: u32) {
        if count == 0 {
            return;
        }
        if line != self.last_line {
            let address_delta = self.address - self.last_address;
            let line_delta = i64::from(line) - i64::from(self.last_line);
            self.push_steps(address_delta, line_delta);
            self.last_line = line;
            self.last_address = self.address;
        }
        self.address += count * INSTRUCTION_SIZE;
    }

    /// Emit at the current line without starting a new line entry.
    pub fn emit_here(&mut self, count: u32) {
        self.address += count * INSTRUCTION_SIZE;
    }

    fn push_steps(&mut self, mut address_delta: u32, mut line_delta: i64) {
        while address_delta > u32::from(u8::MAX) {
            self.steps.push(LineStep {
                address_delta: u8::MAX,
                line_delta: 0,
            });
            address_delta -= u32::from(u8::MAX);
        }
        let mut address_part = address_delta as u8;
        while line_delta > i64::from(i8::MAX) {
            self.steps.push(LineStep {
                address_delta: address_part,
                line_delta: i8::MAX,
            });
            address_part = 0;
            line_delta -= i64::from(i8::MAX);
        }
        while line_delta < i64::from(i8::MIN) {
            self.steps.push(LineStep {
                address_delta: address_part,
                line_delta: i8::MIN,
            });
            address_part = 0;
            line_delta -= i64::from(i8::MIN);
        }
        self.steps.push(LineStep {
            address_delta: address_part,
            line_delta: line_delta as i8,
        });
    }

    #[must_use]
    pub fn finish(self) -> LineTable {
        LineTable { steps: self.steps }
    }
}
