// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use super::error::MatchError;
use super::error::MatchResult;
use core::fmt;
use core::fmt::Display;
use core::ops::RangeInclusive;

/// An inclusive range of transport ports, `from <= to`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PortRange {
    from: u16,
    to: u16,
}

impl PortRange {
    pub fn new(from: u16, to: u16) -> MatchResult<Self> {
        if from > to {
            return Err(MatchError::Validation(format!(
                "bad port range: {from}-{to}"
            )));
        }

        Ok(Self { from, to })
    }

    pub const fn single(port: u16) -> Self {
        Self { from: port, to: port }
    }

    /// Build a range from wider integers, as found in user input.
    pub fn from_raw(from: u32, to: Option<u32>) -> MatchResult<Self> {
        let conv = |p: u32| {
            u16::try_from(p).map_err(|_| {
                MatchError::Validation(format!("bad port: {p}"))
            })
        };
        let from = conv(from)?;
        let to = match to {
            Some(to) => conv(to)?,
            None => from,
        };
        Self::new(from, to)
    }

    pub fn port_from(&self) -> u16 {
        self.from
    }

    pub fn port_to(&self) -> u16 {
        self.to
    }

    pub fn is_single(&self) -> bool {
        self.from == self.to
    }

    pub fn contains(&self, port: u16) -> bool {
        self.from <= port && port <= self.to
    }
}

impl From<u16> for PortRange {
    fn from(port: u16) -> Self {
        Self::single(port)
    }
}

impl TryFrom<RangeInclusive<u16>> for PortRange {
    type Error = MatchError;

    fn try_from(range: RangeInclusive<u16>) -> MatchResult<Self> {
        Self::new(*range.start(), *range.end())
    }
}

/// The condition-key rendering: `n` for a single port, `n-m`
/// otherwise.
impl Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}
