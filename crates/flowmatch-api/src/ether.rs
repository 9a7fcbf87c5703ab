// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Link-layer header values.

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const ETHER_TYPE_ARP: u16 = 0x0806;

/// A 12-bit IEEE 802.1Q VLAN identifier.
///
/// The value zero is reserved by 802.1Q to mean "no VLAN": the frame
/// is either untagged or priority-tagged only. See [`VlanId::NONE`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    /// The "no VLAN" sentinel.
    pub const NONE: Self = Self(0);
    pub const MAX: u16 = 4095;

    pub fn new(vid: u16) -> Result<Self, String> {
        if vid > Self::MAX {
            return Err(format!("bad VLAN ID: {vid}"));
        }

        Ok(Self(vid))
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    pub fn val(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for VlanId {
    type Error = String;

    fn try_from(vid: u16) -> Result<Self, Self::Error> {
        Self::new(vid)
    }
}

impl From<VlanId> for u16 {
    fn from(vid: VlanId) -> u16 {
        vid.0
    }
}

impl Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 3-bit IEEE 802.1p priority code point.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct VlanPcp(u8);

impl VlanPcp {
    pub const MAX: u8 = 7;

    pub fn new(pcp: u8) -> Result<Self, String> {
        if pcp > Self::MAX {
            return Err(format!("bad VLAN priority: {pcp}"));
        }

        Ok(Self(pcp))
    }

    pub fn val(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for VlanPcp {
    type Error = String;

    fn try_from(pcp: u8) -> Result<Self, Self::Error> {
        Self::new(pcp)
    }
}

impl From<VlanPcp> for u8 {
    fn from(pcp: VlanPcp) -> u8 {
        pcp.0
    }
}

impl Display for VlanPcp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
