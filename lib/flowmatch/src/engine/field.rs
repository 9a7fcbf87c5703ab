// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The registry of match fields.

use alloc::string::String;
use bitflags::bitflags;
use core::fmt;
use core::fmt::Display;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

/// A packet header field that a flow-table entry can match on.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum MatchField {
    InPort,
    DlSrc,
    DlDst,
    DlType,
    DlVlan,
    DlVlanPcp,
    IpSrc,
    IpDst,
    IpProto,
    IpDscp,
    TcpSrc,
    TcpDst,
    UdpSrc,
    UdpDst,
    IcmpType,
    IcmpCode,
}

impl MatchField {
    /// Every field, in canonical key order.
    pub const ALL: [MatchField; 16] = [
        Self::InPort,
        Self::DlSrc,
        Self::DlDst,
        Self::DlType,
        Self::DlVlan,
        Self::DlVlanPcp,
        Self::IpSrc,
        Self::IpDst,
        Self::IpProto,
        Self::IpDscp,
        Self::TcpSrc,
        Self::TcpDst,
        Self::UdpSrc,
        Self::UdpDst,
        Self::IcmpType,
        Self::IcmpCode,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::InPort => "IN_PORT",
            Self::DlSrc => "DL_SRC",
            Self::DlDst => "DL_DST",
            Self::DlType => "DL_TYPE",
            Self::DlVlan => "DL_VLAN",
            Self::DlVlanPcp => "DL_VLAN_PCP",
            Self::IpSrc => "IP_SRC",
            Self::IpDst => "IP_DST",
            Self::IpProto => "IP_PROTO",
            Self::IpDscp => "IP_DSCP",
            Self::TcpSrc => "TCP_SRC",
            Self::TcpDst => "TCP_DST",
            Self::UdpSrc => "UDP_SRC",
            Self::UdpDst => "UDP_DST",
            Self::IcmpType => "ICMP_TYPE",
            Self::IcmpCode => "ICMP_CODE",
        }
    }

    /// The single-bit set containing this field.
    pub const fn flag(&self) -> MatchFields {
        MatchFields::from_bits_retain(1 << (*self as u16))
    }
}

impl Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for MatchField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|field| field.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown match field: {s}"))
    }
}

bitflags! {
    /// A set of [`MatchField`]s.
    #[derive(
        Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq,
        Serialize,
    )]
    pub struct MatchFields: u16 {
        const IN_PORT = 1 << 0;
        const DL_SRC = 1 << 1;
        const DL_DST = 1 << 2;
        const DL_TYPE = 1 << 3;
        const DL_VLAN = 1 << 4;
        const DL_VLAN_PCP = 1 << 5;
        const IP_SRC = 1 << 6;
        const IP_DST = 1 << 7;
        const IP_PROTO = 1 << 8;
        const IP_DSCP = 1 << 9;
        const TCP_SRC = 1 << 10;
        const TCP_DST = 1 << 11;
        const UDP_SRC = 1 << 12;
        const UDP_DST = 1 << 13;
        const ICMP_TYPE = 1 << 14;
        const ICMP_CODE = 1 << 15;
    }
}

impl MatchFields {
    /// Does the set contain `field`?
    pub fn has(&self, field: MatchField) -> bool {
        self.contains(field.flag())
    }

    /// Iterate the members of the set in canonical key order.
    pub fn fields(&self) -> impl Iterator<Item = MatchField> + '_ {
        MatchField::ALL.into_iter().filter(|f| self.has(*f))
    }
}

impl From<MatchField> for MatchFields {
    fn from(field: MatchField) -> Self {
        field.flag()
    }
}

impl FromIterator<MatchField> for MatchFields {
    fn from_iter<I: IntoIterator<Item = MatchField>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |acc, f| acc | f.flag())
    }
}

impl Display for MatchFields {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for field in self.fields() {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{field}")?;
            first = false;
        }
        Ok(())
    }
}

/// The fields every unicast flow entry must match on, whether or not
/// the condition that produced it named them.
pub const fn unicast_mandatory() -> MatchFields {
    MatchFields::DL_SRC.union(MatchFields::DL_DST)
}

/// How many of the unicast-mandatory fields are in `set`.
pub fn unicast_mandatory_count(set: &MatchFields) -> usize {
    set.intersection(unicast_mandatory()).bits().count_ones() as usize
}
