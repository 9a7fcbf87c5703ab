// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The user-facing condition specification.
//!
//! Numeric fields are wider than the header fields they describe, so
//! an out-of-range value survives deserialization and is rejected by
//! the engine with a message naming the field.

use super::cond::check_index;
use super::error::MatchError;
use super::error::MatchResult;
use super::ether::EtherMatch;
use super::flow_match::FlowMatch;
use super::inet::Inet4Match;
use super::inet::InetMatch;
use super::l4::L4Match;
use super::l4::PortMatch;
use super::l4::RawPorts;
use super::port_range::PortRange;
use alloc::string::String;
use alloc::string::ToString;
use alloc::vec::Vec;
use serde::Deserialize;
use serde::Serialize;

/// A named, ordered list of match specifications.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlowConditionSpec {
    pub name: String,
    #[serde(default)]
    pub matches: Vec<FlowMatchSpec>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlowMatchSpec {
    /// The position of this match in its condition.
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<EthernetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inet4: Option<Inet4Spec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp: Option<PortMatchSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp: Option<PortMatchSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmp: Option<IcmpSpec>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EthernetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ether_type: Option<u32>,
    /// Zero selects untagged frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_priority: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Inet4Spec {
    /// An IPv4 network in CIDR notation, or a bare host address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dscp: Option<u16>,
}

/// An inclusive port range; a missing `port-to` means a single port.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PortRangeSpec {
    pub port_from: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_to: Option<u32>,
}

impl From<PortRange> for PortRangeSpec {
    fn from(range: PortRange) -> Self {
        Self {
            port_from: u32::from(range.port_from()),
            port_to: (!range.is_single()).then(|| u32::from(range.port_to())),
        }
    }
}

/// The port conditions of a TCP or UDP group.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PortMatchSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<PortRangeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<PortRangeSpec>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct IcmpSpec {
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ty: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

fn raw_ports(spec: &PortMatchSpec) -> (RawPorts, RawPorts) {
    let raw = |r: Option<PortRangeSpec>| r.map(|r| (r.port_from, r.port_to));
    (raw(spec.source_port), raw(spec.destination_port))
}

fn l4_from_spec(spec: &FlowMatchSpec) -> MatchResult<Option<L4Match>> {
    let given = [spec.tcp.is_some(), spec.udp.is_some(), spec.icmp.is_some()];
    if given.iter().filter(|g| **g).count() > 1 {
        return Err(MatchError::Validation(format!(
            "match {}: at most one transport group may be given",
            spec.index
        )));
    }

    if let Some(tcp) = &spec.tcp {
        let (src, dst) = raw_ports(tcp);
        return L4Match::tcp_from_raw(src, dst).map(Some);
    }

    if let Some(udp) = &spec.udp {
        let (src, dst) = raw_ports(udp);
        return L4Match::udp_from_raw(src, dst).map(Some);
    }

    match &spec.icmp {
        Some(icmp) => L4Match::icmp_from_raw(
            icmp.ty.map(u32::from),
            icmp.code.map(u32::from),
        )
        .map(Some),
        None => Ok(None),
    }
}

impl FlowMatch {
    /// Build the raw match described by `spec`, along with its index.
    ///
    /// Each layer is checked on its own; the caller completes and
    /// verifies the result.
    pub fn from_spec(spec: &FlowMatchSpec) -> MatchResult<(u32, Self)> {
        let index = check_index(spec.index)?;

        let ether = spec
            .ethernet
            .as_ref()
            .map(|e| {
                EtherMatch::from_raw(
                    e.source.as_deref(),
                    e.destination.as_deref(),
                    e.ether_type,
                    e.vlan_id,
                    e.vlan_priority,
                )
            })
            .transpose()?;

        let inet = spec
            .inet4
            .as_ref()
            .map(|i| {
                Inet4Match::from_raw(
                    i.source.as_deref(),
                    i.destination.as_deref(),
                    i.protocol.map(u32::from),
                    i.dscp.map(u32::from),
                )
                .map(InetMatch::from)
            })
            .transpose()?;

        let l4 = l4_from_spec(spec)?;
        Ok((index, Self::new(ether, inet, l4)))
    }

    pub fn to_spec(&self, index: u32) -> FlowMatchSpec {
        let ethernet = self.ether().map(|e| EthernetSpec {
            source: e.src().map(|m| m.to_string()),
            destination: e.dst().map(|m| m.to_string()),
            ether_type: e.ether_type().map(u32::from),
            vlan_id: e.vlan_id().map(|v| u32::from(v.val())),
            vlan_priority: e.vlan_pcp().map(|p| u32::from(p.val())),
        });

        let inet4 = self.inet().and_then(|i| i.ip4()).map(|i| Inet4Spec {
            source: i.src().map(|n| n.to_string()),
            destination: i.dst().map(|n| n.to_string()),
            protocol: i.protocol().map(u16::from),
            dscp: i.dscp().map(|d| u16::from(d.val())),
        });

        let ports = |m: &PortMatch| PortMatchSpec {
            source_port: m.src().map(PortRangeSpec::from),
            destination_port: m.dst().map(PortRangeSpec::from),
        };

        let mut spec =
            FlowMatchSpec { index, ethernet, inet4, ..Default::default() };
        match self.l4() {
            Some(L4Match::Tcp(m)) => spec.tcp = Some(ports(m)),
            Some(L4Match::Udp(m)) => spec.udp = Some(ports(m)),
            Some(L4Match::Icmp(m)) => {
                spec.icmp = Some(IcmpSpec {
                    ty: m.ty().map(u16::from),
                    code: m.code().map(u16::from),
                })
            }
            None => {}
        }

        spec
    }
}
