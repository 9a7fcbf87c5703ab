// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The flow-table match schema exchanged with the switch controller.
//!
//! The layout follows the usual SDN flow-table match: the link layer
//! is split between `ethernet-match` and `vlan-match`, the network
//! layer between `ip-match` and `layer3-match`. Transport ports carry
//! an optional `*-port-end` so that port ranges survive the trip.

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
use crate::api::MacAddr;
use alloc::string::String;
use alloc::string::ToString;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct WireMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernet_match: Option<EthernetMatchWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_match: Option<VlanMatchWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_match: Option<IpMatchWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer3_match: Option<Layer3MatchWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer4_match: Option<Layer4MatchWire>,
}

/// A link-layer address, optionally masked.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MacAddressFilter {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EthernetTypeWire {
    #[serde(rename = "type")]
    pub ty: u32,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EthernetMatchWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernet_source: Option<MacAddressFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernet_destination: Option<MacAddressFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernet_type: Option<EthernetTypeWire>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VlanIdWire {
    pub vlan_id: u32,
    /// False selects untagged frames; `vlan-id` is then ignored.
    pub vlan_id_present: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VlanMatchWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<VlanIdWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_pcp: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct IpMatchWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_protocol: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_dscp: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Ipv4MatchWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_destination: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Ipv6MatchWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_destination: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer3MatchWire {
    Ipv4Match(Ipv4MatchWire),
    Ipv6Match(Ipv6MatchWire),
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TcpMatchWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_source_port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_source_port_end: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_destination_port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_destination_port_end: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UdpMatchWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp_source_port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp_source_port_end: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp_destination_port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp_destination_port_end: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Icmpv4MatchWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmpv4_type: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmpv4_code: Option<u32>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer4MatchWire {
    TcpMatch(TcpMatchWire),
    UdpMatch(UdpMatchWire),
    Icmpv4Match(Icmpv4MatchWire),
}

fn unmasked(filter: Option<&MacAddressFilter>) -> MatchResult<Option<&str>> {
    match filter {
        None => Ok(None),
        Some(MacAddressFilter { mask: Some(mask), .. }) => Err(
            MatchError::Unsupported(format!("masked MAC address: {mask}")),
        ),
        Some(f) => Ok(Some(f.address.as_str())),
    }
}

fn ether_from_wire(wire: &WireMatch) -> MatchResult<Option<EtherMatch>> {
    if wire.ethernet_match.is_none() && wire.vlan_match.is_none() {
        return Ok(None);
    }

    let (src, dst, ether_type) = match &wire.ethernet_match {
        Some(em) => (
            unmasked(em.ethernet_source.as_ref())?,
            unmasked(em.ethernet_destination.as_ref())?,
            em.ethernet_type.map(|et| et.ty),
        ),
        None => (None, None, None),
    };

    let vlan = wire.vlan_match.unwrap_or_default();
    let vlan_id =
        vlan.vlan_id.map(|v| if v.vlan_id_present { v.vlan_id } else { 0 });

    EtherMatch::from_raw(src, dst, ether_type, vlan_id, vlan.vlan_pcp).map(Some)
}

fn inet_from_wire(wire: &WireMatch) -> MatchResult<Option<InetMatch>> {
    let (src, dst) = match &wire.layer3_match {
        None => (None, None),
        Some(Layer3MatchWire::Ipv4Match(m)) => {
            (m.ipv4_source.as_deref(), m.ipv4_destination.as_deref())
        }
        Some(Layer3MatchWire::Ipv6Match(_)) => {
            return Err(MatchError::Unsupported("IPv6 match".into()));
        }
    };

    if wire.ip_match.is_none() && wire.layer3_match.is_none() {
        return Ok(None);
    }

    let ip = wire.ip_match.unwrap_or_default();
    Inet4Match::from_raw(src, dst, ip.ip_protocol, ip.ip_dscp)
        .map(|m| Some(InetMatch::from(m)))
}

type WirePorts = (Option<u32>, Option<u32>, Option<u32>, Option<u32>);

fn raw_ports(
    (src, src_end, dst, dst_end): WirePorts,
) -> (RawPorts, RawPorts) {
    (src.map(|p| (p, src_end)), dst.map(|p| (p, dst_end)))
}

fn wire_ports(m: &PortMatch) -> WirePorts {
    let end = |r: PortRange| {
        (!r.is_single()).then(|| u32::from(r.port_to()))
    };
    (
        m.src().map(|r| u32::from(r.port_from())),
        m.src().and_then(end),
        m.dst().map(|r| u32::from(r.port_from())),
        m.dst().and_then(end),
    )
}

fn l4_from_wire(wire: &WireMatch) -> MatchResult<Option<L4Match>> {
    let l4 = match &wire.layer4_match {
        None => return Ok(None),

        Some(Layer4MatchWire::TcpMatch(m)) => {
            let (src, dst) = raw_ports((
                m.tcp_source_port,
                m.tcp_source_port_end,
                m.tcp_destination_port,
                m.tcp_destination_port_end,
            ));
            L4Match::tcp_from_raw(src, dst)?
        }

        Some(Layer4MatchWire::UdpMatch(m)) => {
            let (src, dst) = raw_ports((
                m.udp_source_port,
                m.udp_source_port_end,
                m.udp_destination_port,
                m.udp_destination_port_end,
            ));
            L4Match::udp_from_raw(src, dst)?
        }

        Some(Layer4MatchWire::Icmpv4Match(m)) => {
            L4Match::icmp_from_raw(m.icmpv4_type, m.icmpv4_code)?
        }
    };

    Ok(Some(l4))
}

fn mac_filter(mac: MacAddr) -> MacAddressFilter {
    MacAddressFilter { address: mac.to_string(), mask: None }
}

impl FlowMatch {
    /// Build a match from its flow-table form, then complete and
    /// verify it.
    pub fn from_wire(wire: &WireMatch) -> MatchResult<Self> {
        let ether = ether_from_wire(wire)?;
        let inet = inet_from_wire(wire)?;
        let l4 = l4_from_wire(wire)?;
        Self::new(ether, inet, l4).verify()
    }

    /// The flow-table form of a verified match.
    pub fn to_wire(&self) -> WireMatch {
        let mut wire = WireMatch::default();

        if let Some(e) = self.ether() {
            if e.src().is_some() || e.dst().is_some() || e.ether_type().is_some()
            {
                wire.ethernet_match = Some(EthernetMatchWire {
                    ethernet_source: e.src().map(mac_filter),
                    ethernet_destination: e.dst().map(mac_filter),
                    ethernet_type: e
                        .ether_type()
                        .map(|et| EthernetTypeWire { ty: u32::from(et) }),
                });
            }

            if e.vlan_id().is_some() || e.vlan_pcp().is_some() {
                wire.vlan_match = Some(VlanMatchWire {
                    vlan_id: e.vlan_id().map(|vid| VlanIdWire {
                        vlan_id: u32::from(vid.val()),
                        vlan_id_present: !vid.is_none(),
                    }),
                    vlan_pcp: e.vlan_pcp().map(|pcp| u32::from(pcp.val())),
                });
            }
        }

        if let Some(i) = self.inet().and_then(|i| i.ip4()) {
            if i.protocol().is_some() || i.dscp().is_some() {
                wire.ip_match = Some(IpMatchWire {
                    ip_protocol: i.protocol().map(u32::from),
                    ip_dscp: i.dscp().map(|d| u32::from(d.val())),
                });
            }

            if i.src().is_some() || i.dst().is_some() {
                wire.layer3_match =
                    Some(Layer3MatchWire::Ipv4Match(Ipv4MatchWire {
                        ipv4_source: i.src().map(|n| n.to_string()),
                        ipv4_destination: i.dst().map(|n| n.to_string()),
                    }));
            }
        }

        wire.layer4_match = self.l4().map(|l4| match l4 {
            L4Match::Tcp(m) => {
                let (src, src_end, dst, dst_end) = wire_ports(m);
                Layer4MatchWire::TcpMatch(TcpMatchWire {
                    tcp_source_port: src,
                    tcp_source_port_end: src_end,
                    tcp_destination_port: dst,
                    tcp_destination_port_end: dst_end,
                })
            }

            L4Match::Udp(m) => {
                let (src, src_end, dst, dst_end) = wire_ports(m);
                Layer4MatchWire::UdpMatch(UdpMatchWire {
                    udp_source_port: src,
                    udp_source_port_end: src_end,
                    udp_destination_port: dst,
                    udp_destination_port_end: dst_end,
                })
            }

            L4Match::Icmp(m) => Layer4MatchWire::Icmpv4Match(Icmpv4MatchWire {
                icmpv4_type: m.ty().map(u32::from),
                icmpv4_code: m.code().map(u32::from),
            }),
        });

        wire
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::VlanId;
    use crate::api::VlanPcp;
    use crate::engine::ErrorKind;
    use crate::engine::l4::IcmpMatch;
    use crate::engine::spec::FlowMatchSpec;
    use alloc::vec::Vec;

    fn verified() -> Vec<FlowMatch> {
        let mac: MacAddr = "a8:40:25:ff:00:01".parse().unwrap();
        let raw = vec![
            FlowMatch::default(),
            FlowMatch::default().with_ether(EtherMatch::new().with_src(mac)),
            FlowMatch::default().with_ether(
                EtherMatch::new()
                    .with_ether_type(0x0806)
                    .with_vlan_id(VlanId::NONE),
            ),
            FlowMatch::default().with_ether(
                EtherMatch::new()
                    .with_dst(mac)
                    .with_vlan_id(VlanId::new(4095).unwrap())
                    .with_vlan_pcp(VlanPcp::new(7).unwrap()),
            ),
            FlowMatch::default().with_inet(
                Inet4Match::new()
                    .with_src("172.16.0.0/12".parse().unwrap())
                    .with_dscp(crate::api::Dscp::new(63).unwrap()),
            ),
            FlowMatch::default().with_l4(L4Match::Tcp(PortMatch::new(
                Some(PortRange::single(22)),
                Some(PortRange::new(1024, 65535).unwrap()),
            ))),
            FlowMatch::default().with_l4(L4Match::Udp(PortMatch::new(
                Some(PortRange::new(0, 1023).unwrap()),
                None,
            ))),
            FlowMatch::default()
                .with_l4(L4Match::Icmp(IcmpMatch::new(Some(3), Some(4)))),
        ];

        raw.into_iter().map(|m| m.verify().unwrap()).collect()
    }

    #[test]
    fn verified_matches_round_trip() {
        for m in verified() {
            let wire = m.to_wire();
            assert_eq!(FlowMatch::from_wire(&wire).unwrap(), m, "{wire:?}");
        }
    }

    #[test]
    fn wire_ports_agree_with_spec() {
        let spec: FlowMatchSpec = serde_json::from_str(
            r#"{
                "index": 1,
                "udp": {
                    "source-port": { "port-from": 6000, "port-to": 6099 },
                    "destination-port": { "port-from": 53 }
                }
            }"#,
        )
        .unwrap();
        let (_, from_spec) = FlowMatch::from_spec(&spec).unwrap();

        let wire: WireMatch = serde_json::from_str(
            r#"{
                "layer4-match": {
                    "udp-match": {
                        "udp-source-port": 6000,
                        "udp-source-port-end": 6099,
                        "udp-destination-port": 53
                    }
                }
            }"#,
        )
        .unwrap();

        let verified = from_spec.verify().unwrap();
        assert_eq!(FlowMatch::from_wire(&wire).unwrap(), verified);
        assert_eq!(verified.to_wire().layer4_match, wire.layer4_match);
    }

    #[test]
    fn wire_json_layout() {
        let wire: WireMatch = serde_json::from_str(
            r#"{
                "ethernet-match": {
                    "ethernet-source": { "address": "a8:40:25:ff:00:01" },
                    "ethernet-type": { "type": 2048 }
                },
                "vlan-match": {
                    "vlan-id": { "vlan-id": 0, "vlan-id-present": false }
                },
                "layer3-match": {
                    "ipv4-match": { "ipv4-destination": "10.0.0.1/32" }
                },
                "layer4-match": {
                    "udp-match": {
                        "udp-destination-port": 67,
                        "udp-destination-port-end": 68
                    }
                }
            }"#,
        )
        .unwrap();

        let m = FlowMatch::from_wire(&wire).unwrap();
        assert_eq!(
            m.condition_key(),
            "DL_SRC=a8:40:25:ff:00:01,DL_TYPE=2048,DL_VLAN=0,\
             IP_DST=10.0.0.1/32,IP_PROTO=17,UDP_DST=67-68"
        );
    }

    #[test]
    fn from_wire_completes() {
        let wire = WireMatch {
            layer4_match: Some(Layer4MatchWire::TcpMatch(TcpMatchWire {
                tcp_destination_port: Some(443),
                ..Default::default()
            })),
            ..Default::default()
        };
        let m = FlowMatch::from_wire(&wire).unwrap();
        assert_eq!(m.condition_key(), "DL_TYPE=2048,IP_PROTO=6,TCP_DST=443");
    }

    #[test]
    fn unsupported_wire_features() {
        let masked = WireMatch {
            ethernet_match: Some(EthernetMatchWire {
                ethernet_source: Some(MacAddressFilter {
                    address: "a8:40:25:ff:00:00".into(),
                    mask: Some("ff:ff:ff:ff:00:00".into()),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = FlowMatch::from_wire(&masked).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        let v6 = WireMatch {
            layer3_match: Some(Layer3MatchWire::Ipv6Match(Ipv6MatchWire {
                ipv6_source: Some("fd00::1/128".into()),
                ipv6_destination: None,
            })),
            ..Default::default()
        };
        let err = FlowMatch::from_wire(&v6).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn wire_conflicts_and_ranges() {
        let wire = WireMatch {
            ethernet_match: Some(EthernetMatchWire {
                ethernet_type: Some(EthernetTypeWire { ty: 0x0806 }),
                ..Default::default()
            }),
            ip_match: Some(IpMatchWire { ip_protocol: Some(6), ip_dscp: None }),
            ..Default::default()
        };
        let err = FlowMatch::from_wire(&wire).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let wire = WireMatch {
            vlan_match: Some(VlanMatchWire { vlan_id: None, vlan_pcp: Some(9) }),
            ..Default::default()
        };
        let err = FlowMatch::from_wire(&wire).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // A priority without a VLAN ID fails verification.
        let wire = WireMatch {
            vlan_match: Some(VlanMatchWire { vlan_id: None, vlan_pcp: Some(2) }),
            ..Default::default()
        };
        let err = FlowMatch::from_wire(&wire).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
