// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The persisted form of a flow match.
//!
//! A record holds the fields of a verified match, grouped per layer,
//! and is stored as `postcard` bytes. Decoding re-checks every value
//! and verifies the rebuilt match, so a corrupted record cannot
//! produce a match the engine would not have built itself.

use super::error::MatchError;
use super::error::MatchResult;
use super::ether::EtherMatch;
use super::flow_match::FlowMatch;
use super::inet::Inet4Match;
use super::inet::InetMatch;
use super::l4::IcmpMatch;
use super::l4::L4Match;
use super::l4::PortMatch;
use super::port_range::PortRange;
use crate::api::Dscp;
use crate::api::Ipv4Addr;
use crate::api::Ipv4Cidr;
use crate::api::MacAddr;
use crate::api::VlanId;
use crate::api::VlanPcp;
use alloc::vec::Vec;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EtherRecord {
    pub src: Option<MacAddr>,
    pub dst: Option<MacAddr>,
    pub ether_type: Option<u16>,
    pub vlan_id: Option<VlanId>,
    pub vlan_pcp: Option<VlanPcp>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Inet4Record {
    /// Address and prefix length.
    pub src: Option<(Ipv4Addr, u8)>,
    pub dst: Option<(Ipv4Addr, u8)>,
    pub protocol: Option<u8>,
    pub dscp: Option<Dscp>,
}

/// Inclusive `(from, to)` port pairs.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum L4Record {
    Tcp { src: Option<(u16, u16)>, dst: Option<(u16, u16)> },
    Udp { src: Option<(u16, u16)>, dst: Option<(u16, u16)> },
    Icmp { ty: Option<u8>, code: Option<u8> },
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct FlowMatchRecord {
    pub ether: Option<EtherRecord>,
    pub inet4: Option<Inet4Record>,
    pub l4: Option<L4Record>,
}

impl FlowMatchRecord {
    pub fn encode(&self) -> MatchResult<Vec<u8>> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> MatchResult<Self> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

fn cidr(parts: Option<(Ipv4Addr, u8)>) -> MatchResult<Option<Ipv4Cidr>> {
    parts
        .map(|(ip, len)| {
            Ipv4Cidr::new_checked(ip, len).map_err(MatchError::Codec)
        })
        .transpose()
}

fn ports(
    (src, dst): (Option<(u16, u16)>, Option<(u16, u16)>),
) -> MatchResult<PortMatch> {
    let range = |r: Option<(u16, u16)>| {
        r.map(|(from, to)| PortRange::new(from, to)).transpose()
    };
    Ok(PortMatch::new(range(src)?, range(dst)?))
}

fn port_pairs(m: &PortMatch) -> (Option<(u16, u16)>, Option<(u16, u16)>) {
    let pair = |r: PortRange| (r.port_from(), r.port_to());
    (m.src().map(pair), m.dst().map(pair))
}

impl FlowMatch {
    pub fn to_record(&self) -> FlowMatchRecord {
        let ether = self.ether().map(|e| EtherRecord {
            src: e.src(),
            dst: e.dst(),
            ether_type: e.ether_type(),
            vlan_id: e.vlan_id(),
            vlan_pcp: e.vlan_pcp(),
        });

        let inet4 = self.inet().and_then(|i| i.ip4()).map(|i| Inet4Record {
            src: i.src().map(|n| (n.ip(), n.prefix_len())),
            dst: i.dst().map(|n| (n.ip(), n.prefix_len())),
            protocol: i.protocol(),
            dscp: i.dscp(),
        });

        let l4 = self.l4().map(|l4| match l4 {
            L4Match::Tcp(m) => {
                let (src, dst) = port_pairs(m);
                L4Record::Tcp { src, dst }
            }
            L4Match::Udp(m) => {
                let (src, dst) = port_pairs(m);
                L4Record::Udp { src, dst }
            }
            L4Match::Icmp(m) => L4Record::Icmp { ty: m.ty(), code: m.code() },
        });

        FlowMatchRecord { ether, inet4, l4 }
    }

    /// Rebuild the match held by `rec`, then complete and verify it.
    pub fn from_record(rec: &FlowMatchRecord) -> MatchResult<Self> {
        let ether = rec.ether.map(ether_from_record);

        let inet = match rec.inet4 {
            Some(i) => {
                let mut m = Inet4Match::new();
                if let Some(src) = cidr(i.src)? {
                    m = m.with_src(src);
                }
                if let Some(dst) = cidr(i.dst)? {
                    m = m.with_dst(dst);
                }
                if let Some(proto) = i.protocol {
                    m = m.with_protocol(proto);
                }
                if let Some(dscp) = i.dscp {
                    m = m.with_dscp(dscp);
                }
                Some(InetMatch::from(m))
            }
            None => None,
        };

        let l4 = match rec.l4 {
            Some(L4Record::Tcp { src, dst }) => {
                Some(L4Match::Tcp(ports((src, dst))?))
            }
            Some(L4Record::Udp { src, dst }) => {
                Some(L4Match::Udp(ports((src, dst))?))
            }
            Some(L4Record::Icmp { ty, code }) => {
                Some(L4Match::Icmp(IcmpMatch::new(ty, code)))
            }
            None => None,
        };

        Self::new(ether, inet, l4).verify()
    }
}

fn ether_from_record(rec: EtherRecord) -> EtherMatch {
    let mut m = EtherMatch::new();
    if let Some(src) = rec.src {
        m = m.with_src(src);
    }
    if let Some(dst) = rec.dst {
        m = m.with_dst(dst);
    }
    if let Some(et) = rec.ether_type {
        m = m.with_ether_type(et);
    }
    if let Some(vid) = rec.vlan_id {
        m = m.with_vlan_id(vid);
    }
    if let Some(pcp) = rec.vlan_pcp {
        m = m.with_vlan_pcp(pcp);
    }
    m
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::ErrorKind;

    fn sample() -> FlowMatch {
        FlowMatch::default()
            .with_ether(
                EtherMatch::new()
                    .with_dst("a8:40:25:00:00:09".parse().unwrap())
                    .with_vlan_id(VlanId::new(300).unwrap())
                    .with_vlan_pcp(VlanPcp::new(6).unwrap()),
            )
            .with_inet(
                Inet4Match::new()
                    .with_dst("10.20.0.0/16".parse().unwrap())
                    .with_dscp(Dscp::new(34).unwrap()),
            )
            .with_l4(L4Match::Udp(PortMatch::new(
                None,
                Some(PortRange::new(4789, 4790).unwrap()),
            )))
            .verify()
            .unwrap()
    }

    #[test]
    fn record_bytes_round_trip() {
        let m = sample();
        let bytes = m.to_record().encode().unwrap();
        let rec = FlowMatchRecord::decode(&bytes).unwrap();
        assert_eq!(rec, m.to_record());
        assert_eq!(FlowMatch::from_record(&rec).unwrap(), m);
    }

    #[test]
    fn truncated_record_is_codec_error() {
        let bytes = sample().to_record().encode().unwrap();
        let err =
            FlowMatchRecord::decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
    }

    #[test]
    fn decoded_values_are_rechecked() {
        let rec = FlowMatchRecord {
            inet4: Some(Inet4Record {
                src: Some((Ipv4Addr::from([10, 0, 0, 0]), 40)),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            FlowMatch::from_record(&rec).unwrap_err().kind(),
            ErrorKind::Codec
        );

        let rec = FlowMatchRecord {
            l4: Some(L4Record::Tcp { src: Some((90, 80)), dst: None }),
            ..Default::default()
        };
        assert_eq!(
            FlowMatch::from_record(&rec).unwrap_err().kind(),
            ErrorKind::Validation
        );

        // VLAN IDs are checked while deserializing.
        let bad_vid = FlowMatchRecord {
            ether: Some(EtherRecord {
                vlan_id: Some(VlanId::new(4095).unwrap()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut bytes = bad_vid.encode().unwrap();
        // Option tag, then the varint 4095 (0xff 0x1f) at the VLAN ID.
        let pos = bytes.windows(2).position(|w| w == [0xff, 0x1f]).unwrap();
        bytes[pos + 1] = 0x3f;
        let err = FlowMatchRecord::decode(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
    }
}
