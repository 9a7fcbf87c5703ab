// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The packet header a match is evaluated against, and the trace of
//! fields consulted while evaluating it.
//!
//! Parsing the packet is the caller's business. The engine only needs
//! read access to the decoded header values, which it gets through
//! [`PacketHeader`].

use super::field::MatchField;
use super::field::MatchFields;
use super::field::unicast_mandatory;
use crate::api::Dscp;
use crate::api::Ipv4Addr;
use crate::api::MacAddr;
use crate::api::VlanId;
use crate::api::VlanPcp;
use serde::Deserialize;
use serde::Serialize;

/// The IPv4 header values consulted by a match.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Ipv4Header {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub proto: u8,
    pub dscp: Dscp,
}

/// The upper-layer protocol header values consulted by a match.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum UlpHeader {
    Tcp { src: u16, dst: u16 },
    Udp { src: u16, dst: u16 },
    Icmp { ty: u8, code: u8 },
}

/// Read access to the decoded headers of one packet.
///
/// The Ethernet header is always present. `vlan_id()` returns
/// [`VlanId::NONE`] for an untagged frame.
pub trait PacketHeader {
    fn src_mac(&self) -> MacAddr;
    fn dst_mac(&self) -> MacAddr;
    fn ether_type(&self) -> u16;
    fn vlan_id(&self) -> VlanId;
    fn vlan_pcp(&self) -> VlanPcp;

    /// The IPv4 header, if this is an IPv4 packet.
    fn ipv4(&self) -> Option<Ipv4Header>;

    /// The transport header, if one was decoded.
    fn ulp(&self) -> Option<UlpHeader>;
}

/// The fields consulted while evaluating a match against a packet.
///
/// A flow entry programmed for the packet must match on at least
/// these fields, otherwise it would also catch packets the condition
/// was never evaluated against. One trace belongs to one evaluation;
/// it is not meant to be shared between evaluations.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MatchTrace {
    fields: MatchFields,
}

impl MatchTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `field` was consulted.
    pub fn add(&mut self, field: MatchField) {
        self.fields |= field.flag();
    }

    pub fn has(&self, field: MatchField) -> bool {
        self.fields.has(field)
    }

    /// Record the fields every unicast flow entry needs.
    pub fn add_unicast(&mut self) {
        self.fields |= unicast_mandatory();
    }

    pub fn fields(&self) -> MatchFields {
        self.fields
    }

    pub fn clear(&mut self) {
        self.fields = MatchFields::empty();
    }
}

/// A plain header record.
///
/// This is mostly useful to tests and to tools that describe a packet
/// by hand rather than decoding one.
#[cfg(any(feature = "test-help", test))]
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HeaderMeta {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub ether_type: u16,
    #[serde(default)]
    pub vlan_id: VlanId,
    #[serde(default)]
    pub vlan_pcp: VlanPcp,
    #[serde(default)]
    pub ipv4: Option<Ipv4Header>,
    #[serde(default)]
    pub ulp: Option<UlpHeader>,
}

#[cfg(any(feature = "test-help", test))]
impl HeaderMeta {
    /// An untagged frame with no decoded network layer.
    pub fn ether(src_mac: MacAddr, dst_mac: MacAddr, ether_type: u16) -> Self {
        Self {
            src_mac,
            dst_mac,
            ether_type,
            vlan_id: VlanId::NONE,
            vlan_pcp: VlanPcp::default(),
            ipv4: None,
            ulp: None,
        }
    }

    /// An untagged IPv4 packet carrying `ulp`.
    pub fn ip4_packet(
        src_mac: MacAddr,
        dst_mac: MacAddr,
        ip: Ipv4Header,
        ulp: Option<UlpHeader>,
    ) -> Self {
        let mut hdr =
            Self::ether(src_mac, dst_mac, crate::api::ETHER_TYPE_IPV4);
        hdr.ipv4 = Some(ip);
        hdr.ulp = ulp;
        hdr
    }

    pub fn with_vlan(mut self, vid: VlanId, pcp: VlanPcp) -> Self {
        self.vlan_id = vid;
        self.vlan_pcp = pcp;
        self
    }
}

#[cfg(any(feature = "test-help", test))]
impl PacketHeader for HeaderMeta {
    fn src_mac(&self) -> MacAddr {
        self.src_mac
    }

    fn dst_mac(&self) -> MacAddr {
        self.dst_mac
    }

    fn ether_type(&self) -> u16 {
        self.ether_type
    }

    fn vlan_id(&self) -> VlanId {
        self.vlan_id
    }

    fn vlan_pcp(&self) -> VlanPcp {
        self.vlan_pcp
    }

    fn ipv4(&self) -> Option<Ipv4Header> {
        self.ipv4
    }

    fn ulp(&self) -> Option<UlpHeader> {
        self.ulp
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn trace_accumulates() {
        let mut trace = MatchTrace::new();
        assert!(trace.fields().is_empty());

        trace.add(MatchField::IpProto);
        trace.add(MatchField::IpProto);
        assert!(trace.has(MatchField::IpProto));
        assert_eq!(trace.fields().fields().count(), 1);

        trace.add_unicast();
        assert!(trace.has(MatchField::DlSrc));
        assert!(trace.has(MatchField::DlDst));
        assert!(!trace.has(MatchField::DlType));

        trace.clear();
        assert_eq!(trace, MatchTrace::default());
    }
}
