// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The aggregate match over all layers.
//!
//! A [`FlowMatch`] is built raw from its layers, then completed and
//! verified with [`FlowMatch::verify()`]. Completion derives the
//! fields one layer implies for the layer outside it: a transport
//! match implies the IP protocol, and a network match implies the
//! ether type. Only a verified match should be handed to the packet
//! path or converted to the wire form.

use super::error::MatchResult;
use super::ether::EtherMatch;
use super::field::MatchField;
use super::header::MatchTrace;
use super::header::PacketHeader;
use super::inet::InetMatch;
use super::l4::L4Match;
use crate::api::IpVersion;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct FlowMatch {
    ether: Option<EtherMatch>,
    inet: Option<InetMatch>,
    l4: Option<L4Match>,
}

impl FlowMatch {
    pub const fn new(
        ether: Option<EtherMatch>,
        inet: Option<InetMatch>,
        l4: Option<L4Match>,
    ) -> Self {
        Self { ether, inet, l4 }
    }

    pub fn with_ether(mut self, ether: EtherMatch) -> Self {
        self.ether = Some(ether);
        self
    }

    pub fn with_inet<I: Into<InetMatch>>(mut self, inet: I) -> Self {
        self.inet = Some(inet.into());
        self
    }

    pub fn with_l4(mut self, l4: L4Match) -> Self {
        self.l4 = Some(l4);
        self
    }

    pub fn ether(&self) -> Option<&EtherMatch> {
        self.ether.as_ref()
    }

    pub fn inet(&self) -> Option<&InetMatch> {
        self.inet.as_ref()
    }

    pub fn l4(&self) -> Option<&L4Match> {
        self.l4.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.ether.is_none() && self.inet.is_none() && self.l4.is_none()
    }

    /// Derive the implied fields, innermost layer first, and drop
    /// layers left with no conditions.
    ///
    /// The result is a new match; `self` is untouched. Completing a
    /// completed match yields the same match.
    pub fn complete(&self) -> MatchResult<Self> {
        let Self { mut ether, mut inet, mut l4 } = *self;

        if let Some(m) = l4 {
            let ver = inet.map(|i| i.version()).unwrap_or(IpVersion::V4);
            let proto = m.inet_protocol(ver)?;
            inet = Some(match inet {
                None => InetMatch::for_protocol(ver, proto)?,
                Some(i) => i.set_protocol(proto)?,
            });

            if m.is_empty() {
                l4 = None;
            }
        }

        if let Some(i) = inet {
            let et = i.ether_type();
            ether = Some(match ether {
                None => EtherMatch::new().with_ether_type(et),
                Some(e) => e.set_ether_type(et)?,
            });

            if i.is_empty() {
                inet = None;
            }
        }

        if ether.is_some_and(|e| e.is_empty()) {
            ether = None;
        }

        Ok(Self { ether, inet, l4 })
    }

    /// Complete the match and check every layer that can take part in
    /// an evaluation.
    ///
    /// A layer is only checked when the layer outside it is present;
    /// [`FlowMatch::is_match()`] never reaches it otherwise.
    pub fn verify(&self) -> MatchResult<Self> {
        let m = self.complete()?;

        if let Some(ether) = &m.ether {
            ether.verify()?;

            if let Some(inet) = &m.inet {
                inet.verify()?;

                if let Some(l4) = &m.l4 {
                    l4.verify()?;
                }
            }
        }

        Ok(m)
    }

    /// Evaluate the match against `hdr`, outermost layer first,
    /// recording the consulted fields in `trace`.
    ///
    /// Without an Ethernet condition the match selects every packet.
    /// The inner layers narrow the Ethernet condition; they are not
    /// evaluated on their own.
    pub fn is_match<H: PacketHeader + ?Sized>(
        &self,
        hdr: &H,
        trace: &mut MatchTrace,
    ) -> bool {
        let Some(ether) = &self.ether else {
            return true;
        };

        if !ether.is_match(hdr, trace) {
            return false;
        }

        let Some(inet) = &self.inet else {
            return true;
        };

        if !inet.is_match(hdr, trace) {
            return false;
        }

        match &self.l4 {
            Some(l4) => l4.is_match(hdr, trace),
            None => true,
        }
    }

    pub fn push_key_terms(&self, terms: &mut Vec<String>) {
        if let Some(ether) = &self.ether {
            ether.push_key_terms(terms);
        }
        if let Some(inet) = &self.inet {
            inet.push_key_terms(terms);
        }
        if let Some(l4) = &self.l4 {
            l4.push_key_terms(terms);
        }
    }

    /// The canonical `FIELD=value,...` rendering of the conditions.
    pub fn condition_key(&self) -> String {
        let mut terms = Vec::new();
        self.push_key_terms(&mut terms);
        terms.join(",")
    }

    /// The identity of a flow entry installed for this match on
    /// `node` at `priority`.
    pub fn flow_key(
        &self,
        node: &str,
        priority: u32,
        in_port: Option<&str>,
    ) -> String {
        let mut terms = vec![format!("node={node}"), format!("pri={priority}")];
        if let Some(port) = in_port {
            terms.push(format!("{}={port}", MatchField::InPort));
        }
        self.push_key_terms(&mut terms);
        terms.join(",")
    }
}

impl Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.condition_key())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::Dscp;
    use crate::api::ETHER_TYPE_ARP;
    use crate::api::ETHER_TYPE_IPV4;
    use crate::api::MacAddr;
    use crate::api::VlanId;
    use crate::api::VlanPcp;
    use crate::engine::ErrorKind;
    use crate::engine::MatchError;
    use crate::engine::header::HeaderMeta;
    use crate::engine::header::Ipv4Header;
    use crate::engine::header::UlpHeader;
    use crate::engine::inet::Inet4Match;
    use crate::engine::l4::IcmpMatch;
    use crate::engine::l4::PortMatch;
    use crate::engine::port_range::PortRange;

    const SRC: MacAddr = MacAddr::from_const([0xa8, 0x40, 0x25, 0, 0, 1]);
    const DST: MacAddr = MacAddr::from_const([0xa8, 0x40, 0x25, 0, 0, 2]);

    fn tcp_pkt(src: u16, dst: u16) -> HeaderMeta {
        let ip = Ipv4Header {
            src: "192.168.1.10".parse().unwrap(),
            dst: "10.1.2.3".parse().unwrap(),
            proto: 6,
            dscp: Dscp::default(),
        };
        HeaderMeta::ip4_packet(
            SRC,
            DST,
            ip,
            Some(UlpHeader::Tcp { src, dst }),
        )
    }

    fn tcp_dst(port: u16) -> L4Match {
        L4Match::Tcp(PortMatch::new(None, Some(PortRange::single(port))))
    }

    fn raw_samples() -> Vec<FlowMatch> {
        let net = "10.0.0.0/8".parse().unwrap();
        vec![
            FlowMatch::default(),
            FlowMatch::default().with_ether(EtherMatch::new()),
            FlowMatch::default().with_l4(tcp_dst(80)),
            FlowMatch::default().with_l4(L4Match::Udp(PortMatch::default())),
            FlowMatch::default().with_inet(Inet4Match::new()),
            FlowMatch::default().with_inet(Inet4Match::new().with_dst(net)),
            FlowMatch::default()
                .with_ether(EtherMatch::new().with_src(SRC))
                .with_inet(Inet4Match::new().with_protocol(1))
                .with_l4(L4Match::Icmp(IcmpMatch::new(Some(8), None))),
            FlowMatch::default()
                .with_ether(
                    EtherMatch::new()
                        .with_vlan_id(VlanId::new(10).unwrap())
                        .with_vlan_pcp(VlanPcp::new(3).unwrap()),
                )
                .with_l4(tcp_dst(443)),
        ]
    }

    #[test]
    fn complete_is_idempotent() {
        for m in raw_samples() {
            let once = m.complete().unwrap();
            let twice = once.complete().unwrap();
            assert_eq!(once, twice, "{m:?}");
        }
    }

    #[test]
    fn complete_derives_outer_fields() {
        let m = FlowMatch::default()
            .with_ether(EtherMatch::new().with_ether_type(ETHER_TYPE_IPV4))
            .with_l4(tcp_dst(80))
            .complete()
            .unwrap();

        assert_eq!(m.inet().unwrap().protocol(), Some(6));
        assert_eq!(m.ether().unwrap().ether_type(), Some(ETHER_TYPE_IPV4));
        assert_eq!(m.condition_key(), "DL_TYPE=2048,IP_PROTO=6,TCP_DST=80");
    }

    #[test]
    fn complete_detects_conflicts() {
        let err = FlowMatch::default()
            .with_ether(EtherMatch::new().with_ether_type(ETHER_TYPE_ARP))
            .with_l4(tcp_dst(80))
            .complete()
            .unwrap_err();
        assert_eq!(
            err,
            MatchError::Conflict {
                field: MatchField::DlType,
                current: 0x0806,
                requested: 0x0800,
            }
        );

        let err = FlowMatch::default()
            .with_inet(Inet4Match::new().with_protocol(17))
            .with_l4(tcp_dst(80))
            .complete()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn complete_drops_empty_layers() {
        let m = FlowMatch::default()
            .with_l4(L4Match::Udp(PortMatch::default()))
            .complete()
            .unwrap();
        assert!(m.l4().is_none());
        assert_eq!(m.condition_key(), "DL_TYPE=2048,IP_PROTO=17");

        let m = FlowMatch::default()
            .with_inet(Inet4Match::new())
            .complete()
            .unwrap();
        assert!(m.inet().is_none());
        assert_eq!(m.condition_key(), "DL_TYPE=2048");

        let m = FlowMatch::default()
            .with_ether(EtherMatch::new())
            .complete()
            .unwrap();
        assert!(m.is_empty());

        // The raw match is left as it was.
        let raw = FlowMatch::default().with_ether(EtherMatch::new());
        let _ = raw.complete().unwrap();
        assert!(raw.ether().is_some());
    }

    #[test]
    fn verify_checks_reachable_layers() {
        let pcp_without_vlan = EtherMatch::new()
            .with_vlan_id(VlanId::NONE)
            .with_vlan_pcp(VlanPcp::new(3).unwrap());
        let err = FlowMatch::default()
            .with_ether(pcp_without_vlan)
            .verify()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let m = FlowMatch::default().with_l4(tcp_dst(22)).verify().unwrap();
        assert_eq!(m, m.verify().unwrap());
    }

    #[test]
    fn empty_match_selects_everything() {
        let m = FlowMatch::default();
        let mut trace = MatchTrace::new();
        assert!(m.is_match(&tcp_pkt(1, 2), &mut trace));
        assert!(m.is_match(&HeaderMeta::ether(DST, SRC, 0x88cc), &mut trace));
        assert!(trace.fields().is_empty());
        assert_eq!(m.condition_key(), "");
    }

    // Inner layers narrow the Ethernet condition; without one the
    // raw match selects every packet.
    #[test]
    fn no_ether_ignores_inner_layers() {
        let m = FlowMatch::default().with_l4(tcp_dst(80));
        let mut trace = MatchTrace::new();
        assert!(m.is_match(&tcp_pkt(1000, 443), &mut trace));
        assert!(trace.fields().is_empty());
    }

    #[test]
    fn evaluation_outer_to_inner() {
        let m = FlowMatch::default()
            .with_ether(EtherMatch::new().with_src(SRC))
            .with_inet(
                Inet4Match::new().with_src("192.168.1.0/24".parse().unwrap()),
            )
            .with_l4(tcp_dst(80))
            .verify()
            .unwrap();

        let mut trace = MatchTrace::new();
        assert!(m.is_match(&tcp_pkt(40000, 80), &mut trace));
        for f in [
            MatchField::DlSrc,
            MatchField::DlType,
            MatchField::IpSrc,
            MatchField::IpProto,
            MatchField::TcpDst,
        ] {
            assert!(trace.has(f), "{f}");
        }
        assert!(!trace.has(MatchField::TcpSrc));

        let mut trace = MatchTrace::new();
        assert!(!m.is_match(&tcp_pkt(40000, 81), &mut trace));
        assert!(trace.has(MatchField::TcpDst));

        // An Ethernet miss leaves the inner layers untested.
        let mut trace = MatchTrace::new();
        let other = HeaderMeta::ether(DST, SRC, ETHER_TYPE_IPV4);
        assert!(!m.is_match(&other, &mut trace));
        assert!(trace.has(MatchField::DlSrc));
        assert!(!trace.has(MatchField::IpSrc));
    }

    #[test]
    fn key_ignores_construction_order() {
        let a = FlowMatch::default()
            .with_ether(EtherMatch::new().with_dst(DST).with_src(SRC))
            .with_l4(tcp_dst(80))
            .with_inet(Inet4Match::new().with_dscp(Dscp::new(46).unwrap()));
        let b = FlowMatch::default()
            .with_inet(Inet4Match::new().with_dscp(Dscp::new(46).unwrap()))
            .with_l4(tcp_dst(80))
            .with_ether(EtherMatch::new().with_src(SRC).with_dst(DST));
        assert_eq!(a.condition_key(), b.condition_key());
        assert_eq!(
            a.verify().unwrap().condition_key(),
            "DL_SRC=a8:40:25:00:00:01,DL_DST=a8:40:25:00:00:02,\
             DL_TYPE=2048,IP_PROTO=6,IP_DSCP=46,TCP_DST=80"
        );
    }

    #[test]
    fn flow_keys() {
        let m = FlowMatch::default().with_l4(tcp_dst(80)).verify().unwrap();
        assert_eq!(
            m.flow_key("openflow:1", 10, None),
            "node=openflow:1,pri=10,DL_TYPE=2048,IP_PROTO=6,TCP_DST=80"
        );
        assert_eq!(
            m.flow_key("openflow:1", 10, Some("openflow:1:3")),
            "node=openflow:1,pri=10,IN_PORT=openflow:1:3,\
             DL_TYPE=2048,IP_PROTO=6,TCP_DST=80"
        );
        assert_eq!(
            FlowMatch::default().flow_key("openflow:2", 0, None),
            "node=openflow:2,pri=0"
        );
    }
}
