// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Network-layer (L3) conditions.

use super::error::MatchError;
use super::error::MatchResult;
use super::field::MatchField;
use super::header::MatchTrace;
use super::header::PacketHeader;
use crate::api::Dscp;
use crate::api::ETHER_TYPE_IPV4;
use crate::api::IpVersion;
use crate::api::Ipv4Cidr;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;

/// Conditions on the IPv4 header.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Inet4Match {
    src: Option<Ipv4Cidr>,
    dst: Option<Ipv4Cidr>,
    protocol: Option<u8>,
    dscp: Option<Dscp>,
}

fn parse_net(field: MatchField, s: &str) -> MatchResult<Ipv4Cidr> {
    if s.contains(':') {
        return Err(MatchError::Unsupported(format!(
            "{field}: non-IPv4 network: {s}"
        )));
    }

    s.parse::<Ipv4Cidr>().map_err(|e| MatchError::invalid(field, e))
}

impl Inet4Match {
    pub const fn new() -> Self {
        Self { src: None, dst: None, protocol: None, dscp: None }
    }

    /// Build a match from unchecked values, as found in user input.
    pub fn from_raw(
        src: Option<&str>,
        dst: Option<&str>,
        protocol: Option<u32>,
        dscp: Option<u32>,
    ) -> MatchResult<Self> {
        let src = src.map(|s| parse_net(MatchField::IpSrc, s)).transpose()?;
        let dst = dst.map(|s| parse_net(MatchField::IpDst, s)).transpose()?;

        let protocol = protocol
            .map(|p| {
                u8::try_from(p).map_err(|_| {
                    MatchError::invalid(
                        MatchField::IpProto,
                        format!("bad IP protocol: {p}"),
                    )
                })
            })
            .transpose()?;

        let dscp = dscp
            .map(|d| {
                u8::try_from(d)
                    .map_err(|_| format!("bad DSCP: {d}"))
                    .and_then(Dscp::new)
                    .map_err(|e| MatchError::invalid(MatchField::IpDscp, e))
            })
            .transpose()?;

        Ok(Self { src, dst, protocol, dscp })
    }

    pub fn with_src(mut self, net: Ipv4Cidr) -> Self {
        self.src = Some(net);
        self
    }

    pub fn with_dst(mut self, net: Ipv4Cidr) -> Self {
        self.dst = Some(net);
        self
    }

    pub fn with_protocol(mut self, proto: u8) -> Self {
        self.protocol = Some(proto);
        self
    }

    pub fn with_dscp(mut self, dscp: Dscp) -> Self {
        self.dscp = Some(dscp);
        self
    }

    pub fn src(&self) -> Option<Ipv4Cidr> {
        self.src
    }

    pub fn dst(&self) -> Option<Ipv4Cidr> {
        self.dst
    }

    pub fn protocol(&self) -> Option<u8> {
        self.protocol
    }

    pub fn dscp(&self) -> Option<Dscp> {
        self.dscp
    }

    /// Fill in the protocol implied by the transport layer, with the
    /// same rules as [`EtherMatch::set_ether_type()`].
    ///
    /// [`EtherMatch::set_ether_type()`]: super::ether::EtherMatch::set_ether_type
    pub fn set_protocol(mut self, proto: u8) -> MatchResult<Self> {
        match self.protocol {
            None => {
                self.protocol = Some(proto);
                Ok(self)
            }

            Some(cur) if cur == proto => Ok(self),

            Some(cur) => Err(MatchError::Conflict {
                field: MatchField::IpProto,
                current: u32::from(cur),
                requested: u32::from(proto),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_none()
            && self.dst.is_none()
            && self.protocol.is_none()
            && self.dscp.is_none()
    }

    /// Evaluate the conditions against `hdr`.
    ///
    /// The addresses are tested first, source then destination. The
    /// protocol and DSCP are only consulted once both address tests
    /// have passed. A packet with no IPv4 header never matches, and
    /// nothing is recorded for it.
    pub fn is_match<H: PacketHeader + ?Sized>(
        &self,
        hdr: &H,
        trace: &mut MatchTrace,
    ) -> bool {
        let Some(ip) = hdr.ipv4() else {
            return false;
        };

        if let Some(src) = self.src {
            trace.add(MatchField::IpSrc);
            if !src.is_member(ip.src) {
                return false;
            }
        }

        if let Some(dst) = self.dst {
            trace.add(MatchField::IpDst);
            if !dst.is_member(ip.dst) {
                return false;
            }
        }

        if let Some(proto) = self.protocol {
            trace.add(MatchField::IpProto);
            if ip.proto != proto {
                return false;
            }
        }

        if let Some(dscp) = self.dscp {
            trace.add(MatchField::IpDscp);
            if ip.dscp != dscp {
                return false;
            }
        }

        true
    }

    pub fn push_key_terms(&self, terms: &mut Vec<String>) {
        if let Some(src) = self.src {
            terms.push(format!("{}={src}", MatchField::IpSrc));
        }
        if let Some(dst) = self.dst {
            terms.push(format!("{}={dst}", MatchField::IpDst));
        }
        if let Some(proto) = self.protocol {
            terms.push(format!("{}={proto}", MatchField::IpProto));
        }
        if let Some(dscp) = self.dscp {
            terms.push(format!("{}={dscp}", MatchField::IpDscp));
        }
    }
}

/// Conditions on the network layer, per IP version.
///
/// Only IPv4 is implemented; another version is added as a new
/// variant with its own arm in each method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum InetMatch {
    Ip4(Inet4Match),
}

impl From<Inet4Match> for InetMatch {
    fn from(m: Inet4Match) -> Self {
        Self::Ip4(m)
    }
}

impl InetMatch {
    /// A match on nothing but the protocol.
    pub fn for_protocol(ver: IpVersion, proto: u8) -> MatchResult<Self> {
        match ver {
            IpVersion::V4 => Ok(Self::Ip4(Inet4Match::new().with_protocol(proto))),
            IpVersion::V6 => {
                Err(MatchError::Unsupported(format!("{ver} network match")))
            }
        }
    }

    pub fn version(&self) -> IpVersion {
        match self {
            Self::Ip4(_) => IpVersion::V4,
        }
    }

    /// The ether type every packet of this IP version carries.
    pub fn ether_type(&self) -> u16 {
        match self {
            Self::Ip4(_) => ETHER_TYPE_IPV4,
        }
    }

    pub fn protocol(&self) -> Option<u8> {
        match self {
            Self::Ip4(m) => m.protocol(),
        }
    }

    pub fn ip4(&self) -> Option<&Inet4Match> {
        match self {
            Self::Ip4(m) => Some(m),
        }
    }

    pub fn set_protocol(self, proto: u8) -> MatchResult<Self> {
        match self {
            Self::Ip4(m) => m.set_protocol(proto).map(Self::Ip4),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Ip4(m) => m.is_empty(),
        }
    }

    /// Every IPv4 field is range-checked by its type, so there is
    /// nothing left to check between them.
    pub fn verify(&self) -> MatchResult<()> {
        match self {
            Self::Ip4(_) => Ok(()),
        }
    }

    pub fn is_match<H: PacketHeader + ?Sized>(
        &self,
        hdr: &H,
        trace: &mut MatchTrace,
    ) -> bool {
        match self {
            Self::Ip4(m) => m.is_match(hdr, trace),
        }
    }

    pub fn push_key_terms(&self, terms: &mut Vec<String>) {
        match self {
            Self::Ip4(m) => m.push_key_terms(terms),
        }
    }

    pub fn condition_key(&self) -> String {
        let mut terms = Vec::new();
        self.push_key_terms(&mut terms);
        terms.join(",")
    }
}

impl Display for InetMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.condition_key())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::MacAddr;
    use crate::api::PROTO_TCP;
    use crate::api::PROTO_UDP;
    use crate::engine::ErrorKind;
    use crate::engine::header::HeaderMeta;
    use crate::engine::header::Ipv4Header;
    use alloc::string::ToString;

    fn hdr(src: &str, dst: &str, proto: u8, dscp: u8) -> HeaderMeta {
        let ip = Ipv4Header {
            src: src.parse().unwrap(),
            dst: dst.parse().unwrap(),
            proto,
            dscp: Dscp::new(dscp).unwrap(),
        };
        HeaderMeta::ip4_packet(MacAddr::ZERO, MacAddr::ZERO, ip, None)
    }

    #[test]
    fn from_raw_validates() {
        let m = Inet4Match::from_raw(
            Some("10.0.0.0/8"),
            Some("192.168.1.7"),
            Some(6),
            Some(46),
        )
        .unwrap();
        assert_eq!(m.src().unwrap().to_string(), "10.0.0.0/8");
        assert_eq!(m.dst().unwrap().to_string(), "192.168.1.7/32");
        assert_eq!(m.protocol(), Some(PROTO_TCP));
        assert_eq!(m.dscp().map(|d| d.val()), Some(46));

        let err = Inet4Match::from_raw(None, None, None, Some(64)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = Inet4Match::from_raw(None, None, Some(256), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err =
            Inet4Match::from_raw(Some("10.0.0.0/33"), None, None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err =
            Inet4Match::from_raw(None, Some("fd00::/64"), None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn set_protocol_rules() {
        let m = Inet4Match::new().set_protocol(PROTO_TCP).unwrap();
        assert_eq!(m.protocol(), Some(PROTO_TCP));
        assert_eq!(m.set_protocol(PROTO_TCP), Ok(m));
        assert_eq!(
            m.set_protocol(PROTO_UDP).unwrap_err(),
            MatchError::Conflict {
                field: MatchField::IpProto,
                current: 6,
                requested: 17,
            }
        );
    }

    #[test]
    fn address_mismatch_skips_protocol() {
        let m = Inet4Match::new()
            .with_src("10.0.0.0/8".parse().unwrap())
            .with_protocol(PROTO_TCP);
        let mut trace = MatchTrace::new();
        assert!(!m.is_match(&hdr("11.0.0.1", "10.0.0.2", 6, 0), &mut trace));
        assert!(trace.has(MatchField::IpSrc));
        assert!(!trace.has(MatchField::IpProto));

        let mut trace = MatchTrace::new();
        assert!(m.is_match(&hdr("10.9.0.1", "10.0.0.2", 6, 0), &mut trace));
        assert!(trace.has(MatchField::IpSrc));
        assert!(trace.has(MatchField::IpProto));
        assert!(!trace.has(MatchField::IpDst));
    }

    #[test]
    fn dscp_checked_last() {
        let m = Inet4Match::new()
            .with_dst("192.168.0.0/16".parse().unwrap())
            .with_protocol(PROTO_UDP)
            .with_dscp(Dscp::new(10).unwrap());
        let mut trace = MatchTrace::new();
        assert!(!m.is_match(&hdr("1.1.1.1", "192.168.3.4", 6, 10), &mut trace));
        assert!(trace.has(MatchField::IpProto));
        assert!(!trace.has(MatchField::IpDscp));

        let mut trace = MatchTrace::new();
        assert!(!m.is_match(&hdr("1.1.1.1", "192.168.3.4", 17, 12), &mut trace));
        assert!(trace.has(MatchField::IpDscp));

        assert!(m.is_match(&hdr("1.1.1.1", "192.168.3.4", 17, 10), &mut trace));
    }

    #[test]
    fn non_ip_packet_never_matches() {
        let m = InetMatch::from(Inet4Match::new());
        let pkt = HeaderMeta::ether(MacAddr::ZERO, MacAddr::ZERO, 0x0806);
        let mut trace = MatchTrace::new();
        assert!(!m.is_match(&pkt, &mut trace));
        assert!(trace.fields().is_empty());
    }

    #[test]
    fn version_helpers() {
        let m = InetMatch::for_protocol(IpVersion::V4, PROTO_TCP).unwrap();
        assert_eq!(m.version(), IpVersion::V4);
        assert_eq!(m.ether_type(), ETHER_TYPE_IPV4);
        assert_eq!(m.protocol(), Some(PROTO_TCP));
        assert_eq!(
            InetMatch::for_protocol(IpVersion::V6, PROTO_TCP).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
    }

    #[test]
    fn key_order() {
        let m = InetMatch::from(
            Inet4Match::new()
                .with_dscp(Dscp::new(8).unwrap())
                .with_protocol(17)
                .with_dst("10.1.2.0/24".parse().unwrap())
                .with_src("10.0.0.1".parse().unwrap()),
        );
        assert_eq!(
            m.condition_key(),
            "IP_SRC=10.0.0.1/32,IP_DST=10.1.2.0/24,IP_PROTO=17,IP_DSCP=8"
        );
    }
}
