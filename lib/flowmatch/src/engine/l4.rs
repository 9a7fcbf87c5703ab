// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Transport-layer (L4) conditions.

use super::error::MatchError;
use super::error::MatchResult;
use super::field::MatchField;
use super::header::MatchTrace;
use super::header::PacketHeader;
use super::header::UlpHeader;
use super::port_range::PortRange;
use crate::api::IpVersion;
use crate::api::PROTO_ICMP;
use crate::api::PROTO_TCP;
use crate::api::PROTO_UDP;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;

/// Source and destination port conditions, shared by TCP and UDP.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PortMatch {
    src: Option<PortRange>,
    dst: Option<PortRange>,
}

impl PortMatch {
    pub const fn new(src: Option<PortRange>, dst: Option<PortRange>) -> Self {
        Self { src, dst }
    }

    pub fn src(&self) -> Option<PortRange> {
        self.src
    }

    pub fn dst(&self) -> Option<PortRange> {
        self.dst
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_none() && self.dst.is_none()
    }
}

/// Conditions on the ICMPv4 header.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct IcmpMatch {
    ty: Option<u8>,
    code: Option<u8>,
}

impl IcmpMatch {
    pub const fn new(ty: Option<u8>, code: Option<u8>) -> Self {
        Self { ty, code }
    }

    pub fn ty(&self) -> Option<u8> {
        self.ty
    }

    pub fn code(&self) -> Option<u8> {
        self.code
    }

    pub fn is_empty(&self) -> bool {
        self.ty.is_none() && self.code.is_none()
    }

    fn is_match(&self, ty: u8, code: u8, trace: &mut MatchTrace) -> bool {
        if let Some(want) = self.ty {
            trace.add(MatchField::IcmpType);
            if ty != want {
                return false;
            }
        }

        if let Some(want) = self.code {
            trace.add(MatchField::IcmpCode);
            if code != want {
                return false;
            }
        }

        true
    }
}

/// Conditions on the transport layer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum L4Match {
    Tcp(PortMatch),
    Udp(PortMatch),
    Icmp(IcmpMatch),
}

/// An unchecked `(from, to)` port pair as read from an external form.
/// A missing `to` means the range holds `from` alone.
pub type RawPorts = Option<(u32, Option<u32>)>;

fn raw_range(
    field: MatchField,
    from: u32,
    to: Option<u32>,
) -> MatchResult<PortRange> {
    PortRange::from_raw(from, to).map_err(|e| match e {
        MatchError::Validation(msg) => MatchError::invalid(field, msg),
        e => e,
    })
}

fn raw_u8(field: MatchField, val: u32) -> MatchResult<u8> {
    u8::try_from(val)
        .map_err(|_| MatchError::invalid(field, format!("bad value: {val}")))
}

// Shared by the TCP and UDP arms: the source range is tested first, and
// a miss there leaves the destination untested.
fn match_ports(
    m: &PortMatch,
    (src, dst): (u16, u16),
    (src_field, dst_field): (MatchField, MatchField),
    trace: &mut MatchTrace,
) -> bool {
    if let Some(range) = m.src {
        trace.add(src_field);
        if !range.contains(src) {
            return false;
        }
    }

    if let Some(range) = m.dst {
        trace.add(dst_field);
        if !range.contains(dst) {
            return false;
        }
    }

    true
}

impl L4Match {
    /// A TCP match built from unchecked `(from, to)` port pairs.
    pub fn tcp_from_raw(src: RawPorts, dst: RawPorts) -> MatchResult<Self> {
        let src = src
            .map(|(f, t)| raw_range(MatchField::TcpSrc, f, t))
            .transpose()?;
        let dst = dst
            .map(|(f, t)| raw_range(MatchField::TcpDst, f, t))
            .transpose()?;
        Ok(Self::Tcp(PortMatch::new(src, dst)))
    }

    /// A UDP match built from unchecked `(from, to)` port pairs.
    pub fn udp_from_raw(src: RawPorts, dst: RawPorts) -> MatchResult<Self> {
        let src = src
            .map(|(f, t)| raw_range(MatchField::UdpSrc, f, t))
            .transpose()?;
        let dst = dst
            .map(|(f, t)| raw_range(MatchField::UdpDst, f, t))
            .transpose()?;
        Ok(Self::Udp(PortMatch::new(src, dst)))
    }

    pub fn icmp_from_raw(ty: Option<u32>, code: Option<u32>) -> MatchResult<Self> {
        let ty = ty.map(|v| raw_u8(MatchField::IcmpType, v)).transpose()?;
        let code = code.map(|v| raw_u8(MatchField::IcmpCode, v)).transpose()?;
        Ok(Self::Icmp(IcmpMatch::new(ty, code)))
    }

    /// The IP protocol number this transport match implies.
    pub fn inet_protocol(&self, ver: IpVersion) -> MatchResult<u8> {
        if ver != IpVersion::V4 {
            return Err(MatchError::Unsupported(format!(
                "{} match over {ver}",
                self.name()
            )));
        }

        Ok(match self {
            Self::Tcp(_) => PROTO_TCP,
            Self::Udp(_) => PROTO_UDP,
            Self::Icmp(_) => PROTO_ICMP,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tcp(_) => "TCP",
            Self::Udp(_) => "UDP",
            Self::Icmp(_) => "ICMP",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Tcp(m) | Self::Udp(m) => m.is_empty(),
            Self::Icmp(m) => m.is_empty(),
        }
    }

    /// Port ranges and ICMP values are range-checked when they are
    /// built, so every transport match that exists is valid.
    pub fn verify(&self) -> MatchResult<()> {
        Ok(())
    }

    /// Evaluate the conditions against `hdr`.
    ///
    /// A packet whose transport header is of another protocol does
    /// not match, and nothing is recorded for it.
    pub fn is_match<H: PacketHeader + ?Sized>(
        &self,
        hdr: &H,
        trace: &mut MatchTrace,
    ) -> bool {
        match (self, hdr.ulp()) {
            (Self::Tcp(m), Some(UlpHeader::Tcp { src, dst })) => match_ports(
                m,
                (src, dst),
                (MatchField::TcpSrc, MatchField::TcpDst),
                trace,
            ),

            (Self::Udp(m), Some(UlpHeader::Udp { src, dst })) => match_ports(
                m,
                (src, dst),
                (MatchField::UdpSrc, MatchField::UdpDst),
                trace,
            ),

            (Self::Icmp(m), Some(UlpHeader::Icmp { ty, code })) => {
                m.is_match(ty, code, trace)
            }

            _ => false,
        }
    }

    pub fn push_key_terms(&self, terms: &mut Vec<String>) {
        let (m, src_field, dst_field) = match self {
            Self::Tcp(m) => (m, MatchField::TcpSrc, MatchField::TcpDst),
            Self::Udp(m) => (m, MatchField::UdpSrc, MatchField::UdpDst),
            Self::Icmp(m) => {
                if let Some(ty) = m.ty {
                    terms.push(format!("{}={ty}", MatchField::IcmpType));
                }
                if let Some(code) = m.code {
                    terms.push(format!("{}={code}", MatchField::IcmpCode));
                }
                return;
            }
        };

        if let Some(src) = m.src {
            terms.push(format!("{src_field}={src}"));
        }
        if let Some(dst) = m.dst {
            terms.push(format!("{dst_field}={dst}"));
        }
    }

    pub fn condition_key(&self) -> String {
        let mut terms = Vec::new();
        self.push_key_terms(&mut terms);
        terms.join(",")
    }
}

impl Display for L4Match {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.condition_key())
    }
}
