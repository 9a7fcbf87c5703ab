// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Ethernet (L2) conditions.

use super::error::MatchError;
use super::error::MatchResult;
use super::field::MatchField;
use super::header::MatchTrace;
use super::header::PacketHeader;
use crate::api::MacAddr;
use crate::api::VlanId;
use crate::api::VlanPcp;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;

/// Conditions on the Ethernet header. Every field is optional; an
/// unset field matches any value.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct EtherMatch {
    src: Option<MacAddr>,
    dst: Option<MacAddr>,
    ether_type: Option<u16>,
    vlan_id: Option<VlanId>,
    vlan_pcp: Option<VlanPcp>,
}

impl EtherMatch {
    pub const fn new() -> Self {
        Self {
            src: None,
            dst: None,
            ether_type: None,
            vlan_id: None,
            vlan_pcp: None,
        }
    }

    /// Build a match from unchecked values, as found in user input.
    pub fn from_raw(
        src: Option<&str>,
        dst: Option<&str>,
        ether_type: Option<u32>,
        vlan_id: Option<u32>,
        vlan_pcp: Option<u32>,
    ) -> MatchResult<Self> {
        let mac = |field: MatchField, s: &str| {
            s.parse::<MacAddr>().map_err(|e| MatchError::invalid(field, e))
        };

        let src = src.map(|s| mac(MatchField::DlSrc, s)).transpose()?;
        let dst = dst.map(|s| mac(MatchField::DlDst, s)).transpose()?;

        let ether_type = ether_type
            .map(|et| {
                u16::try_from(et).map_err(|_| {
                    MatchError::invalid(
                        MatchField::DlType,
                        format!("bad ether type: {et:#x}"),
                    )
                })
            })
            .transpose()?;

        let vlan_id = vlan_id
            .map(|vid| {
                u16::try_from(vid)
                    .map_err(|_| format!("bad VLAN ID: {vid}"))
                    .and_then(VlanId::new)
                    .map_err(|e| MatchError::invalid(MatchField::DlVlan, e))
            })
            .transpose()?;

        let vlan_pcp = vlan_pcp
            .map(|pcp| {
                u8::try_from(pcp)
                    .map_err(|_| format!("bad VLAN priority: {pcp}"))
                    .and_then(VlanPcp::new)
                    .map_err(|e| MatchError::invalid(MatchField::DlVlanPcp, e))
            })
            .transpose()?;

        Ok(Self { src, dst, ether_type, vlan_id, vlan_pcp })
    }

    pub fn with_src(mut self, mac: MacAddr) -> Self {
        self.src = Some(mac);
        self
    }

    pub fn with_dst(mut self, mac: MacAddr) -> Self {
        self.dst = Some(mac);
        self
    }

    pub fn with_ether_type(mut self, ether_type: u16) -> Self {
        self.ether_type = Some(ether_type);
        self
    }

    pub fn with_vlan_id(mut self, vid: VlanId) -> Self {
        self.vlan_id = Some(vid);
        self
    }

    pub fn with_vlan_pcp(mut self, pcp: VlanPcp) -> Self {
        self.vlan_pcp = Some(pcp);
        self
    }

    pub fn src(&self) -> Option<MacAddr> {
        self.src
    }

    pub fn dst(&self) -> Option<MacAddr> {
        self.dst
    }

    pub fn ether_type(&self) -> Option<u16> {
        self.ether_type
    }

    pub fn vlan_id(&self) -> Option<VlanId> {
        self.vlan_id
    }

    pub fn vlan_pcp(&self) -> Option<VlanPcp> {
        self.vlan_pcp
    }

    /// Fill in the ether type implied by the network layer.
    ///
    /// An unset ether type takes `ether_type`; an equal one is left
    /// alone; a different one is a conflict.
    pub fn set_ether_type(mut self, ether_type: u16) -> MatchResult<Self> {
        match self.ether_type {
            None => {
                self.ether_type = Some(ether_type);
                Ok(self)
            }

            Some(cur) if cur == ether_type => Ok(self),

            Some(cur) => Err(MatchError::Conflict {
                field: MatchField::DlType,
                current: u32::from(cur),
                requested: u32::from(ether_type),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_none()
            && self.dst.is_none()
            && self.ether_type.is_none()
            && self.vlan_id.is_none()
            && self.vlan_pcp.is_none()
    }

    /// Check the constraints between fields.
    pub fn verify(&self) -> MatchResult<()> {
        if self.vlan_pcp.is_some() {
            match self.vlan_id {
                Some(vid) if !vid.is_none() => {}
                _ => {
                    return Err(MatchError::invalid(
                        MatchField::DlVlanPcp,
                        "VLAN priority requires a VLAN ID",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Evaluate the conditions against `hdr`, in the order source,
    /// destination, ether type, VLAN. Evaluation stops at the first
    /// mismatch, so later fields are neither tested nor recorded.
    ///
    /// The VLAN ID is never recorded: every flow entry matches on it
    /// regardless. The VLAN priority is only consulted for a frame on
    /// the expected VLAN.
    pub fn is_match<H: PacketHeader + ?Sized>(
        &self,
        hdr: &H,
        trace: &mut MatchTrace,
    ) -> bool {
        if let Some(src) = self.src {
            trace.add(MatchField::DlSrc);
            if hdr.src_mac() != src {
                return false;
            }
        }

        if let Some(dst) = self.dst {
            trace.add(MatchField::DlDst);
            if hdr.dst_mac() != dst {
                return false;
            }
        }

        if let Some(et) = self.ether_type {
            trace.add(MatchField::DlType);
            if hdr.ether_type() != et {
                return false;
            }
        }

        if let Some(vid) = self.vlan_id {
            if hdr.vlan_id() != vid {
                return false;
            }

            if let Some(pcp) = self.vlan_pcp {
                trace.add(MatchField::DlVlanPcp);
                if hdr.vlan_pcp() != pcp {
                    return false;
                }
            }
        }

        true
    }

    /// Append the `FIELD=value` terms of the condition key.
    pub fn push_key_terms(&self, terms: &mut Vec<String>) {
        if let Some(src) = self.src {
            terms.push(format!("{}={src}", MatchField::DlSrc));
        }
        if let Some(dst) = self.dst {
            terms.push(format!("{}={dst}", MatchField::DlDst));
        }
        if let Some(et) = self.ether_type {
            terms.push(format!("{}={et}", MatchField::DlType));
        }
        if let Some(vid) = self.vlan_id {
            terms.push(format!("{}={vid}", MatchField::DlVlan));
        }
        if let Some(pcp) = self.vlan_pcp {
            terms.push(format!("{}={pcp}", MatchField::DlVlanPcp));
        }
    }

    pub fn condition_key(&self) -> String {
        let mut terms = Vec::new();
        self.push_key_terms(&mut terms);
        terms.join(",")
    }
}

impl Display for EtherMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.condition_key())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::ETHER_TYPE_ARP;
    use crate::api::ETHER_TYPE_IPV4;
    use crate::engine::ErrorKind;
    use crate::engine::header::HeaderMeta;

    const SRC: MacAddr = MacAddr::from_const([0xa8, 0x40, 0x25, 0, 0, 1]);
    const DST: MacAddr = MacAddr::from_const([0xa8, 0x40, 0x25, 0, 0, 2]);
    const OTHER: MacAddr = MacAddr::from_const([0xa8, 0x40, 0x25, 0, 0, 9]);

    fn vid(v: u16) -> VlanId {
        VlanId::new(v).unwrap()
    }

    fn pcp(v: u8) -> VlanPcp {
        VlanPcp::new(v).unwrap()
    }

    #[test]
    fn from_raw_validates() {
        let m = EtherMatch::from_raw(
            Some("a8:40:25:00:00:01"),
            None,
            Some(0x0800),
            Some(10),
            Some(3),
        )
        .unwrap();
        assert_eq!(m.src(), Some(SRC));
        assert_eq!(m.ether_type(), Some(ETHER_TYPE_IPV4));
        assert_eq!(m.vlan_id(), Some(vid(10)));
        assert_eq!(m.vlan_pcp(), Some(pcp(3)));

        let bad = [
            EtherMatch::from_raw(Some("a8:40:25"), None, None, None, None),
            EtherMatch::from_raw(None, Some("zz::"), None, None, None),
            EtherMatch::from_raw(None, None, Some(0x10000), None, None),
            EtherMatch::from_raw(None, None, None, Some(4096), None),
            EtherMatch::from_raw(None, None, None, Some(1), Some(8)),
        ];
        for res in bad {
            assert_eq!(res.unwrap_err().kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn set_ether_type_rules() {
        let m = EtherMatch::new().set_ether_type(ETHER_TYPE_IPV4).unwrap();
        assert_eq!(m.ether_type(), Some(ETHER_TYPE_IPV4));
        assert_eq!(m.set_ether_type(ETHER_TYPE_IPV4), Ok(m));
        assert_eq!(
            m.set_ether_type(ETHER_TYPE_ARP),
            Err(MatchError::Conflict {
                field: MatchField::DlType,
                current: 0x0800,
                requested: 0x0806,
            })
        );
    }

    #[test]
    fn pcp_requires_vlan() {
        let m = EtherMatch::new().with_vlan_pcp(pcp(3));
        assert_eq!(m.verify().unwrap_err().kind(), ErrorKind::Validation);

        let m = m.with_vlan_id(VlanId::NONE);
        assert_eq!(m.verify().unwrap_err().kind(), ErrorKind::Validation);

        let m = m.with_vlan_id(vid(5));
        assert_eq!(m.verify(), Ok(()));
    }

    #[test]
    fn source_mismatch_stops_evaluation() {
        let m = EtherMatch::new().with_src(SRC).with_dst(DST);
        let hdr = HeaderMeta::ether(OTHER, DST, ETHER_TYPE_IPV4);
        let mut trace = MatchTrace::new();
        assert!(!m.is_match(&hdr, &mut trace));
        assert!(trace.has(MatchField::DlSrc));
        assert!(!trace.has(MatchField::DlDst));
    }

    #[test]
    fn full_match_records_fields() {
        let m = EtherMatch::new()
            .with_src(SRC)
            .with_dst(DST)
            .with_ether_type(ETHER_TYPE_IPV4)
            .with_vlan_id(vid(7))
            .with_vlan_pcp(pcp(2));
        let hdr = HeaderMeta::ether(SRC, DST, ETHER_TYPE_IPV4)
            .with_vlan(vid(7), pcp(2));
        let mut trace = MatchTrace::new();
        assert!(m.is_match(&hdr, &mut trace));
        assert!(trace.has(MatchField::DlSrc));
        assert!(trace.has(MatchField::DlDst));
        assert!(trace.has(MatchField::DlType));
        assert!(trace.has(MatchField::DlVlanPcp));
        assert!(!trace.has(MatchField::DlVlan));
    }

    #[test]
    fn vlan_mismatch_skips_priority() {
        let m = EtherMatch::new().with_vlan_id(vid(7)).with_vlan_pcp(pcp(2));
        let hdr =
            HeaderMeta::ether(SRC, DST, ETHER_TYPE_IPV4).with_vlan(vid(8), pcp(2));
        let mut trace = MatchTrace::new();
        assert!(!m.is_match(&hdr, &mut trace));
        assert!(trace.fields().is_empty());

        let hdr =
            HeaderMeta::ether(SRC, DST, ETHER_TYPE_IPV4).with_vlan(vid(7), pcp(1));
        assert!(!m.is_match(&hdr, &mut trace));
        assert!(trace.has(MatchField::DlVlanPcp));
    }

    #[test]
    fn untagged_match() {
        let m = EtherMatch::new().with_vlan_id(VlanId::NONE);
        let mut trace = MatchTrace::new();
        let hdr = HeaderMeta::ether(SRC, DST, ETHER_TYPE_ARP);
        assert!(m.is_match(&hdr, &mut trace));
        let tagged = hdr.with_vlan(vid(1), pcp(0));
        assert!(!m.is_match(&tagged, &mut trace));
    }

    #[test]
    fn key_has_fixed_order() {
        let a = EtherMatch::new()
            .with_vlan_pcp(pcp(1))
            .with_ether_type(ETHER_TYPE_ARP)
            .with_vlan_id(vid(100))
            .with_dst(DST)
            .with_src(SRC);
        let b = EtherMatch::new()
            .with_src(SRC)
            .with_dst(DST)
            .with_ether_type(ETHER_TYPE_ARP)
            .with_vlan_id(vid(100))
            .with_vlan_pcp(pcp(1));
        let key = "DL_SRC=a8:40:25:00:00:01,DL_DST=a8:40:25:00:00:02,\
                   DL_TYPE=2054,DL_VLAN=100,DL_VLAN_PCP=1";
        assert_eq!(a.condition_key(), key);
        assert_eq!(b.condition_key(), key);
        assert_eq!(EtherMatch::new().condition_key(), "");
        assert_eq!(
            EtherMatch::new().with_dst(DST).condition_key(),
            "DL_DST=a8:40:25:00:00:02"
        );
    }
}
