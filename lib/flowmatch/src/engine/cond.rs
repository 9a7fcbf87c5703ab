// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! A flow condition: a named list of matches ordered by index.

use super::error::MatchError;
use super::error::MatchResult;
use super::flow_match::FlowMatch;
use super::header::MatchTrace;
use super::header::PacketHeader;
use super::spec::FlowConditionSpec;
use crate::provider::LogLevel;
use crate::provider::LogProvider;
use alloc::collections::BTreeMap;
use alloc::collections::btree_map::Entry;
use alloc::string::String;
use alloc::string::ToString;

pub const MATCH_INDEX_MIN: u32 = 1;
pub const MATCH_INDEX_MAX: u32 = 65535;
pub const COND_NAME_MAX_LEN: usize = 31;

pub fn check_index(index: u32) -> MatchResult<u32> {
    if !(MATCH_INDEX_MIN..=MATCH_INDEX_MAX).contains(&index) {
        return Err(MatchError::Validation(format!(
            "bad match index: {index}"
        )));
    }

    Ok(index)
}

pub fn check_name(name: &str) -> MatchResult<()> {
    let bad =
        || MatchError::Validation(format!("bad condition name: {name:?}"));

    if name.is_empty() || name.len() > COND_NAME_MAX_LEN {
        return Err(bad());
    }

    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return Err(bad());
    }

    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(bad());
    }

    Ok(())
}

/// The outcome of a condition that selected a packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CondMatch {
    /// The condition has no matches and selects every packet.
    All,
    /// The index of the first match that selected the packet.
    Index(u32),
}

/// Every match held here has been verified.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FlowCondition {
    name: String,
    matches: BTreeMap<u32, FlowMatch>,
}

impl FlowCondition {
    pub fn new(name: &str) -> MatchResult<Self> {
        check_name(name)?;
        Ok(Self { name: name.to_string(), matches: BTreeMap::new() })
    }

    /// Build a condition from its specification.
    ///
    /// Either every match is accepted or the whole condition is
    /// rejected.
    pub fn from_spec(
        spec: &FlowConditionSpec,
        log: &dyn LogProvider,
    ) -> MatchResult<Self> {
        Self::build(spec).inspect_err(|e| {
            log.log(
                LogLevel::Warn,
                &format!("rejected flow condition {:?}: {e}", spec.name),
            );
        })
    }

    fn build(spec: &FlowConditionSpec) -> MatchResult<Self> {
        let mut cond = Self::new(&spec.name)?;

        for mspec in &spec.matches {
            let (index, raw) = FlowMatch::from_spec(mspec)?;
            let m = raw.verify()?;

            match cond.matches.entry(index) {
                Entry::Vacant(e) => {
                    e.insert(m);
                }

                Entry::Occupied(_) => {
                    return Err(MatchError::Validation(format!(
                        "duplicate match index: {index}"
                    )));
                }
            }
        }

        Ok(cond)
    }

    pub fn to_spec(&self) -> FlowConditionSpec {
        FlowConditionSpec {
            name: self.name.clone(),
            matches: self
                .matches
                .iter()
                .map(|(index, m)| m.to_spec(*index))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&FlowMatch> {
        self.matches.get(&index)
    }

    /// The matches in ascending index order.
    pub fn matches(&self) -> impl Iterator<Item = (u32, &FlowMatch)> {
        self.matches.iter().map(|(index, m)| (*index, m))
    }

    /// Verify `m` and store it at `index`, returning the match it
    /// replaced.
    pub fn set_match(
        &mut self,
        index: u32,
        m: FlowMatch,
        log: &dyn LogProvider,
    ) -> MatchResult<Option<FlowMatch>> {
        let index = check_index(index)?;
        let m = m.verify().inspect_err(|e| {
            log.log(
                LogLevel::Warn,
                &format!("{}: rejected match {index}: {e}", self.name),
            );
        })?;

        let prev = self.matches.insert(index, m);
        if let Some(prev) = &prev {
            log.log(
                LogLevel::Note,
                &format!(
                    "{}: match {index} replaced: {prev} -> {m}",
                    self.name
                ),
            );
        }

        Ok(prev)
    }

    pub fn remove_match(
        &mut self,
        index: u32,
        log: &dyn LogProvider,
    ) -> Option<FlowMatch> {
        let prev = self.matches.remove(&index);
        if let Some(prev) = &prev {
            log.log(
                LogLevel::Note,
                &format!("{}: match {index} removed: {prev}", self.name),
            );
        }
        prev
    }

    /// Find the first match, in index order, that selects `hdr`.
    ///
    /// `trace` accumulates the fields consulted by every match tried,
    /// including those that failed.
    pub fn evaluate<H: PacketHeader + ?Sized>(
        &self,
        hdr: &H,
        trace: &mut MatchTrace,
    ) -> Option<CondMatch> {
        if self.matches.is_empty() {
            return Some(CondMatch::All);
        }

        self.matches
            .iter()
            .find(|(_, m)| m.is_match(hdr, trace))
            .map(|(index, _)| CondMatch::Index(*index))
    }

    pub fn is_match<H: PacketHeader + ?Sized>(
        &self,
        hdr: &H,
        trace: &mut MatchTrace,
    ) -> bool {
        self.evaluate(hdr, trace).is_some()
    }
}
