// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Print flow conditions in a human-friendly manner.
//!
//! This is mostly just a place to hang printing routines so that they
//! can be used by both flowmatchadm and integration tests.

use crate::engine::cond::CondMatch;
use crate::engine::cond::FlowCondition;
use crate::engine::header::MatchTrace;
use std::io::Write;
use tabwriter::TabWriter;

/// Print a [`FlowCondition`].
pub fn print_condition(cond: &FlowCondition) -> std::io::Result<()> {
    print_condition_into(&mut std::io::stdout(), cond)
}

/// Print a [`FlowCondition`].
pub fn print_condition_into(
    writer: &mut impl Write,
    cond: &FlowCondition,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Condition {}", cond.name())?;
    write_hrb(&mut t)?;
    writeln!(t, "INDEX\tKEY")?;
    write_hr(&mut t)?;
    for (index, m) in cond.matches() {
        writeln!(t, "{index}\t{}", m.condition_key())?;
    }
    writeln!(t)?;
    t.flush()
}

/// Print the flow key of every match in `cond`.
pub fn print_flow_keys_into(
    writer: &mut impl Write,
    cond: &FlowCondition,
    node: &str,
    priority: u32,
    in_port: Option<&str>,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "INDEX\tFLOW KEY")?;
    write_hr(&mut t)?;
    for (index, m) in cond.matches() {
        writeln!(t, "{index}\t{}", m.flow_key(node, priority, in_port))?;
    }
    t.flush()
}

/// Print the outcome of evaluating a condition against one packet.
pub fn print_eval_into(
    writer: &mut impl Write,
    outcome: Option<CondMatch>,
    trace: &MatchTrace,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    let matched = match outcome {
        Some(CondMatch::All) => "ALL".to_string(),
        Some(CondMatch::Index(index)) => index.to_string(),
        None => "NONE".to_string(),
    };

    writeln!(t, "MATCH\tFIELDS")?;
    writeln!(t, "{matched}\t{}", trace.fields())?;
    t.flush()
}

/// Write a horizontal rule in bold.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<70}", "=")
}

/// Write a horizontal rule.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<70}", "-")
}
