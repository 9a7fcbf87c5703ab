// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use slog::debug;

use flowmatch::engine::cond::FlowCondition;
use flowmatch::engine::flow_match::FlowMatch;
use flowmatch::engine::header::MatchTrace;
use flowmatch::engine::record::FlowMatchRecord;
use flowmatch::engine::wire::WireMatch;
use flowmatch::print::print_condition;
use flowmatch::print::print_eval_into;
use flowmatch::print::print_flow_keys_into;
use flowmatchadm::AdmConfig;
use flowmatchadm::KeyParams;
use flowmatchadm::PacketDesc;
use flowmatchadm::SlogLog;
use flowmatchadm::build_logger;
use flowmatchadm::from_hex;
use flowmatchadm::read_condition;
use flowmatchadm::read_json;
use flowmatchadm::to_hex;

/// Verify, render, and evaluate flow match conditions.
#[derive(Debug, Parser)]
#[command(version)]
enum Command {
    /// Verify a condition file and print its matches.
    Verify { file: PathBuf },

    /// Print the flow key of every match in a condition file.
    Keys {
        file: PathBuf,

        /// The node id of the switch the flows are installed on.
        #[arg(long)]
        node: Option<String>,

        /// The flow priority.
        #[arg(long)]
        priority: Option<u32>,

        /// The ingress port the flows are restricted to.
        #[arg(long)]
        in_port: Option<String>,

        /// A TOML file supplying `node` and `priority` defaults.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the flow-table form of every match as JSON.
    ToWire { file: PathBuf },

    /// Read a flow-table match from JSON and print its condition key.
    FromWire { file: PathBuf },

    /// Print the persisted record of every match as hex.
    Encode { file: PathBuf },

    /// Decode a hex record and print its condition key.
    Decode { hex: String },

    /// Evaluate a condition against a packet header.
    Eval { file: PathBuf, header: PathBuf },
}

fn load(file: &Path, log: &SlogLog) -> anyhow::Result<FlowCondition> {
    let spec = read_condition(file)?;
    let cond = FlowCondition::from_spec(&spec, log)
        .with_context(|| format!("condition {:?}", spec.name))?;
    debug!(
        log.0, "loaded condition";
        "name" => cond.name(), "matches" => cond.len()
    );
    Ok(cond)
}

fn main() -> anyhow::Result<()> {
    let cmd = Command::parse();
    let log = SlogLog(build_logger());

    match cmd {
        Command::Verify { file } => {
            let cond = load(&file, &log)?;
            print_condition(&cond)?;
        }

        Command::Keys { file, node, priority, in_port, config } => {
            let cfg = match config {
                Some(path) => AdmConfig::load(&path)?,
                None => AdmConfig::default(),
            };
            let params = KeyParams::resolve(&cfg, node, priority, in_port)?;
            let cond = load(&file, &log)?;
            print_flow_keys_into(
                &mut std::io::stdout(),
                &cond,
                &params.node,
                params.priority,
                params.in_port.as_deref(),
            )?;
        }

        Command::ToWire { file } => {
            let cond = load(&file, &log)?;
            let wire: BTreeMap<u32, WireMatch> = cond
                .matches()
                .map(|(index, m)| (index, m.to_wire()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&wire)?);
        }

        Command::FromWire { file } => {
            let wire: WireMatch = read_json(&file)?;
            let m = FlowMatch::from_wire(&wire)?;
            println!("{}", m.condition_key());
        }

        Command::Encode { file } => {
            let cond = load(&file, &log)?;
            for (index, m) in cond.matches() {
                println!("{index}\t{}", to_hex(&m.to_record().encode()?));
            }
        }

        Command::Decode { hex } => {
            let rec = FlowMatchRecord::decode(&from_hex(&hex)?)?;
            let m = FlowMatch::from_record(&rec)?;
            println!("{}", m.condition_key());
        }

        Command::Eval { file, header } => {
            let cond = load(&file, &log)?;
            let desc: PacketDesc = read_json(&header)?;
            let hdr = desc.to_header()?;
            let mut trace = MatchTrace::new();
            let outcome = cond.evaluate(&hdr, &mut trace);
            print_eval_into(&mut std::io::stdout(), outcome, &trace)?;
        }
    }

    Ok(())
}
