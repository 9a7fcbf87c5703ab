// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Flow match administration library

use anyhow::Context;
use anyhow::bail;
use flowmatch::api::Dscp;
use flowmatch::api::Ipv4Addr;
use flowmatch::api::MacAddr;
use flowmatch::api::VlanId;
use flowmatch::api::VlanPcp;
use flowmatch::engine::header::HeaderMeta;
use flowmatch::engine::header::Ipv4Header;
use flowmatch::engine::header::UlpHeader;
use flowmatch::engine::spec::FlowConditionSpec;
use flowmatch::provider::LogLevel;
use flowmatch::provider::LogProvider;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use slog::Drain;
use slog::Logger;
use slog::error;
use slog::info;
use slog::o;
use slog::warn;
use std::fs;
use std::path::Path;

pub const DEFAULT_PRIORITY: u32 = 10;

/// Build the terminal logger. `RUST_LOG` overrides the default
/// `info` level.
pub fn build_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let mut builder = slog_envlogger::LogBuilder::new(drain)
        .filter(None, slog::FilterLevel::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder = builder.parse(&filters);
    }
    let drain = slog_async::Async::new(builder.build().fuse()).build().fuse();
    Logger::root(drain, o!("component" => "flowmatchadm"))
}

/// A [`LogProvider`] that forwards engine messages to a `slog`
/// logger.
pub struct SlogLog(pub Logger);

impl LogProvider for SlogLog {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Note => info!(self.0, "{}", msg),
            LogLevel::Warn => warn!(self.0, "{}", msg),
            LogLevel::Error => error!(self.0, "{}", msg),
        }
    }
}

/// Defaults read from the `--config` file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AdmConfig {
    /// The node id used in flow keys.
    #[serde(default)]
    pub node: Option<String>,

    /// The priority used in flow keys.
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

impl Default for AdmConfig {
    fn default() -> Self {
        Self { node: None, priority: DEFAULT_PRIORITY }
    }
}

impl AdmConfig {
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("failed to parse config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&s)
    }
}

/// The flow-key parameters after applying flags over the config file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyParams {
    pub node: String,
    pub priority: u32,
    pub in_port: Option<String>,
}

impl KeyParams {
    pub fn resolve(
        cfg: &AdmConfig,
        node: Option<String>,
        priority: Option<u32>,
        in_port: Option<String>,
    ) -> anyhow::Result<Self> {
        let Some(node) = node.or_else(|| cfg.node.clone()) else {
            bail!("no node id: pass --node or set `node` in the config");
        };

        Ok(Self { node, priority: priority.unwrap_or(cfg.priority), in_port })
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&s)
        .with_context(|| format!("failed to parse {}", path.display()))
}

pub fn read_condition(path: &Path) -> anyhow::Result<FlowConditionSpec> {
    read_json(path)
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn from_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        bail!("odd-length hex string");
    }

    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|d| u8::from_str_radix(d, 16).ok())
                .with_context(|| format!("bad hex digits at offset {i}"))
        })
        .collect()
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Ipv4Desc {
    pub src: String,
    pub dst: String,
    pub protocol: u8,
    #[serde(default)]
    pub dscp: u8,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UlpDesc {
    Tcp {
        src: u16,
        dst: u16,
    },
    Udp {
        src: u16,
        dst: u16,
    },
    Icmp {
        #[serde(rename = "type")]
        ty: u8,
        code: u8,
    },
}

/// A packet header written by hand, as read by `eval`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PacketDesc {
    pub src_mac: String,
    pub dst_mac: String,
    pub ether_type: u16,
    #[serde(default)]
    pub vlan_id: u16,
    #[serde(default)]
    pub vlan_pcp: u8,
    #[serde(default)]
    pub ipv4: Option<Ipv4Desc>,
    #[serde(default)]
    pub ulp: Option<UlpDesc>,
}

impl PacketDesc {
    pub fn to_header(&self) -> anyhow::Result<HeaderMeta> {
        let mac = |s: &str| s.parse::<MacAddr>().map_err(anyhow::Error::msg);
        let mut hdr = HeaderMeta::ether(
            mac(&self.src_mac).context("src-mac")?,
            mac(&self.dst_mac).context("dst-mac")?,
            self.ether_type,
        )
        .with_vlan(
            VlanId::new(self.vlan_id).map_err(anyhow::Error::msg)?,
            VlanPcp::new(self.vlan_pcp).map_err(anyhow::Error::msg)?,
        );

        if let Some(ip) = &self.ipv4 {
            let addr =
                |s: &str| s.parse::<Ipv4Addr>().map_err(anyhow::Error::msg);
            hdr.ipv4 = Some(Ipv4Header {
                src: addr(&ip.src).context("ipv4 src")?,
                dst: addr(&ip.dst).context("ipv4 dst")?,
                proto: ip.protocol,
                dscp: Dscp::new(ip.dscp).map_err(anyhow::Error::msg)?,
            });
        }

        hdr.ulp = self.ulp.map(|ulp| match ulp {
            UlpDesc::Tcp { src, dst } => UlpHeader::Tcp { src, dst },
            UlpDesc::Udp { src, dst } => UlpHeader::Udp { src, dst },
            UlpDesc::Icmp { ty, code } => UlpHeader::Icmp { ty, code },
        });

        Ok(hdr)
    }
}
