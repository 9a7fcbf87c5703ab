// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The match engine.
//!
//! Value objects are built leaves first: the per-layer matches in
//! [`ether`], [`inet`] and [`l4`] validate themselves on
//! construction, and [`flow_match::FlowMatch`] ties them together.
//! The external representations live in [`spec`] (user facing),
//! [`wire`] (flow-table schema) and [`record`] (persisted form).
pub mod cond;
pub mod error;
pub mod ether;
pub mod field;
pub mod flow_match;
pub mod header;
pub mod inet;
pub mod l4;
pub mod port_range;
pub mod record;
pub mod spec;
pub mod wire;

pub use error::ErrorKind;
pub use error::MatchError;
pub use error::MatchResult;
