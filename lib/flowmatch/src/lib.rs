// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! A layered packet match engine.
//!
//! A [`FlowMatch`](engine::flow_match::FlowMatch) describes which
//! packets a flow-table rule applies to, as a set of optional
//! conditions on the Ethernet, IPv4 and transport headers. The engine
//! completes the fields implied by inner layers, validates the
//! result, evaluates it against packet headers, and renders it in the
//! canonical key and external forms used by the flow programming
//! layer.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[macro_use]
extern crate alloc;

pub mod api;
pub mod engine;
#[cfg(any(feature = "std", test))]
pub mod print;
pub mod provider;
