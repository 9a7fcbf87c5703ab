// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Value types shared between the flow match engine and its
//! consumers: link-layer addresses, IPv4 addresses and networks, and
//! the small bounded integers carried in packet headers.

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

pub mod ether;
pub mod ip;
pub mod mac;

pub use ether::*;
pub use ip::*;
pub use mac::*;
