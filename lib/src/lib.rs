// DPoS finality
// Copyright (C) 2026  DPoS finality contributors
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Last-irreducible-block tracking for delegated-proof-of-stake chains.
//!
//! In a delegated-proof-of-stake chain, a rotating set of block producers takes turns producing
//! blocks. Every block declares how many of the blocks immediately preceding it (itself
//! included) it confirms. Once a block has gathered enough confirmations, the producer of the
//! block that delivered the last missing confirmation proposes it as a candidate for the *last
//! irreducible block* (LIB): the highest block that can never be reverted. The actual LIB is
//! obtained by aggregating the latest proposal of every producer in a way that tolerates up to
//! roughly one third of the producers being slow or faulty.
//!
//! # Overview
//!
//! - The [`block`] module contains the [`block::BlockRef`] and [`block::CommittedBlock`] value
//!   types consumed by everything else.
//! - The [`finality`] module contains the [`finality::ConfirmationLedger`], the quorum
//!   calculation, and the [`finality::LibTracker`] which is the main entry point of this library.
//! - The [`status`] module contains the encoding of the two records that must be persisted in
//!   order to recover after a restart.
//! - The [`database`] module contains an SQLite-backed storage for blocks and for these records.
//!
//! # Usage
//!
//! On startup, read the two status records from the storage and pass them to
//! [`finality::load`], then call [`finality::rebuild_confirms`]. This returns a
//! [`finality::Rebuild`] state machine that asks for the blocks between the persisted LIB and
//! the current best block. Once finished, it yields a [`finality::LibTracker`].
//!
//! Whenever a new block extends the best chain, call [`finality::LibTracker::commit_block`]. If
//! it returns a new LIB, persist it (see [`finality::LibTracker::encode_status`]), then call
//! [`finality::LibTracker::gc`].
//!
//! Whenever the best chain switches to a different fork, call
//! [`finality::LibTracker::rollback_to`], which returns the same kind of state machine as on
//! startup.
//!
//! The types of the [`finality`] module don't perform any locking. All the calls must be
//! serialized by the API user, in the same order as the blocks are applied to the chain.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
// TODO: the `unused_crate_dependencies` lint is disabled because of dev-dependencies, see <https://github.com/rust-lang/rust/issues/95513>
// #![deny(unused_crate_dependencies)]

extern crate alloc;

pub mod block;
pub mod database;
pub mod finality;
pub mod informant;
pub mod status;

