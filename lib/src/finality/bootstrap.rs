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

//! Startup of the tracker.
//!
//! On startup, the persisted records are first decoded with [`load`]. Then, [`rebuild_confirms`]
//! rebuilds the confirmation entries by replaying the blocks between the persisted LIB and the
//! current best block.

use super::{replay, ConfirmationLedger, InvalidLibError, ProposalsMap, Rebuild, ReplayError};
use crate::{
    block::BlockRef,
    status::{self, StatusDecodeError},
};

use core::num::NonZeroU16;

/// Records found in the database, as raw bytes.
///
/// `None` or an empty slice indicate that the record is absent.
#[derive(Debug, Copy, Clone, Default)]
pub struct StatusRecords<'a> {
    /// Record stored under [`status::STATUS_KEY_LIB`].
    pub lib: Option<&'a [u8]>,
    /// Record stored under [`status::STATUS_KEY_PRE_LIB`].
    pub pre_lib: Option<&'a [u8]>,
}

/// Decoded persisted status. See [`load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedStatus {
    /// Last irreducible block. The genesis block if the record was absent.
    pub lib: BlockRef,
    /// Proposals of every producer. Empty if the record was absent.
    pub proposals: ProposalsMap,
    /// `true` if neither record was present, which happens when the chain is started for the
    /// first time.
    pub first_boot: bool,
}

/// Decodes the persisted records.
///
/// Absent records aren't an error and default to the genesis block and to an empty map of
/// proposals. A record that is present but can't be decoded is an error.
pub fn load(
    records: StatusRecords<'_>,
    genesis: &BlockRef,
) -> Result<PersistedStatus, StatusDecodeError> {
    let lib_record = records.lib.filter(|r| !r.is_empty());
    let pre_lib_record = records.pre_lib.filter(|r| !r.is_empty());

    let lib = match lib_record {
        Some(encoded) => status::decode_lib(encoded)?,
        None => genesis.clone(),
    };

    let proposals = match pre_lib_record {
        Some(encoded) => status::decode_pre_lib(encoded)?,
        None => ProposalsMap::default(),
    };

    Ok(PersistedStatus {
        lib,
        proposals,
        first_boot: lib_record.is_none() && pre_lib_record.is_none(),
    })
}

/// Configuration for [`rebuild_confirms`].
#[derive(Debug)]
pub struct BootstrapConfig {
    /// Genesis block of the chain.
    pub genesis: BlockRef,

    /// Current best block of the chain.
    pub best_block: BlockRef,

    /// Number of confirmations each block must receive before being proposed by the producer
    /// of the block that completes them.
    pub required_confirms: NonZeroU16,

    /// Status previously loaded with [`load`].
    pub status: PersistedStatus,
}

/// Rebuilds a [`super::LibTracker`] by replaying the blocks from the persisted LIB (excluded) up
/// to the best block (included).
///
/// The returned state machine finishes immediately if the LIB is the best block. It finishes
/// with an error if the LIB is above the best block, or at the same height but different.
///
/// The proposals of the rebuilt tracker are the persisted ones.
pub fn rebuild_confirms(config: BootstrapConfig) -> Rebuild {
    let PersistedStatus { lib, proposals, .. } = config.status;
    let best = config.best_block;

    if lib.height > best.height || (lib.height == best.height && lib.hash != best.hash) {
        return Rebuild::Finished(Err(ReplayError::InvalidLib(InvalidLibError {
            lib,
            best_hash: best.hash,
            best_height: best.height,
        })));
    }

    let ledger =
        ConfirmationLedger::with_proposals(config.genesis, config.required_confirms, proposals);
    replay::start(ledger, lib, best, replay::ReplayKind::Bootstrap)
}
