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

//! Tracking of the last irreducible block (LIB).
//!
//! This module provides the [`LibTracker`] type, which holds the current LIB, the current best
//! block, and a [`ConfirmationLedger`] containing the confirmation status of each block between
//! the two.
//!
//! # Confirmations and proposals
//!
//! Each block declares a *confirmation window*: the number of blocks, ending with itself, that
//! it confirms. When a block is committed, each of the blocks of its window loses one of its
//! remaining confirmations, starting from the block itself and walking backwards. Blocks start
//! with a number of remaining confirmations equal to a constant passed at initialization.
//!
//! The first block, walking backwards, that runs out of remaining confirmations becomes a
//! *proposal* of the producer of the newly-committed block. It is the block that this producer
//! considers as irreducible.
//!
//! Every time a proposal is made, the LIB candidate is calculated from the latest proposal of
//! every producer. See the [`quorum`] module.
//!
//! # Startup and switches of the best chain
//!
//! The confirmation status isn't persisted. Instead, it is rebuilt by replaying the blocks
//! between the LIB and the best block. Only the LIB and the proposals of each producer need to
//! be persisted. See [the `status` module](crate::status).
//!
//! The replay is performed by the [`Rebuild`] state machine, which is obtained either by calling
//! [`rebuild_confirms`] on startup, or [`LibTracker::rollback_to`] when the best chain switches
//! to a different fork. In both cases, the LIB itself is never modified, as by definition it
//! can't be reverted.

use crate::{
    block::{BlockRef, CommittedBlock},
    informant::HashDisplay,
    status,
};

use alloc::vec::Vec;
use core::{fmt, num::NonZeroU16};

mod bootstrap;
mod ledger;
mod replay;
mod tests;

pub mod quorum;

pub use self::bootstrap::*;
pub use self::ledger::*;
pub use self::replay::*;

/// Current LIB, current best block, and the confirmation status of the blocks in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibTracker {
    /// Confirmation status of the blocks strictly above [`LibTracker::lib`] up to
    /// [`LibTracker::best_block`], after [`LibTracker::gc`] has been called.
    ledger: ConfirmationLedger,
    /// Last irreducible block. Its height never decreases.
    lib: BlockRef,
    /// Latest block that has been committed or rolled back to.
    best_block: BlockRef,
}

impl LibTracker {
    /// Initializes a new tracker for a chain that only contains its genesis block.
    ///
    /// Use [`rebuild_confirms`] instead if the chain contains more than its genesis block.
    pub fn new(genesis: BlockRef, required_confirms: NonZeroU16) -> Self {
        LibTracker {
            ledger: ConfirmationLedger::new(genesis.clone(), required_confirms),
            lib: genesis.clone(),
            best_block: genesis,
        }
    }

    /// Returns the current last irreducible block.
    pub fn lib(&self) -> &BlockRef {
        &self.lib
    }

    /// Returns the current best block.
    pub fn best_block(&self) -> &BlockRef {
        &self.best_block
    }

    /// Returns the genesis block of the chain.
    pub fn genesis(&self) -> &BlockRef {
        self.ledger.genesis()
    }

    /// Returns the underlying [`ConfirmationLedger`].
    pub fn ledger(&self) -> &ConfirmationLedger {
        &self.ledger
    }

    /// Adds a block on top of the current best block.
    ///
    /// Returns the new LIB if it has changed. The API user is then expected to persist the
    /// records returned by [`LibTracker::encode_status`], then call [`LibTracker::gc`].
    ///
    /// The LIB only ever moves towards higher blocks, and only to a block of the chain
    /// that ends with the new best block.
    ///
    /// An error is returned if the block isn't a child of the current best block. The state
    /// of the tracker is left untouched in that situation.
    pub fn commit_block(
        &mut self,
        block: &CommittedBlock,
    ) -> Result<Option<BlockRef>, ConsistencyError> {
        if block.parent_hash != self.best_block.hash
            || self.best_block.height.checked_add(1) != Some(block.height)
        {
            return Err(ConsistencyError {
                current: block.hash,
                current_height: block.height,
                parent: block.parent_hash,
                old_best: self.best_block.hash,
                old_best_height: self.best_block.height,
            });
        }

        self.ledger.add_confirm_info(block);
        self.best_block = block.block_ref();

        let Some(candidate) = self.ledger.update() else {
            return Ok(None);
        };

        if candidate.height <= self.lib.height {
            return Ok(None);
        }

        // Proposals made on a fork that has since been abandoned can survive a rollback. They
        // must never be finalized.
        if self
            .ledger
            .entry(candidate.height)
            .map_or(true, |entry| entry.block.hash != candidate.hash)
        {
            return Ok(None);
        }

        self.lib = candidate.clone();
        Ok(Some(candidate))
    }

    /// Switches the best block to the given block, which is generally on a different fork than
    /// the current best block.
    ///
    /// All the confirmation entries are discarded and rebuilt by replaying the blocks from the
    /// LIB (excluded) up to `target` (included). The proposals of each producer are then
    /// truncated using [`ConfirmationLedger::rollback_pre_libs`].
    ///
    /// The returned state machine finishes with an error if `target` is below the LIB, or at the
    /// same height as the LIB but different from it, as that would mean reverting the LIB.
    pub fn rollback_to(self, target: BlockRef) -> Rebuild {
        if target.height < self.lib.height
            || (target.height == self.lib.height && target.hash != self.lib.hash)
        {
            return Rebuild::Finished(Err(ReplayError::InvalidLib(InvalidLibError {
                lib: self.lib,
                best_hash: target.hash,
                best_height: target.height,
            })));
        }

        let LibTracker {
            mut ledger, lib, ..
        } = self;
        ledger.clear_entries();
        replay::start(ledger, lib, target, replay::ReplayKind::Rollback)
    }

    /// Removes from the ledger the entries that are at or below the LIB.
    pub fn gc(&mut self) {
        self.ledger.gc(&self.lib);
    }

    /// Returns the records that must be persisted in order to be able to recover the current
    /// state with [`load`] and [`rebuild_confirms`].
    pub fn encode_status(&self) -> EncodedStatus {
        EncodedStatus {
            lib: status::encode_lib(&self.lib),
            pre_lib: status::encode_pre_lib(self.ledger.proposals()),
        }
    }
}

/// See [`LibTracker::encode_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedStatus {
    /// Record to store under [`status::STATUS_KEY_LIB`].
    pub lib: Vec<u8>,
    /// Record to store under [`status::STATUS_KEY_PRE_LIB`].
    pub pre_lib: Vec<u8>,
}

/// The current block, its parent, and the previous best block are inconsistent with each other.
///
/// This indicates a bug in the code that decides which block is the best block, or in the
/// ordering of the calls.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error)]
pub struct ConsistencyError {
    /// Hash of the block being processed.
    pub current: [u8; 32],
    /// Height of the block being processed.
    pub current_height: u64,
    /// Hash of the parent declared by the block being processed.
    pub parent: [u8; 32],
    /// Hash of the block that was previously known as best block.
    pub old_best: [u8; 32],
    /// Height of the block that was previously known as best block.
    pub old_best_height: u64,
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Current block #{} {} (parent {}) inconsistent with old best #{} {}",
            self.current_height,
            HashDisplay(&self.current),
            HashDisplay(&self.parent),
            self.old_best_height,
            HashDisplay(&self.old_best)
        )
    }
}

/// The LIB is above the best block, or at the same height but different.
///
/// This indicates either a corruption of the persisted LIB, or an attempt to revert the LIB.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error)]
pub struct InvalidLibError {
    /// The LIB.
    pub lib: BlockRef,
    /// Hash of the best block, or of the target of the rollback.
    pub best_hash: [u8; 32],
    /// Height of the best block, or of the target of the rollback.
    pub best_height: u64,
}

impl fmt::Display for InvalidLibError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The LIB (#{}, {}) is inconsistent with the best block (#{}, {})",
            self.lib.height,
            HashDisplay(&self.lib.hash),
            self.best_height,
            HashDisplay(&self.best_hash)
        )
    }
}
