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

//! Rebuilding of the confirmation entries by replaying blocks.
//!
//! Both [`super::rebuild_confirms`] and [`super::LibTracker::rollback_to`] return a [`Rebuild`].
//! The API user is expected to repeatedly provide the block at the height indicated by
//! [`BlockNeeded::height`], in increasing order, until [`Rebuild::Finished`] is returned.
//!
//! The blocks are replayed into a fresh scratch ledger, whose entries then replace the entries
//! of the tracker. The proposals made during the replay aren't kept, as they are already known
//! to the tracker. They are available through [`Rebuilt::replayed_proposals`].

use super::{ConfirmationLedger, ConsistencyError, InvalidLibError, LibTracker, ProposalsMap};
use crate::block::{BlockRef, CommittedBlock};

use alloc::boxed::Box;

/// State of the replay.
#[must_use]
#[derive(Debug)]
pub enum Rebuild {
    /// Replay is over.
    Finished(Result<Rebuilt, ReplayError>),
    /// The block at the given height on the best chain is needed in order to continue.
    BlockNeeded(BlockNeeded),
}

/// Outcome of a successful replay.
#[derive(Debug)]
pub struct Rebuilt {
    /// The rebuilt tracker. Its best block is the target of the replay.
    pub tracker: LibTracker,
    /// Proposals made by the producers of the replayed blocks, starting from a ledger that only
    /// knows about the genesis block.
    pub replayed_proposals: ProposalsMap,
}

/// Error that can happen during a replay.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
pub enum ReplayError {
    /// The LIB is inconsistent with the block to replay up to.
    #[display("{_0}")]
    InvalidLib(InvalidLibError),
    /// A replayed block isn't a child of the previously replayed block.
    #[display("{_0}")]
    Inconsistent(ConsistencyError),
    /// The injected block isn't at the requested height.
    #[display("Expected block at height {expected_height}, obtained {obtained_height}")]
    UnexpectedBlock {
        /// Height that was requested.
        expected_height: u64,
        /// Height of the block that was injected.
        obtained_height: u64,
    },
    /// The block injected at the height of the target isn't the target.
    #[display("Block at height {height} isn't the expected best block")]
    BestBlockMismatch {
        /// Height of the target.
        height: u64,
        /// Hash of the target.
        expected_hash: [u8; 32],
        /// Hash of the block that was injected.
        obtained_hash: [u8; 32],
    },
}

/// Waiting for a block to be injected.
#[must_use]
#[derive(Debug)]
pub struct BlockNeeded {
    inner: Box<Inner>,
}

impl BlockNeeded {
    /// Height of the block that must be injected.
    pub fn height(&self) -> u64 {
        self.inner.next_height
    }

    /// Block that the replay ends with.
    pub fn target(&self) -> &BlockRef {
        &self.inner.target
    }

    /// Injects the block of the best chain at the height returned by [`BlockNeeded::height`].
    pub fn inject_block(mut self, block: &CommittedBlock) -> Rebuild {
        if block.height != self.inner.next_height {
            return Rebuild::Finished(Err(ReplayError::UnexpectedBlock {
                expected_height: self.inner.next_height,
                obtained_height: block.height,
            }));
        }

        if block.parent_hash != self.inner.parent_hash {
            return Rebuild::Finished(Err(ReplayError::Inconsistent(ConsistencyError {
                current: block.hash,
                current_height: block.height,
                parent: block.parent_hash,
                old_best: self.inner.parent_hash,
                old_best_height: block.height - 1,
            })));
        }

        if block.height == self.inner.target.height && block.hash != self.inner.target.hash {
            return Rebuild::Finished(Err(ReplayError::BestBlockMismatch {
                height: block.height,
                expected_hash: self.inner.target.hash,
                obtained_hash: block.hash,
            }));
        }

        self.inner.scratch.add_confirm_info(block);
        let _ = self.inner.scratch.update();

        if block.height == self.inner.target.height {
            return finish(*self.inner);
        }

        self.inner.next_height += 1;
        self.inner.parent_hash = block.hash;
        Rebuild::BlockNeeded(self)
    }
}

/// Whether the replay happens on startup or after a switch of the best chain.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) enum ReplayKind {
    Bootstrap,
    Rollback,
}

#[derive(Debug)]
struct Inner {
    /// Ledger whose entries are replaced at the end of the replay. Its entries are empty.
    ledger: ConfirmationLedger,
    /// Ledger into which the blocks are replayed.
    scratch: ConfirmationLedger,
    lib: BlockRef,
    target: BlockRef,
    kind: ReplayKind,
    /// Height of the next block to inject.
    next_height: u64,
    /// Hash that the parent hash of the next block must be equal to.
    parent_hash: [u8; 32],
}

/// Starts replaying the blocks from `lib` (excluded) to `target` (included).
///
/// The height of `target` must be superior or equal to the one of `lib`, and `target` must be
/// equal to `lib` if they have the same height.
pub(super) fn start(
    ledger: ConfirmationLedger,
    lib: BlockRef,
    target: BlockRef,
    kind: ReplayKind,
) -> Rebuild {
    debug_assert!(ledger.is_empty());
    debug_assert!(target.height >= lib.height);

    let scratch = ConfirmationLedger::new(ledger.genesis().clone(), ledger.required_confirms());
    let inner = Inner {
        // Unused if `target` is `lib`, which is always the case if `lib` is at `u64::MAX`.
        next_height: lib.height.saturating_add(1),
        parent_hash: lib.hash,
        ledger,
        scratch,
        lib,
        target,
        kind,
    };

    if inner.target.height == inner.lib.height {
        return finish(inner);
    }

    Rebuild::BlockNeeded(BlockNeeded {
        inner: Box::new(inner),
    })
}

fn finish(inner: Inner) -> Rebuild {
    let Inner {
        mut ledger,
        scratch,
        lib,
        target,
        kind,
        ..
    } = inner;

    let replayed_proposals = ledger.take_entries_of(scratch);
    if kind == ReplayKind::Rollback {
        ledger.rollback_pre_libs();
    }

    Rebuild::Finished(Ok(Rebuilt {
        tracker: LibTracker {
            ledger,
            lib,
            best_block: target,
        },
        replayed_proposals,
    }))
}
