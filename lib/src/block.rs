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

//! Block identities consumed by the LIB tracking.
//!
//! The LIB tracking never looks at the body of a block, nor at most of its header. The only
//! information it needs is found in [`CommittedBlock`], and the only information it keeps about
//! a block is found in [`BlockRef`].

/// Identity of a block producer.
///
/// This is typically the public key the producer signs its blocks with. Its content is opaque to
/// this library, but its ordering is used to break ties deterministically.
pub type ProducerId = [u8; 32];

/// Immutable reference to a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockRef {
    /// Hash of the block.
    pub hash: [u8; 32],
    /// Height of the block. The genesis block has a height of 0.
    pub height: u64,
    /// Number of blocks, ending with this one, that this block confirms.
    ///
    /// In other words, the block at height `h` confirms the blocks whose height is in the range
    /// `h - confirm_window + 1 ..= h`.
    pub confirm_window: u64,
}

impl BlockRef {
    /// Returns the height of the lowest block confirmed by this block, or `None` if this block
    /// doesn't confirm any block.
    pub fn lowest_confirmed_height(&self) -> Option<u64> {
        if self.confirm_window == 0 {
            return None;
        }

        Some(
            self.height
                .saturating_sub(self.confirm_window.saturating_sub(1)),
        )
    }
}

impl<'a> From<&'a CommittedBlock> for BlockRef {
    fn from(block: &'a CommittedBlock) -> BlockRef {
        block.block_ref()
    }
}

/// Block that has been committed to the chain.
///
/// "Committed" means that the state transition of this block has been applied and is durable.
/// Whether this block is part of the best chain is decided outside of this library.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommittedBlock {
    /// Hash of the block.
    pub hash: [u8; 32],
    /// Hash of the parent of the block. Irrelevant for the genesis block.
    pub parent_hash: [u8; 32],
    /// Height of the block. The genesis block has a height of 0.
    pub height: u64,
    /// See [`BlockRef::confirm_window`].
    pub confirm_window: u64,
    /// Producer that has produced and signed this block.
    pub producer: ProducerId,
}

impl CommittedBlock {
    /// Builds the [`BlockRef`] corresponding to this block.
    pub fn block_ref(&self) -> BlockRef {
        BlockRef {
            hash: self.hash,
            height: self.height,
            confirm_window: self.confirm_window,
        }
    }

    /// Returns `true` if this block is the genesis block of the chain.
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}
