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

//! Confirmations gathered by the blocks above the LIB, and proposals of each producer.

use super::quorum;
use crate::block::{BlockRef, CommittedBlock, ProducerId};

use alloc::{collections::BTreeMap, vec::Vec};
use core::{fmt, num::NonZeroU16};
use hashbrown::HashMap;

/// For each producer, the list of blocks it has proposed as LIB, by strictly increasing height.
///
/// > **Note**: The iteration order of this map is unspecified and must never influence the
/// >           outcome of any calculation.
pub type ProposalsMap = HashMap<ProducerId, Vec<BlockRef>, fnv::FnvBuildHasher>;

/// Confirmation status of one block above the LIB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmEntry {
    /// The block whose confirmations are tracked.
    pub block: BlockRef,
    /// Producer of [`ConfirmEntry::block`].
    pub producer: ProducerId,
    /// Number of confirmations that this block still needs. Only ever decreases.
    remaining_confirms: u16,
}

impl ConfirmEntry {
    /// Returns the number of confirmations this block still needs before it can be proposed.
    ///
    /// A value of 0 means that the block has already been proposed by a producer.
    pub fn remaining_confirms(&self) -> u16 {
        self.remaining_confirms
    }
}

/// Ordered list of [`ConfirmEntry`]s, one per block since the latest LIB, plus the LIB proposals
/// of each producer.
///
/// See [the module-level documentation](..).
#[derive(Clone, PartialEq, Eq)]
pub struct ConfirmationLedger {
    /// Reference to the genesis block. Default first proposal of every producer.
    genesis: BlockRef,
    /// Number of confirmations each block needs before being proposed.
    required_confirms: NonZeroU16,
    /// Entries indexed by block height.
    ///
    /// Heights in this container are not necessarily contiguous after a call to
    /// [`ConfirmationLedger::gc`], but new entries are always inserted above the highest one.
    entries: BTreeMap<u64, ConfirmEntry>,
    /// See [`ProposalsMap`].
    proposals: ProposalsMap,
}

impl ConfirmationLedger {
    /// Builds a new empty ledger.
    pub fn new(genesis: BlockRef, required_confirms: NonZeroU16) -> Self {
        Self::with_proposals(genesis, required_confirms, ProposalsMap::default())
    }

    /// Builds a new ledger without any entry but with the given proposals.
    ///
    /// This is typically used after proposals have been loaded from a persistent storage.
    pub fn with_proposals(
        genesis: BlockRef,
        required_confirms: NonZeroU16,
        proposals: ProposalsMap,
    ) -> Self {
        ConfirmationLedger {
            genesis,
            required_confirms,
            entries: BTreeMap::new(),
            proposals,
        }
    }

    /// Returns the reference to the genesis block that was passed at initialization.
    pub fn genesis(&self) -> &BlockRef {
        &self.genesis
    }

    /// Returns the number of confirmations each new entry starts with.
    pub fn required_confirms(&self) -> NonZeroU16 {
        self.required_confirms
    }

    /// Returns the number of entries in the ledger.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the ledger doesn't contain any entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the list of entries, by increasing height.
    pub fn iter_entries(&self) -> impl DoubleEndedIterator<Item = &ConfirmEntry> + '_ {
        self.entries.values()
    }

    /// Returns the entry of the block at the given height, if any.
    pub fn entry(&self, height: u64) -> Option<&ConfirmEntry> {
        self.entries.get(&height)
    }

    /// Returns the most recently appended entry.
    pub fn tail(&self) -> Option<&ConfirmEntry> {
        self.entries.values().next_back()
    }

    /// Returns the proposals of all the producers.
    pub fn proposals(&self) -> &ProposalsMap {
        &self.proposals
    }

    /// Returns the proposals of the given producer, by increasing height.
    ///
    /// Returns an empty slice if this producer has never produced any block.
    pub fn proposals_of(&self, producer: &ProducerId) -> &[BlockRef] {
        self.proposals.get(producer).map_or(&[], |list| &list[..])
    }

    /// Appends an entry for the given block at the end of the ledger.
    ///
    /// If the producer of this block doesn't have any proposal yet, it is attributed the genesis
    /// block as its first proposal.
    ///
    /// Does nothing if the block is the genesis block.
    ///
    /// # Panic
    ///
    /// Panics if the height of the block isn't strictly superior to the height of the current
    /// [`ConfirmationLedger::tail`].
    ///
    pub fn add_confirm_info(&mut self, block: &CommittedBlock) {
        if block.is_genesis() {
            return;
        }

        if let Some(tail) = self.tail() {
            assert!(
                block.height > tail.block.height,
                "confirmation entries must be appended by increasing height"
            );
        }

        self.entries.insert(
            block.height,
            ConfirmEntry {
                block: block.block_ref(),
                producer: block.producer,
                remaining_confirms: self.required_confirms.get(),
            },
        );

        if !self.proposals.contains_key(&block.producer) {
            self.proposals
                .insert(block.producer, alloc::vec![self.genesis.clone()]);
        }
    }

    /// Applies the confirmations brought by the most recently appended entry.
    ///
    /// The [`ConfirmationLedger::tail`] confirms the `confirm_window` entries that end with
    /// itself. Each of them loses one remaining confirmation. If one of them runs out of
    /// remaining confirmations, the producer of the tail proposes it as LIB, and the new LIB
    /// candidate is calculated and returned.
    ///
    /// Returns `None` if no new proposal was made, or if the ledger is empty. A block that runs
    /// out of confirmations but whose height isn't above the latest proposal of the producer of
    /// the tail doesn't count as a new proposal.
    ///
    /// > **Note**: The returned value is a *candidate*. It can be inferior or equal to the
    /// >           current LIB, for example when a producer that has never proposed anything
    /// >           joins the set of producers.
    pub fn update(&mut self) -> Option<BlockRef> {
        let (producer, proposed) = self.apply_tail_confirmations()?;
        if !self.push_proposal(producer, proposed) {
            return None;
        }
        self.calc_lib()
    }

    /// Walks backwards from the tail and decrements the remaining confirmations of each entry
    /// within the window of the tail. Stops at the first entry that runs out of confirmations.
    fn apply_tail_confirmations(&mut self) -> Option<(ProducerId, BlockRef)> {
        let (producer, window) = {
            let tail = self.tail()?;
            (tail.producer, tail.block.confirm_window)
        };

        let window = usize::try_from(window).unwrap_or(usize::MAX);
        for entry in self.entries.values_mut().rev().take(window) {
            // An entry that has already been proposed doesn't count again.
            if entry.remaining_confirms == 0 {
                continue;
            }

            entry.remaining_confirms -= 1;
            if entry.remaining_confirms == 0 {
                return Some((producer, entry.block.clone()));
            }
        }

        None
    }

    /// Appends a proposal to the list of the given producer. Returns `false` and does nothing if
    /// the producer has already proposed a block at this height or above.
    fn push_proposal(&mut self, producer: ProducerId, block: BlockRef) -> bool {
        let list = self.proposals.entry(producer).or_default();
        // Blocks with a large confirmation window can complete an entry older than the latest
        // proposal of their producer. A proposal never moves backwards.
        if list.last().map_or(false, |last| last.height >= block.height) {
            return false;
        }
        list.push(block);
        true
    }

    /// Calculates the LIB candidate from the latest proposal of every producer.
    ///
    /// See [`quorum::lib_candidate`]. Returns `None` if no producer has proposed anything.
    pub fn calc_lib(&self) -> Option<BlockRef> {
        quorum::lib_candidate(
            self.proposals
                .iter()
                .filter_map(|(producer, list)| list.last().map(|last| (producer, last))),
        )
        .cloned()
    }

    /// Removes every entry whose height is inferior or equal to the given LIB.
    ///
    /// Proposals aren't affected.
    pub fn gc(&mut self, lib: &BlockRef) {
        match lib.height.checked_add(1) {
            Some(first_kept) => self.entries = self.entries.split_off(&first_kept),
            None => self.entries.clear(),
        }
    }

    /// Removes all the entries. Proposals aren't affected.
    pub(super) fn clear_entries(&mut self) {
        self.entries.clear();
    }

    /// Replaces the entries of `self` with the ones of `other`, and returns the proposals of
    /// `other`.
    pub(super) fn take_entries_of(&mut self, other: ConfirmationLedger) -> ProposalsMap {
        self.entries = other.entries;
        other.proposals
    }

    /// Discards, for each producer that has an entry in the ledger, every proposal whose height
    /// is superior or equal to the height of the earliest entry of this producer.
    ///
    /// This is used after the entries have been rebuilt following a switch of the best chain.
    /// Proposals are only ever truncated.
    pub fn rollback_pre_libs(&mut self) {
        let mut earliest_by_producer =
            HashMap::<_, u64, fnv::FnvBuildHasher>::with_capacity_and_hasher(
                self.proposals.len(),
                Default::default(),
            );
        for entry in self.entries.values() {
            earliest_by_producer
                .entry(entry.producer)
                .or_insert(entry.block.height);
        }

        for (producer, earliest) in earliest_by_producer {
            let Some(list) = self.proposals.get_mut(&producer) else {
                continue;
            };

            if let Some(purge_begin) = list.iter().position(|p| p.height >= earliest) {
                list.truncate(purge_begin);
            }
        }
    }

    /// Returns, for each height, the number of entries whose confirmation window covers this
    /// height, excluding the entry itself.
    ///
    /// This is purely informative and has no influence on the LIB.
    pub fn decrement_counts(&self) -> BTreeMap<u64, u32> {
        let mut counts = BTreeMap::new();
        for entry in self.entries.values() {
            let Some(lowest) = entry.block.lowest_confirmed_height() else {
                continue;
            };

            for height in lowest..entry.block.height {
                *counts.entry(height).or_insert(0u32) += 1;
            }
        }
        counts
    }
}

impl fmt::Debug for ConfirmationLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationLedger")
            .field("required_confirms", &self.required_confirms)
            .field("entries", &self.entries.values().collect::<Vec<_>>())
            .field("proposals", &self.proposals)
            .finish()
    }
}
