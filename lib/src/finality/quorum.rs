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

//! Aggregation of the proposals of the producers into a single LIB.
//!
//! Each producer proposes, over time, blocks that it considers as irreducible. Only the latest
//! proposal of each producer matters. Sorting these proposals by increasing height and picking
//! the one at index `(n - 1) / 3` guarantees that at least `n - (n - 1) / 3` producers have
//! proposed a block at this height or above. In other words, the chosen block can't be
//! influenced by fewer than a third of the producers lagging behind or lying about their
//! proposal.

use crate::block::{BlockRef, ProducerId};

use smallvec::SmallVec;

/// Returns the index, in the list of proposals sorted by increasing height, of the proposal to
/// use as LIB, where `num_proposals` is the number of producers with a proposal.
///
/// # Panic
///
/// Panics if `num_proposals` is 0.
///
pub fn quorum_index(num_proposals: usize) -> usize {
    assert_ne!(num_proposals, 0);
    (num_proposals - 1) / 3
}

/// Calculates the LIB candidate from the latest proposal of each producer.
///
/// Returns `None` if the iterator is empty.
///
/// The result doesn't depend on the order in which the proposals are yielded. Proposals at the
/// same height are ordered by producer.
pub fn lib_candidate<'a>(
    latest_proposals: impl Iterator<Item = (&'a ProducerId, &'a BlockRef)>,
) -> Option<&'a BlockRef> {
    // The number of producers is typically around a few dozens.
    let mut latest_proposals = latest_proposals.collect::<SmallVec<[_; 32]>>();
    if latest_proposals.is_empty() {
        return None;
    }

    latest_proposals.sort_unstable_by(|(producer_a, block_a), (producer_b, block_b)| {
        block_a
            .height
            .cmp(&block_b.height)
            .then_with(|| producer_a.cmp(producer_b))
    });

    Some(latest_proposals[quorum_index(latest_proposals.len())].1)
}

#[cfg(test)]
mod tests {
    use crate::block::BlockRef;

    fn block(height: u64) -> BlockRef {
        BlockRef {
            hash: [u8::try_from(height % 256).unwrap(); 32],
            height,
            confirm_window: 0,
        }
    }

    #[test]
    fn empty() {
        assert!(super::lib_candidate(core::iter::empty()).is_none());
    }

    #[test]
    fn quorum_index_values() {
        assert_eq!(super::quorum_index(1), 0);
        assert_eq!(super::quorum_index(2), 0);
        assert_eq!(super::quorum_index(3), 0);
        assert_eq!(super::quorum_index(4), 1);
        assert_eq!(super::quorum_index(5), 1);
        assert_eq!(super::quorum_index(10), 3);
        assert_eq!(super::quorum_index(21), 6);
    }

    #[test]
    fn picks_sorted_index() {
        for num in [1usize, 2, 3, 4, 5, 10] {
            // Distinct heights, yielded in a shuffled order.
            let producers = (0..num)
                .map(|n| [u8::try_from(n).unwrap(); 32])
                .collect::<Vec<_>>();
            let blocks = (0..num)
                .map(|n| block(u64::try_from((n * 7) % num).unwrap() * 10 + 5))
                .collect::<Vec<_>>();

            let obtained = super::lib_candidate(producers.iter().zip(blocks.iter())).unwrap();

            let mut heights = blocks.iter().map(|b| b.height).collect::<Vec<_>>();
            heights.sort_unstable();
            assert_eq!(obtained.height, heights[(num - 1) / 3]);
        }
    }

    #[test]
    fn independent_of_iteration_order() {
        let producers = (0..7u8).map(|n| [n; 32]).collect::<Vec<_>>();
        let blocks = [3, 9, 9, 1, 4, 9, 2].map(block);

        let forward = super::lib_candidate(producers.iter().zip(blocks.iter())).unwrap();
        let backward =
            super::lib_candidate(producers.iter().rev().zip(blocks.iter().rev())).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward.height, 3);
    }
}
