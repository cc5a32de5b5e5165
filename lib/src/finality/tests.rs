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

#![cfg(test)]

use super::{
    load, rebuild_confirms, BootstrapConfig, ConfirmationLedger, LibTracker, Rebuild, Rebuilt,
    ReplayError, StatusRecords,
};
use crate::block::{BlockRef, CommittedBlock, ProducerId};

use core::num::NonZeroU16;
use rand::Rng as _;

const A: ProducerId = [1; 32];
const B: ProducerId = [2; 32];
const C: ProducerId = [3; 32];

fn confirms(n: u16) -> NonZeroU16 {
    NonZeroU16::new(n).unwrap()
}

fn genesis() -> CommittedBlock {
    CommittedBlock {
        hash: [0xaa; 32],
        parent_hash: [0; 32],
        height: 0,
        confirm_window: 0,
        producer: [0; 32],
    }
}

/// Builds a child of `parent`. `fork` is used to obtain different hashes for blocks at the same
/// height.
fn child(
    parent: &CommittedBlock,
    producer: ProducerId,
    confirm_window: u64,
    fork: u8,
) -> CommittedBlock {
    let height = parent.height + 1;
    let mut hash = [0; 32];
    hash[..8].copy_from_slice(&height.to_le_bytes());
    hash[8] = fork;
    hash[9] = producer[0];
    hash[31] = 0xff;
    CommittedBlock {
        hash,
        parent_hash: parent.hash,
        height,
        confirm_window,
        producer,
    }
}

/// Builds a chain on top of `parent`, one block per producer, all with the same window.
fn build_chain(
    parent: &CommittedBlock,
    producers: &[ProducerId],
    confirm_window: u64,
    fork: u8,
) -> Vec<CommittedBlock> {
    let mut out = Vec::<CommittedBlock>::with_capacity(producers.len());
    for producer in producers {
        let block = child(out.last().unwrap_or(parent), *producer, confirm_window, fork);
        out.push(block);
    }
    out
}

/// Drives a replay to completion, taking the blocks from `chain`, which must be ordered by
/// height and start with the genesis block.
fn drive(mut rebuild: Rebuild, chain: &[CommittedBlock]) -> Result<Rebuilt, ReplayError> {
    loop {
        match rebuild {
            Rebuild::Finished(result) => return result,
            Rebuild::BlockNeeded(needed) => {
                let block = &chain[usize::try_from(needed.height()).unwrap()];
                rebuild = needed.inject_block(block);
            }
        }
    }
}

/// Commits the given blocks one by one, garbage collecting after each LIB change. Returns the
/// height of the LIB after each block.
fn commit_all(tracker: &mut LibTracker, blocks: &[CommittedBlock]) -> Vec<u64> {
    let mut lib_heights = Vec::with_capacity(blocks.len());
    for block in blocks {
        if tracker.commit_block(block).unwrap().is_some() {
            tracker.gc();
        }
        lib_heights.push(tracker.lib().height);
    }
    lib_heights
}

#[test]
fn three_producers_scenario() {
    let genesis = genesis();
    let mut tracker = LibTracker::new(genesis.block_ref(), confirms(2));
    let blocks = build_chain(&genesis, &[A, B, C, A, B], 2, 0);

    assert_eq!(tracker.commit_block(&blocks[0]).unwrap(), None);
    assert_eq!(tracker.commit_block(&blocks[1]).unwrap(), None);
    assert_eq!(tracker.commit_block(&blocks[2]).unwrap(), None);
    assert_eq!(
        tracker.commit_block(&blocks[3]).unwrap(),
        Some(blocks[0].block_ref())
    );
    assert_eq!(
        tracker.commit_block(&blocks[4]).unwrap(),
        Some(blocks[1].block_ref())
    );

    let heights = |producer: &ProducerId| {
        tracker
            .ledger()
            .proposals_of(producer)
            .iter()
            .map(|p| p.height)
            .collect::<Vec<_>>()
    };
    assert_eq!(heights(&A), vec![0, 3]);
    assert_eq!(heights(&B), vec![0, 1, 4]);
    assert_eq!(heights(&C), vec![0, 2]);

    assert_eq!(tracker.lib(), &blocks[1].block_ref());
    assert_eq!(tracker.best_block(), &blocks[4].block_ref());
}

#[test]
fn single_producer_window_one() {
    let genesis = genesis();
    let mut tracker = LibTracker::new(genesis.block_ref(), confirms(1));
    let blocks = build_chain(&genesis, &[A, A, A], 1, 0);

    for block in &blocks {
        assert_eq!(tracker.commit_block(block).unwrap(), Some(block.block_ref()));
        tracker.gc();
        assert!(tracker.ledger().is_empty());
    }
}

#[test]
fn genesis_never_in_ledger() {
    let genesis = genesis();
    let mut ledger = ConfirmationLedger::new(genesis.block_ref(), confirms(2));
    ledger.add_confirm_info(&genesis);
    assert!(ledger.is_empty());
    assert!(ledger.proposals().is_empty());
    assert_eq!(ledger.update(), None);

    let block = child(&genesis, A, 2, 0);
    ledger.add_confirm_info(&block);
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.proposals_of(&A), &[genesis.block_ref()]);
    assert_eq!(ledger.tail().unwrap().remaining_confirms(), 2);
}

#[test]
fn zero_entries_not_decremented_again() {
    let genesis = genesis();
    let mut ledger = ConfirmationLedger::new(genesis.block_ref(), confirms(1));
    let blocks = build_chain(&genesis, &[A, B], 3, 0);

    ledger.add_confirm_info(&blocks[0]);
    assert_eq!(ledger.update(), Some(blocks[0].block_ref()));
    assert_eq!(ledger.proposals_of(&A), &[genesis.block_ref(), blocks[0].block_ref()]);

    // The window of the second block covers the first block, which is already at zero. The
    // walk stops at the second block.
    ledger.add_confirm_info(&blocks[1]);
    ledger.update();
    assert_eq!(ledger.entry(1).unwrap().remaining_confirms(), 0);
    assert_eq!(ledger.entry(2).unwrap().remaining_confirms(), 0);
    assert_eq!(ledger.proposals_of(&B), &[genesis.block_ref(), blocks[1].block_ref()]);
}

#[test]
fn empty_window_confirms_nothing() {
    let genesis = genesis();
    let mut ledger = ConfirmationLedger::new(genesis.block_ref(), confirms(1));
    ledger.add_confirm_info(&child(&genesis, A, 0, 0));
    assert_eq!(ledger.update(), None);
    assert_eq!(ledger.entry(1).unwrap().remaining_confirms(), 1);
}

#[test]
#[should_panic]
fn add_confirm_info_requires_increasing_height() {
    let genesis = genesis();
    let mut ledger = ConfirmationLedger::new(genesis.block_ref(), confirms(2));
    let block = child(&genesis, A, 2, 0);
    ledger.add_confirm_info(&block);
    ledger.add_confirm_info(&block);
}

#[test]
fn gc_is_exact() {
    let genesis = genesis();
    let mut ledger = ConfirmationLedger::new(genesis.block_ref(), confirms(5));
    let blocks = build_chain(&genesis, &[A, B, C, A, B, C], 2, 0);
    for block in &blocks {
        ledger.add_confirm_info(block);
        ledger.update();
    }

    let before = ledger.iter_entries().cloned().collect::<Vec<_>>();
    let proposals_before = ledger.proposals().clone();
    ledger.gc(&blocks[2].block_ref());

    assert_eq!(
        ledger.iter_entries().cloned().collect::<Vec<_>>(),
        before[3..].to_vec()
    );
    assert_eq!(ledger.proposals(), &proposals_before);

    // Collecting again with the same LIB or an older one has no effect.
    ledger.gc(&blocks[2].block_ref());
    assert_eq!(
        ledger.iter_entries().cloned().collect::<Vec<_>>(),
        before[3..].to_vec()
    );
    ledger.gc(&blocks[0].block_ref());
    ledger.gc(&genesis.block_ref());
    assert_eq!(
        ledger.iter_entries().cloned().collect::<Vec<_>>(),
        before[3..].to_vec()
    );
    assert_eq!(ledger.proposals(), &proposals_before);

    ledger.gc(&BlockRef {
        hash: [0; 32],
        height: u64::MAX,
        confirm_window: 0,
    });
    assert!(ledger.is_empty());
}

#[test]
fn decrement_counts() {
    let genesis = genesis();
    let mut ledger = ConfirmationLedger::new(genesis.block_ref(), confirms(5));
    let b1 = child(&genesis, A, 1, 0);
    let b2 = child(&b1, B, 3, 0);
    let b3 = child(&b2, C, 2, 0);
    for block in [&b1, &b2, &b3] {
        ledger.add_confirm_info(block);
    }

    let counts = ledger.decrement_counts();
    assert_eq!(counts.get(&0), Some(&1));
    assert_eq!(counts.get(&1), Some(&1));
    assert_eq!(counts.get(&2), Some(&1));
    assert_eq!(counts.get(&3), None);
    assert_eq!(counts.len(), 3);
}

#[test]
fn commit_requires_child_of_best() {
    let genesis = genesis();
    let mut tracker = LibTracker::new(genesis.block_ref(), confirms(2));
    let blocks = build_chain(&genesis, &[A, B], 2, 0);
    tracker.commit_block(&blocks[0]).unwrap();

    let before = tracker.clone();

    // Same block twice.
    let err = tracker.commit_block(&blocks[0]).unwrap_err();
    assert_eq!(err.current, blocks[0].hash);
    assert_eq!(err.old_best, blocks[0].hash);
    assert_eq!(tracker, before);

    // Right parent hash, wrong height.
    let mut wrong_height = blocks[1].clone();
    wrong_height.height = 3;
    assert!(tracker.commit_block(&wrong_height).is_err());
    assert_eq!(tracker, before);

    let orphan = child(&blocks[1], C, 2, 0);
    assert!(tracker.commit_block(&orphan).is_err());
    assert_eq!(tracker, before);
}

#[test]
fn lib_is_monotonic_and_on_chain() {
    let mut rng = rand::thread_rng();

    for _ in 0..64 {
        let producers = (0..rng.gen_range(1..=21))
            .map(|_| rand::random::<ProducerId>())
            .collect::<Vec<_>>();

        let genesis = genesis();
        let mut tracker = LibTracker::new(genesis.block_ref(), confirms(rng.gen_range(1..=6)));
        let mut chain = vec![genesis];

        for _ in 0..rng.gen_range(0..200) {
            let parent = chain.last().unwrap();
            let block = CommittedBlock {
                hash: rand::random(),
                parent_hash: parent.hash,
                height: parent.height + 1,
                confirm_window: rng.gen_range(0..=12),
                producer: producers[rng.gen_range(0..producers.len())],
            };

            let lib_before = tracker.lib().clone();
            if let Some(new_lib) = tracker.commit_block(&block).unwrap() {
                assert!(new_lib.height > lib_before.height);
                tracker.gc();
            } else {
                assert_eq!(tracker.lib(), &lib_before);
            }
            chain.push(block);

            let lib = tracker.lib();
            assert_eq!(
                chain[usize::try_from(lib.height).unwrap()].block_ref(),
                *lib
            );
            assert!(tracker.ledger().iter_entries().all(|e| e.block.height > lib.height));
            assert_eq!(
                tracker.ledger().len(),
                usize::try_from(tracker.best_block().height - lib.height).unwrap()
            );
        }
    }
}

#[test]
fn bootstrap_equivalent_to_sequential_commits() {
    let mut rng = rand::thread_rng();

    for _ in 0..64 {
        let producers = (0..rng.gen_range(1..=10))
            .map(|_| rand::random::<ProducerId>())
            .collect::<Vec<_>>();
        let required_confirms = confirms(rng.gen_range(1..=4));

        let genesis = genesis();
        let mut tracker = LibTracker::new(genesis.block_ref(), required_confirms);
        let mut chain = vec![genesis.clone()];
        for _ in 0..rng.gen_range(0..100) {
            let parent = chain.last().unwrap();
            let block = CommittedBlock {
                hash: rand::random(),
                parent_hash: parent.hash,
                height: parent.height + 1,
                confirm_window: rng.gen_range(1..=8),
                producer: producers[rng.gen_range(0..producers.len())],
            };
            if tracker.commit_block(&block).unwrap().is_some() {
                tracker.gc();
            }
            chain.push(block);
        }

        let encoded = tracker.encode_status();
        let status = load(
            StatusRecords {
                lib: Some(&encoded.lib[..]),
                pre_lib: Some(&encoded.pre_lib[..]),
            },
            &genesis.block_ref(),
        )
        .unwrap();
        assert!(!status.first_boot);

        let rebuilt = drive(
            rebuild_confirms(BootstrapConfig {
                genesis: genesis.block_ref(),
                best_block: tracker.best_block().clone(),
                required_confirms,
                status,
            }),
            &chain,
        )
        .unwrap();

        assert_eq!(rebuilt.tracker, tracker);
    }
}

#[test]
fn bootstrap_first_boot() {
    let genesis = genesis();
    let chain = core::iter::once(genesis.clone())
        .chain(build_chain(&genesis, &[A, B, C, A, B], 2, 0))
        .collect::<Vec<_>>();

    let status = load(StatusRecords::default(), &genesis.block_ref()).unwrap();
    assert!(status.first_boot);
    assert_eq!(status.lib, genesis.block_ref());
    assert!(status.proposals.is_empty());

    let rebuilt = drive(
        rebuild_confirms(BootstrapConfig {
            genesis: genesis.block_ref(),
            best_block: chain[5].block_ref(),
            required_confirms: confirms(2),
            status,
        }),
        &chain,
    )
    .unwrap();

    // The LIB isn't moved by the replay, and the proposals made during the replay aren't kept.
    assert_eq!(rebuilt.tracker.lib(), &genesis.block_ref());
    assert_eq!(rebuilt.tracker.best_block(), &chain[5].block_ref());
    assert_eq!(rebuilt.tracker.ledger().len(), 5);
    assert!(rebuilt.tracker.ledger().proposals().is_empty());
    assert_eq!(
        rebuilt
            .replayed_proposals
            .get(&B)
            .unwrap()
            .iter()
            .map(|p| p.height)
            .collect::<Vec<_>>(),
        vec![0, 1, 4]
    );
}

#[test]
fn bootstrap_empty_records_are_absent() {
    let genesis = genesis();
    let status = load(
        StatusRecords {
            lib: Some(&[0u8; 0][..]),
            pre_lib: None,
        },
        &genesis.block_ref(),
    )
    .unwrap();
    assert!(status.first_boot);
}

#[test]
fn bootstrap_corrupted_record() {
    let genesis = genesis();
    assert!(load(
        StatusRecords {
            lib: Some(&[1, 2, 3][..]),
            pre_lib: None,
        },
        &genesis.block_ref(),
    )
    .is_err());
}

#[test]
fn bootstrap_lib_is_best() {
    let genesis = genesis();
    let blocks = build_chain(&genesis, &[A, B, C], 2, 0);
    let status = load(
        StatusRecords {
            lib: Some(&crate::status::encode_lib(&blocks[2].block_ref())[..]),
            pre_lib: None,
        },
        &genesis.block_ref(),
    )
    .unwrap();

    let Rebuild::Finished(Ok(rebuilt)) = rebuild_confirms(BootstrapConfig {
        genesis: genesis.block_ref(),
        best_block: blocks[2].block_ref(),
        required_confirms: confirms(2),
        status,
    }) else {
        panic!()
    };

    assert!(rebuilt.tracker.ledger().is_empty());
    assert_eq!(rebuilt.tracker.lib(), &blocks[2].block_ref());
}

#[test]
fn bootstrap_lib_at_max_height() {
    let genesis = genesis();
    let lib = BlockRef {
        hash: [0xcc; 32],
        height: u64::MAX,
        confirm_window: 3,
    };
    let status = load(
        StatusRecords {
            lib: Some(&crate::status::encode_lib(&lib)[..]),
            pre_lib: None,
        },
        &genesis.block_ref(),
    )
    .unwrap();

    let Rebuild::Finished(Ok(rebuilt)) = rebuild_confirms(BootstrapConfig {
        genesis: genesis.block_ref(),
        best_block: lib.clone(),
        required_confirms: confirms(2),
        status,
    }) else {
        panic!()
    };

    assert!(rebuilt.tracker.ledger().is_empty());
    assert_eq!(rebuilt.tracker.lib(), &lib);
    assert_eq!(rebuilt.tracker.best_block(), &lib);
}

#[test]
fn bootstrap_lib_above_best() {
    let genesis = genesis();
    let blocks = build_chain(&genesis, &[A, B, C, A, B], 2, 0);
    let status = load(
        StatusRecords {
            lib: Some(&crate::status::encode_lib(&blocks[4].block_ref())[..]),
            pre_lib: None,
        },
        &genesis.block_ref(),
    )
    .unwrap();

    let rebuild = rebuild_confirms(BootstrapConfig {
        genesis: genesis.block_ref(),
        best_block: blocks[2].block_ref(),
        required_confirms: confirms(2),
        status,
    });

    match rebuild {
        Rebuild::Finished(Err(ReplayError::InvalidLib(err))) => {
            assert_eq!(err.lib, blocks[4].block_ref());
            assert_eq!(err.best_height, 3);
        }
        _ => panic!(),
    }
}

#[test]
fn replay_rejects_bad_blocks() {
    let genesis = genesis();
    let main = build_chain(&genesis, &[A, B, C], 2, 0);
    let fork = build_chain(&genesis, &[A, B, C], 2, 1);

    let start = || {
        rebuild_confirms(BootstrapConfig {
            genesis: genesis.block_ref(),
            best_block: main[2].block_ref(),
            required_confirms: confirms(2),
            status: load(StatusRecords::default(), &genesis.block_ref()).unwrap(),
        })
    };

    let Rebuild::BlockNeeded(needed) = start() else {
        panic!()
    };
    assert_eq!(needed.height(), 1);
    assert_eq!(needed.target(), &main[2].block_ref());
    assert!(matches!(
        needed.inject_block(&main[1]),
        Rebuild::Finished(Err(ReplayError::UnexpectedBlock {
            expected_height: 1,
            obtained_height: 2
        }))
    ));

    let Rebuild::BlockNeeded(needed) = start() else {
        panic!()
    };
    let Rebuild::BlockNeeded(needed) = needed.inject_block(&main[0]) else {
        panic!()
    };
    assert!(matches!(
        needed.inject_block(&fork[1]),
        Rebuild::Finished(Err(ReplayError::Inconsistent(_)))
    ));

    // The fork is internally consistent, but doesn't end with the expected best block.
    let fork_with_genesis = core::iter::once(genesis.clone())
        .chain(fork.iter().cloned())
        .collect::<Vec<_>>();
    assert!(matches!(
        drive(start(), &fork_with_genesis),
        Err(ReplayError::BestBlockMismatch { height: 3, .. })
    ));
}

#[test]
fn rollback_to_fork() {
    let genesis = genesis();
    let main = build_chain(&genesis, &[A, B, C, A, B, C], 2, 0);
    let mut tracker = LibTracker::new(genesis.block_ref(), confirms(2));
    assert_eq!(commit_all(&mut tracker, &main), vec![0, 0, 0, 1, 2, 3]);

    // Fork starting after block 4.
    let fork = build_chain(&main[3], &[C, B, C, A], 2, 1);
    let fork_chain = core::iter::once(genesis.clone())
        .chain(main[..4].iter().cloned())
        .chain(fork.iter().cloned())
        .collect::<Vec<_>>();

    let rebuilt = drive(tracker.rollback_to(fork[0].block_ref()), &fork_chain).unwrap();
    let mut tracker = rebuilt.tracker;

    assert_eq!(tracker.lib(), &main[2].block_ref());
    assert_eq!(tracker.best_block(), &fork[0].block_ref());
    assert_eq!(
        tracker.ledger().iter_entries().map(|e| e.block.height).collect::<Vec<_>>(),
        vec![4, 5]
    );

    let heights = |tracker: &LibTracker, producer: &ProducerId| {
        tracker
            .ledger()
            .proposals_of(producer)
            .iter()
            .map(|p| p.height)
            .collect::<Vec<_>>()
    };
    assert_eq!(heights(&tracker, &A), vec![0, 3]);
    assert_eq!(heights(&tracker, &B), vec![0, 1, 4]);
    assert_eq!(heights(&tracker, &C), vec![0, 2]);

    assert_eq!(tracker.commit_block(&fork[1]).unwrap(), None);
    assert_eq!(tracker.commit_block(&fork[2]).unwrap(), None);
    assert_eq!(
        tracker.commit_block(&fork[3]).unwrap(),
        Some(fork[0].block_ref())
    );
}

#[test]
fn rollback_only_shrinks_proposals() {
    let mut rng = rand::thread_rng();
    let producers = [A, B, C, [4; 32], [5; 32]];

    for _ in 0..32 {
        let genesis = genesis();
        let mut tracker = LibTracker::new(genesis.block_ref(), confirms(rng.gen_range(2..=4)));
        let main = (0..40)
            .map(|_| producers[rng.gen_range(0..producers.len())])
            .collect::<Vec<_>>();
        let main = build_chain(&genesis, &main, 3, 0);
        commit_all(&mut tracker, &main);

        let lib_height = usize::try_from(tracker.lib().height).unwrap();
        let fork_point = rng.gen_range(lib_height..=main.len());
        let fork_parent = if fork_point == 0 {
            &genesis
        } else {
            &main[fork_point - 1]
        };
        let fork = (0..rng.gen_range(0..10))
            .map(|_| producers[rng.gen_range(0..producers.len())])
            .collect::<Vec<_>>();
        let fork = build_chain(fork_parent, &fork, 3, 1);
        let target = fork.last().unwrap_or(fork_parent).block_ref();
        let fork_chain = core::iter::once(genesis.clone())
            .chain(main[..fork_point].iter().cloned())
            .chain(fork.iter().cloned())
            .collect::<Vec<_>>();

        let before = tracker.clone();
        let rebuilt = drive(tracker.rollback_to(target.clone()), &fork_chain).unwrap();

        assert_eq!(rebuilt.tracker.lib(), before.lib());
        assert_eq!(rebuilt.tracker.best_block(), &target);
        for producer in &producers {
            let after = rebuilt.tracker.ledger().proposals_of(producer);
            let before = before.ledger().proposals_of(producer);
            assert!(after.len() <= before.len());
            assert_eq!(after, &before[..after.len()]);
        }
    }
}

#[test]
fn rollback_below_lib_is_fatal() {
    let genesis = genesis();
    let main = build_chain(&genesis, &[A, B, C, A, B, C, A], 2, 0);
    let mut tracker = LibTracker::new(genesis.block_ref(), confirms(2));
    commit_all(&mut tracker, &main);
    assert_eq!(tracker.lib().height, 4);

    match tracker.clone().rollback_to(main[2].block_ref()) {
        Rebuild::Finished(Err(ReplayError::InvalidLib(err))) => {
            assert_eq!(err.lib.height, 4);
            assert_eq!(err.best_height, 3);
        }
        _ => panic!(),
    }

    // Same height as the LIB, but a different block.
    let other = child(&main[2], B, 2, 1);
    assert!(matches!(
        tracker.clone().rollback_to(other.block_ref()),
        Rebuild::Finished(Err(ReplayError::InvalidLib(_)))
    ));

    // Rolling back to the LIB itself is fine.
    let Rebuild::Finished(Ok(rebuilt)) = tracker.rollback_to(main[3].block_ref()) else {
        panic!()
    };
    assert!(rebuilt.tracker.ledger().is_empty());
    assert_eq!(rebuilt.tracker.best_block(), &main[3].block_ref());
}

#[test]
fn abandoned_fork_never_finalized() {
    let genesis = genesis();
    let main = build_chain(&genesis, &[A, B, C, A, B, C, A], 2, 0);
    let mut tracker = LibTracker::new(genesis.block_ref(), confirms(2));
    commit_all(&mut tracker, &main);
    assert_eq!(tracker.lib().height, 4);

    let fork = build_chain(&main[3], &[A, A, A, B], 2, 1);
    let fork_chain = core::iter::once(genesis.clone())
        .chain(main[..4].iter().cloned())
        .chain(fork.iter().cloned())
        .collect::<Vec<_>>();
    let mut tracker = drive(tracker.rollback_to(fork[0].block_ref()), &fork_chain)
        .unwrap()
        .tracker;

    // `C` has no block on the new chain and keeps its proposal of the abandoned block 5.
    assert_eq!(
        tracker.ledger().proposals_of(&C).last(),
        Some(&main[4].block_ref())
    );

    for block in &fork[1..] {
        assert_eq!(tracker.commit_block(block).unwrap(), None);
    }
    assert_eq!(tracker.lib(), &main[3].block_ref());
}
