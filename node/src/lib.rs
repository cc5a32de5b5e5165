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

//! Service tracking the last irreducible block (LIB) of a chain whose blocks are stored in an
//! SQLite database.
//!
//! The [`LibService`] owns the database and a [`LibTracker`]. The block-application pipeline is
//! expected to insert each committed block in the database, mark it as the best block, then
//! call [`LibService::on_best_block`]. All calls must happen sequentially, in the order in
//! which the blocks are applied.

#![deny(rustdoc::broken_intra_doc_links)]

use dpos_finality::{
    block::{BlockRef, CommittedBlock},
    database::sqlite::{self, CorruptedError, SqliteDatabase},
    finality::{
        self, BootstrapConfig, ConsistencyError, LibTracker, Rebuild, Rebuilt, ReplayError,
        StatusRecords,
    },
    informant::ShortHashDisplay,
    status::{self, StatusDecodeError},
};

use std::num::NonZeroU16;

/// Configuration of a [`LibService`].
#[derive(Debug)]
pub struct Config<'a> {
    /// Database to open.
    pub database: sqlite::Config<'a>,

    /// Genesis block of the chain. Inserted in the database if it is empty. If the database
    /// isn't empty, its genesis block must be the same.
    pub genesis: CommittedBlock,

    /// Number of confirmations each block must receive before being proposed by the producer
    /// of the block that completes them.
    pub required_confirms: NonZeroU16,
}

/// See the [module-level documentation](self).
#[derive(Debug)]
pub struct LibService {
    database: SqliteDatabase,
    tracker: LibTracker,
}

impl LibService {
    /// Opens the database, then rebuilds the state of the LIB tracking by replaying the blocks
    /// between the persisted LIB and the best block of the database.
    pub fn new(config: Config) -> Result<Self, InitError> {
        let (database, database_is_new) =
            match sqlite::open(config.database).map_err(InitError::DatabaseOpen)? {
                sqlite::DatabaseOpen::Open(database) => (database, false),
                sqlite::DatabaseOpen::Empty(empty) => (
                    empty
                        .initialize(&config.genesis)
                        .map_err(InitError::Database)?,
                    true,
                ),
            };

        let genesis = database.genesis_block().map_err(InitError::Database)?;
        if genesis != config.genesis {
            return Err(InitError::GenesisMismatch);
        }

        let lib_record = database
            .status_get(status::STATUS_KEY_LIB)
            .map_err(InitError::Database)?;
        let pre_lib_record = database
            .status_get(status::STATUS_KEY_PRE_LIB)
            .map_err(InitError::Database)?;
        let persisted = finality::load(
            StatusRecords {
                lib: lib_record.as_deref(),
                pre_lib: pre_lib_record.as_deref(),
            },
            &genesis.block_ref(),
        )
        .map_err(InitError::Status)?;
        let first_boot = persisted.first_boot;

        let best_block = database.best_block().map_err(InitError::Database)?;
        let replayed_blocks = best_block.height - persisted.lib.height.min(best_block.height);

        let rebuilt = drive_rebuild(
            &database,
            finality::rebuild_confirms(BootstrapConfig {
                genesis: genesis.block_ref(),
                best_block: best_block.block_ref(),
                required_confirms: config.required_confirms,
                status: persisted,
            }),
        )
        .map_err(InitError::Rebuild)?;

        let service = LibService {
            database,
            tracker: rebuilt.tracker,
        };

        if first_boot {
            service.persist().map_err(InitError::Database)?;
        }

        log::info!(
            "lib-status-loaded; database_is_new={:?}; first_boot={:?}; lib_hash={}; \
            lib_height={}; best_hash={}; best_height={}; replayed_blocks={}",
            database_is_new,
            first_boot,
            ShortHashDisplay(&service.tracker.lib().hash),
            service.tracker.lib().height,
            ShortHashDisplay(&service.tracker.best_block().hash),
            service.tracker.best_block().height,
            replayed_blocks
        );

        Ok(service)
    }

    /// Returns the current last irreducible block.
    pub fn lib(&self) -> &BlockRef {
        self.tracker.lib()
    }

    /// Returns the best block as known by the service.
    pub fn best_block(&self) -> &BlockRef {
        self.tracker.best_block()
    }

    /// Returns the underlying tracker.
    pub fn tracker(&self) -> &LibTracker {
        &self.tracker
    }

    /// Returns the database. Blocks must be inserted through it before calling
    /// [`LibService::on_best_block`].
    pub fn database(&self) -> &SqliteDatabase {
        &self.database
    }

    /// Notifies the service that the given block, which must already be in the database, is
    /// now the best block.
    ///
    /// If the block is a child of the previous best block, its confirmations are applied. If it
    /// descends from the previous best block through blocks that were never reported, the
    /// confirmations of each of these blocks are applied in order, exactly as if they had been
    /// reported one by one. Otherwise, the best chain has switched to a different fork, and the
    /// confirmation status is rebuilt from the LIB.
    ///
    /// Returns the new LIB if it has changed. The status records are persisted before this
    /// function returns.
    ///
    /// Errors indicate either a corrupted database or an attempt to revert the LIB, and the node
    /// should generally stop. The tracked state is unchanged if a
    /// [`BlockApplyError::Consistency`] or [`BlockApplyError::Rebuild`] is returned.
    pub fn on_best_block(
        &mut self,
        block: &CommittedBlock,
    ) -> Result<Option<BlockRef>, BlockApplyError> {
        let new_lib = if block.parent_hash == self.tracker.best_block().hash {
            self.tracker
                .commit_block(block)
                .map_err(BlockApplyError::Consistency)?
        } else if self.extends_tracked_best(block)? {
            self.fast_forward(block)?
        } else {
            log::debug!(
                "lib-status-rollback; old_best_hash={}; old_best_height={}; target_hash={}; \
                target_height={}; lib_height={}; discarded_entries={}",
                ShortHashDisplay(&self.tracker.best_block().hash),
                self.tracker.best_block().height,
                ShortHashDisplay(&block.hash),
                block.height,
                self.tracker.lib().height,
                self.tracker.ledger().len()
            );

            let rebuilt = drive_rebuild(
                &self.database,
                self.tracker.clone().rollback_to(block.block_ref()),
            )
            .map_err(BlockApplyError::Rebuild)?;
            self.tracker = rebuilt.tracker;
            None
        };

        // The proposals change more often than the LIB. They are persisted after every block so
        // that a restart replays the same state.
        self.persist().map_err(BlockApplyError::Database)?;

        if let Some(new_lib) = &new_lib {
            self.tracker.gc();
            log::info!(
                "lib-updated; hash={}; height={}; best_height={}; pending_entries={}",
                ShortHashDisplay(&new_lib.hash),
                new_lib.height,
                self.tracker.best_block().height,
                self.tracker.ledger().len()
            );
        }

        Ok(new_lib)
    }

    /// Returns `true` if both the tracked best block and `block` are part of the best chain of
    /// the database, with `block` above the tracked best block.
    fn extends_tracked_best(&self, block: &CommittedBlock) -> Result<bool, BlockApplyError> {
        let tracked = self.tracker.best_block();
        if block.height <= tracked.height {
            return Ok(false);
        }

        for (height, hash) in [(tracked.height, &tracked.hash), (block.height, &block.hash)] {
            let on_best_chain = self
                .database
                .best_chain_block_by_number(height)
                .map_err(BlockApplyError::Database)?
                .map_or(false, |b| b.hash == *hash);
            if !on_best_chain {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Commits, in order, every block of the best chain of the database between the tracked
    /// best block (exclusive) and `block` (inclusive).
    ///
    /// Must only be called if [`LibService::extends_tracked_best`] has returned `true`.
    fn fast_forward(
        &mut self,
        block: &CommittedBlock,
    ) -> Result<Option<BlockRef>, BlockApplyError> {
        let from_height = self.tracker.best_block().height;
        log::debug!(
            "lib-status-fast-forward; from_height={}; to_hash={}; to_height={}",
            from_height,
            ShortHashDisplay(&block.hash),
            block.height
        );

        let mut tracker = self.tracker.clone();
        let mut new_lib = None;

        for height in (from_height + 1)..=block.height {
            let fetched;
            let intermediate = if height == block.height {
                block
            } else {
                fetched = self
                    .database
                    .best_chain_block_by_number(height)
                    .map_err(|err| BlockApplyError::Rebuild(RebuildError::Database(err)))?
                    .ok_or(BlockApplyError::Rebuild(RebuildError::MissingBlock {
                        height,
                    }))?;
                &fetched
            };

            // Entries are collected after each change of LIB, like when the blocks are reported
            // one by one.
            if let Some(lib) = tracker
                .commit_block(intermediate)
                .map_err(BlockApplyError::Consistency)?
            {
                tracker.gc();
                new_lib = Some(lib);
            }
        }

        self.tracker = tracker;
        Ok(new_lib)
    }

    fn persist(&self) -> Result<(), CorruptedError> {
        let encoded = self.tracker.encode_status();
        self.database.status_set(&encoded.lib, &encoded.pre_lib)
    }
}

/// Runs the given [`Rebuild`] to completion, fetching the blocks of the best chain from the
/// database.
fn drive_rebuild(database: &SqliteDatabase, mut rebuild: Rebuild) -> Result<Rebuilt, RebuildError> {
    loop {
        match rebuild {
            Rebuild::Finished(result) => return result.map_err(RebuildError::Replay),
            Rebuild::BlockNeeded(needed) => {
                let height = needed.height();
                let block = database
                    .best_chain_block_by_number(height)
                    .map_err(RebuildError::Database)?
                    .ok_or(RebuildError::MissingBlock { height })?;
                rebuild = needed.inject_block(&block);
            }
        }
    }
}

/// Error when initializing a [`LibService`].
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum InitError {
    /// Failed to open the database.
    #[display("Failed to open the database: {_0}")]
    DatabaseOpen(sqlite::InternalError),
    /// Error accessing the database.
    #[display("{_0}")]
    Database(CorruptedError),
    /// The genesis block in the database isn't the one in the configuration.
    #[display("Database doesn't match the configured genesis block")]
    GenesisMismatch,
    /// A persisted status record is corrupted.
    #[display("{_0}")]
    Status(StatusDecodeError),
    /// Failed to rebuild the confirmation status.
    #[display("{_0}")]
    Rebuild(RebuildError),
}

/// Error when calling [`LibService::on_best_block`].
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum BlockApplyError {
    /// Error accessing the database.
    #[display("{_0}")]
    Database(CorruptedError),
    /// The block, or one of the blocks between the previous best block and it, has the
    /// previous best block as parent but isn't at the right height.
    #[display("{_0}")]
    Consistency(ConsistencyError),
    /// Failed to rebuild the confirmation status after a switch of the best chain.
    #[display("{_0}")]
    Rebuild(RebuildError),
}

/// Error while replaying blocks.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum RebuildError {
    /// Error accessing the database.
    #[display("{_0}")]
    Database(CorruptedError),
    /// The best chain of the database doesn't contain any block at the given height.
    #[display("Missing block #{height} in the best chain")]
    MissingBlock {
        /// Height of the missing block.
        height: u64,
    },
    /// The blocks are inconsistent with the LIB or with each other.
    #[display("{_0}")]
    Replay(ReplayError),
}
