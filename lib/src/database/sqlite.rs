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

//! Filesystem-backed database containing the blocks of a chain and the status of its LIB.
//!
//! # Usage
//!
//! Use the [`open()`] function to create a new database or open an existing one. [`open()`]
//! returns a [`DatabaseOpen`] enum. This enum will contain either a [`SqliteDatabase`] object,
//! representing an access to the database, or a [`DatabaseEmpty`] if the database didn't exist or
//! is empty. If that is the case, use [`DatabaseEmpty::initialize`] in order to populate it with
//! the genesis block and obtain a [`SqliteDatabase`].
//!
//! Use [`SqliteDatabase::insert_block`] to insert a new block in the database. The block is
//! assumed to have been committed by the API user. An error is returned if this block is already
//! in the database or if its parent isn't.
//!
//! Use [`SqliteDatabase::set_best_block`] to mark a block already in the database as the best
//! block. The blocks between the genesis and this block form the *best chain*, and can be
//! retrieved by height with [`SqliteDatabase::best_chain_block_by_number`].
//!
//! The records of the [`crate::status`] module are accessed with
//! [`SqliteDatabase::status_get`] and [`SqliteDatabase::status_set`].
//!
//! # About errors handling
//!
//! Most of the functions and methods in this module return a `Result` containing notably an
//! [`CorruptedError`]. This kind of errors can happen if the operating system returns an error
//! when accessing the file system, or if the database has been corrupted, for example by the user
//! manually modifying it.
//!
//! There isn't much that can be done to properly handle an [`CorruptedError`]. The only
//! reasonable solutions are either to stop the program, or to delete the entire database and
//! recreate it.
//!
//! # Schema
//!
//! The SQL schema of the database, with explanatory comments, can be found in `open.rs`.
//!
//! # About blocking behavior
//!
//! This implementation uses the SQLite library, which isn't Rust-asynchronous-compatible. Many
//! functions will, with the help of the operating system, put the current thread to sleep while
//! waiting for an I/O operation to finish.
//!

#![cfg(feature = "database-sqlite")]
#![cfg_attr(docsrs, doc(cfg(feature = "database-sqlite")))]

use crate::{
    block::CommittedBlock,
    status::{STATUS_KEY_LIB, STATUS_KEY_PRE_LIB},
};

use alloc::vec::Vec;
use core::fmt;
use parking_lot::Mutex;
use rusqlite::OptionalExtension as _;

pub use open::{open, Config, ConfigTy, DatabaseEmpty, DatabaseOpen};

mod open;

/// Returns an opaque string representing the version number of the SQLite library this binary
/// is using.
pub fn sqlite_version() -> &'static str {
    rusqlite::version()
}

/// An open database. Holds file descriptors.
pub struct SqliteDatabase {
    /// The SQLite connection.
    ///
    /// Every modification is performed within a transaction, so that a crash never leaves the
    /// database in an intermediary state.
    database: Mutex<rusqlite::Connection>,
}

impl SqliteDatabase {
    /// Returns the genesis block of the chain.
    pub fn genesis_block(&self) -> Result<CommittedBlock, CorruptedError> {
        let connection = self.database.lock();
        let hash = meta_get_hash(&connection, "genesis")?;
        block_by_hash(&connection, &hash)?.ok_or(CorruptedError::MissingBlock)
    }

    /// Returns the current best block.
    pub fn best_block(&self) -> Result<CommittedBlock, CorruptedError> {
        let connection = self.database.lock();
        let hash = meta_get_hash(&connection, "best")?;
        block_by_hash(&connection, &hash)?.ok_or(CorruptedError::MissingBlock)
    }

    /// Returns the block with the given hash, or `None` if the block is unknown.
    pub fn block(&self, block_hash: &[u8; 32]) -> Result<Option<CommittedBlock>, CorruptedError> {
        let connection = self.database.lock();
        block_by_hash(&connection, block_hash)
    }

    /// Returns the block of the best chain at the given height, or `None` if the best chain is
    /// shorter.
    pub fn best_chain_block_by_number(
        &self,
        block_number: u64,
    ) -> Result<Option<CommittedBlock>, CorruptedError> {
        let Ok(block_number) = i64::try_from(block_number) else {
            return Ok(None);
        };

        let connection = self.database.lock();
        let row = connection
            .prepare_cached(
                r#"SELECT hash, parent_hash, number, confirm_window, producer FROM blocks WHERE number = ? AND is_best_chain = TRUE"#,
            )
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?
            .query_row((block_number,), block_row)
            .optional()
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?;

        row.map(decode_block_row).transpose()
    }

    /// Inserts a new block in the database.
    ///
    /// The parent of the block must already be in the database. If `is_new_best` is `true`, the
    /// block also becomes the new best block, exactly as if [`SqliteDatabase::set_best_block`]
    /// had been called afterwards.
    pub fn insert_block(&self, block: &CommittedBlock, is_new_best: bool) -> Result<(), InsertError> {
        let number = i64::try_from(block.height).map_err(|_| InsertError::InvalidNumber)?;
        let confirm_window =
            i64::try_from(block.confirm_window).map_err(|_| InsertError::InvalidNumber)?;

        // Locking is performed as late as possible.
        let mut database = self.database.lock();

        // Start a transaction to insert everything at once.
        let transaction = database
            .transaction()
            .map_err(|err| InsertError::Corrupted(CorruptedError::Internal(InternalError(err))))?;

        if has_block(&transaction, &block.hash)? {
            return Err(InsertError::Duplicate);
        }

        let Some(parent) = block_by_hash(&transaction, &block.parent_hash)? else {
            return Err(InsertError::MissingParent);
        };
        if parent.height.checked_add(1) != Some(block.height) {
            return Err(InsertError::NotChildOfParent);
        }

        transaction
            .prepare_cached(
                "INSERT INTO blocks(hash, parent_hash, number, confirm_window, producer, is_best_chain) VALUES (?, ?, ?, ?, ?, FALSE)",
            )
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?
            .execute((
                &block.hash[..],
                &block.parent_hash[..],
                number,
                confirm_window,
                &block.producer[..],
            ))
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?;

        if is_new_best {
            set_best_chain(&transaction, &block.hash)?;
        }

        // If everything is successful, we commit.
        transaction
            .commit()
            .map_err(|err| InsertError::Corrupted(CorruptedError::Internal(InternalError(err))))?;

        Ok(())
    }

    /// Changes the best block to the given block, which must already be in the database.
    ///
    /// The new best block doesn't need to be a descendant of the current best block.
    pub fn set_best_block(&self, new_best_block_hash: &[u8; 32]) -> Result<(), SetBestError> {
        let mut database = self.database.lock();

        let transaction = database.transaction().map_err(|err| {
            SetBestError::Corrupted(CorruptedError::Internal(InternalError(err)))
        })?;

        if !has_block(&transaction, new_best_block_hash)? {
            return Err(SetBestError::UnknownBlock);
        }

        set_best_chain(&transaction, new_best_block_hash)?;

        transaction.commit().map_err(|err| {
            SetBestError::Corrupted(CorruptedError::Internal(InternalError(err)))
        })?;

        Ok(())
    }

    /// Returns the status record stored under the given key, or `None` if there is none.
    ///
    /// See [`crate::status`] for the list of keys.
    pub fn status_get(&self, key: &str) -> Result<Option<Vec<u8>>, CorruptedError> {
        let connection = self.database.lock();
        meta_get_blob(&connection, key)
    }

    /// Stores both status records at once.
    ///
    /// Either both records are written or none of them is.
    pub fn status_set(&self, lib: &[u8], pre_lib: &[u8]) -> Result<(), CorruptedError> {
        let mut database = self.database.lock();
        let transaction = database
            .transaction()
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?;

        meta_set_blob(&transaction, STATUS_KEY_LIB, lib)?;
        meta_set_blob(&transaction, STATUS_KEY_PRE_LIB, pre_lib)?;

        transaction
            .commit()
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?;
        Ok(())
    }

    /// Inserts the genesis block in an empty database.
    fn initialize(&self, genesis: &CommittedBlock) -> Result<(), CorruptedError> {
        let mut database = self.database.lock();
        let transaction = database
            .transaction()
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?;

        transaction
            .prepare_cached(
                "INSERT OR REPLACE INTO blocks(hash, parent_hash, number, confirm_window, producer, is_best_chain) VALUES(?, NULL, 0, ?, ?, TRUE)",
            )
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?
            .execute((
                &genesis.hash[..],
                i64::try_from(genesis.confirm_window).unwrap_or(i64::MAX),
                &genesis.producer[..],
            ))
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?;

        meta_set_blob(&transaction, "genesis", &genesis.hash[..])?;
        meta_set_blob(&transaction, "best", &genesis.hash[..])?;

        transaction
            .commit()
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?;

        Ok(())
    }
}

impl fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SqliteDatabase").finish()
    }
}

impl Drop for SqliteDatabase {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            // The SQLite documentation recommends running `PRAGMA optimize` when the database
            // closes.
            let _ = self.database.get_mut().execute("PRAGMA optimize", ());
        }
    }
}

/// Error while calling [`SqliteDatabase::insert_block`].
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum InsertError {
    /// Error accessing the database.
    #[display("{_0}")]
    Corrupted(CorruptedError),
    /// Block was already in the database.
    Duplicate,
    /// Parent of the block to insert isn't in the database.
    MissingParent,
    /// The height of the block isn't equal to the height of its parent plus one.
    NotChildOfParent,
    /// The height or the confirmation window of the block can't be stored.
    InvalidNumber,
}

/// Error while calling [`SqliteDatabase::set_best_block`].
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum SetBestError {
    /// Error accessing the database.
    #[display("{_0}")]
    Corrupted(CorruptedError),
    /// New best block isn't in the database.
    UnknownBlock,
}

impl From<CorruptedError> for InsertError {
    fn from(err: CorruptedError) -> InsertError {
        InsertError::Corrupted(err)
    }
}

impl From<CorruptedError> for SetBestError {
    fn from(err: CorruptedError) -> SetBestError {
        SetBestError::Corrupted(err)
    }
}

/// Error in the content of the database.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CorruptedError {
    /// Block numbers and confirmation windows are expected to fit in 63 bits.
    InvalidNumber,
    /// A block hash is expected to be 32 bytes. This isn't the case.
    InvalidBlockHashLen,
    /// The parent of a block in the database couldn't be found in that same database.
    BrokenChain,
    /// Missing a key in the `meta` table.
    MissingMetaKey,
    /// Some parts of the database refer to a block by its hash, but the block couldn't be found.
    MissingBlock,
    #[display("Internal error: {_0}")]
    Internal(InternalError),
}

/// Low-level database error, such as an error while accessing the file system.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub struct InternalError(rusqlite::Error);

/// Raw content of a row of the `blocks` table.
type BlockRow = ([u8; 32], Option<[u8; 32]>, i64, i64, [u8; 32]);

/// Must be used with a `SELECT hash, parent_hash, number, confirm_window, producer` query.
fn block_row(row: &rusqlite::Row) -> rusqlite::Result<BlockRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn decode_block_row(
    (hash, parent_hash, number, confirm_window, producer): BlockRow,
) -> Result<CommittedBlock, CorruptedError> {
    Ok(CommittedBlock {
        hash,
        // The genesis block has no parent.
        parent_hash: parent_hash.unwrap_or([0; 32]),
        height: u64::try_from(number).map_err(|_| CorruptedError::InvalidNumber)?,
        confirm_window: u64::try_from(confirm_window).map_err(|_| CorruptedError::InvalidNumber)?,
        producer,
    })
}

fn block_by_hash(
    database: &rusqlite::Connection,
    hash: &[u8; 32],
) -> Result<Option<CommittedBlock>, CorruptedError> {
    let row = database
        .prepare_cached(
            r#"SELECT hash, parent_hash, number, confirm_window, producer FROM blocks WHERE hash = ?"#,
        )
        .map_err(|err| CorruptedError::Internal(InternalError(err)))?
        .query_row((&hash[..],), block_row)
        .optional()
        .map_err(|err| CorruptedError::Internal(InternalError(err)))?;

    row.map(decode_block_row).transpose()
}

fn has_block(database: &rusqlite::Connection, hash: &[u8]) -> Result<bool, CorruptedError> {
    database
        .prepare_cached(r#"SELECT COUNT(*) FROM blocks WHERE hash = ?"#)
        .map_err(|err| CorruptedError::Internal(InternalError(err)))?
        .query_row((hash,), |row| Ok(row.get_unwrap::<_, i64>(0) != 0))
        .map_err(|err| CorruptedError::Internal(InternalError(err)))
}

fn meta_get_blob(
    database: &rusqlite::Connection,
    key: &str,
) -> Result<Option<Vec<u8>>, CorruptedError> {
    let value = database
        .prepare_cached(r#"SELECT value_blob FROM meta WHERE key = ?"#)
        .map_err(|err| CorruptedError::Internal(InternalError(err)))?
        .query_row((key,), |row| row.get::<_, Vec<u8>>(0))
        .optional()
        .map_err(|err| CorruptedError::Internal(InternalError(err)))?;
    Ok(value)
}

fn meta_get_hash(database: &rusqlite::Connection, key: &str) -> Result<[u8; 32], CorruptedError> {
    let value = meta_get_blob(database, key)?.ok_or(CorruptedError::MissingMetaKey)?;
    <[u8; 32]>::try_from(&value[..]).map_err(|_| CorruptedError::InvalidBlockHashLen)
}

fn meta_set_blob(
    database: &rusqlite::Connection,
    key: &str,
    value: &[u8],
) -> Result<(), CorruptedError> {
    database
        .prepare_cached(r#"INSERT OR REPLACE INTO meta(key, value_blob) VALUES (?, ?)"#)
        .map_err(|err| CorruptedError::Internal(InternalError(err)))?
        .execute((key, value))
        .map_err(|err| CorruptedError::Internal(InternalError(err)))?;
    Ok(())
}

/// Marks the chain ending with the given block as the best chain.
fn set_best_chain(
    database: &rusqlite::Connection,
    new_best_block_hash: &[u8; 32],
) -> Result<(), CorruptedError> {
    // Walk down the ancestry of the new best block until a block of the current best chain is
    // found. This block is the common ancestor of the old and new best chains.
    let mut to_include = Vec::new();
    let mut iter = *new_best_block_hash;
    let common_ancestor_number = loop {
        let (number, parent_hash, is_best_chain) = database
            .prepare_cached(
                r#"SELECT number, parent_hash, is_best_chain FROM blocks WHERE hash = ?"#,
            )
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?
            .query_row((&iter[..],), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<[u8; 32]>>(1)?,
                    row.get::<_, bool>(2)?,
                ))
            })
            .optional()
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?
            .ok_or(CorruptedError::BrokenChain)?;

        if is_best_chain {
            break number;
        }

        to_include.push(iter);
        // The genesis block is always part of the best chain.
        iter = parent_hash.ok_or(CorruptedError::BrokenChain)?;
    };

    database
        .prepare_cached(
            r#"UPDATE blocks SET is_best_chain = FALSE WHERE number > ? AND is_best_chain = TRUE"#,
        )
        .map_err(|err| CorruptedError::Internal(InternalError(err)))?
        .execute((common_ancestor_number,))
        .map_err(|err| CorruptedError::Internal(InternalError(err)))?;

    {
        let mut statement = database
            .prepare_cached(r#"UPDATE blocks SET is_best_chain = TRUE WHERE hash = ?"#)
            .map_err(|err| CorruptedError::Internal(InternalError(err)))?;
        for hash in to_include {
            statement
                .execute((&hash[..],))
                .map_err(|err| CorruptedError::Internal(InternalError(err)))?;
        }
    }

    meta_set_blob(database, "best", &new_best_block_hash[..])?;
    Ok(())
}
