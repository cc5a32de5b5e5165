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

//! Encoding and decoding of the records that must be persisted in order to recover the LIB
//! tracking after a restart.
//!
//! Two records exist:
//!
//! - Under the key [`STATUS_KEY_LIB`], the latest LIB, encoded with [`encode_lib`].
//! - Under the key [`STATUS_KEY_PRE_LIB`], the proposals of each producer, encoded with
//!   [`encode_pre_lib`].
//!
//! Both records start with a version byte equal to [`STATUS_FORMAT_VERSION`]. All integers are
//! encoded in LEB128. A block reference is encoded as its 32-bytes hash, followed with its
//! height, followed with its confirmation window. The proposals are encoded as a number of
//! producers, followed with, for each producer by increasing order, the 32 bytes of the
//! producer, the number of proposals, and the proposals by increasing height.
//!
//! The encoding is deterministic: encoding the same information always gives the same bytes.

use crate::{
    block::{BlockRef, ProducerId},
    finality::ProposalsMap,
};

use alloc::vec::Vec;
use nom::Finish as _;

/// Key under which the LIB record is stored.
pub const STATUS_KEY_LIB: &str = "dposStatus.LIB";

/// Key under which the record containing the proposals of each producer is stored.
pub const STATUS_KEY_PRE_LIB: &str = "dposStatus.PreLIB";

/// Version byte found at the start of each record.
pub const STATUS_FORMAT_VERSION: u8 = 1;

/// Error when decoding a status record.
#[derive(Debug, derive_more::Display, derive_more::Error, Clone)]
#[display("Failed to decode status record {key}: {kind:?}")]
pub struct StatusDecodeError {
    /// Key of the record that has failed to decode.
    pub key: &'static str,
    /// Reason for the failure.
    pub kind: nom::error::ErrorKind,
}

/// Encodes the LIB record.
pub fn encode_lib(lib: &BlockRef) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 32 + 10 + 10);
    out.push(STATUS_FORMAT_VERSION);
    encode_block_ref_into(lib, &mut out);
    out
}

/// Decodes a record previously encoded with [`encode_lib`].
pub fn decode_lib(encoded: &[u8]) -> Result<BlockRef, StatusDecodeError> {
    match nom::Parser::parse(
        &mut nom::combinator::all_consuming::<_, nom::error::Error<&[u8]>, _>(
            nom::combinator::complete(lib_record),
        ),
        encoded,
    )
    .finish()
    {
        Ok((_, lib)) => Ok(lib),
        Err(err) => Err(StatusDecodeError {
            key: STATUS_KEY_LIB,
            kind: err.code,
        }),
    }
}

/// Encodes the record containing the proposals of each producer.
pub fn encode_pre_lib(proposals: &ProposalsMap) -> Vec<u8> {
    let mut producers = proposals.iter().collect::<Vec<_>>();
    producers.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

    let mut out = Vec::new();
    out.push(STATUS_FORMAT_VERSION);
    push_varint(&mut out, u64::try_from(producers.len()).unwrap());
    for (producer, list) in producers {
        out.extend_from_slice(&producer[..]);
        push_varint(&mut out, u64::try_from(list.len()).unwrap());
        for block in list {
            encode_block_ref_into(block, &mut out);
        }
    }
    out
}

/// Decodes a record previously encoded with [`encode_pre_lib`].
///
/// Producers that aren't ordered and proposals that aren't strictly increasing are considered
/// as a corruption.
pub fn decode_pre_lib(encoded: &[u8]) -> Result<ProposalsMap, StatusDecodeError> {
    match nom::Parser::parse(
        &mut nom::combinator::all_consuming::<_, nom::error::Error<&[u8]>, _>(
            nom::combinator::complete(pre_lib_record),
        ),
        encoded,
    )
    .finish()
    {
        Ok((_, proposals)) => Ok(proposals),
        Err(err) => Err(StatusDecodeError {
            key: STATUS_KEY_PRE_LIB,
            kind: err.code,
        }),
    }
}

fn encode_block_ref_into(block: &BlockRef, out: &mut Vec<u8>) {
    out.extend_from_slice(&block.hash[..]);
    push_varint(out, block.height);
    push_varint(out, block.confirm_window);
}

/// Appends `value` in LEB128 form: seven bits per byte, least significant group first, the
/// highest bit of each byte set if more bytes follow.
fn push_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push(0x80 | (value & 0x7f) as u8);
        value >>= 7;
    }
    out.push(value as u8);
}

// Nom parsers

fn version(input: &[u8]) -> nom::IResult<&[u8], u8> {
    nom::Parser::parse(
        &mut nom::combinator::verify(nom::number::complete::u8, |v: &u8| {
            *v == STATUS_FORMAT_VERSION
        }),
        input,
    )
}

fn hash(input: &[u8]) -> nom::IResult<&[u8], [u8; 32]> {
    nom::Parser::parse(
        &mut nom::combinator::map(nom::bytes::complete::take(32u32), |h: &[u8]| {
            <[u8; 32]>::try_from(h).unwrap()
        }),
        input,
    )
}

/// Longest LEB128 encoding of a `u64`.
const VARINT_MAX_LEN: usize = 10;

/// Parses an integer written by [`push_varint`].
///
/// Encodings with a trailing zero byte are refused, so that each value has exactly one
/// encoding.
fn varint(input: &[u8]) -> nom::IResult<&[u8], u64> {
    let mut value = 0u64;

    for (index, byte) in input.iter().copied().enumerate().take(VARINT_MAX_LEN) {
        let group = u64::from(byte & 0x7f);
        let shift = 7 * index;
        if shift == 63 && group > 1 {
            return Err(nom::Err::Error(nom::error::make_error(
                input,
                nom::error::ErrorKind::TooLarge,
            )));
        }
        value |= group << shift;

        if byte & 0x80 == 0 {
            if index != 0 && byte == 0 {
                return Err(nom::Err::Error(nom::error::make_error(
                    input,
                    nom::error::ErrorKind::Verify,
                )));
            }
            return Ok((&input[index + 1..], value));
        }
    }

    let kind = if input.len() >= VARINT_MAX_LEN {
        nom::error::ErrorKind::TooLarge
    } else {
        nom::error::ErrorKind::Eof
    };
    Err(nom::Err::Error(nom::error::make_error(input, kind)))
}

/// Parses a number of items.
fn count(input: &[u8]) -> nom::IResult<&[u8], usize> {
    nom::Parser::parse(
        &mut nom::combinator::map_res(varint, |n| usize::try_from(n)),
        input,
    )
}

fn block_ref(input: &[u8]) -> nom::IResult<&[u8], BlockRef> {
    let (input, hash) = hash(input)?;
    let (input, height) = varint(input)?;
    let (input, confirm_window) = varint(input)?;
    Ok((
        input,
        BlockRef {
            hash,
            height,
            confirm_window,
        },
    ))
}

fn lib_record(input: &[u8]) -> nom::IResult<&[u8], BlockRef> {
    let (input, _) = version(input)?;
    block_ref(input)
}

fn pre_lib_record(input: &[u8]) -> nom::IResult<&[u8], ProposalsMap> {
    let (mut input, _) = version(input)?;
    let num_producers;
    (input, num_producers) = count(input)?;

    // Capacities aren't reserved in advance, as the numbers come from the input.
    let mut out = ProposalsMap::default();
    let mut previous_producer: Option<ProducerId> = None;

    for _ in 0..num_producers {
        let producer_start = input;
        let producer;
        (input, producer) = hash(input)?;
        if previous_producer.map_or(false, |previous| previous >= producer) {
            return Err(nom::Err::Error(nom::error::make_error(
                producer_start,
                nom::error::ErrorKind::Verify,
            )));
        }
        previous_producer = Some(producer);

        let num_proposals;
        (input, num_proposals) = count(input)?;

        let mut list: Vec<BlockRef> = Vec::new();
        for _ in 0..num_proposals {
            let block_start = input;
            let block;
            (input, block) = block_ref(input)?;
            if list.last().map_or(false, |last| last.height >= block.height) {
                return Err(nom::Err::Error(nom::error::make_error(
                    block_start,
                    nom::error::ErrorKind::Verify,
                )));
            }
            list.push(block);
        }

        out.insert(producer, list);
    }

    Ok((input, out))
}
