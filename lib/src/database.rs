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

//! Persistent storage.
//!
//! The LIB tracking itself never accesses any storage. The API user is expected to load and
//! store the records described in [the `status` module](crate::status), and to provide the
//! blocks that need to be replayed.
//!
//! The [`sqlite`] module, enabled with the `database-sqlite` feature, provides a ready-to-use
//! implementation storing both the blocks and the records.

pub mod sqlite;
