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

//! Helpers for printing information about blocks.

use core::fmt;

/// Implementation of [`fmt::Display`] that prints a block hash as `0x` followed with its
/// hexadecimal representation.
///
/// ```
/// use dpos_finality::informant::HashDisplay;
/// assert_eq!(HashDisplay(&[0xab, 0x01]).to_string(), "0xab01");
/// ```
pub struct HashDisplay<'a>(pub &'a [u8]);

impl<'a> fmt::Display for HashDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x")?;
        for byte in self.0 {
            write!(f, "{:02x}", *byte)?;
        }
        Ok(())
    }
}

impl<'a> fmt::Debug for HashDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Implementation of [`fmt::Display`] that prints the first and last four bytes of a block hash,
/// for log lines. Values of eight bytes or less are printed entirely.
///
/// ```
/// use dpos_finality::informant::ShortHashDisplay;
/// assert_eq!(ShortHashDisplay(&[0x12; 32]).to_string(), "0x12121212…12121212");
/// assert_eq!(ShortHashDisplay(&[0xab, 0x01]).to_string(), "0xab01");
/// ```
pub struct ShortHashDisplay<'a>(pub &'a [u8]);

impl<'a> fmt::Display for ShortHashDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.len() <= 8 {
            return fmt::Display::fmt(&HashDisplay(self.0), f);
        }

        write!(f, "0x")?;
        for byte in &self.0[..4] {
            write!(f, "{:02x}", *byte)?;
        }
        write!(f, "…")?;
        for byte in &self.0[self.0.len() - 4..] {
            write!(f, "{:02x}", *byte)?;
        }
        Ok(())
    }
}

impl<'a> fmt::Debug for ShortHashDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
