// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Error types for marketplace operations.
//!
//! The taxonomy is deliberately small: every operation surfaces one of five
//! kinds, and callers branch on the variant rather than on message text.
//! Boundary layers translate the variant into a transport response
//! (HTTP status, CLI exit code, ...).

use thiserror::Error;

/// Marketplace operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// Malformed or out-of-range input (non-positive price, empty title, ...)
    #[error("{0}")]
    Validation(&'static str),

    /// A referenced request, proposal, or transaction does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The caller is not the owning party of the entity
    #[error("not authorized")]
    Forbidden,

    /// The operation is not permitted in the entity's current lifecycle state
    #[error("{0}")]
    InvalidState(&'static str),

    /// A uniqueness constraint would be violated
    #[error("{0}")]
    Conflict(&'static str),
}

impl MarketError {
    /// True for the errors a client can fix by changing its input, as opposed
    /// to lifecycle races that are expected under concurrent marketplace use.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, MarketError::InvalidState(_))
    }
}
