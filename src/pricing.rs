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

//! Platform fee computation.
//!
//! Pure and deterministic: the split depends only on the amount. The platform
//! takes 10% with a flat floor, so below `MIN_PLATFORM_FEE / FEE_RATE` (= 50)
//! the floor dominates and small jobs can even net the provider less than the
//! fee.

use crate::error::MarketError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Platform cut as a fraction of the transaction amount.
pub const FEE_RATE: Decimal = dec!(0.10);

/// Flat floor on the platform fee.
pub const MIN_PLATFORM_FEE: Decimal = dec!(5);

/// Result of splitting an amount between the platform and the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub platform_fee: Decimal,
    pub provider_earnings: Decimal,
}

/// Computes the platform fee and provider earnings for an amount.
///
/// `platform_fee = max(amount * 0.10, 5)`, `provider_earnings = amount - fee`.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] if the amount is zero or negative.
pub fn compute_split(amount: Decimal) -> Result<FeeSplit, MarketError> {
    if amount <= Decimal::ZERO {
        return Err(MarketError::Validation("amount must be positive"));
    }

    let platform_fee = (amount * FEE_RATE).max(MIN_PLATFORM_FEE);
    Ok(FeeSplit {
        platform_fee,
        provider_earnings: amount - platform_fee,
    })
}
