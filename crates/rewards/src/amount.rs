// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Exact fixed-point amounts in token base units.
//!
//! Every ledger-affecting value is a [U256] in base units together with the number of decimals
//! it represents. Products and quotients of two scaled quantities are brought back to one scale
//! with [mul_scaled] and [div_scaled], both truncating.

use std::{cmp::Ordering, fmt};

use alloy_primitives::U256;

use crate::error::{Result, RewardsError};

/// Fixed-point scale of reward-per-token values and shares (10^18).
pub const SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Number of decimals represented by [SCALE].
pub const SCALE_DECIMALS: u8 = 18;

/// Computes `a * b / SCALE`, truncating.
pub fn mul_scaled(a: U256, b: U256) -> Result<U256> {
    a.checked_mul(b)
        .map(|product| product / SCALE)
        .ok_or(RewardsError::ArithmeticOverflow("mul_scaled"))
}

/// Computes `a * SCALE / b`, truncating.
///
/// Fails with [RewardsError::DivisionByZero] when `b` is zero. Callers for which a zero divisor
/// is a legitimate state must branch on it before calling.
pub fn div_scaled(a: U256, b: U256) -> Result<U256> {
    if b.is_zero() {
        return Err(RewardsError::DivisionByZero);
    }
    a.checked_mul(SCALE)
        .map(|product| product / b)
        .ok_or(RewardsError::ArithmeticOverflow("div_scaled"))
}

/// Parse a human decimal string such as `"1000.5"` into base units with the given decimals.
///
/// Signs, exponents and grouping separators are rejected. Fractional digits beyond `decimals`
/// are accepted only when they are all zero.
pub fn parse_units(input: &str, decimals: u8) -> Result<U256> {
    let invalid = || RewardsError::InvalidNumericFormat(input.to_string());
    let s = input.trim();
    let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(invalid());
    }

    let width = decimals as usize;
    let frac_part = if frac_part.len() > width {
        let (kept, excess) = frac_part.split_at(width);
        if excess.bytes().any(|b| b != b'0') {
            return Err(invalid());
        }
        kept
    } else {
        frac_part
    };

    let digits = format!("{int_part}{frac_part:0<width$}");
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(&digits, 10).map_err(|_| invalid())
}

/// Format base units as a canonical, non-scientific decimal string.
///
/// The fractional part is truncated to `precision` digits when given, trailing zeros are
/// dropped, and at least one fractional digit is always kept: `1000.0`, `0.25`.
pub fn format_units(value: U256, decimals: u8, precision: Option<usize>) -> String {
    let digits = value.to_string();
    let width = decimals as usize;
    let (int_part, mut frac_part) = if digits.len() > width {
        let (int_part, frac_part) = digits.split_at(digits.len() - width);
        (int_part.to_string(), frac_part.to_string())
    } else {
        ("0".to_string(), format!("{digits:0>width$}"))
    };
    if let Some(precision) = precision {
        frac_part.truncate(precision);
    }
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        format!("{int_part}.0")
    } else {
        format!("{int_part}.{frac_part}")
    }
}

/// An exact amount in base units, tagged with its decimals.
///
/// Amounts of different decimals are never equal and are unordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Amount {
    exact: U256,
    decimals: u8,
}

impl Amount {
    pub const fn new(exact: U256, decimals: u8) -> Self {
        Self { exact, decimals }
    }

    pub const fn zero(decimals: u8) -> Self {
        Self { exact: U256::ZERO, decimals }
    }

    /// An amount at the [SCALE] precision, such as a reward-per-token value or a share.
    pub const fn scaled(exact: U256) -> Self {
        Self { exact, decimals: SCALE_DECIMALS }
    }

    pub fn parse(input: &str, decimals: u8) -> Result<Self> {
        Ok(Self { exact: parse_units(input, decimals)?, decimals })
    }

    pub fn exact(&self) -> U256 {
        self.exact
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.exact.is_zero()
    }

    /// Decimal representation, truncated to `precision` fractional digits when given.
    pub fn format(&self, precision: Option<usize>) -> String {
        format_units(self.exact, self.decimals, precision)
    }

    /// Lossy conversion for human-facing ratios. Never feed the result back into exact math.
    pub fn to_f64_lossy(&self) -> f64 {
        self.format(None).parse().unwrap_or(f64::NAN)
    }

    fn same_decimals(&self, other: &Self) -> Result<()> {
        if self.decimals != other.decimals {
            return Err(RewardsError::DecimalsMismatch {
                left: self.decimals,
                right: other.decimals,
            });
        }
        Ok(())
    }

    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.same_decimals(&other)?;
        let exact =
            self.exact.checked_add(other.exact).ok_or(RewardsError::ArithmeticOverflow("add"))?;
        Ok(Self { exact, ..self })
    }

    pub fn checked_sub(self, other: Self) -> Result<Self> {
        self.same_decimals(&other)?;
        let exact = self
            .exact
            .checked_sub(other.exact)
            .ok_or(RewardsError::ArithmeticOverflow("sub underflow"))?;
        Ok(Self { exact, ..self })
    }

    /// Multiply by a plain integer factor, such as a number of seconds.
    pub fn checked_mul_int(self, factor: u64) -> Result<Self> {
        let exact = self
            .exact
            .checked_mul(U256::from(factor))
            .ok_or(RewardsError::ArithmeticOverflow("mul"))?;
        Ok(Self { exact, ..self })
    }

    /// `self * factor / SCALE`, keeping the decimals of `self`. `factor` is a [SCALE]-precision
    /// value such as a share or a reward-per-token delta.
    pub fn mul_scaled(self, factor: Self) -> Result<Self> {
        Ok(Self { exact: mul_scaled(self.exact, factor.exact)?, ..self })
    }

    /// `self * SCALE / divisor` as a [SCALE]-precision value. Both operands must share decimals.
    pub fn div_scaled(self, divisor: Self) -> Result<Self> {
        self.same_decimals(&divisor)?;
        Ok(Self::scaled(div_scaled(self.exact, divisor.exact)?))
    }

    /// Sum a sequence of amounts that all carry `decimals`.
    pub fn sum<'a>(amounts: impl IntoIterator<Item = &'a Amount>, decimals: u8) -> Result<Self> {
        amounts.into_iter().try_fold(Self::zero(decimals), |acc, amount| acc.checked_add(*amount))
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.decimals == other.decimals).then(|| self.exact.cmp(&other.exact))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(None))
    }
}
