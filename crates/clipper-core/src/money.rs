//! # Money Module
//!
//! Provides the `Money` type and the commission/house split policy.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  In a commission ledger that is fatal: the provider's cut and the      │
//! │  house's cut MUST re-add to the sale total, every single time, or      │
//! │  the end-of-month settlement never reconciles.                         │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents + Floor-And-Remainder                     │
//! │    commission = floor(total × pct / 100)                               │
//! │    house      = total − commission                                     │
//! │    The house absorbs the sub-cent remainder, so the sum invariant      │
//! │    holds by construction. house is NEVER rounded on its own.           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use clipper_core::money::{split, CommissionRate, Money};
//!
//! let total = Money::from_cents(10000);
//! let parts = split(total, CommissionRate::from_percent(70)).unwrap();
//!
//! assert_eq!(parts.commission.cents(), 7000);
//! assert_eq!(parts.house.cents(), 3000);
//! assert_eq!(parts.commission + parts.house, total);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::error::MoneyError;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for adjustments and variances
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use clipper_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }
}

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and debugging. Use frontend formatting for actual UI
/// display to handle localization properly.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

// =============================================================================
// Commission Rate
// =============================================================================

/// A provider's commission rate in whole percent.
///
/// ## Why Whole Percent?
/// Provider contracts in the shop are negotiated in whole points (50%, 60%,
/// 70%); there is no sub-percent granularity to represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// Creates a commission rate from a whole percentage.
    ///
    /// Does not validate the range; [`split`] rejects rates above 100 and
    /// [`crate::validation::validate_commission_pct`] covers input
    /// boundaries.
    #[inline]
    pub const fn from_percent(pct: u32) -> Self {
        CommissionRate(pct)
    }

    /// Returns the rate in whole percent.
    #[inline]
    pub const fn percent(&self) -> u32 {
        self.0
    }

    /// Zero commission (everything goes to the house).
    #[inline]
    pub const fn zero() -> Self {
        CommissionRate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        CommissionRate(crate::DEFAULT_COMMISSION_PCT)
    }
}

impl fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// =============================================================================
// Commission Split
// =============================================================================

/// The two-way division of a sale total.
///
/// Invariant: `commission + house == total` for the total the split was
/// computed from. Guaranteed by construction in [`split`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    /// The service provider's share.
    pub commission: Money,
    /// The house's share, including any sub-cent remainder.
    pub house: Money,
}

/// Splits a sale total between provider commission and house income.
///
/// ## Policy
/// ```text
/// commission = floor(total × pct / 100)
/// house      = total − commission
/// ```
/// The house share is derived by subtraction, never rounded independently,
/// so `commission + house == total` holds exactly for every valid input.
///
/// ## Errors
/// - [`MoneyError::InvalidAmount`] if `total <= 0`
/// - [`MoneyError::InvalidPercentage`] if `rate > 100`
///
/// ## Example
/// ```rust
/// use clipper_core::money::{split, CommissionRate, Money};
///
/// // 9999 cents at 33%: floor(3299.67) = 3299, house takes the remainder
/// let parts = split(Money::from_cents(9999), CommissionRate::from_percent(33)).unwrap();
/// assert_eq!(parts.commission.cents(), 3299);
/// assert_eq!(parts.house.cents(), 6700);
/// ```
pub fn split(total: Money, rate: CommissionRate) -> Result<CommissionSplit, MoneyError> {
    if !total.is_positive() {
        return Err(MoneyError::InvalidAmount {
            cents: total.cents(),
        });
    }

    if rate.percent() > 100 {
        return Err(MoneyError::InvalidPercentage {
            pct: rate.percent(),
        });
    }

    // i128 intermediate prevents overflow on large totals.
    // Integer division of non-negative operands is the floor.
    let commission_cents = (total.cents() as i128 * rate.percent() as i128 / 100) as i64;
    let commission = Money::from_cents(commission_cents);

    Ok(CommissionSplit {
        commission,
        house: total - commission,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
