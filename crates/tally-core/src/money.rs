//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ONE ROUNDING RULE FOR EVERY PATH                                       │
//! │                                                                         │
//! │  The live recalculation (every line edit) and the final save both      │
//! │  produce cents through the functions in this module.                    │
//! │                                                                         │
//! │    amount × rate  →  i128 product  →  round half to even  →  cents      │
//! │                                                                         │
//! │  A displayed running total can therefore never differ from the         │
//! │  persisted total by a cent.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! let price = Money::from_cents(1099); // 10.99
//! let doubled = price * 2;             // 21.98
//! let parsed = Money::parse("10.99").unwrap();
//! assert_eq!(price, parsed);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Rate;

/// Number of decimal places of the display currency.
pub const CURRENCY_DECIMALS: u32 = 2;

// =============================================================================
// Rounding
// =============================================================================

/// Divides `numerator` by a positive `denominator`, rounding half to even.
///
/// ```text
///   0.5 → 0    1.5 → 2    2.5 → 2    3.5 → 4    -2.5 → -2
/// ```
pub fn div_round_half_even(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);

    let negative = numerator < 0;
    let magnitude = numerator.abs();
    let mut quotient = magnitude / denominator;
    let remainder = magnitude % denominator;

    let twice = remainder * 2;
    if twice > denominator || (twice == denominator && quotient % 2 == 1) {
        quotient += 1;
    }

    if negative {
        -quotient
    } else {
        quotient
    }
}

/// Parses a decimal string into an integer scaled by `10^scale`.
///
/// Accepts an optional sign and either `.` or `,` as decimal separator.
/// Digits beyond `scale` are rounded half to even.
pub(crate) fn parse_scaled(input: &str, scale: u32) -> Option<i64> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    let (negative, digits) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let digits = digits.replace(',', ".");
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let frac = parts.next().unwrap_or("");

    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut numerator: i128 = 0;
    for c in whole.chars().chain(frac.chars()) {
        numerator = numerator.checked_mul(10)?.checked_add((c as u8 - b'0') as i128)?;
    }

    let frac_len = frac.len() as u32;
    let scaled = if frac_len <= scale {
        numerator.checked_mul(10_i128.checked_pow(scale - frac_len)?)?
    } else {
        div_round_half_even(numerator, 10_i128.checked_pow(frac_len - scale)?)
    };

    let signed = if negative { -scaled } else { scaled };
    i64::try_from(signed).ok()
}

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Where Money is Used
/// ```text
/// OrderLine.unit_price ──► line gross ──► line net ──► tax group net
///                                                          │
///                         DocumentTotals { net, tax, surcharge, withholding, total }
///                                                          │
///                                          PaymentLedger remaining due / change
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Parses a decimal amount such as `"12.5"`, `"12,50"` or `"-3"`.
    ///
    /// Sub-cent digits are rounded half to even.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::parse("12,5").unwrap().cents(), 1250);
    /// assert_eq!(Money::parse("0.125").unwrap().cents(), 12);
    /// assert!(Money::parse("abc").is_none());
    /// ```
    pub fn parse(input: &str) -> Option<Self> {
        parse_scaled(input, CURRENCY_DECIMALS).map(Money)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Returns zero for negative amounts.
    #[inline]
    pub fn clamp_non_negative(self) -> Money {
        if self.0 < 0 {
            Money::zero()
        } else {
            self
        }
    }

    /// Returns `rate` of this amount, rounded half to even to the cent.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    /// use tally_core::types::Rate;
    ///
    /// // 10.00 × 8.25% = 0.825 → 0.82 (2 is even)
    /// let tax = Money::from_cents(1000).portion(Rate::from_bps(825));
    /// assert_eq!(tax.cents(), 82);
    ///
    /// // 10.00 × 8.35% = 0.835 → 0.84 (4 is even)
    /// let tax = Money::from_cents(1000).portion(Rate::from_bps(835));
    /// assert_eq!(tax.cents(), 84);
    /// ```
    pub fn portion(&self, rate: Rate) -> Money {
        let product = self.0 as i128 * rate.bps() as i128;
        Money(div_round_half_even(product, 10_000) as i64)
    }

    /// Subtracts a percentage discount, rounding the discount half to even.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    /// use tally_core::types::Rate;
    ///
    /// let discounted = Money::from_cents(10000).discounted(Rate::from_bps(1000));
    /// assert_eq!(discounted.cents(), 9000);
    /// ```
    pub fn discounted(&self, rate: Rate) -> Money {
        *self - self.portion(rate)
    }

    /// Multiplies by an integer quantity, saturating at the `i64` bounds.
    ///
    /// Validated lines never get near them; see [`Money::checked_mul_quantity`].
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// `None` when price × quantity does not fit.
    #[inline]
    pub const fn checked_mul_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums request-supplied amounts; `None` on overflow.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let amounts = [Money::from_cents(150), Money::from_cents(250)];
    /// assert_eq!(Money::checked_sum(amounts), Some(Money::from_cents(400)));
    /// assert_eq!(Money::checked_sum([Money::from_cents(i64::MAX), Money::from_cents(1)]), None);
    /// ```
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering (`-5.50`). Currency symbols are applied by the
/// configuration layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
