//! Coupons
//!
//! The finite set of coupon face values a customer can be offered. Every customer
//! receives exactly one coupon from this set; a zero-value coupon models "no coupon".

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

/// Errors related to coupon set construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CouponError {
    /// The candidate set contains no coupons.
    #[error("coupon set must contain at least one coupon")]
    Empty,

    /// A coupon has a negative face value (input index).
    #[error("Coupon {0} has a negative face value")]
    NegativeFaceValue(usize),

    /// Two coupons share a face value (minor units).
    #[error("Duplicate coupon face value: {0}")]
    Duplicate(i64),

    /// A coupon's currency differs from the set currency (input index, coupon currency, set currency).
    #[error("Coupon {0} has currency {1}, but coupon set has currency {2}")]
    CurrencyMismatch(usize, &'static str, &'static str),

    /// A coupon was not found in the set.
    #[error("Coupon {0} not found")]
    CouponNotFound(usize),
}

/// Coupon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coupon {
    /// Face value of the coupon
    pub face_value: Money<'static, Currency>,

    /// Maximum number of customers that may receive this coupon
    pub limit: Option<u32>,
}

impl Coupon {
    /// Create an uncapped coupon.
    pub fn new(face_value: Money<'static, Currency>) -> Self {
        Coupon {
            face_value,
            limit: None,
        }
    }

    /// Create a coupon that can be issued at most `limit` times.
    pub fn with_limit(face_value: Money<'static, Currency>, limit: u32) -> Self {
        Coupon {
            face_value,
            limit: Some(limit),
        }
    }

    /// Face value in minor units.
    pub fn minor_units(&self) -> i64 {
        self.face_value.to_minor_units()
    }
}

/// Candidate coupon set, sorted ascending by face value.
#[derive(Debug, Clone)]
pub struct CouponSet {
    coupons: SmallVec<[Coupon; 8]>,
    currency: &'static Currency,
}

impl CouponSet {
    /// Create a coupon set. Coupons are sorted by face value.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] if the set is empty, contains a negative or duplicate
    /// face value, or mixes currencies.
    pub fn new(
        coupons: impl IntoIterator<Item = Coupon>,
        currency: &'static Currency,
    ) -> Result<Self, CouponError> {
        let mut coupons: SmallVec<[Coupon; 8]> = coupons.into_iter().collect();

        if coupons.is_empty() {
            return Err(CouponError::Empty);
        }

        coupons.iter().enumerate().try_for_each(|(i, coupon)| {
            let coupon_currency = coupon.face_value.currency();

            if coupon_currency != currency {
                return Err(CouponError::CurrencyMismatch(
                    i,
                    coupon_currency.iso_alpha_code,
                    currency.iso_alpha_code,
                ));
            }

            if coupon.minor_units() < 0 {
                return Err(CouponError::NegativeFaceValue(i));
            }

            Ok(())
        })?;

        coupons.sort_by_key(Coupon::minor_units);

        let duplicate = coupons.windows(2).find_map(|pair| match pair {
            [a, b] if a.minor_units() == b.minor_units() => Some(a.minor_units()),
            _ => None,
        });

        if let Some(minor_units) = duplicate {
            return Err(CouponError::Duplicate(minor_units));
        }

        Ok(CouponSet { coupons, currency })
    }

    /// Create an uncapped coupon set from face values in minor units.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] under the same conditions as [`CouponSet::new`].
    pub fn from_minor_units(
        values: &[i64],
        currency: &'static Currency,
    ) -> Result<Self, CouponError> {
        Self::new(
            values
                .iter()
                .map(|minor| Coupon::new(Money::from_minor(*minor, currency))),
            currency,
        )
    }

    /// Get a coupon by index.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::CouponNotFound` if the index is out of range.
    pub fn get(&self, idx: usize) -> Result<&Coupon, CouponError> {
        self.coupons.get(idx).ok_or(CouponError::CouponNotFound(idx))
    }

    /// Index of the coupon whose face value is closest to `target_minor`.
    ///
    /// Ties resolve to the lower face value.
    pub fn nearest(&self, target_minor: i64) -> usize {
        self.nearest_where(target_minor, |_idx| true).unwrap_or(0)
    }

    /// Index of the closest coupon among those accepted by `available`.
    ///
    /// Ties resolve to the lower face value. Returns `None` when no coupon is
    /// available.
    pub fn nearest_where(
        &self,
        target_minor: i64,
        mut available: impl FnMut(usize) -> bool,
    ) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;

        // Coupons are sorted ascending, so keeping the first strict improvement
        // favours the lower face value on ties.
        for (idx, coupon) in self.coupons.iter().enumerate() {
            if !available(idx) {
                continue;
            }

            let distance = coupon.minor_units().abs_diff(target_minor);

            if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                best = Some((idx, distance));
            }
        }

        best.map(|(idx, _)| idx)
    }

    /// The lowest face value in the set.
    pub fn cheapest(&self) -> Money<'static, Currency> {
        self.coupons
            .first()
            .map_or(Money::from_minor(0, self.currency), |coupon| {
                coupon.face_value
            })
    }

    /// Sum of all issuance caps, or `None` if any coupon is uncapped.
    pub fn total_limit(&self) -> Option<u64> {
        self.coupons
            .iter()
            .try_fold(0_u64, |acc, coupon| Some(acc + u64::from(coupon.limit?)))
    }

    /// Iterate over the coupons in ascending face value order.
    pub fn iter(&self) -> impl Iterator<Item = &Coupon> {
        self.coupons.iter()
    }

    /// Number of coupons in the set.
    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    /// Check if the set is empty. Always false for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }

    /// Currency of the set.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }
}
