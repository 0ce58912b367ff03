//! This module contains the numerator/denominator pair behind weighted averages.
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Weighted sum of values together with the sum of their weights.
///
/// The weighted mean is only formed when [`RatioSum::ratio`] is called, so that partial sums from
/// different workers can be combined using `Add` and `AddAssign` without any loss.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct RatioSum<T> {
    numerator: T,
    denominator: T,
}

impl<T: Add<Output = T>> Add for RatioSum<T> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            numerator: self.numerator + other.numerator,
            denominator: self.denominator + other.denominator,
        }
    }
}

impl<T: AddAssign> AddAssign for RatioSum<T> {
    fn add_assign(&mut self, other: Self) {
        self.numerator += other.numerator;
        self.denominator += other.denominator;
    }
}

impl<T> RatioSum<T> {
    /// Constructor.
    pub const fn new(numerator: T, denominator: T) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

impl<T: Float + AddAssign> RatioSum<T> {
    /// An empty sum.
    pub fn zero() -> Self {
        Self::new(T::zero(), T::zero())
    }

    /// Adds `value` with the statistical weight `weight`.
    pub fn add_weighted(&mut self, value: T, weight: T) {
        self.numerator += weight * value;
        self.denominator += weight;
    }

    /// Returns the accumulated numerator, $\sum_i w_i x_i$.
    pub fn numerator(&self) -> T {
        self.numerator
    }

    /// Returns the accumulated denominator, $\sum_i w_i$.
    pub fn denominator(&self) -> T {
        self.denominator
    }

    /// Returns the weighted mean, or zero if no positive weight has been accumulated.
    pub fn ratio(&self) -> T {
        if self.denominator > T::zero() {
            self.numerator / self.denominator
        } else {
            T::zero()
        }
    }
}
