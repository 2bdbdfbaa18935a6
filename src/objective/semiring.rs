use std::fmt::Debug;

/// The arithmetic used to turn scores into normalized probabilities.
pub trait Semiring: Copy + Debug {
    /// The additive identity, the weight of an empty sum.
    fn zero() -> Self;

    /// The weight `e^score`.
    fn exp(score: f64) -> Self;

    fn add(self, other: Self) -> Self;

    fn mul(self, other: Self) -> Self;

    fn div(self, other: Self) -> Self;

    /// Converts the weight back to a plain probability.
    fn value(self) -> f64;
}

/// Weights kept as their natural logarithm.
///
/// Sums are a stable log-sum-exp, so normalizing many large scores never overflows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Log(f64);

impl Semiring for Log {
    fn zero() -> Self {
        Log(f64::NEG_INFINITY)
    }

    fn exp(score: f64) -> Self {
        Log(score)
    }

    fn add(self, other: Self) -> Self {
        let (hi, lo) = if self.0 >= other.0 {
            (self.0, other.0)
        } else {
            (other.0, self.0)
        };

        if lo == f64::NEG_INFINITY {
            return Log(hi);
        }

        Log(hi + (lo - hi).exp().ln_1p())
    }

    fn mul(self, other: Self) -> Self {
        Log(self.0 + other.0)
    }

    fn div(self, other: Self) -> Self {
        Log(self.0 - other.0)
    }

    fn value(self) -> f64 {
        self.0.exp()
    }
}

/// Weights kept as plain floats, only safe for small scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear(f64);

impl Semiring for Linear {
    fn zero() -> Self {
        Linear(0.0)
    }

    fn exp(score: f64) -> Self {
        Linear(score.exp())
    }

    fn add(self, other: Self) -> Self {
        Linear(self.0 + other.0)
    }

    fn mul(self, other: Self) -> Self {
        Linear(self.0 * other.0)
    }

    fn div(self, other: Self) -> Self {
        Linear(self.0 / other.0)
    }

    fn value(self) -> f64 {
        self.0
    }
}

/// Normalizes `scores` into a distribution computed in `S`.
///
/// # Returns
/// One probability per score, in the same order.
pub fn normalize<S: Semiring>(scores: &[f64]) -> Vec<f64> {
    let z = scores
        .iter()
        .fold(S::zero(), |z, &score| z.add(S::exp(score)));

    scores
        .iter()
        .map(|&score| S::exp(score).div(z).value())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn log_and_linear_agree_on_small_scores() {
        let scores = [0.5, -1.0, 2.0, 0.0];
        let log = normalize::<Log>(&scores);
        let linear = normalize::<Linear>(&scores);

        for (l, r) in log.iter().zip(&linear) {
            assert!((l - r).abs() < EPS);
        }
        assert!((log.iter().sum::<f64>() - 1.0).abs() < EPS);
    }

    #[test]
    fn log_survives_huge_scores() {
        let probs = normalize::<Log>(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < EPS);
        assert!((probs[1] - 0.5).abs() < EPS);

        let linear = normalize::<Linear>(&[1000.0, 1000.0]);
        assert!(linear[0].is_nan());
    }

    #[test]
    fn zero_is_the_additive_identity() {
        let x = Log::exp(3.0);
        assert_eq!(Log::zero().add(x), x);
        assert_eq!(x.add(Log::zero()), x);
        assert_eq!(Linear::zero().add(Linear::exp(0.0)).value(), 1.0);
    }

    #[test]
    fn mul_and_div_are_inverse() {
        let (a, b) = (Log::exp(1.5), Log::exp(-0.25));
        assert!((a.mul(b).div(b).value() - a.value()).abs() < EPS);
        assert!((a.mul(b).value() - 1.25f64.exp()).abs() < EPS);
    }
}
