//! Exponential Moving Average.

use super::Filter;

/// An Exponential Moving Average (EMA) filter.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f32,
}

impl Ema {
    /// Creates a new Exponential Moving Average filter.
    ///
    /// The `alpha` parameter must be between 0.0 and 1.0 and defines how quickly the weight of
    /// older values decays. Values closer to 1.0 favor recent values.
    ///
    /// # Panics
    ///
    /// This method will panic if `alpha` is not in between 0.0 and 1.0.
    pub fn new(alpha: f32) -> Self {
        assert!((0.0..=1.0).contains(&alpha));
        Self { alpha }
    }
}

/// Filter state for [`Ema`] filters.
#[derive(Debug, Default)]
pub struct EmaState {
    last: Option<f32>,
}

impl Filter<f32> for Ema {
    type State = EmaState;

    fn filter(&self, state: &mut Self::State, value: f32) -> f32 {
        let avg = match state.last {
            Some(last) => self.alpha * value + (1.0 - self.alpha) * last,
            None => value,
        };
        state.last = Some(avg);
        avg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema() {
        let ema = Ema::new(0.5);
        let mut state = EmaState::default();
        assert_eq!(ema.filter(&mut state, 1.0), 1.0);
        assert_eq!(ema.filter(&mut state, 2.0), 1.5);
        assert_eq!(ema.filter(&mut state, 2.0), 1.75);

        let mut state = EmaState::default();
        assert_eq!(ema.filter(&mut state, 4.0), 4.0);
    }
}
