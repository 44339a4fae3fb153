//! Data filtering and smoothing.

pub mod ema;

/// Trait for filters over values of type `V`.
///
/// The filter itself only holds its parameters, while the accumulated history lives in a separate
/// [`Filter::State`], so that one filter can be shared between several value streams.
pub trait Filter<V> {
    /// The filter's per-stream state.
    type State: Default;

    /// Adds `value` to the stream tracked by `state`, returning the filtered value.
    fn filter(&self, state: &mut Self::State, value: V) -> V;
}
