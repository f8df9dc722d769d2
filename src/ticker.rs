//! Periodic timer abstraction
//!
//! Every poll loop in the crate (directory listings and per-archive size
//! samples) is driven by a [`Scheduler`] supplied by the caller. The default
//! [`TokioScheduler`] uses `tokio::time`, which becomes a deterministic virtual
//! clock under `tokio::time::pause()`.

use futures::stream::{BoxStream, StreamExt};
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;

/// Stream of tick instants produced by a scheduler
pub type Ticks = BoxStream<'static, Instant>;

/// Source of periodic ticks
///
/// Implementations must yield the first tick promptly and the following ones
/// roughly `period` apart. A finite stream is allowed; consumers treat the end
/// of the stream as "no more polling".
pub trait Scheduler: Send + Sync + Debug {
    /// Start a new independent timer with the given period
    fn interval(&self, period: Duration) -> Ticks;
}

/// Scheduler backed by `tokio::time::interval`
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn interval(&self, period: Duration) -> Ticks {
        // tokio panics on a zero period
        let period = period.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        IntervalStream::new(interval).boxed()
    }
}
