//! Simulation time: stamps, spans, operation periods and the period clock.

/// Number of ticks (seconds) in one operation period.
pub const OPERATION_PERIOD_TICKS: i64 = 3600;

/// A point in simulation time, counted in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeStamp(pub i64);

/// A duration in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSpan(pub i64);

impl TimeSpan {
    /// Span of one operation period.
    pub const fn operation_period() -> Self {
        Self(OPERATION_PERIOD_TICKS)
    }
}

/// A time interval of fixed length, identified by its start.
///
/// # Examples
///
/// ```
/// use flex_dispatch::sim::clock::{TimePeriod, TimeStamp};
///
/// let first = TimePeriod::hourly(TimeStamp(0));
/// let third = first.shift_by(2);
/// assert_eq!(third.start(), TimeStamp(7200));
/// assert_eq!(third.last_time(), TimeStamp(10799));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimePeriod {
    start: TimeStamp,
    duration: TimeSpan,
}

impl TimePeriod {
    /// Creates a period starting at `start` lasting `duration`.
    ///
    /// # Panics
    ///
    /// Panics if `duration` is not positive.
    pub fn new(start: TimeStamp, duration: TimeSpan) -> Self {
        assert!(duration.0 > 0, "period duration must be > 0");
        Self { start, duration }
    }

    /// Creates a one-hour operation period starting at `start`.
    pub fn hourly(start: TimeStamp) -> Self {
        Self::new(start, TimeSpan::operation_period())
    }

    pub fn start(&self) -> TimeStamp {
        self.start
    }

    pub fn duration(&self) -> TimeSpan {
        self.duration
    }

    /// Last tick still belonging to this period.
    pub fn last_time(&self) -> TimeStamp {
        TimeStamp(self.start.0 + self.duration.0 - 1)
    }

    /// Returns the period `count` whole periods later (or earlier for negative counts).
    pub fn shift_by(&self, count: i64) -> Self {
        Self {
            start: TimeStamp(self.start.0 + count * self.duration.0),
            duration: self.duration,
        }
    }
}

/// A simulation clock that hands out consecutive operation periods.
///
/// # Examples
///
/// ```
/// use flex_dispatch::sim::clock::{Clock, TimePeriod, TimeStamp};
///
/// let mut clock = Clock::new(TimePeriod::hourly(TimeStamp(0)), 3);
/// let mut starts = Vec::new();
///
/// clock.run(|period| starts.push(period.start().0));
/// assert_eq!(starts, vec![0, 3600, 7200]);
/// ```
pub struct Clock {
    /// Next period to be handed out
    next: TimePeriod,
    /// Periods already handed out
    current: usize,
    /// Total periods to run
    total: usize,
}

impl Clock {
    /// Creates a clock starting at `first` that runs for `total` periods.
    pub fn new(first: TimePeriod, total: usize) -> Self {
        Self {
            next: first,
            current: 0,
            total,
        }
    }

    /// Advances the clock by one period.
    ///
    /// # Returns
    ///
    /// * `Some(period)` - The period before advancing
    /// * `None` - If all periods have been handed out
    pub fn tick(&mut self) -> Option<TimePeriod> {
        if self.current < self.total {
            let period = self.next;
            self.next = period.shift_by(1);
            self.current += 1;
            Some(period)
        } else {
            None
        }
    }

    /// Runs a function for each remaining period.
    pub fn run(&mut self, mut f: impl FnMut(TimePeriod)) {
        while let Some(period) = self.tick() {
            f(period);
        }
    }

    /// Returns the number of periods already handed out.
    pub fn elapsed(&self) -> usize {
        self.current
    }

    /// Returns true once every period has been handed out.
    pub fn is_finished(&self) -> bool {
        self.current >= self.total
    }
}
