//! Timestamp subsystem.
//!
//! Two interchangeable sources sit behind the `tsc-clock` cargo feature:
//!
//! - **Wall clock** (default): the OS realtime clock, captured as
//!   nanoseconds since the Unix epoch. Conversion to broken-out time is
//!   arithmetic.
//! - **TSC clock**: a raw cycle-counter read on the hot path; the backend
//!   converts ticks to wall time through a [`TscCalibration`] anchored to
//!   the wall clock and periodically resynced.
//!
//! On architectures without a cycle counter the TSC source falls back to
//! the wall clock, which keeps the conversion an identity.

use std::time::{SystemTime, UNIX_EPOCH};

/// Raw record timestamp: wall nanoseconds or TSC ticks depending on the
/// selected source.
pub type Timestamp = i64;

pub(crate) const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Broken-out wall-clock time handed to sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallTime {
    /// Seconds since the Unix epoch.
    pub secs: i64,
    /// Nanoseconds within the second.
    pub nanos: u32,
}

impl WallTime {
    pub(crate) fn from_nanos(nanos: i64) -> Self {
        Self {
            secs: nanos.div_euclid(NANOS_PER_SEC),
            nanos: nanos.rem_euclid(NANOS_PER_SEC) as u32,
        }
    }
}

/// Current wall clock in nanoseconds since the Unix epoch.
#[inline]
pub(crate) fn wall_now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_nanos() as i64,
        Err(before_epoch) => -(before_epoch.duration().as_nanos() as i64),
    }
}

/// Raw cycle-counter read; wall clock where none exists.
#[cfg_attr(not(feature = "tsc-clock"), allow(dead_code))]
#[inline]
pub(crate) fn ticks_now() -> i64 {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: RDTSC has no preconditions.
        unsafe { core::arch::x86_64::_rdtsc() as i64 }
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        wall_now()
    }
}

/// Timestamp for the current instant, per the selected source.
#[inline]
pub fn now() -> Timestamp {
    #[cfg(feature = "tsc-clock")]
    {
        ticks_now()
    }
    #[cfg(not(feature = "tsc-clock"))]
    {
        wall_now()
    }
}

const CALIBRATION_TRIALS: usize = 13;
const CALIBRATION_SPIN_NANOS: i64 = 10_000_000;
const SYNC_ATTEMPTS: usize = 4;
const TIGHT_LAG_NANOS: i64 = 2_500;
const RELAXED_LAG_NANOS: i64 = 10_000;
const RESYNC_INTERVAL_NANOS: i64 = 700_000_000;

/// Tick→wall conversion state for the TSC source.
///
/// Calibrates the tick rate on construction (median of
/// [`CALIBRATION_TRIALS`] spin trials), then anchors a
/// (wall base, tick base) pair. `time_since_epoch` extrapolates from the
/// anchor and re-anchors whenever the elapsed ticks exceed the resync
/// interval.
#[cfg_attr(not(feature = "tsc-clock"), allow(dead_code))]
pub(crate) struct TscCalibration {
    wall_base: i64,
    ticks_base: i64,
    resync_interval_ticks: i64,
    resync_interval_original: i64,
    nanos_per_tick: f64,
}

#[cfg_attr(not(feature = "tsc-clock"), allow(dead_code))]
impl TscCalibration {
    pub(crate) fn new() -> Self {
        let nanos_per_tick = Self::measure_nanos_per_tick();
        let interval = (RESYNC_INTERVAL_NANOS as f64 / nanos_per_tick) as i64;
        let mut calibration = Self {
            wall_base: 0,
            ticks_base: 0,
            resync_interval_ticks: interval,
            resync_interval_original: interval,
            nanos_per_tick,
        };
        if !calibration.sync() {
            eprintln!("blazelog: failed to sync TSC clock");
        }
        calibration
    }

    /// Wall nanoseconds since the Unix epoch for a tick reading.
    ///
    /// Total: a failed resync keeps the previous anchor, so the result may
    /// be stale but is always produced.
    pub(crate) fn time_since_epoch(&mut self, ticks: i64) -> i64 {
        let mut elapsed = ticks.wrapping_sub(self.ticks_base);
        if elapsed > self.resync_interval_ticks {
            if !self.sync() {
                eprintln!("blazelog: TSC clock resync failed; continuing with last calibration");
            }
            elapsed = ticks.wrapping_sub(self.ticks_base);
        }
        self.wall_base + (elapsed as f64 * self.nanos_per_tick) as i64
    }

    /// One anchoring cycle: up to [`SYNC_ATTEMPTS`] tries at the tight lag,
    /// then a single try at the relaxed lag. A failed cycle doubles the
    /// resync interval once.
    fn sync(&mut self) -> bool {
        if self.try_anchor(TIGHT_LAG_NANOS, SYNC_ATTEMPTS) || self.try_anchor(RELAXED_LAG_NANOS, 1) {
            return true;
        }
        self.resync_interval_ticks *= 2;
        false
    }

    /// Tries to capture a (wall, ticks) anchor whose two tick reads are at
    /// most `lag_nanos` apart.
    fn try_anchor(&mut self, lag_nanos: i64, attempts: usize) -> bool {
        let lag_ticks = (lag_nanos as f64 / self.nanos_per_tick) as i64;

        for _ in 0..attempts {
            let ticks_start = ticks_now();
            let wall = wall_now();
            let ticks_stop = ticks_now();

            if ticks_stop.wrapping_sub(ticks_start) <= lag_ticks {
                self.wall_base = wall;
                self.ticks_base = midpoint(ticks_start, ticks_stop);
                self.resync_interval_ticks = self.resync_interval_original;
                return true;
            }
        }

        false
    }

    /// Correlates tick and wall elapsed time over spin trials; the median
    /// rate wins.
    fn measure_nanos_per_tick() -> f64 {
        let mut rates = [0.0f64; CALIBRATION_TRIALS];

        for rate in &mut rates {
            let wall_start = wall_now();
            let ticks_start = ticks_now();

            let mut wall_elapsed;
            let mut ticks_stop;
            loop {
                wall_elapsed = wall_now() - wall_start;
                ticks_stop = ticks_now();
                if wall_elapsed >= CALIBRATION_SPIN_NANOS {
                    break;
                }
            }

            *rate = ticks_stop.wrapping_sub(ticks_start) as f64 / wall_elapsed as f64;
        }

        rates.sort_by(f64::total_cmp);
        let median = rates[CALIBRATION_TRIALS / 2];
        if median > 0.0 {
            1.0 / median
        } else {
            1.0
        }
    }
}

/// Overflow-free midpoint of two tick readings.
#[inline]
fn midpoint(x: i64, y: i64) -> i64 {
    (x & y) + ((x ^ y) >> 1)
}

/// Backend-owned conversion from record timestamps to wall time.
pub(crate) struct TimeResolver {
    #[cfg(feature = "tsc-clock")]
    calibration: TscCalibration,
}

impl TimeResolver {
    pub(crate) fn new() -> Self {
        Self {
            #[cfg(feature = "tsc-clock")]
            calibration: TscCalibration::new(),
        }
    }

    #[cfg_attr(not(feature = "tsc-clock"), allow(clippy::unused_self))]
    pub(crate) fn resolve(&mut self, timestamp: Timestamp) -> WallTime {
        #[cfg(feature = "tsc-clock")]
        {
            WallTime::from_nanos(self.calibration.time_since_epoch(timestamp))
        }
        #[cfg(not(feature = "tsc-clock"))]
        {
            WallTime::from_nanos(timestamp)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_time_splits_nanoseconds() {
        let time = WallTime::from_nanos(1_700_000_000_123_456_789);
        assert_eq!(time.secs, 1_700_000_000);
        assert_eq!(time.nanos, 123_456_789);

        let zero = WallTime::from_nanos(0);
        assert_eq!((zero.secs, zero.nanos), (0, 0));

        // Pre-epoch values still produce nanos in [0, 1e9).
        let before = WallTime::from_nanos(-1);
        assert_eq!(before.secs, -1);
        assert_eq!(before.nanos, 999_999_999);
    }

    #[test]
    fn wall_clock_is_plausible() {
        let now = wall_now();
        // Past 2020-01-01 in nanoseconds.
        assert!(now > 1_577_836_800 * NANOS_PER_SEC);
    }

    #[test]
    fn tsc_monotonic_between_resyncs() {
        let mut calibration = TscCalibration::new();

        let t1 = ticks_now();
        let t2 = t1 + 1_000;
        let t3 = t1 + 1_000_000;
        let w1 = calibration.time_since_epoch(t1);
        let w2 = calibration.time_since_epoch(t2);
        let w3 = calibration.time_since_epoch(t3);
        assert!(w2 >= w1);
        assert!(w3 >= w2);
    }

    #[test]
    fn tsc_tracks_wall_clock() {
        let mut calibration = TscCalibration::new();
        let converted = calibration.time_since_epoch(ticks_now());
        let wall = wall_now();
        // Within 100ms of the real clock right after calibration.
        assert!((converted - wall).abs() < 100_000_000, "off by {}ns", converted - wall);
    }
}
