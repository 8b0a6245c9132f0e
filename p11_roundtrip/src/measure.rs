/* measure.rs : timing, process CPU time and resident memory for the RSA report
   Diagnostic only; nothing here influences the cryptographic round trip.
 */

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::Result;

pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let res = f();
    (res, start.elapsed())
}

#[derive(Debug, Clone, Copy)]
pub struct Throughput {
    pub operations: u32,
    pub elapsed: Duration,
}

impl Throughput {
    pub fn per_second(&self) -> Option<f64> {
        if self.elapsed.is_zero() {
            None
        } else {
            Some(f64::from(self.operations) / self.elapsed.as_secs_f64())
        }
    }
}

/// Runs `op` `operations` times; the first failure aborts the whole measurement.
pub fn throughput<F>(operations: u32, mut op: F) -> Result<Throughput>
where
    F: FnMut() -> Result<()>,
{
    let start = Instant::now();
    for _ in 0..operations {
        op()?;
    }
    let elapsed = start.elapsed();
    debug!(operations, elapsed_ms = elapsed.as_millis() as u64, "throughput measured");
    Ok(Throughput { operations, elapsed })
}

/// One point-in-time reading of the process counters.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSample {
    pub wall: Instant,
    /// user + system CPU time consumed by this process so far
    pub cpu: Option<Duration>,
    /// resident set size in bytes
    pub memory: Option<u64>,
}

impl ResourceSample {
    pub fn take() -> Self {
        ResourceSample { wall: Instant::now(), cpu: process_cpu_time(), memory: resident_memory() }
    }

    pub fn wall_since(&self, earlier: &ResourceSample) -> Duration {
        self.wall.saturating_duration_since(earlier.wall)
    }

    /// CPU time consumed between the samples as a percentage of the wall time between them.
    pub fn cpu_percent_since(&self, earlier: &ResourceSample) -> Option<f64> {
        let wall = self.wall_since(earlier);
        if wall.is_zero() {
            return None;
        }
        let cpu = self.cpu?.checked_sub(earlier.cpu?)?;
        Some(cpu.as_secs_f64() / wall.as_secs_f64() * 100.0)
    }

    pub fn memory_change_since(&self, earlier: &ResourceSample) -> Option<i64> {
        let now = i64::try_from(self.memory?).ok()?;
        let then = i64::try_from(earlier.memory?).ok()?;
        Some(now - then)
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn rusage_self() -> Option<libc::rusage> {
            let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
            let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
            if rc == 0 { Some(usage) } else { None }
        }

        fn timeval_to_duration(tv: libc::timeval) -> Duration {
            let secs = u64::try_from(tv.tv_sec).unwrap_or(0);
            let micros = u64::try_from(tv.tv_usec).unwrap_or(0);
            Duration::from_secs(secs) + Duration::from_micros(micros)
        }

        fn process_cpu_time() -> Option<Duration> {
            let usage = rusage_self()?;
            Some(timeval_to_duration(usage.ru_utime) + timeval_to_duration(usage.ru_stime))
        }
    }
    else {
        fn process_cpu_time() -> Option<Duration> { None }
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        /* second field of /proc/self/statm is the resident page count */
        fn resident_memory() -> Option<u64> {
            let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
            let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
            let page_size = u64::try_from(unsafe { libc::sysconf(libc::_SC_PAGESIZE) }).ok()?;
            Some(pages * page_size)
        }
    }
    else if #[cfg(target_os = "macos")] {
        // peak, not current; ru_maxrss is in bytes on macOS
        fn resident_memory() -> Option<u64> {
            u64::try_from(rusage_self()?.ru_maxrss).ok()
        }
    }
    else if #[cfg(unix)] {
        // peak, not current; ru_maxrss is in kilobytes
        fn resident_memory() -> Option<u64> {
            u64::try_from(rusage_self()?.ru_maxrss).ok().map(|kb| kb * 1024)
        }
    }
    else {
        fn resident_memory() -> Option<u64> { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HsmError;

    #[test]
    fn test_per_second() {
        let t = Throughput { operations: 100, elapsed: Duration::from_millis(500) };
        assert_eq!(t.per_second(), Some(200.0));
        let t = Throughput { operations: 100, elapsed: Duration::ZERO };
        assert_eq!(t.per_second(), None);
    }

    #[test]
    fn test_throughput_runs_every_operation() {
        let mut count = 0;
        let t = throughput(7, || {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 7);
        assert_eq!(t.operations, 7);
    }

    #[test]
    fn test_throughput_stops_at_first_failure() {
        let mut count = 0;
        let res = throughput(10, || {
            count += 1;
            if count == 3 { Err(HsmError::RoundTripMismatch) } else { Ok(()) }
        });
        assert!(matches!(res, Err(HsmError::RoundTripMismatch)));
        assert_eq!(count, 3);
    }

    #[test]
    fn test_timed_returns_result() {
        let (value, elapsed) = timed(|| 6 * 7);
        assert_eq!(value, 42);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_cpu_percent_is_cpu_over_wall() {
        let start = Instant::now();
        let a = ResourceSample { wall: start, cpu: Some(Duration::from_millis(200)), memory: Some(10) };
        let b = ResourceSample { wall: start + Duration::from_secs(2), cpu: Some(Duration::from_millis(1200)), memory: Some(30) };
        let percent = b.cpu_percent_since(&a).unwrap();
        assert!((percent - 50.0).abs() < 1e-9);
        assert_eq!(b.memory_change_since(&a), Some(20));
        assert_eq!(a.memory_change_since(&b), Some(-20));
        assert_eq!(a.cpu_percent_since(&a), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_take_reads_process_counters() {
        let sample = ResourceSample::take();
        assert!(sample.cpu.is_some());
        assert!(sample.memory.unwrap() > 0);
    }
}
