//! Fixed-size ring-buffer scope timer, ported from the teacher's
//! `profiler.rs`. Used by [`crate::render::frame_driver::FrameDriver`] to
//! track the wall-clock cost of each named phase of the per-frame loop
//! (spec §4.8) over a rolling window, without allocating per frame.

use std::iter::zip;

/// `COUNT` named phases, each averaged over the last `SAMPLES` frames.
pub struct Profiler<const COUNT: usize, const SAMPLES: usize> {
    sample_i: usize,
    names: [&'static str; COUNT],
    profiles: [Profile<SAMPLES>; COUNT],
}

#[derive(Clone, Copy)]
struct Profile<const SAMPLES: usize> {
    sum: i64,
    micros: [i64; SAMPLES],
}

impl<const COUNT: usize, const SAMPLES: usize> Profiler<COUNT, SAMPLES> {
    pub const fn new(names: [&'static str; COUNT]) -> Self {
        Self {
            sample_i: 0,
            names,
            profiles: [Profile {
                sum: 0,
                micros: [0; SAMPLES],
            }; COUNT],
        }
    }

    /// Records a sample of `micros` microseconds for phase `phase_i` at the
    /// current slot in the ring buffer. Call `end_frame` once after the last
    /// phase of a frame to advance the slot.
    pub fn add_sample(&mut self, micros: i64, phase_i: usize) {
        self.profiles[phase_i].add_sample(micros, self.sample_i);
    }

    /// Times `f` and records its wall-clock duration against `phase_i`,
    /// returning `f`'s result.
    pub fn scope<T>(&mut self, phase_i: usize, f: impl FnOnce() -> T) -> T {
        let start = std::time::Instant::now();
        let result = f();
        self.add_sample(start.elapsed().as_micros() as i64, phase_i);
        result
    }

    pub fn end_frame(&mut self) {
        self.sample_i = (self.sample_i + 1) % SAMPLES;
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let mut total: i64 = 0;

        for (name, profile) in zip(&self.names, &self.profiles) {
            let ave = profile.average();
            out.push_str(&format!("{:<16}{:>4} μs\n", name, ave));
            total += ave;
        }

        if total == 0 {
            out + "Total              0 μs (NA fps)"
        } else {
            out + &format!("Total           {:>4} μs ({} fps)", total, 1_000_000 / total)
        }
    }
}

impl<const SAMPLES: usize> Profile<SAMPLES> {
    fn average(&self) -> i64 {
        self.sum / (SAMPLES as i64)
    }

    fn add_sample(&mut self, micros: i64, next_i: usize) {
        let last = self.micros[next_i];
        self.micros[next_i] = micros;
        self.sum += micros - last;
    }
}

#[cfg(test)]
mod tests {
    use super::Profiler;

    #[test]
    fn ring_buffer_averages_over_window() {
        let mut p: Profiler<1, 4> = Profiler::new(["phase"]);
        for micros in [100, 200, 300, 400] {
            p.add_sample(micros, 0);
            p.end_frame();
        }
        assert_eq!(p.profiles[0].average(), 250);
    }

    #[test]
    fn scope_records_a_nonzero_duration() {
        let mut p: Profiler<1, 8> = Profiler::new(["phase"]);
        p.scope(0, || std::thread::sleep(std::time::Duration::from_micros(50)));
        assert!(p.profiles[0].sum > 0);
    }
}
