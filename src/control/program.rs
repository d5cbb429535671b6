//! Programs: repeatable sequences of ramp/dwell legs driving one control.
//!
//! `Stairs` and `Teeth` are builders producing a plain `Program`; all change
//! of value in a staircase happens in zero-duration transitions, teeth ramps
//! get their durations from a slope.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::info;

use super::actuator::Actuator;
use super::control::Control;

/// One program leg: ramp from `start` to `end` over `duration`. Equal
/// endpoints dwell.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub start: f64,
    pub end: f64,
    pub duration: Duration,
}

impl Leg {
    pub fn new(start: f64, end: f64, duration: Duration) -> Self {
        Self {
            start,
            end,
            duration,
        }
    }

    pub fn is_dwell(&self) -> bool {
        self.start == self.end
    }
}

pub struct Program<A: Actuator> {
    control: Arc<Control<A>>,
    legs: Vec<Leg>,
    repeat: usize,
    running: Arc<AtomicBool>,
    /// Sticky interrupt: `ramp()` re-arms the control's stop latch at every
    /// leg, so a stop request must survive the leg boundary here.
    interrupt: Arc<AtomicBool>,
}

impl<A: Actuator + 'static> Program<A> {
    pub fn new(control: Arc<Control<A>>, legs: Vec<Leg>, repeat: usize) -> Self {
        Self {
            control,
            legs,
            repeat,
            running: Arc::new(AtomicBool::new(false)),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Plain cycle through `setpoints` with index wrap (`v_n := v_0`), one
    /// duration per leg.
    pub fn cycle(
        control: Arc<Control<A>>,
        setpoints: &[f64],
        durations: &[Duration],
        repeat: usize,
    ) -> Self {
        let n = setpoints.len();
        let mut legs = Vec::with_capacity(n);
        for i in 0..n {
            let duration = durations.get(i).copied().unwrap_or_default();
            legs.push(Leg::new(setpoints[i], setpoints[(i + 1) % n], duration));
        }
        Self::new(control, legs, repeat)
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn repeat(&self) -> usize {
        self.repeat
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// `repeat × Σ leg durations`, the nominal wall-clock length.
    pub fn total_duration(&self) -> Duration {
        let once: Duration = self.legs.iter().map(|leg| leg.duration).sum();
        once * self.repeat as u32
    }

    /// Interrupts the program after the current leg's cancellation.
    pub fn stop(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
        self.control.stop();
    }

    /// Drives all legs sequentially on a worker thread; each leg is one
    /// `ramp` call. Sets the control's stop flag on completion.
    pub fn run(self: &Arc<Self>) -> JoinHandle<()> {
        let program = self.clone();
        program.interrupt.store(false, Ordering::Relaxed);
        program.running.store(true, Ordering::Relaxed);
        std::thread::spawn(move || {
            info!(
                "program started: {} legs x {} repeats ({:.1} s nominal)",
                program.legs.len(),
                program.repeat,
                program.total_duration().as_secs_f64()
            );
            'cycles: for cycle in 0..program.repeat {
                for leg in &program.legs {
                    if program.interrupt.load(Ordering::Relaxed)
                        || program.control.stop_requested()
                    {
                        info!("program interrupted during cycle {}", cycle + 1);
                        break 'cycles;
                    }
                    let handle = program
                        .control
                        .ramp(leg.duration, (leg.start, leg.end));
                    let _ = handle.join();
                }
            }
            program.control.stop();
            program.running.store(false, Ordering::Relaxed);
            info!("program finished");
        })
    }
}

/// Staircase builder: every setpoint becomes a dwell of the requested
/// duration, linked by zero-duration transitions, so the whole pattern is
/// `[(v_i, v_i, d_i), (v_i, v_{i+1}, 0)]` with index wrap.
pub struct Stairs {
    setpoints: Vec<f64>,
    durations: Vec<Duration>,
    repeat: usize,
}

impl Stairs {
    /// Uniform dwell duration for every step.
    pub fn new(duration: Duration, setpoints: &[f64], repeat: usize) -> Self {
        Self {
            durations: vec![duration; setpoints.len()],
            setpoints: setpoints.to_vec(),
            repeat,
        }
    }

    /// Per-step dwell durations; the shorter of the two lists decides.
    pub fn per_step(durations: &[Duration], setpoints: &[f64], repeat: usize) -> Self {
        let n = setpoints.len().min(durations.len());
        Self {
            durations: durations[..n].to_vec(),
            setpoints: setpoints[..n].to_vec(),
            repeat,
        }
    }

    pub fn build<A: Actuator + 'static>(self, control: Arc<Control<A>>) -> Program<A> {
        let n = self.setpoints.len();
        let mut legs = Vec::with_capacity(2 * n);
        for i in 0..n {
            let v = self.setpoints[i];
            let next = self.setpoints[(i + 1) % n];
            legs.push(Leg::new(v, v, self.durations[i]));
            legs.push(Leg::new(v, next, Duration::ZERO));
        }
        Program::new(control, legs, self.repeat)
    }
}

/// Slope unit of a `Teeth` program, converted to per-second internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlopeUnit {
    PerSecond,
    PerMinute,
    PerHour,
}

impl SlopeUnit {
    /// Seconds in one unit of the slope's time base.
    pub fn seconds(&self) -> f64 {
        match self {
            SlopeUnit::PerSecond => 1.0,
            SlopeUnit::PerMinute => 60.0,
            SlopeUnit::PerHour => 3600.0,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "/s" => Some(SlopeUnit::PerSecond),
            "/min" => Some(SlopeUnit::PerMinute),
            "/h" => Some(SlopeUnit::PerHour),
            _ => None,
        }
    }
}

/// Which phase the teeth pattern begins with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeethStart {
    Plateau,
    Ramp,
}

/// Teeth builder: plateaus of fixed duration separated by ramps whose
/// durations derive from `|Δv| / slope`. `start = Ramp` rotates the pattern
/// to begin mid-cycle with the first ramp.
pub struct Teeth {
    slope: f64,
    unit: SlopeUnit,
    plateau_duration: Duration,
    setpoints: Vec<f64>,
    start: TeethStart,
    repeat: usize,
}

impl Teeth {
    pub fn new(
        slope: f64,
        unit: SlopeUnit,
        plateau_duration: Duration,
        setpoints: &[f64],
        start: TeethStart,
        repeat: usize,
    ) -> Self {
        Self {
            slope,
            unit,
            plateau_duration,
            setpoints: setpoints.to_vec(),
            start,
            repeat,
        }
    }

    pub fn build<A: Actuator + 'static>(self, control: Arc<Control<A>>) -> Program<A> {
        let slope_per_second = self.slope / self.unit.seconds();
        let n = self.setpoints.len();
        let mut legs = Vec::with_capacity(2 * n);
        for i in 0..n {
            let v = self.setpoints[i];
            let next = self.setpoints[(i + 1) % n];
            legs.push(Leg::new(v, v, self.plateau_duration));
            let ramp_seconds = (next - v).abs() / slope_per_second;
            legs.push(Leg::new(v, next, Duration::from_secs_f64(ramp_seconds)));
        }
        if self.start == TeethStart::Ramp {
            legs.rotate_left(1);
        }
        Program::new(control, legs, self.repeat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::actuator::SoftActuator;
    use crate::control::duration::parse_hms;

    fn soft_control(tick_ms: u64) -> Arc<Control<SoftActuator>> {
        Arc::new(
            Control::new("rh", SoftActuator::new(0.0))
                .with_tick(Duration::from_millis(tick_ms)),
        )
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn stairs_expand_to_dwell_transition_pairs() {
        let control = soft_control(10);
        let program =
            Stairs::new(parse_hms("1::").unwrap(), &[90.0, 70.0, 50.0, 30.0], 2).build(control);

        let expected = [
            (90.0, 90.0, HOUR),
            (90.0, 70.0, Duration::ZERO),
            (70.0, 70.0, HOUR),
            (70.0, 50.0, Duration::ZERO),
            (50.0, 50.0, HOUR),
            (50.0, 30.0, Duration::ZERO),
            (30.0, 30.0, HOUR),
            (30.0, 90.0, Duration::ZERO),
        ];
        assert_eq!(program.legs().len(), expected.len());
        for (leg, (start, end, duration)) in program.legs().iter().zip(expected) {
            assert_eq!((leg.start, leg.end, leg.duration), (start, end, duration));
        }
        // Repeated twice: 8 hours nominal.
        assert_eq!(program.total_duration(), 8 * HOUR);
    }

    #[test]
    fn teeth_slope_durations_and_ramp_start_rotation() {
        let control = soft_control(10);
        let program = Teeth::new(
            25.0,
            SlopeUnit::PerMinute,
            parse_hms("1:20:").unwrap(),
            &[3000.0, 2000.0, 3000.0, 1000.0],
            TeethStart::Ramp,
            1,
        )
        .build(control);

        // After rotation the pattern starts with the first ramp; ramps of
        // 40, 40, 80, 80 minutes interleave with 80-minute plateaus. Slope
        // arithmetic goes through floats, so durations get a tolerance.
        let expected = [
            (3000.0, 2000.0, 40.0),
            (2000.0, 2000.0, 80.0),
            (2000.0, 3000.0, 40.0),
            (3000.0, 3000.0, 80.0),
            (3000.0, 1000.0, 80.0),
            (1000.0, 1000.0, 80.0),
            (1000.0, 3000.0, 80.0),
            // Rotation moved the original leading plateau to the tail.
            (3000.0, 3000.0, 80.0),
        ];
        let legs = program.legs();
        assert_eq!(legs.len(), expected.len());
        for (leg, (start, end, minutes)) in legs.iter().zip(expected) {
            assert_eq!(leg.start, start);
            assert_eq!(leg.end, end);
            let secs = leg.duration.as_secs_f64();
            assert!(
                (secs - minutes * 60.0).abs() < 1e-3,
                "leg duration {secs} s != {minutes} min"
            );
        }
    }

    #[test]
    fn stairs_per_step_durations() {
        let control = soft_control(10);
        let program = Stairs::per_step(
            &[Duration::from_secs(10), Duration::from_secs(20)],
            &[5.0, 8.0],
            1,
        )
        .build(control);

        assert_eq!(
            program.legs(),
            &[
                Leg::new(5.0, 5.0, Duration::from_secs(10)),
                Leg::new(5.0, 8.0, Duration::ZERO),
                Leg::new(8.0, 8.0, Duration::from_secs(20)),
                Leg::new(8.0, 5.0, Duration::ZERO),
            ]
        );
    }

    #[test]
    fn slope_unit_table() {
        assert_eq!(SlopeUnit::parse("/s"), Some(SlopeUnit::PerSecond));
        assert_eq!(SlopeUnit::parse("/min"), Some(SlopeUnit::PerMinute));
        assert_eq!(SlopeUnit::parse("/h"), Some(SlopeUnit::PerHour));
        assert_eq!(SlopeUnit::parse("/d"), None);
        assert_eq!(SlopeUnit::PerHour.seconds(), 3600.0);
    }

    #[test]
    fn cycle_wraps_last_setpoint_to_first() {
        let control = soft_control(10);
        let d = Duration::from_secs(5);
        let program = Program::cycle(control, &[1.0, 2.0, 3.0], &[d, d, d], 3);
        assert_eq!(
            program.legs(),
            &[
                Leg::new(1.0, 2.0, d),
                Leg::new(2.0, 3.0, d),
                Leg::new(3.0, 1.0, d),
            ]
        );
        assert_eq!(program.total_duration(), Duration::from_secs(45));
    }

    #[test]
    fn program_runs_to_completion_within_clock_slack() {
        let control = soft_control(5);
        let d = Duration::from_millis(60);
        let program = Arc::new(Program::cycle(control.clone(), &[0.0, 10.0], &[d, d], 2));

        let start = std::time::Instant::now();
        let handle = program.run();
        handle.join().unwrap();
        let elapsed = start.elapsed();

        let nominal = program.total_duration();
        assert!(elapsed >= nominal, "finished early: {elapsed:?} < {nominal:?}");
        // One tick of slack per leg plus scheduling noise.
        assert!(
            elapsed < nominal + Duration::from_millis(200),
            "took too long: {elapsed:?}"
        );
        // Completion sets the control's stop flag.
        assert!(control.stop_requested());
        assert!(!program.is_running());
    }

    #[test]
    fn program_stop_interrupts_after_current_leg() {
        let control = soft_control(5);
        let program = Arc::new(Program::cycle(
            control.clone(),
            &[0.0, 100.0],
            &[Duration::from_secs(30), Duration::from_secs(30)],
            1,
        ));
        let handle = program.run();
        std::thread::sleep(Duration::from_millis(50));
        program.stop();
        let start = std::time::Instant::now();
        handle.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!program.is_running());
    }
}
