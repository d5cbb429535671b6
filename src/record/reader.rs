//! Reader thread: periodic sensor acquisition feeding the save/plot queues.
//!
//! A failed read is an expected condition: the transition into and out of
//! failure is logged once, the loop never terminates on it. Formatting
//! failures are programmer errors and stop this reader only; the paired
//! writer drains whatever was queued and exits on the shared stop latch.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use crate::sensors::Sensor;
use crate::utils::{unix_now, Latch};

use super::recording::Recording;

/// Backoff after a failed read in continuous mode, where there is no timer
/// tick to pace retries.
const CONTINUOUS_FAIL_BACKOFF: Duration = Duration::from_millis(1);

/// Spawns the reader thread for one recording. Continuous recordings run at
/// elevated priority since they own their core's cadence.
pub fn spawn_reader(
    recording: Arc<Recording>,
    sensor: Box<dyn Sensor>,
    stop: Arc<Latch>,
    graph: Arc<Latch>,
    initial_properties: Vec<(String, String)>,
) -> std::io::Result<JoinHandle<()>> {
    let builder = thread::Builder::new().name(format!("reader-{}", recording.name()));
    if recording.continuous() {
        builder.spawn_with_priority(ThreadPriority::Max, move |_| {
            run_reader(&recording, sensor, &stop, &graph, &initial_properties)
        })
    } else {
        builder.spawn(move || run_reader(&recording, sensor, &stop, &graph, &initial_properties))
    }
}

/// Reader loop body. Public for in-process tests that drive it directly.
pub fn run_reader(
    recording: &Recording,
    mut sensor: Box<dyn Sensor>,
    stop: &Latch,
    graph: &Latch,
    initial_properties: &[(String, String)],
) {
    let name = recording.name().to_string();

    if let Err(e) = sensor.open() {
        error!("[{name}] could not open sensor: {e}");
        return;
    }

    // Some properties depend on the opened sensor handle, so initial
    // settings apply here rather than at hub construction.
    for (property, value) in initial_properties {
        match recording.set_property(property, value) {
            Ok(true) => info!("[{name}] initial property {property}={value}"),
            Ok(false) => debug!("[{name}] ignoring unknown initial property '{property}'"),
            Err(e) => warn!("[{name}] bad initial property: {e}"),
        }
    }

    recording.timer().reset();
    let mut failed_reading = false;
    let mut last_success: Option<f64> = None;

    while !stop.is_set() {
        if recording.is_active() {
            match sensor.read() {
                Err(e) => {
                    if !failed_reading {
                        warn!("[{name}] sensor reading failed: {e}");
                        failed_reading = true;
                    }
                    if recording.continuous() {
                        thread::sleep(CONTINUOUS_FAIL_BACKOFF);
                    }
                }
                Ok(payload) => {
                    if failed_reading {
                        info!("[{name}] sensor reading resumed");
                        failed_reading = false;
                    }

                    let now = unix_now();
                    let dt = last_success.map(|t| now - t).unwrap_or(0.0);
                    last_success = Some(now);

                    match recording.format_measurement(payload, now, dt) {
                        Err(e) => {
                            error!("[{name}] formatting error, reader stopping: {e}");
                            break;
                        }
                        Ok(None) => {}
                        Ok(Some(measurement)) => {
                            let save = recording.is_saving();
                            let plot = graph.is_set();
                            match (save, plot) {
                                (true, true) => {
                                    recording.save_queue().put(measurement.clone());
                                    recording.plot_queue().put(measurement);
                                }
                                (true, false) => recording.save_queue().put(measurement),
                                (false, true) => recording.plot_queue().put(measurement),
                                (false, false) => {}
                            }
                        }
                    }
                }
            }
        }

        // A failed read waits out the usual interval instead of hammering
        // the sensor.
        if !recording.continuous() && !recording.timer().checkpt() {
            // Timer stopped out from under us; pace on the stop latch so a
            // cleared graph session cannot spin this loop.
            stop.wait_timeout(recording.timer().interval());
        }
    }

    sensor.close();
    debug!("[{name}] reader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sink::CsvSink;
    use crate::sensors::{FlakySensor, Payload, SensorError, SimulatedSensor};

    fn test_recording(dir: &std::path::Path, dt: Duration) -> Arc<Recording> {
        let sink = CsvSink::new(dir.join("T.tsv"), &["time (unix)", "dt (s)", "T (C)"]);
        Arc::new(Recording::numeric("T", dt, sink))
    }

    fn run_for(
        recording: &Arc<Recording>,
        sensor: Box<dyn Sensor>,
        graph_on: bool,
        duration: Duration,
    ) {
        let stop = Arc::new(Latch::new());
        let graph = Arc::new(Latch::new());
        if graph_on {
            graph.set();
        }
        let handle = {
            let recording = recording.clone();
            let stop = stop.clone();
            let graph = graph.clone();
            thread::spawn(move || run_reader(&recording, sensor, &stop, &graph, &[]))
        };
        thread::sleep(duration);
        stop.set();
        handle.join().unwrap();
    }

    #[test]
    fn emits_to_save_queue_only_when_saving() {
        let dir = tempfile::tempdir().unwrap();
        let rec = test_recording(dir.path(), Duration::from_millis(10));
        let sensor = Box::new(SimulatedSensor::seeded("T", vec![25.0], 0.1, 7));
        run_for(&rec, sensor, false, Duration::from_millis(120));

        assert!(rec.save_queue().len() >= 5);
        // graph unset → nothing on the plot queue
        assert!(rec.plot_queue().is_empty());
    }

    #[test]
    fn plot_queue_follows_graph_latch() {
        let dir = tempfile::tempdir().unwrap();
        let rec = test_recording(dir.path(), Duration::from_millis(10));
        rec.set_saving(false);
        let sensor = Box::new(SimulatedSensor::seeded("T", vec![25.0], 0.1, 7));
        run_for(&rec, sensor, true, Duration::from_millis(120));

        assert!(rec.save_queue().is_empty());
        assert!(rec.plot_queue().len() >= 5);
    }

    #[test]
    fn inactive_recording_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let rec = test_recording(dir.path(), Duration::from_millis(10));
        rec.set_active(false);
        let sensor = Box::new(SimulatedSensor::seeded("T", vec![25.0], 0.1, 7));
        run_for(&rec, sensor, true, Duration::from_millis(80));

        assert!(rec.save_queue().is_empty());
        assert!(rec.plot_queue().is_empty());
    }

    #[test]
    fn survives_read_failures_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let rec = test_recording(dir.path(), Duration::from_millis(10));
        let inner = SimulatedSensor::seeded("T", vec![25.0], 0.1, 7);
        let sensor = Box::new(FlakySensor::new(inner, vec![(2, 5)]));
        run_for(&rec, sensor, false, Duration::from_millis(200));

        // Failures did not kill the loop: reads resumed and queued.
        assert!(rec.save_queue().len() >= 6);
        // dt reflects time since last *successful* read, so the first
        // post-failure measurement has a larger dt.
        let all = rec.save_queue().drain_all();
        let dts: Vec<f64> = all.iter().map(|m| m.dt()).collect();
        let max_dt = dts.iter().cloned().fold(0.0, f64::max);
        assert!(max_dt >= 0.03, "expected a gap from the failure window, got {dts:?}");
    }

    #[test]
    fn formatting_error_terminates_reader() {
        struct WrongPayload;
        impl Sensor for WrongPayload {
            fn name(&self) -> &str {
                "bad"
            }
            fn read(&mut self) -> Result<Payload, SensorError> {
                Ok(Payload::Frame(crate::sensors::ImageFrame {
                    width: 1,
                    height: 1,
                    bytes: vec![0],
                }))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let rec = test_recording(dir.path(), Duration::from_millis(5));
        let stop = Arc::new(Latch::new());
        let graph = Arc::new(Latch::new());
        let handle = {
            let rec = rec.clone();
            let stop = stop.clone();
            let graph = graph.clone();
            thread::spawn(move || run_reader(&rec, Box::new(WrongPayload), &stop, &graph, &[]))
        };
        // Reader exits on its own, without the stop latch.
        handle.join().unwrap();
        assert!(!stop.is_set());
        assert!(rec.save_queue().is_empty());
    }

    #[test]
    fn initial_properties_applied_after_open() {
        let dir = tempfile::tempdir().unwrap();
        let rec = test_recording(dir.path(), Duration::from_millis(10));
        let sensor = Box::new(SimulatedSensor::seeded("T", vec![25.0], 0.1, 7));
        let stop = Arc::new(Latch::new());
        stop.set(); // loop body skipped; only the property phase runs
        let graph = Arc::new(Latch::new());
        run_reader(
            &rec,
            sensor,
            &stop,
            &graph,
            &[
                ("dt".to_string(), "2.5".to_string()),
                ("saving".to_string(), "false".to_string()),
                ("exposure".to_string(), "10".to_string()), // unknown, ignored
            ],
        );
        assert_eq!(rec.timer().interval(), Duration::from_secs_f64(2.5));
        assert!(!rec.is_saving());
    }
}
