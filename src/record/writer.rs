//! Writer thread: drains the save queue to the sink in open/close cycles.
//!
//! The sink file is only held open for the duration of one drain, so the
//! data on disk survives a crash between cycles. Backlog growth is reported
//! once per threshold crossing; a save error drops the offending measurement
//! and never takes the hub down. On stop, one final drain preserves all
//! buffered data.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::utils::Latch;

use super::recording::Recording;

/// Default ascending backlog thresholds; each one warns once on the way up
/// and reports recovery once on the way down. The hub can override them.
pub const QUEUE_WARN_THRESHOLDS: [usize; 3] = [100, 1_000, 10_000];

/// Progress granularity of the final shutdown drain.
const DRAIN_PROGRESS_EVERY: usize = 100;

pub fn spawn_writer(
    recording: Arc<Recording>,
    stop: Arc<Latch>,
    dt_save: Duration,
    thresholds: Vec<usize>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("writer-{}", recording.name()))
        .spawn(move || run_writer(&recording, &stop, dt_save, &thresholds))
}

/// Writer loop body. Public for in-process tests that drive it directly.
pub fn run_writer(recording: &Recording, stop: &Latch, dt_save: Duration, thresholds: &[usize]) {
    let name = recording.name().to_string();
    let mut warned = vec![false; thresholds.len()];

    while !stop.is_set() {
        check_backlog(recording, thresholds, &mut warned);
        if let Err(e) = write_cycle(recording) {
            error!("[{name}] sink cycle failed: {e}");
        }
        check_backlog(recording, thresholds, &mut warned);
        stop.wait_timeout(dt_save);
    }

    // Final drain: everything still buffered goes to disk before exit.
    check_backlog(recording, thresholds, &mut warned);
    match final_drain(recording) {
        Ok(0) => {}
        Ok(n) => info!("[{name}] drained {n} buffered measurements on shutdown"),
        Err(e) => error!("[{name}] final drain failed: {e}"),
    }
    debug!("[{name}] writer stopped");
}

/// One open → drain → close cycle.
fn write_cycle(recording: &Recording) -> Result<(), csv::Error> {
    if recording.save_queue().is_empty() {
        return Ok(());
    }
    recording.sink().init()?;
    let mut writer = recording.sink().open_append()?;
    while let Some(measurement) = recording.save_queue().try_get() {
        if let Err(e) = recording.save(&measurement, &mut writer) {
            // Drop the offending measurement, keep the rest flowing.
            error!(
                "data saving error for {}: {e}",
                measurement.name()
            );
        }
    }
    writer.flush()?;
    Ok(())
}

/// Shutdown drain with a progress indicator for large backlogs.
fn final_drain(recording: &Recording) -> Result<usize, csv::Error> {
    let pending = recording.save_queue().drain_all();
    if pending.is_empty() {
        return Ok(0);
    }
    let name = recording.name();
    let total = pending.len();
    if total >= DRAIN_PROGRESS_EVERY {
        info!("[{name}] saving {total} buffered measurements before exit...");
    }

    recording.sink().init()?;
    let mut writer = recording.sink().open_append()?;
    for (i, measurement) in pending.iter().enumerate() {
        if let Err(e) = recording.save(measurement, &mut writer) {
            error!("data saving error for {}: {e}", measurement.name());
        }
        let done = i + 1;
        if total >= DRAIN_PROGRESS_EVERY && (done % DRAIN_PROGRESS_EVERY == 0 || done == total) {
            info!("[{name}] ... {done}/{total}");
        }
    }
    writer.flush()?;
    Ok(total)
}

/// One-shot threshold warnings: each threshold warns when first crossed
/// upward and reports recovery when next crossed back down.
fn check_backlog(recording: &Recording, thresholds: &[usize], warned: &mut [bool]) {
    let depth = recording.save_queue().len();
    for (i, &threshold) in thresholds.iter().enumerate() {
        if depth > threshold && !warned[i] {
            warned[i] = true;
            warn!(
                "[{}] saving queue is over {threshold} elements ({depth})",
                recording.name()
            );
        } else if depth <= threshold && warned[i] {
            warned[i] = false;
            info!(
                "[{}] saving queue back under {threshold} elements",
                recording.name()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::measurement::Measurement;
    use crate::record::sink::{ColumnFormat, CsvSink};

    fn test_recording(dir: &std::path::Path) -> Arc<Recording> {
        let sink = CsvSink::new(dir.join("P.tsv"), &["time (unix)", "dt (s)", "P (mbar)"])
            .with_formats(&[
                ColumnFormat::Fixed(3),
                ColumnFormat::Fixed(3),
                ColumnFormat::General,
            ]);
        Arc::new(Recording::numeric("P", Duration::from_millis(50), sink))
    }

    fn numeric(name: &str, time: f64, value: f64) -> Measurement {
        Measurement::Numeric {
            name: name.to_string(),
            time,
            dt: 0.1,
            values: vec![value],
        }
    }

    #[test]
    fn persists_in_enqueue_order() {
        let dir = tempfile::tempdir().unwrap();
        let rec = test_recording(dir.path());
        rec.init_file().unwrap();

        for i in 0..20 {
            rec.save_queue().put(numeric("P", i as f64, 1000.0 + i as f64));
        }

        let stop = Arc::new(Latch::new());
        let handle = spawn_writer(
            rec.clone(),
            stop.clone(),
            Duration::from_millis(20),
            QUEUE_WARN_THRESHOLDS.to_vec(),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(100));
        stop.set();
        handle.join().unwrap();

        let content = std::fs::read_to_string(rec.sink().path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 21); // header + 20
        for (i, line) in lines[1..].iter().enumerate() {
            let time: f64 = line.split('\t').next().unwrap().parse().unwrap();
            assert!((time - i as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn no_loss_on_shutdown_with_backlog() {
        let dir = tempfile::tempdir().unwrap();
        let rec = test_recording(dir.path());
        rec.init_file().unwrap();

        // Writer sleeps long: queue builds to 150 before it wakes.
        let stop = Arc::new(Latch::new());
        let handle = spawn_writer(
            rec.clone(),
            stop.clone(),
            Duration::from_secs(60),
            QUEUE_WARN_THRESHOLDS.to_vec(),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(50));
        for i in 0..150 {
            rec.save_queue().put(numeric("P", i as f64, 0.0));
        }
        stop.set();
        handle.join().unwrap();

        let content = std::fs::read_to_string(rec.sink().path()).unwrap();
        assert_eq!(content.lines().count(), 151); // header + all 150
    }

    #[test]
    fn backlog_warnings_are_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let rec = test_recording(dir.path());
        let thresholds = QUEUE_WARN_THRESHOLDS.to_vec();
        let mut warned = vec![false; thresholds.len()];

        for i in 0..150 {
            rec.save_queue().put(numeric("P", i as f64, 0.0));
        }
        check_backlog(&rec, &thresholds, &mut warned);
        assert_eq!(warned, [true, false, false]);
        // Repeated checks at the same depth do not re-arm.
        check_backlog(&rec, &thresholds, &mut warned);
        assert_eq!(warned, [true, false, false]);

        rec.save_queue().drain_all();
        check_backlog(&rec, &thresholds, &mut warned);
        assert_eq!(warned, [false, false, false]);
    }

    #[test]
    fn save_error_drops_measurement_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let rec = test_recording(dir.path());
        rec.init_file().unwrap();

        // An image measurement in a numeric recording cannot be saved; the
        // writer logs and moves on.
        rec.save_queue().put(Measurement::Image {
            name: "P".to_string(),
            time: 0.0,
            dt: 0.0,
            num: 0,
            frame: crate::sensors::ImageFrame {
                width: 1,
                height: 1,
                bytes: vec![0],
            },
        });
        rec.save_queue().put(numeric("P", 1.0, 42.0));

        let stop = Arc::new(Latch::new());
        stop.set();
        run_writer(&rec, &stop, Duration::from_millis(10), &QUEUE_WARN_THRESHOLDS);

        let content = std::fs::read_to_string(rec.sink().path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2); // header + the good measurement
        assert!(lines[1].starts_with("1.000"));
    }
}
