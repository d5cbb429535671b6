//! # labrec demo bench
//!
//! Wires simulated sensors into a record hub and runs an interactive
//! session: the CLI accepts `g` to pop the live view (rendered to an SVG
//! file next to the data), `dt=...` / `dt_P=...` to retune cadences on the
//! fly and `q` to stop.
//!
//! ## Modes
//! - **Numeric:** pressure + two-channel temperature recordings, the
//!   temperature sensor drops out periodically to exercise failure logging.
//! - **Numeric + program:** same, plus a relative-humidity control driven by
//!   a repeating teeth program on a simulated actuator.
//! - **Image:** a synthetic camera recording numbered frames with a
//!   timestamp sink.

use std::io::{stdin, stdout, Write};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use labrec::control::{Control, SlopeUnit, SoftActuator, Teeth, TeethStart};
use labrec::record::{ColumnFormat, CsvSink, ImageStore, RecordHub, Recording};
use labrec::sensors::{FlakySensor, SimulatedCamera, SimulatedSensor};
use labrec::utils::Latch;
use labrec::view::{InfoFeed, RawFrameBackend, SvgScopeBackend, Viewer, Window};

const DEFAULT_PATH: &str = "data";

fn main() {
    env_logger::init();
    info!("=== labrec demo bench ===");

    loop {
        match prompt_menu().as_str() {
            "1" | "" => run_numeric_bench(false),
            "2" => run_numeric_bench(true),
            "3" => run_image_bench(),
            "4" => {
                println!("Goodbye!");
                return;
            }
            other => println!("Unrecognized option '{}', please try again.", other),
        }
    }
}

fn prompt_menu() -> String {
    println!("\n┌──────────────────────────────────────────┐");
    println!("│        SELECT DEMO MODE                  │");
    println!("├──────────────────────────────────────────┤");
    println!("│  1) Numeric recordings                   │");
    println!("│  2) Numeric + teeth program              │");
    println!("│  3) Image recording                      │");
    println!("│  4) Exit                                 │");
    println!("└──────────────────────────────────────────┘");
    println!("During a session: g = live view, dt=<s>, q = quit");
    print!("Select [1/2/3/4] (default: 1): ");
    let _ = stdout().flush();

    let mut input = String::new();
    let _ = stdin().read_line(&mut input);
    input.trim().to_string()
}

fn prompt_path() -> String {
    print!("Data folder [default: {}]: ", DEFAULT_PATH);
    let _ = stdout().flush();
    let mut input = String::new();
    let _ = stdin().read_line(&mut input);
    let path = input.trim();
    if path.is_empty() {
        DEFAULT_PATH.to_string()
    } else {
        path.to_string()
    }
}

fn run_numeric_bench(with_program: bool) {
    let path = prompt_path();
    let hub = Arc::new(RecordHub::new(&path));

    // Pressure at 10 Hz.
    let p_sink = CsvSink::new(
        format!("{path}/Pressure.tsv"),
        &["time (unix)", "dt (s)", "P (mbar)"],
    )
    .with_formats(&[
        ColumnFormat::Fixed(3),
        ColumnFormat::Fixed(3),
        ColumnFormat::Fixed(2),
    ]);
    let p_rec = Recording::numeric("P", Duration::from_millis(100), p_sink);
    let p_sensor = Box::new(SimulatedSensor::new("P", vec![2727.0], 2.0));
    let p = match hub.add_recording(p_rec, p_sensor) {
        Ok(recording) => recording,
        Err(e) => {
            error!("could not register recording: {e}");
            return;
        }
    };

    // Two-channel temperature at 2 Hz, with periodic dropouts.
    let t_sink = CsvSink::new(
        format!("{path}/Temperature.tsv"),
        &["time (unix)", "dt (s)", "T1 (C)", "T2 (C)"],
    )
    .with_formats(&[
        ColumnFormat::Fixed(3),
        ColumnFormat::Fixed(3),
        ColumnFormat::Fixed(4),
        ColumnFormat::Fixed(4),
    ]);
    let t_rec = Recording::numeric("T", Duration::from_millis(500), t_sink);
    let t_sensor = Box::new(FlakySensor::new(
        SimulatedSensor::new("T", vec![26.9, 25.5], 0.2),
        vec![(40, 45), (120, 130)],
    ));
    let t = match hub.add_recording(t_rec, t_sensor) {
        Ok(recording) => recording,
        Err(e) => {
            error!("could not register recording: {e}");
            return;
        }
    };

    // Live view: one scope window per recording, rendered into SVG files.
    {
        let stop = hub.stop_latch();
        let p_queue = p.plot_queue().clone();
        let t_queue = t.plot_queue().clone();
        let svg_path = format!("{path}/live_view.svg");
        hub.on_graph(move || {
            let close = Arc::new(Latch::new());
            let mut viewer = Viewer::new(Duration::from_millis(100), stop.clone(), close);
            viewer.add_window(
                Window::scope("P", p_queue.clone(), 30.0, 1),
                Box::new(SvgScopeBackend::new(&svg_path, (900, 600))),
            );
            viewer.add_window(
                Window::scope("T", t_queue.clone(), 30.0, 2),
                Box::new(SvgScopeBackend::new(format!("{svg_path}.T.svg"), (900, 600))),
            );
            println!("Live view rendering to {svg_path}");
            viewer.run();
        });
    }

    // Optional teeth program on a simulated humidity actuator.
    let program = with_program.then(|| {
        let control = Arc::new(
            Control::new("rh", SoftActuator::new(50.0))
                .with_range(Some(0.0), Some(100.0))
                .with_round_digits(1)
                .with_tick(Duration::from_secs(1)),
        );
        let program = Arc::new(
            Teeth::new(
                2.0,
                SlopeUnit::PerMinute,
                Duration::from_secs(120),
                &[70.0, 30.0],
                TeethStart::Plateau,
                3,
            )
            .build(control),
        );
        let handle = program.run();
        (program, handle)
    });

    if let Err(e) = hub.start() {
        error!("session failed to start: {e}");
        std::process::exit(1);
    }

    if let Some((program, handle)) = program {
        program.stop();
        let _ = handle.join();
    }
}

fn run_image_bench() {
    let path = prompt_path();
    let hub = Arc::new(RecordHub::new(&path).with_metadata_filename("Images_Metadata.json"));

    let sink = CsvSink::new(
        format!("{path}/Cam0.tsv"),
        &["filename", "time (unix)", "dt (s)"],
    )
    .with_formats(&[
        ColumnFormat::General,
        ColumnFormat::Fixed(3),
        ColumnFormat::Fixed(3),
    ]);
    let store = ImageStore::new(format!("{path}/Cam0"), None, false);
    let recording = match Recording::image("Cam0", Duration::from_millis(200), sink, store) {
        Ok(recording) => recording,
        Err(e) => {
            error!("could not set up image recording: {e}");
            return;
        }
    };
    let camera = Box::new(SimulatedCamera::new("Cam0", 320, 240));
    let cam = match hub.add_recording(recording, camera) {
        Ok(recording) => recording,
        Err(e) => {
            error!("could not register recording: {e}");
            return;
        }
    };

    {
        let stop = hub.stop_latch();
        let queue = cam.plot_queue().clone();
        let live_path = format!("{path}/Cam0-live.raw");
        hub.on_graph(move || {
            let close = Arc::new(Latch::new());
            let (clock, clock_handle) =
                InfoFeed::spawn_periodic(Duration::from_secs(1), stop.clone(), || {
                    format!("t = {:.0}", labrec::utils::unix_now())
                });
            let mut window = Window::image("Cam0", queue.clone());
            window.attach_info_feed(clock);
            let mut viewer = Viewer::new(Duration::from_millis(50), stop.clone(), close);
            viewer.add_window(window, Box::new(RawFrameBackend::new(&live_path)));
            println!("Live frames dumping to {live_path}");
            viewer.run();
            let _ = clock_handle.join();
        });
    }

    if let Err(e) = hub.start() {
        error!("session failed to start: {e}");
        std::process::exit(1);
    }
}
