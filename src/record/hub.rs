//! Record hub: composition root of the acquisition engine.
//!
//! Owns the recordings, the shared `stop`/`graph` latches and the base path.
//! `start()` fans out one reader and one writer thread per recording plus
//! the CLI and any user auxiliary tasks, then runs the graph gate on the
//! calling thread (GUI toolkits usually demand the main thread) until stop,
//! and joins everything on the way out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, info, warn};
use parking_lot::Mutex;
use thiserror::Error;

use crate::cli;
use crate::sensors::Sensor;
use crate::utils::Latch;

use super::meta::{write_session_meta, RecordingMeta, SessionMeta};
use super::reader::spawn_reader;
use super::recording::{Recording, RecordingError};
use super::writer::{spawn_writer, QUEUE_WARN_THRESHOLDS};

#[derive(Debug, Error)]
pub enum HubError {
    #[error("duplicate recording '{0}'")]
    DuplicateRecording(String),
    #[error("hub already started")]
    AlreadyStarted,
    #[error(transparent)]
    Recording(#[from] RecordingError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

type GraphCallback = Box<dyn FnMut() + Send>;
type AuxTask = Box<dyn FnOnce() + Send>;

pub struct RecordHub {
    path: PathBuf,
    dt_save: Duration,
    dt_request: Duration,
    metadata_filename: String,
    use_stdin_cli: bool,
    queue_warn_thresholds: Vec<usize>,

    recordings: DashMap<String, Arc<Recording>>,
    sensors: Mutex<HashMap<String, Box<dyn Sensor>>>,
    initial_properties: Mutex<Vec<(String, String)>>,
    aux_tasks: Mutex<Vec<AuxTask>>,
    on_graph: Mutex<Option<GraphCallback>>,

    stop: Arc<Latch>,
    graph: Arc<Latch>,
    started: AtomicBool,
}

impl RecordHub {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dt_save: Duration::from_secs_f64(1.3),
            dt_request: Duration::from_secs_f64(0.7),
            metadata_filename: "Metadata.json".to_string(),
            use_stdin_cli: true,
            queue_warn_thresholds: QUEUE_WARN_THRESHOLDS.to_vec(),
            recordings: DashMap::new(),
            sensors: Mutex::new(HashMap::new()),
            initial_properties: Mutex::new(Vec::new()),
            aux_tasks: Mutex::new(Vec::new()),
            on_graph: Mutex::new(None),
            stop: Arc::new(Latch::new()),
            graph: Arc::new(Latch::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Cadence of writer flush cycles.
    pub fn with_dt_save(mut self, dt_save: Duration) -> Self {
        self.dt_save = dt_save;
        self
    }

    /// Cadence of the graph gate's stop checks.
    pub fn with_dt_request(mut self, dt_request: Duration) -> Self {
        self.dt_request = dt_request;
        self
    }

    pub fn with_metadata_filename(mut self, filename: &str) -> Self {
        self.metadata_filename = filename.to_string();
        self
    }

    /// Ascending save-queue depths at which writers warn about backlog.
    pub fn with_queue_thresholds(mut self, thresholds: &[usize]) -> Self {
        self.queue_warn_thresholds = thresholds.to_vec();
        self
    }

    /// Disables the stdin command thread (embedding and tests drive the
    /// broker directly).
    pub fn without_stdin_cli(mut self) -> Self {
        self.use_stdin_cli = false;
        self
    }

    /// Registers a recording together with the sensor its reader will own.
    pub fn add_recording(
        &self,
        recording: Recording,
        sensor: Box<dyn Sensor>,
    ) -> Result<Arc<Recording>, HubError> {
        let name = recording.name().to_string();
        if self.recordings.contains_key(&name) {
            return Err(HubError::DuplicateRecording(name));
        }
        let recording = Arc::new(recording);
        self.sensors.lock().insert(name.clone(), sensor);
        self.recordings.insert(name, recording.clone());
        Ok(recording)
    }

    /// Initial property setting applied by each reader after sensor open.
    /// Generic keys (`dt`) reach every recording exposing the property,
    /// suffixed keys (`dt_P`) only the named one.
    pub fn initial_property(&self, key: &str, value: &str) {
        self.initial_properties
            .lock()
            .push((key.to_string(), value.to_string()));
    }

    /// Extra thread to run for the duration of the session.
    pub fn add_task(&self, task: impl FnOnce() + Send + 'static) {
        self.aux_tasks.lock().push(Box::new(task));
    }

    /// Blocking viewer hook invoked by the graph gate while `graph` is set.
    pub fn on_graph(&self, callback: impl FnMut() + Send + 'static) {
        *self.on_graph.lock() = Some(Box::new(callback));
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stop_latch(&self) -> Arc<Latch> {
        self.stop.clone()
    }

    pub fn graph_latch(&self) -> Arc<Latch> {
        self.graph.clone()
    }

    pub fn recording(&self, name: &str) -> Option<Arc<Recording>> {
        self.recordings.get(name).map(|r| r.value().clone())
    }

    pub fn recording_names(&self) -> Vec<String> {
        self.recordings.iter().map(|e| e.key().clone()).collect()
    }

    /// Requests a full shutdown: readers finish their tick, writers drain.
    pub fn request_stop(&self) {
        self.stop.set();
    }

    // ------------------------------------------------------------------
    // Property broker
    // ------------------------------------------------------------------

    /// Routes a `<property>=<value>` command. A `<property>_<recording>`
    /// command targets one recording; otherwise the property fans out to
    /// every recording that exposes it. Unknown properties of a given
    /// recording are ignored silently; parse failures are logged.
    pub fn set_property_command(&self, command: &str, value: &str) {
        // Targeted form first.
        for entry in self.recordings.iter() {
            let name = entry.key();
            let suffix = format!("_{name}");
            if let Some(property) = command.strip_suffix(&suffix) {
                if property.is_empty() {
                    continue;
                }
                match entry.value().set_property(property, value) {
                    Ok(true) => info!("[{name}] {property} = {value}"),
                    Ok(false) => debug!("[{name}] does not expose '{property}'"),
                    Err(e) => warn!("[{name}] {e}"),
                }
                return;
            }
        }

        // Generic fan-out.
        let mut applied = 0usize;
        for entry in self.recordings.iter() {
            match entry.value().set_property(command, value) {
                Ok(true) => {
                    info!("[{}] {command} = {value}", entry.key());
                    applied += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("[{}] {e}", entry.key()),
            }
        }
        if applied == 0 {
            warn!("no recording exposes property '{command}'");
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Runs the session to completion. Blocking; returns once `stop` was
    /// requested and every thread joined.
    pub fn start(self: &Arc<Self>) -> Result<(), HubError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(HubError::AlreadyStarted);
        }

        std::fs::create_dir_all(&self.path)?;
        for entry in self.recordings.iter() {
            entry.value().init_file()?;
        }
        self.write_metadata()?;

        info!("recording started in folder {}", self.path.display());

        // Pair every recording with its sensor before spawning anything.
        let mut workers: Vec<(Arc<Recording>, Box<dyn Sensor>, Vec<(String, String)>)> =
            Vec::new();
        {
            let mut sensors = self.sensors.lock();
            for entry in self.recordings.iter() {
                let sensor = sensors
                    .remove(entry.key())
                    .expect("recording registered without sensor");
                let props = self.initial_properties_for(entry.key());
                workers.push((entry.value().clone(), sensor, props));
            }
        }

        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        for (recording, sensor, props) in workers {
            handles.push(spawn_reader(
                recording.clone(),
                sensor,
                self.stop.clone(),
                self.graph.clone(),
                props,
            )?);
            handles.push(spawn_writer(
                recording,
                self.stop.clone(),
                self.dt_save,
                self.queue_warn_thresholds.clone(),
            )?);
        }

        if self.use_stdin_cli {
            handles.push(cli::spawn_stdin_cli(self.clone())?);
        }

        for task in self.aux_tasks.lock().drain(..) {
            handles.push(std::thread::spawn(task));
        }

        self.graph_gate();

        for handle in handles {
            let _ = handle.join();
        }
        info!("recording stopped");
        Ok(())
    }

    fn write_metadata(&self) -> Result<(), HubError> {
        let recordings = self
            .recordings
            .iter()
            .map(|entry| RecordingMeta::from_recording(entry.value()))
            .collect();
        let meta = SessionMeta {
            program: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            time_unix: crate::utils::unix_now(),
            path: self.path.display().to_string(),
            dt_save_s: self.dt_save.as_secs_f64(),
            dt_request_s: self.dt_request.as_secs_f64(),
            recordings,
        };
        let written = write_session_meta(&self.path, &self.metadata_filename, &meta)?;
        info!("session metadata written to {}", written.display());
        Ok(())
    }

    /// Settings a given reader applies after opening its sensor: generic
    /// keys first, targeted keys after so they win.
    fn initial_properties_for(&self, name: &str) -> Vec<(String, String)> {
        let all = self.initial_properties.lock();
        let names: Vec<String> = self.recording_names();
        let mut props = Vec::new();
        for (key, value) in all.iter() {
            let targeted = names
                .iter()
                .any(|n| key.strip_suffix(&format!("_{n}")).is_some_and(|p| !p.is_empty()));
            if !targeted {
                props.push((key.clone(), value.clone()));
            }
        }
        let suffix = format!("_{name}");
        for (key, value) in all.iter() {
            if let Some(property) = key.strip_suffix(&suffix) {
                if !property.is_empty() {
                    props.push((property.to_string(), value.clone()));
                }
            }
        }
        props
    }

    /// Main-thread gate: runs the viewer hook while `graph` is set,
    /// otherwise naps on the stop latch.
    fn graph_gate(&self) {
        while !self.stop.is_set() {
            if self.graph.is_set() {
                let mut cb = self.on_graph.lock();
                match cb.as_mut() {
                    Some(callback) => {
                        // Blocking until the viewer closes.
                        callback();
                    }
                    None => warn!("graph requested but no viewer is configured"),
                }
                drop(cb);
                self.graph.clear();
            }
            self.stop.wait_timeout(self.dt_request);
        }
    }
}
