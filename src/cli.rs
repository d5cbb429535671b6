//! Interactive command surface of the record hub.
//!
//! Line-oriented: `g`/`graph` pops the live view, `q`/`Q`/`quit` stops the
//! session, `<property>=<value>` broadcasts to every recording exposing the
//! property and `<property>_<recording>=<value>` targets one recording.
//! Parse errors are logged and the loop continues.

use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{info, warn};

use crate::record::RecordHub;

/// Runs the command loop over any line source until quit/stop or EOF.
pub fn run_cli<R: BufRead>(hub: &RecordHub, input: R) {
    let stop = hub.stop_latch();
    let graph = hub.graph_latch();

    for line in input.lines() {
        if stop.is_set() {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("command input error: {e}");
                break;
            }
        };
        let command = line.trim();
        if command.is_empty() {
            continue;
        }

        match command {
            "g" | "graph" => {
                info!("graph requested");
                graph.set();
            }
            "q" | "Q" | "quit" => {
                info!("stop requested");
                stop.set();
                break;
            }
            _ => match command.split_once('=') {
                Some((key, value)) => {
                    hub.set_property_command(key.trim(), value.trim());
                }
                None => warn!("unrecognized command '{command}'"),
            },
        }
    }

    // EOF without an explicit quit still ends the session; a detached
    // control surface must not leave the hub running headless forever.
    if !stop.is_set() {
        info!("command input closed, stopping");
        stop.set();
    }
}

/// Spawns the stdin-backed command thread used by the interactive binary.
pub fn spawn_stdin_cli(hub: Arc<RecordHub>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("cli".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            run_cli(&hub, stdin.lock());
        })
}
