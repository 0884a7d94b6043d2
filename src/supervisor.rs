use crate::settings::CommandTemplate;
use crate::store::StreamId;
use futures_util::future::select_all;
use std::collections::HashMap;
use std::io;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("too many streams playing (max {max_size})")]
    CapacityExceeded { max_size: usize },
    #[error("stream {id} is already playing")]
    DuplicateLaunch { id: StreamId },
    #[error("failed to start '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("launch command is empty")]
    EmptyCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerHandle {
    pub id: StreamId,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerOutput {
    pub id: StreamId,
    pub line: String,
}

type OutputLines = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

struct PlayerEntry {
    child: Child,
    /// stdout and stderr; a slot becomes `None` once its pipe reaches EOF.
    outputs: Vec<Option<OutputLines>>,
}

/// Bounded table of running player processes, at most one per stream.
pub struct Supervisor {
    entries: HashMap<StreamId, PlayerEntry>,
    max_size: usize,
}

impl Supervisor {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_size: max_size.max(1),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    #[must_use]
    pub fn contains(&self, id: StreamId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Spawns `template` with `url` and `resolution` appended and returns without waiting.
    pub fn launch(
        &mut self,
        id: StreamId,
        url: &str,
        resolution: &str,
        template: &CommandTemplate,
    ) -> Result<PlayerHandle, SupervisorError> {
        if self.entries.len() >= self.max_size {
            return Err(SupervisorError::CapacityExceeded {
                max_size: self.max_size,
            });
        }
        if self.entries.contains_key(&id) {
            return Err(SupervisorError::DuplicateLaunch { id });
        }
        let (program, args) = template
            .words()
            .split_first()
            .ok_or(SupervisorError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .arg(url)
            .arg(resolution)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SupervisorError::SpawnFailed {
                program: program.clone(),
                source,
            })?;

        let mut outputs = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            outputs.push(Some(output_lines(stdout)));
        }
        if let Some(stderr) = child.stderr.take() {
            outputs.push(Some(output_lines(stderr)));
        }

        let handle = PlayerHandle {
            id,
            pid: child.id(),
        };
        info!(stream_id = id, pid = ?handle.pid, command = %template.display(), "player launched");
        self.entries.insert(id, PlayerEntry { child, outputs });
        Ok(handle)
    }

    /// Removes every entry whose process has exited and returns their ids in ascending order.
    pub fn reap(&mut self) -> Vec<StreamId> {
        let mut finished = Vec::new();
        for (id, entry) in &mut self.entries {
            match entry.child.try_wait() {
                Ok(Some(status)) => {
                    info!(stream_id = *id, %status, "player exited");
                    finished.push(*id);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(stream_id = *id, error = %err, "player status unavailable, dropping entry");
                    finished.push(*id);
                }
            }
        }

        for id in &finished {
            self.entries.remove(id);
        }
        finished.sort_unstable();
        finished
    }

    pub fn stop(&mut self, id: StreamId) -> Option<PlayerHandle> {
        let mut entry = self.entries.remove(&id)?;
        let handle = PlayerHandle {
            id,
            pid: entry.child.id(),
        };
        terminate(&mut entry.child);
        info!(stream_id = id, pid = ?handle.pid, "player stopped");
        Some(handle)
    }

    /// Terminates every live player. Used once at teardown.
    pub fn shutdown(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        info!(count = self.entries.len(), "stopping all players");
        for entry in self.entries.values_mut() {
            terminate(&mut entry.child);
        }
        self.entries.clear();
    }

    /// Waits for the next line written by any live player.
    ///
    /// The set of watched pipes is rebuilt on every call, so players launched or removed
    /// between calls are picked up. Pends forever when nothing is watched; callers race it
    /// against keyboard input and a tick. Cancel safe.
    pub async fn next_output(&mut self) -> PlayerOutput {
        loop {
            let reads = self
                .entries
                .iter_mut()
                .flat_map(|(id, entry)| {
                    entry
                        .outputs
                        .iter_mut()
                        .enumerate()
                        .filter_map(move |(slot, lines)| {
                            lines
                                .as_mut()
                                .map(|lines| Box::pin(read_line(*id, slot, lines)))
                        })
                })
                .collect::<Vec<_>>();
            if reads.is_empty() {
                return std::future::pending::<PlayerOutput>().await;
            }

            let (ready, _, remaining) = select_all(reads).await;
            drop(remaining);
            let (id, slot, result) = ready;
            match result {
                Ok(Some(line)) => {
                    return PlayerOutput {
                        id,
                        line: line.trim_end_matches('\r').to_owned(),
                    };
                }
                Ok(None) => self.close_output(id, slot),
                Err(err) => {
                    debug!(stream_id = id, error = %err, "player output unreadable");
                    self.close_output(id, slot);
                }
            }
        }
    }

    fn close_output(&mut self, id: StreamId, slot: usize) {
        if let Some(entry) = self.entries.get_mut(&id)
            && let Some(lines) = entry.outputs.get_mut(slot)
        {
            *lines = None;
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn output_lines(pipe: impl AsyncRead + Send + Unpin + 'static) -> OutputLines {
    let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(pipe);
    BufReader::new(reader).lines()
}

async fn read_line(
    id: StreamId,
    slot: usize,
    lines: &mut OutputLines,
) -> (StreamId, usize, io::Result<Option<String>>) {
    (id, slot, lines.next_line().await)
}

/// Asks the player to exit without waiting for it. The runtime reaps the dropped child.
fn terminate(child: &mut Child) {
    if !send_sigterm(child) {
        let _ = child.start_kill();
    }
    let _ = child.try_wait();
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(raw_pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return false;
    };
    match kill(Pid::from_raw(raw_pid), Signal::SIGTERM) {
        Ok(()) => true,
        Err(err) => {
            debug!(pid = raw_pid, error = %err, "SIGTERM failed, killing instead");
            false
        }
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> bool {
    false
}
