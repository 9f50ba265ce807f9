use crate::shell::job_table::JobTable;
use crate::shell::process::ProcessHandle;
use anyhow::{Context, Result};
use log::{debug, warn};
use signal_hook::consts::SIGCHLD;
use signal_hook::iterator::{Handle, Signals};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

enum WatcherMsg {
    Track(Box<dyn ProcessHandle>),
    ChildSignal,
    Shutdown,
}

/// Background thread that reaps backgrounded children and marks their jobs
/// completed.
///
/// It wakes on SIGCHLD and at least once every `poll_interval`, so a
/// coalesced signal never leaves a job stuck in `Running`.
pub struct CompletionWatcher {
    table: Arc<Mutex<JobTable>>,
    tx: Sender<WatcherMsg>,
    worker: Option<JoinHandle<()>>,
    signals: Option<(Handle, JoinHandle<()>)>,
}

impl CompletionWatcher {
    pub fn start(table: Arc<Mutex<JobTable>>, poll_interval: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let worker_table = table.clone();
        let worker = thread::Builder::new()
            .name("msh-watcher".to_string())
            .spawn(move || {
                let mut tracked: Vec<Box<dyn ProcessHandle>> = Vec::new();
                loop {
                    match rx.recv_timeout(poll_interval) {
                        Ok(WatcherMsg::Track(handle)) => {
                            debug!("watching pid {}", handle.pid());
                            tracked.push(handle);
                        }
                        Ok(WatcherMsg::ChildSignal) => debug!("SIGCHLD received"),
                        Ok(WatcherMsg::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                    if !tracked.is_empty() {
                        sweep(&mut tracked, &worker_table);
                    }
                }
                debug!("watcher stopped with {} children still running", tracked.len());
            })
            .context("Failed to start completion watcher thread")?;

        let signals = match forward_sigchld(tx.clone()) {
            Ok(signals) => Some(signals),
            Err(e) => {
                warn!("SIGCHLD notification unavailable, polling only: {:#}", e);
                None
            }
        };

        Ok(Self {
            table,
            tx,
            worker: Some(worker),
            signals,
        })
    }

    /// Hands a backgrounded child over to the watcher.
    ///
    /// The job must already be in the table, otherwise a fast exit would be
    /// marked against nothing and never reported.
    pub fn track(&self, handle: Box<dyn ProcessHandle>) {
        if let Err(mpsc::SendError(WatcherMsg::Track(handle))) =
            self.tx.send(WatcherMsg::Track(handle))
        {
            warn!("watcher unavailable, giving pid {} its own waiter", handle.pid());
            wait_detached(self.table.clone(), handle);
        }
    }
}

impl Drop for CompletionWatcher {
    fn drop(&mut self) {
        if let Some((handle, thread)) = self.signals.take() {
            handle.close();
            let _ = thread.join();
        }
        let _ = self.tx.send(WatcherMsg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn forward_sigchld(tx: Sender<WatcherMsg>) -> Result<(Handle, JoinHandle<()>)> {
    let mut signals = Signals::new([SIGCHLD]).context("Failed to register SIGCHLD")?;
    let handle = signals.handle();
    let thread = thread::Builder::new()
        .name("msh-sigchld".to_string())
        .spawn(move || {
            for _ in signals.forever() {
                if tx.send(WatcherMsg::ChildSignal).is_err() {
                    break;
                }
            }
        })
        .context("Failed to start SIGCHLD thread")?;
    Ok((handle, thread))
}

/// Blocks a dedicated thread on one child, then marks its job completed.
fn wait_detached(table: Arc<Mutex<JobTable>>, mut handle: Box<dyn ProcessHandle>) {
    let pid = handle.pid();
    let spawned = thread::Builder::new()
        .name(format!("msh-wait-{}", pid))
        .spawn(move || {
            if let Err(e) = handle.wait() {
                warn!("lost track of pid {}: {}", pid, e);
            }
            lock(&table).mark_completed(pid);
        });
    if let Err(e) = spawned {
        warn!("could not wait for pid {}; its job will stay running: {}", pid, e);
    }
}

fn lock(table: &Mutex<JobTable>) -> MutexGuard<'_, JobTable> {
    match table.lock() {
        Ok(table) => table,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Reaps every exited child and marks its job, all under the table lock.
///
/// `try_wait` never blocks. Holding the lock across it means a pid is only
/// released to the OS once its job is already Completed, so a recycled pid
/// registered by `insert` can never be confused with the old job.
fn sweep(tracked: &mut Vec<Box<dyn ProcessHandle>>, table: &Mutex<JobTable>) {
    let mut table = lock(table);
    tracked.retain_mut(|handle| {
        let pid = handle.pid();
        match handle.try_wait() {
            Ok(Some(status)) => debug!("pid {} exited: {}", pid, status),
            Ok(None) => return true,
            Err(e) => warn!("lost track of pid {}: {}", pid, e),
        }
        if !table.mark_completed(pid) {
            debug!("pid {} exited but is not a running job", pid);
        }
        false
    });
}
