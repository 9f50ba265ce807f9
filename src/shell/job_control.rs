use crate::shell::error::LaunchError;
use crate::shell::job_table::{JobTable, JobView};
use crate::shell::process::{Spawner, SystemSpawner};
use crate::shell::watcher::CompletionWatcher;
use anyhow::Result;
use log::debug;
use nix::unistd::Pid;
use std::fmt;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A background job that was just started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundLaunch {
    pub display_id: usize,
    pub pid: Pid,
}

impl fmt::Display for BackgroundLaunch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.display_id, self.pid)
    }
}

#[derive(Debug)]
pub enum LaunchOutcome {
    /// The child ran to completion while the caller waited.
    Foreground { status: ExitStatus },
    Background(BackgroundLaunch),
}

/// A finished background job, ready to be announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    pub display_id: usize,
    pub command: String,
}

impl fmt::Display for CompletionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]+ Done {}", self.display_id, self.command)
    }
}

/// Owns the job table and every child the shell starts.
///
/// Foreground children are waited on inline and never enter the table.
/// Background children are registered, then handed to the completion
/// watcher which flips them to completed when they exit. Completions are
/// only removed and reported through [`Supervisor::reap_completed`], which
/// the shell loop calls between commands.
pub struct Supervisor {
    table: Arc<Mutex<JobTable>>,
    spawner: Box<dyn Spawner>,
    watcher: CompletionWatcher,
}

impl Supervisor {
    pub fn new(poll_interval: Duration) -> Result<Self> {
        Self::with_spawner(Box::new(SystemSpawner), poll_interval)
    }

    pub fn with_spawner(spawner: Box<dyn Spawner>, poll_interval: Duration) -> Result<Self> {
        let table = Arc::new(Mutex::new(JobTable::new()));
        let watcher = CompletionWatcher::start(table.clone(), poll_interval)?;
        Ok(Self {
            table,
            spawner,
            watcher,
        })
    }

    pub fn launch(
        &mut self,
        argv: &[String],
        background: bool,
    ) -> Result<LaunchOutcome, LaunchError> {
        let program = argv.first().ok_or(LaunchError::EmptyCommand)?;

        let mut handle = self
            .spawner
            .spawn(argv)
            .map_err(|e| LaunchError::from_spawn(program, e))?;
        let pid = handle.pid();

        if !background {
            debug!("waiting for foreground pid {}", pid);
            let status = handle.wait().map_err(|source| LaunchError::Wait {
                program: program.clone(),
                source,
            })?;
            debug!("foreground pid {} finished: {}", pid, status);
            return Ok(LaunchOutcome::Foreground { status });
        }

        let display_id = self.lock_table().insert(pid, argv.join(" "));
        debug!("background job [{}] started as pid {}", display_id, pid);
        self.watcher.track(handle);

        Ok(LaunchOutcome::Background(BackgroundLaunch { display_id, pid }))
    }

    /// Removes finished jobs from the table and returns them for printing.
    /// Never blocks on a child.
    pub fn reap_completed(&self) -> Vec<CompletionEvent> {
        let done = self.lock_table().drain_completed();
        if !done.is_empty() {
            debug!("reaped {} finished job(s)", done.len());
        }
        done.into_iter()
            .map(|job| CompletionEvent {
                display_id: job.display_id,
                command: job.command,
            })
            .collect()
    }

    pub fn snapshot(&self) -> Vec<JobView> {
        self.lock_table().snapshot()
    }

    pub fn has_jobs(&self) -> bool {
        !self.lock_table().is_empty()
    }

    fn lock_table(&self) -> MutexGuard<'_, JobTable> {
        match self.table.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
