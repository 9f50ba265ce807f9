use log::warn;
use nix::unistd::Pid;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Completed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running => write!(f, "Running"),
            JobState::Completed => write!(f, "Done"),
        }
    }
}

/// One background child tracked by the shell.
#[derive(Debug, Clone)]
pub struct Job {
    pub display_id: usize,
    pub pid: Pid,
    pub command: String,
    pub state: JobState,
    // Position in the order terminations were observed. Only set once Completed.
    completed_seq: Option<u64>,
}

/// Read-only view of a job, as listed by `jobs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobView {
    pub display_id: usize,
    pub pid: Pid,
    pub command: String,
    pub state: JobState,
}

impl fmt::Display for JobView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {} {}", self.display_id, self.state, self.pid, self.command)
    }
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        JobView {
            display_id: job.display_id,
            pid: job.pid,
            command: job.command.clone(),
            state: job.state,
        }
    }
}

/// Ordered table of background jobs.
///
/// The table holds no lock of its own. The supervisor wraps it in a single
/// mutex so inserts, completions and drains are serialized against each other.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_display_id: usize,
    next_completed_seq: u64,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_display_id: 1,
            next_completed_seq: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Registers a running job and returns its display id.
    ///
    /// Display ids grow monotonically for the lifetime of the table, even
    /// across periods where the table is empty.
    pub fn insert(&mut self, pid: Pid, command: String) -> usize {
        if let Some(pos) = self
            .jobs
            .iter()
            .position(|job| job.pid == pid && job.state == JobState::Running)
        {
            debug_assert!(false, "pid {} registered twice while still running", pid);
            warn!("replacing stale job entry for pid {}", pid);
            self.jobs.remove(pos);
        }

        let display_id = self.next_display_id;
        self.next_display_id += 1;
        self.jobs.push(Job {
            display_id,
            pid,
            command,
            state: JobState::Running,
            completed_seq: None,
        });
        display_id
    }

    /// Flips the running job with `pid` to completed.
    ///
    /// Returns false when no running job matches, which covers foreground
    /// children, already-completed jobs and pids the table never saw.
    pub fn mark_completed(&mut self, pid: Pid) -> bool {
        let seq = self.next_completed_seq;
        match self
            .jobs
            .iter_mut()
            .find(|job| job.pid == pid && job.state == JobState::Running)
        {
            Some(job) => {
                job.state = JobState::Completed;
                job.completed_seq = Some(seq);
                self.next_completed_seq += 1;
                true
            }
            None => false,
        }
    }

    /// Removes and returns every completed job, in the order completions
    /// were observed.
    pub fn drain_completed(&mut self) -> Vec<Job> {
        let (mut done, running): (Vec<Job>, Vec<Job>) = std::mem::take(&mut self.jobs)
            .into_iter()
            .partition(|job| job.state == JobState::Completed);
        self.jobs = running;
        done.sort_by_key(|job| job.completed_seq);
        done
    }

    pub fn snapshot(&self) -> Vec<JobView> {
        self.jobs.iter().map(JobView::from).collect()
    }
}
