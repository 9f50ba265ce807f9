use nix::unistd::Pid;
use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};

/// A spawned child as seen by the job-control core.
pub trait ProcessHandle: Send {
    fn pid(&self) -> Pid;

    /// Blocks until the child exits and reaps it.
    fn wait(&mut self) -> io::Result<ExitStatus>;

    /// Reaps the child if it has already exited.
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>>;
}

/// Starts child processes for the supervisor.
pub trait Spawner: Send {
    fn spawn(&mut self, argv: &[String]) -> io::Result<Box<dyn ProcessHandle>>;
}

/// Spawns real OS processes that share the shell's terminal.
#[derive(Debug, Default)]
pub struct SystemSpawner;

impl Spawner for SystemSpawner {
    fn spawn(&mut self, argv: &[String]) -> io::Result<Box<dyn ProcessHandle>> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;

        Ok(Box::new(SystemProcess { child }))
    }
}

struct SystemProcess {
    child: Child,
}

impl ProcessHandle for SystemProcess {
    fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_spawner_runs_and_reaps() {
        let mut spawner = SystemSpawner;
        let mut handle = spawner.spawn(&["true".to_string()]).unwrap();
        assert!(handle.pid().as_raw() > 0);
        let status = handle.wait().unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_system_spawner_reports_missing_program() {
        let mut spawner = SystemSpawner;
        let err = spawner
            .spawn(&["definitely-not-a-real-command-msh".to_string()])
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_system_spawner_rejects_empty_argv() {
        let mut spawner = SystemSpawner;
        let err = spawner.spawn(&[]).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
