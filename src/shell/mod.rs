mod command_parser;
mod error;
mod job_control;
mod job_table;
mod process;
mod signal_handler;
mod watcher;

use crate::config::Config;
use crate::terminal::{ReadOutcome, Terminal};
use anyhow::{Context, Result};
use colored::*;
use command_parser::{CommandParser, ParsedCommand};
use job_control::{LaunchOutcome, Supervisor};
use log::{debug, warn};
use signal_handler::SignalHandler;
use std::fmt::Display;
use std::io::{self, Write};

pub struct Shell {
    terminal: Terminal,
    signals: Option<SignalHandler>,
    session: Session,
}

impl Shell {
    pub fn new(config: &Config) -> Result<Self> {
        let signals = match SignalHandler::initialize() {
            Ok(signals) => Some(signals),
            Err(e) => {
                warn!("Failed to initialize signal handlers: {}", e);
                None
            }
        };

        let supervisor =
            Supervisor::new(config.poll_interval).context("Failed to start job supervisor")?;

        Ok(Shell {
            terminal: Terminal::new(config.prompt.clone(), config.history_file.clone())?,
            signals,
            session: Session::new(supervisor, config.announce_foreground),
        })
    }

    pub fn run(&mut self) -> Result<()> {
        loop {
            let line = match self.terminal.read_line()? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Interrupted => continue,
                ReadOutcome::Eof => break,
            };

            let mut stdout = io::stdout();
            let flow = self.session.handle_line(&line, &mut stdout);

            if let Some(signals) = &self.signals {
                if let Err(e) = signals.acknowledge(&mut stdout) {
                    warn!("Failed to write to stdout: {}", e);
                }
            }

            if flow == Flow::Exit {
                break;
            }
        }

        if self.session.supervisor.has_jobs() {
            debug!("leaving with background jobs still running");
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Handles one input line at a time against a supervisor.
///
/// Finished jobs are reported before and after every launch, never while a
/// foreground child is running.
struct Session {
    supervisor: Supervisor,
    announce_foreground: bool,
}

impl Session {
    fn new(supervisor: Supervisor, announce_foreground: bool) -> Self {
        Session {
            supervisor,
            announce_foreground,
        }
    }

    fn handle_line(&mut self, line: &str, out: &mut impl Write) -> Flow {
        let command = match CommandParser::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(e) => {
                report_error("msh", &format!("{:#}", e));
                return Flow::Continue;
            }
        };

        if let Some(flow) = self.run_builtin(&command, out) {
            return flow;
        }

        self.report_completed(out);
        self.launch(&command, out);
        self.report_completed(out);
        Flow::Continue
    }

    fn launch(&mut self, command: &ParsedCommand, out: &mut impl Write) {
        debug!("launching {:?} (background: {})", command.command_text(), command.background);
        match self.supervisor.launch(&command.argv, command.background) {
            Ok(LaunchOutcome::Background(launch)) => emit(out, [launch]),
            Ok(LaunchOutcome::Foreground { status }) => {
                debug!("{} exited with {}", command.program(), status);
                if self.announce_foreground {
                    emit(out, [format!("{} done", command.program())]);
                }
            }
            Err(e) => {
                let program = e.program().unwrap_or("msh").to_string();
                report_error(&program, &e.to_string());
            }
        }
    }

    /// Prints a Done line for every background job that finished since the
    /// last call.
    fn report_completed(&self, out: &mut impl Write) {
        let events = self.supervisor.reap_completed();
        if !events.is_empty() {
            emit(out, events);
        }
    }

    fn run_builtin(&mut self, command: &ParsedCommand, out: &mut impl Write) -> Option<Flow> {
        match command.program() {
            "cd" => {
                let target = match command.argv.get(1) {
                    Some(dir) => dir.clone(),
                    None => dirs::home_dir()
                        .map(|home| home.to_string_lossy().to_string())
                        .unwrap_or_else(|| ".".to_string()),
                };
                if let Err(e) = std::env::set_current_dir(&target) {
                    report_error("cd", &format!("{}: {}", target, e));
                }
                Some(Flow::Continue)
            }
            "exit" => Some(Flow::Exit),
            "jobs" => {
                self.report_completed(out);
                emit(out, self.supervisor.snapshot());
                Some(Flow::Continue)
            }
            _ => None,
        }
    }
}

/// Writes one line per item. A broken stdout is logged, not fatal.
fn emit<T: Display>(out: &mut impl Write, lines: impl IntoIterator<Item = T>) {
    let result = lines
        .into_iter()
        .try_for_each(|line| writeln!(out, "{}", line))
        .and_then(|_| out.flush());
    if let Err(e) = result {
        warn!("Failed to write to stdout: {}", e);
    }
}

fn report_error(prefix: &str, message: &str) {
    eprintln!("{}: {}", prefix.red(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::job_table::JobState;
    use crate::shell::process::testing::ScriptedSpawner;
    use nix::unistd::Pid;
    use std::thread;
    use std::time::{Duration, Instant};

    fn session(spawner: &ScriptedSpawner) -> Session {
        let supervisor =
            Supervisor::with_spawner(Box::new(spawner.clone()), Duration::from_millis(5)).unwrap();
        Session::new(supervisor, false)
    }

    fn wait_completed(session: &Session, display_id: usize) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            let done = session
                .supervisor
                .snapshot()
                .iter()
                .any(|job| job.display_id == display_id && job.state == JobState::Completed);
            if done {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("job [{}] never completed", display_id);
    }

    fn output(out: &mut Vec<u8>) -> String {
        String::from_utf8(std::mem::take(out)).unwrap()
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_background_launch_then_done_on_next_command() {
        let spawner = ScriptedSpawner::starting_at(100);
        let mut session = session(&spawner);
        let mut out = Vec::new();

        assert_eq!(session.handle_line("sleep 1 &", &mut out), Flow::Continue);
        assert_eq!(output(&mut out), "[1] 100\n");

        spawner.exit(Pid::from_raw(100));
        wait_completed(&session, 1);

        session.handle_line("true", &mut out);
        assert_eq!(output(&mut out), "[1]+ Done sleep 1\n");
        assert!(session.supervisor.snapshot().is_empty());
    }

    #[test]
    fn test_jobs_reports_done_before_listing() {
        let spawner = ScriptedSpawner::starting_at(100);
        let mut session = session(&spawner);
        let mut out = Vec::new();

        session.handle_line("sleep 1 &", &mut out);
        session.handle_line("sleep 2 &", &mut out);
        assert_eq!(output(&mut out), "[1] 100\n[2] 110\n");

        spawner.exit(Pid::from_raw(100));
        wait_completed(&session, 1);

        session.handle_line("jobs", &mut out);
        assert_eq!(output(&mut out), "[1]+ Done sleep 1\n[2] Running 110 sleep 2\n");
        assert_eq!(session.supervisor.snapshot().len(), 1);
    }

    #[test]
    fn test_builtins_stay_out_of_job_table() {
        let spawner = ScriptedSpawner::starting_at(100);
        let mut session = session(&spawner);
        let mut out = Vec::new();
        let start_dir = std::env::current_dir().unwrap();
        let target = std::env::temp_dir().canonicalize().unwrap();

        let flow = session.handle_line(&format!("cd {}", target.display()), &mut out);
        let moved_to = std::env::current_dir().unwrap().canonicalize().unwrap();
        std::env::set_current_dir(&start_dir).unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(moved_to, target);
        assert!(session.supervisor.snapshot().is_empty());

        assert_eq!(session.handle_line("cd /definitely/not/here", &mut out), Flow::Continue);
        assert_eq!(session.handle_line("exit", &mut out), Flow::Exit);
        assert!(session.supervisor.snapshot().is_empty());
        assert!(output(&mut out).is_empty());
    }

    #[test]
    fn test_blank_comment_and_bad_lines_are_skipped() {
        let spawner = ScriptedSpawner::starting_at(100);
        let mut session = session(&spawner);
        let mut out = Vec::new();

        assert_eq!(session.handle_line("", &mut out), Flow::Continue);
        assert_eq!(session.handle_line("# sleep 1 &", &mut out), Flow::Continue);
        assert_eq!(session.handle_line("echo \"unterminated", &mut out), Flow::Continue);
        assert!(output(&mut out).is_empty());
        assert!(session.supervisor.snapshot().is_empty());
    }

    #[test]
    fn test_foreground_announcement_is_optional() {
        let spawner = ScriptedSpawner::starting_at(100);
        let mut session = session(&spawner);
        let mut out = Vec::new();

        session.handle_line("true", &mut out);
        assert_eq!(output(&mut out), "");

        session.announce_foreground = true;
        session.handle_line("true", &mut out);
        assert_eq!(output(&mut out), "true done\n");
        assert!(session.supervisor.snapshot().is_empty());
    }

    #[test]
    fn test_launch_failure_keeps_loop_running() {
        let spawner = ScriptedSpawner::failing(io::ErrorKind::NotFound);
        let mut session = session(&spawner);
        let mut out = Vec::new();

        assert_eq!(session.handle_line("nope &", &mut out), Flow::Continue);
        assert!(output(&mut out).is_empty());
        assert!(session.supervisor.snapshot().is_empty());
    }

    #[test]
    fn test_broken_stdout_does_not_stop_the_loop() {
        let spawner = ScriptedSpawner::starting_at(100);
        let mut session = session(&spawner);

        assert_eq!(session.handle_line("sleep 1 &", &mut BrokenPipe), Flow::Continue);
        assert_eq!(session.supervisor.snapshot().len(), 1);

        spawner.exit(Pid::from_raw(100));
        wait_completed(&session, 1);
        assert_eq!(session.handle_line("true", &mut BrokenPipe), Flow::Continue);
        assert!(session.supervisor.snapshot().is_empty());

        let mut out = Vec::new();
        session.handle_line("sleep 2 &", &mut out);
        assert_eq!(output(&mut out), "[2] 120\n");
    }
}
