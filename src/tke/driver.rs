use std::fmt;
use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use portable_pty::{CommandBuilder, PtySize, native_pty_system};
use thiserror::Error;

use super::table::strip_ansi;

const REDACTED: &str = "********";

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to start '{command}': {message}")]
    Spawn { command: String, message: String },

    #[error("'{command}' timed out after {seconds}s waiting for {waiting_for}")]
    Timeout {
        command: String,
        waiting_for: String,
        seconds: u64,
    },

    #[error("'{command}' exited before prompting '{prompt}'")]
    UnexpectedEof { command: String, prompt: String },

    #[error("'{command}' exited with status {code}")]
    Exit {
        command: String,
        code: u32,
        output: String,
    },

    #[error("terminal I/O error on '{command}': {message}")]
    Io { command: String, message: String },
}

/// One scripted answer: wait until `prompt` appears, then type `reply`.
#[derive(Clone)]
pub struct Exchange {
    pub prompt: String,
    pub reply: String,
    pub secret: bool,
}

impl Exchange {
    pub fn new(prompt: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reply: reply.into(),
            secret: false,
        }
    }

    /// Reply is removed from captured output and debug logs.
    pub fn secret(prompt: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            secret: true,
            ..Self::new(prompt, reply)
        }
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reply: &str = if self.secret { REDACTED } else { &self.reply };
        f.debug_struct("Exchange")
            .field("prompt", &self.prompt)
            .field("reply", &reply)
            .finish()
    }
}

/// Runs one CLI invocation, answering its prompts in order, and returns the captured output.
pub trait CliDriver {
    fn run(&mut self, args: &[String], exchanges: &[Exchange]) -> Result<String, DriverError>;
}

/// Drives a real program through a pseudo-terminal.
#[derive(Debug, Clone)]
pub struct PtyDriver {
    program: String,
    prefix: Vec<String>,
    env: Vec<(String, String)>,
    timeout: Duration,
}

impl PtyDriver {
    pub fn new(program: impl Into<String>, prefix: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            prefix,
            env: Vec::new(),
            timeout,
        }
    }

    /// Sets an environment variable for every spawned command.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn env(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `<program> tke <args..>`, the layout of the IBM Cloud CLI plugin.
    pub fn tke(program: impl Into<String>, timeout: Duration) -> Self {
        Self::new(program, vec!["tke".to_string()], timeout)
    }

    // NOTE: Only the subcommand is named; later args may carry key material
    fn label(&self, args: &[String]) -> String {
        let mut parts = vec![self.program.as_str()];
        parts.extend(self.prefix.iter().map(String::as_str));
        if let Some(first) = args.first() {
            parts.push(first);
        }
        parts.join(" ")
    }
}

impl CliDriver for PtyDriver {
    fn run(&mut self, args: &[String], exchanges: &[Exchange]) -> Result<String, DriverError> {
        let command = self.label(args);
        let spawn_err = |e: &dyn fmt::Display| DriverError::Spawn {
            command: command.clone(),
            message: e.to_string(),
        };

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: 50,
                cols: 200,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| spawn_err(&e))?;

        let mut cmd = CommandBuilder::new(&self.program);
        cmd.args(&self.prefix);
        cmd.args(args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| spawn_err(&e))?;
        // The reader only sees EOF once every slave handle is closed.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_err(&e))?;
        let mut writer = pair.master.take_writer().map_err(|e| spawn_err(&e))?;

        tracing::debug!(command = %command, prompts = exchanges.len(), "spawned");

        let mut session = Session::start(reader);
        let result = (|| {
            for exchange in exchanges {
                session.expect(&command, &exchange.prompt, self.timeout)?;
                tracing::debug!(command = %command, ?exchange, "answering prompt");
                writer
                    .write_all(format!("{}\n", exchange.reply).as_bytes())
                    .and_then(|_| writer.flush())
                    .map_err(|e| DriverError::Io {
                        command: command.clone(),
                        message: e.to_string(),
                    })?;
            }
            session.wait_eof(&command, self.timeout)
        })();

        if let Err(err) = result {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }

        let status = child.wait().map_err(|e| DriverError::Io {
            command: command.clone(),
            message: e.to_string(),
        })?;
        let output = redact(&session.transcript(), exchanges);

        if !status.success() {
            return Err(DriverError::Exit {
                command,
                code: status.exit_code(),
                output,
            });
        }
        Ok(output)
    }
}

struct Session {
    rx: Receiver<Vec<u8>>,
    transcript: Vec<u8>,
    pending: Vec<u8>,
}

impl Session {
    fn start(mut reader: Box<dyn Read + Send>) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = [0u8; 8192];
            loop {
                let n = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    // EIO once the child side closes on Linux
                    Err(_) => break,
                };
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
        });
        Self {
            rx,
            transcript: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn push(&mut self, chunk: Vec<u8>) {
        self.transcript.extend_from_slice(&chunk);
        self.pending.extend(chunk);
    }

    fn expect(&mut self, command: &str, prompt: &str, timeout: Duration) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if strip_ansi(&String::from_utf8_lossy(&self.pending)).contains(prompt) {
                self.pending.clear();
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(chunk) => self.push(chunk),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(DriverError::Timeout {
                        command: command.to_string(),
                        waiting_for: format!("prompt '{}'", prompt),
                        seconds: timeout.as_secs(),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(DriverError::UnexpectedEof {
                        command: command.to_string(),
                        prompt: prompt.to_string(),
                    });
                }
            }
        }
    }

    fn wait_eof(&mut self, command: &str, timeout: Duration) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(chunk) => self.push(chunk),
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(DriverError::Timeout {
                        command: command.to_string(),
                        waiting_for: "exit".to_string(),
                        seconds: timeout.as_secs(),
                    });
                }
            }
        }
    }

    fn transcript(&self) -> String {
        String::from_utf8_lossy(&self.transcript).into_owned()
    }
}

/// Removes secret replies echoed back by the terminal.
pub fn redact(output: &str, exchanges: &[Exchange]) -> String {
    exchanges
        .iter()
        .filter(|e| e.secret && !e.reply.is_empty())
        .fold(output.to_string(), |acc, e| acc.replace(&e.reply, REDACTED))
}
