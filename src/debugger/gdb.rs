use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::debugger::adapter::{
    AdapterKind, DebugEvent, DebuggerAdapter, ExitStatus, FormatterSource, FrameRef, Resume,
    StopContext, TargetSpec, VariableHandle,
};
use crate::debugger::error::DebuggerError;
use crate::debugger::mi::{self, AsyncKind, MiRecord, MiTuple, ResultClass, StreamKind};

const GDB_BINARY: &str = "gdb";
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Reply to one tokenized MI command
#[derive(Debug)]
struct MiReply {
    class: ResultClass,
    results: MiTuple,
}

/// What the read loop hands to the adapter, in arrival order
#[derive(Debug)]
enum RawEvent {
    Stopped(MiTuple),
    Output(String),
}

// ============================================================================
// MI peer (token-correlated commands)
// ============================================================================

#[derive(Clone)]
struct MiPeer {
    stdin: Arc<Mutex<ChildStdin>>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<MiReply>>>>,
    token_counter: Arc<AtomicU64>,
    timeout: Duration,
}

impl MiPeer {
    fn new(stdin: ChildStdin, timeout: Duration) -> Self {
        Self {
            stdin: Arc::new(Mutex::new(stdin)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            token_counter: Arc::new(AtomicU64::new(1)),
            timeout,
        }
    }

    fn next_token(&self) -> u64 {
        self.token_counter.fetch_add(1, Ordering::Relaxed)
    }

    async fn send_line(&self, line: &str) -> io::Result<()> {
        let mut guard = self.stdin.lock().await;
        guard.write_all(line.as_bytes()).await?;
        guard.write_all(b"\n").await?;
        guard.flush().await
    }

    async fn request(&self, command: &str) -> Result<MiReply, DebuggerError> {
        let token = self.next_token();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(token, tx);

        tracing::debug!(token, command, "gdb <-");
        if let Err(err) = self.send_line(&format!("{token}{command}")).await {
            self.pending.lock().await.remove(&token);
            return Err(DebuggerError::Io(err));
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(DebuggerError::ChannelClosed),
            Err(_) => {
                self.pending.lock().await.remove(&token);
                Err(DebuggerError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }

    /// Like `request`, with `^error` turned into [`DebuggerError::Command`].
    async fn execute(&self, command: &str) -> Result<MiTuple, DebuggerError> {
        let reply = self.request(command).await?;
        if reply.class == ResultClass::Error {
            let msg = reply
                .results
                .get_str("msg")
                .unwrap_or("unknown debugger error")
                .to_string();
            return Err(DebuggerError::Command(msg));
        }
        Ok(reply.results)
    }

    async fn resolve(&self, token: u64, reply: MiReply) {
        if let Some(tx) = self.pending.lock().await.remove(&token) {
            if tx.send(reply).is_err() {
                tracing::debug!(token, "Dropping MI reply; requester already gave up");
            }
        } else {
            tracing::trace!(token, "MI reply with no pending request");
        }
    }

    /// Wake every waiting request with a closed channel.
    async fn fail_all(&self) {
        self.pending.lock().await.clear();
    }
}

// ============================================================================
// Stop classification
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
enum StopKind {
    Intercept { thread_id: u32 },
    Exited(ExitStatus),
    Crashed { signal: String },
    Other { reason: Option<String> },
}

fn classify_stop(results: &MiTuple, breakpoint: Option<&str>) -> StopKind {
    let ours = breakpoint.is_some() && results.get_str("bkptno") == breakpoint;
    match results.get_str("reason") {
        Some("breakpoint-hit") if ours => {
            let thread_id = results
                .get_str("thread-id")
                .and_then(|id| id.parse().ok())
                .unwrap_or(1);
            StopKind::Intercept { thread_id }
        }
        Some("exited-normally") => StopKind::Exited(ExitStatus::Code { code: 0 }),
        Some("exited") => {
            let code = results
                .get_str("exit-code")
                .and_then(mi::parse_octal_exit_code)
                .unwrap_or(0);
            StopKind::Exited(ExitStatus::Code { code })
        }
        Some("exited-signalled") => StopKind::Exited(ExitStatus::Signalled {
            signal: signal_name(results),
        }),
        Some("signal-received") => StopKind::Crashed {
            signal: signal_name(results),
        },
        other => StopKind::Other {
            reason: other.map(str::to_string),
        },
    }
}

fn signal_name(results: &MiTuple) -> String {
    results
        .get_str("signal-name")
        .unwrap_or("unknown")
        .to_string()
}

/// Quote one argument for the shell GDB starts the inferior through.
fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn exec_arguments_command(args: &[String]) -> String {
    let mut shell_args: Vec<String> = args.iter().map(|a| shell_quote(a)).collect();
    // The inferior shares our pipe to GDB's stdin otherwise.
    if cfg!(unix) {
        shell_args.push("< /dev/null".to_string());
    }
    format!("-exec-arguments {}", mi::quote_arg(&shell_args.join(" ")))
}

// ============================================================================
// Read loops
// ============================================================================

/// Route one decoded record. Replies wake their requester; the rest may be
/// forwarded to the adapter.
async fn dispatch(record: MiRecord, peer: &MiPeer) -> Option<RawEvent> {
    match record {
        MiRecord::Result {
            token: Some(token),
            class,
            results,
        } => {
            peer.resolve(token, MiReply { class, results }).await;
            None
        }
        MiRecord::Result { token: None, class, .. } => {
            tracing::debug!(?class, "Untokened MI result record");
            None
        }
        MiRecord::Async {
            kind: AsyncKind::Exec,
            class,
            results,
            ..
        } if class == "stopped" => Some(RawEvent::Stopped(results)),
        MiRecord::Async { class, .. } => {
            tracing::trace!(class = %class, "Ignoring async record");
            None
        }
        MiRecord::Stream {
            kind: StreamKind::Target,
            text,
        } => Some(RawEvent::Output(text.trim_end_matches('\n').to_string())),
        MiRecord::Stream { kind, text } => {
            tracing::debug!(?kind, "gdb: {}", text.trim_end());
            None
        }
        MiRecord::Prompt => None,
    }
}

/// Split one stdout line into events. Target output that was not
/// newline-terminated can carry an MI record on its tail.
async fn route_line(line: &str, peer: &MiPeer) -> Vec<RawEvent> {
    let mut events = Vec::with_capacity(2);
    match mi::parse_line(line) {
        Ok(Some(record)) => {
            events.extend(dispatch(record, peer).await);
            return events;
        }
        Ok(None) => {}
        Err(err) => {
            tracing::debug!(error = %err, line, "Unparseable MI-like line, passing through");
        }
    }

    match mi::split_embedded_record(line) {
        Some((text, record)) => {
            if !text.is_empty() {
                events.push(RawEvent::Output(text.to_string()));
            }
            events.extend(dispatch(record, peer).await);
        }
        None => events.push(RawEvent::Output(line.to_string())),
    }
    events
}

async fn read_stdout(stdout: ChildStdout, peer: MiPeer, events: mpsc::Sender<RawEvent>) {
    let mut reader = BufReader::new(stdout);
    // Raw bytes: the target may print anything, valid UTF-8 or not.
    let mut buffer = Vec::new();

    'read: loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Ok(_) => {
                let decoded = String::from_utf8_lossy(&buffer);
                let line = decoded.trim_end_matches(['\r', '\n']);
                tracing::trace!("gdb -> {}", line);

                for event in route_line(line, &peer).await {
                    if events.send(event).await.is_err() {
                        break 'read;
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "gdb read loop failed");
                break;
            }
        }
    }

    peer.fail_all().await;
}

async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!("gdb stderr: {}", line),
            Ok(None) => break,
            Err(err) => {
                tracing::debug!(error = %err, "Failed to read gdb stderr");
                break;
            }
        }
    }
}

// ============================================================================
// GDB adapter
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionMode {
    Launch,
    Attach,
}

struct GdbSession {
    child: Child,
    peer: MiPeer,
    events: mpsc::Receiver<RawEvent>,
    mode: SessionMode,
    breakpoint: Option<String>,
    generation: u64,
    /// Stopped on our breakpoint and not yet resumed
    suspended: bool,
    exited: bool,
}

impl GdbSession {
    fn ensure_current(&self, generation: u64) -> Result<(), DebuggerError> {
        if !self.suspended || generation != self.generation {
            return Err(DebuggerError::StaleFrame {
                handle: generation,
                current: self.generation,
            });
        }
        Ok(())
    }

    /// Wait for the next `*stopped`, passing output through the log.
    async fn wait_for_stop(&mut self, timeout: Duration) -> Result<MiTuple, DebuggerError> {
        let wait = async {
            while let Some(event) = self.events.recv().await {
                match event {
                    RawEvent::Stopped(results) => return Ok(results),
                    RawEvent::Output(line) => tracing::debug!("target: {}", line),
                }
            }
            Err(DebuggerError::ChannelClosed)
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| DebuggerError::Timeout(timeout.as_millis() as u64))?
    }
}

/// Drives GDB through its machine interface.
pub struct GdbAdapter {
    binary_path: PathBuf,
    command_timeout: Duration,
    session: Option<GdbSession>,
}

impl GdbAdapter {
    pub fn new() -> Self {
        Self {
            binary_path: Self::find_binary().unwrap_or_else(|| PathBuf::from(GDB_BINARY)),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            session: None,
        }
    }

    /// Create an adapter with a specific gdb binary
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            binary_path: path,
            ..Self::new()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    fn find_binary() -> Option<PathBuf> {
        which::which(GDB_BINARY).ok()
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("--interpreter=mi3");
        cmd.arg("--quiet");
        // No user or system gdbinit; only the printers we are told to load.
        cmd.arg("-nx");
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    fn session_mut(&mut self) -> Result<&mut GdbSession, DebuggerError> {
        self.session.as_mut().ok_or(DebuggerError::NoSession)
    }

    async fn spawn_session(&self) -> Result<GdbSession, DebuggerError> {
        let mut child = self.build_command().spawn().map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                DebuggerError::BinaryNotFound(self.binary_path.display().to_string())
            } else {
                DebuggerError::Io(err)
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DebuggerError::Io(io::Error::other("failed to capture gdb stdin")))?;
        let stdout = child.stdout.take().ok_or(DebuggerError::StdoutCaptureFailed)?;
        if child.id().is_none() {
            return Err(DebuggerError::ProcessSpawnFailed);
        }

        let peer = MiPeer::new(stdin, self.command_timeout);
        let (tx, rx) = mpsc::channel::<RawEvent>(256);
        tokio::spawn(read_stdout(stdout, peer.clone(), tx));
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr));
        }

        Ok(GdbSession {
            child,
            peer,
            events: rx,
            mode: SessionMode::Launch,
            breakpoint: None,
            generation: 0,
            suspended: false,
            exited: false,
        })
    }

    async fn configure(
        session: &mut GdbSession,
        target: &TargetSpec,
        formatter: &FormatterSource,
        timeout: Duration,
    ) -> Result<(), DebuggerError> {
        let peer = session.peer.clone();
        for setting in [
            "confirm off",
            "pagination off",
            "width 0",
            "print elements unlimited",
            "print repeats unlimited",
        ] {
            peer.execute(&format!("-gdb-set {setting}")).await?;
        }

        if let FormatterSource::Scripts(scripts) = formatter {
            for script in scripts {
                if !script.exists() {
                    return Err(DebuggerError::FormatterSetup(format!(
                        "{} does not exist",
                        script.display()
                    )));
                }
                let console = format!("source {}", script.display());
                peer.execute(&format!("-interpreter-exec console {}", mi::quote_arg(&console)))
                    .await
                    .map_err(|err| match err {
                        DebuggerError::Command(msg) => DebuggerError::FormatterSetup(format!(
                            "{}: {msg}",
                            script.display()
                        )),
                        other => other,
                    })?;
                tracing::info!(script = %script.display(), "Loaded formatter script");
            }
        }
        peer.execute("-enable-pretty-printing").await?;

        match target {
            TargetSpec::Launch { path, args } => {
                if !path.exists() {
                    return Err(DebuggerError::TargetNotFound(path.display().to_string()));
                }
                let load = format!(
                    "-file-exec-and-symbols {}",
                    mi::quote_arg(&path.display().to_string())
                );
                peer.execute(&load).await.map_err(|err| match err {
                    DebuggerError::Command(msg) => DebuggerError::TargetNotFound(msg),
                    other => other,
                })?;
                peer.execute(&exec_arguments_command(args)).await?;
                session.mode = SessionMode::Launch;
            }
            TargetSpec::Attach { pid } => {
                peer.execute(&format!("-target-attach {pid}"))
                    .await
                    .map_err(|err| match err {
                        DebuggerError::Command(msg) => DebuggerError::AttachFailed(msg),
                        other => other,
                    })?;
                // Attaching stops the process; swallow that stop.
                session.wait_for_stop(timeout).await?;
                session.mode = SessionMode::Attach;
            }
        }

        Ok(())
    }
}

impl Default for GdbAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DebuggerAdapter for GdbAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Gdb
    }

    async fn attach(
        &mut self,
        target: &TargetSpec,
        formatter: &FormatterSource,
    ) -> Result<(), DebuggerError> {
        if self.session.is_some() {
            return Err(DebuggerError::AttachFailed(
                "a debugging session is already active".to_string(),
            ));
        }

        let mut session = self.spawn_session().await?;
        let timeout = self.command_timeout;
        if let Err(err) = Self::configure(&mut session, target, formatter, timeout).await {
            if let Err(kill_err) = session.child.kill().await {
                tracing::debug!(error = %kill_err, "Failed to kill gdb after setup failure");
            }
            return Err(err);
        }

        tracing::info!(
            target_spec = %target,
            gdb = %self.binary_path.display(),
            "Debugger attached"
        );
        self.session = Some(session);
        Ok(())
    }

    async fn install_intercept(&mut self, marker: &str) -> Result<(), DebuggerError> {
        let session = self.session_mut()?;
        let results = session
            .peer
            .execute(&format!("-break-insert {}", mi::quote_arg(marker)))
            .await
            .map_err(|err| match err {
                DebuggerError::Command(msg) => DebuggerError::MarkerNotFound(msg),
                other => other,
            })?;

        let number = results
            .get_tuple("bkpt")
            .and_then(|bkpt| bkpt.get_str("number"))
            .ok_or_else(|| {
                DebuggerError::MarkerNotFound(format!("no breakpoint number returned for {marker}"))
            })?;
        tracing::info!(marker, breakpoint = number, "Intercept installed");
        session.breakpoint = Some(number.to_string());
        Ok(())
    }

    async fn start(&mut self) -> Result<(), DebuggerError> {
        let session = self.session_mut()?;
        let command = match session.mode {
            SessionMode::Launch => "-exec-run",
            SessionMode::Attach => "-exec-continue",
        };
        session
            .peer
            .execute(command)
            .await
            .map_err(|err| match err {
                DebuggerError::Command(msg) => DebuggerError::AttachFailed(msg),
                other => other,
            })?;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<DebugEvent, DebuggerError> {
        let session = self.session_mut()?;
        loop {
            let raw = session
                .events
                .recv()
                .await
                .ok_or(DebuggerError::ChannelClosed)?;

            let results = match raw {
                RawEvent::Output(line) => return Ok(DebugEvent::TargetOutput(line)),
                RawEvent::Stopped(results) => results,
            };

            session.generation += 1;
            match classify_stop(&results, session.breakpoint.as_deref()) {
                StopKind::Intercept { thread_id } => {
                    session.suspended = true;
                    return Ok(DebugEvent::Intercepted(StopContext {
                        generation: session.generation,
                        thread_id,
                    }));
                }
                StopKind::Exited(status) => {
                    session.exited = true;
                    return Ok(DebugEvent::Exited(status));
                }
                StopKind::Crashed { signal } => {
                    tracing::warn!(signal = %signal, "Target received a fatal signal");
                    if let Err(err) = session.peer.execute("-interpreter-exec console kill").await {
                        tracing::debug!(error = %err, "Failed to kill crashed target");
                    }
                    session.exited = true;
                    return Ok(DebugEvent::Exited(ExitStatus::Signalled { signal }));
                }
                StopKind::Other { reason } => {
                    tracing::debug!(?reason, "Unexpected stop, continuing");
                    session.peer.execute("-exec-continue").await?;
                }
            }
        }
    }

    async fn read_tag(&mut self, stop: &StopContext) -> Result<String, DebuggerError> {
        let session = self.session_mut()?;
        session.ensure_current(stop.generation)?;

        let results = session
            .peer
            .execute(&format!(
                "-stack-list-arguments --thread {} 1 0 0",
                stop.thread_id
            ))
            .await
            .map_err(|err| match err {
                DebuggerError::Command(msg) => DebuggerError::TagUnreadable(msg),
                other => other,
            })?;

        let value = results
            .get_list("stack-args")
            .and_then(|frames| frames.first())
            .and_then(|frame| frame.as_tuple())
            .and_then(|frame| frame.get_list("args"))
            .and_then(|args| args.first())
            .and_then(|arg| arg.as_tuple())
            .and_then(|arg| arg.get_str("value"))
            .ok_or_else(|| {
                DebuggerError::TagUnreadable("marker frame has no readable argument".to_string())
            })?;

        mi::extract_c_string(value).ok_or_else(|| {
            DebuggerError::TagUnreadable(format!("marker argument is not a string: {value}"))
        })
    }

    async fn resolve_frame(
        &mut self,
        stop: &StopContext,
        depth: u32,
    ) -> Result<FrameRef, DebuggerError> {
        let session = self.session_mut()?;
        session.ensure_current(stop.generation)?;

        let results = session
            .peer
            .execute(&format!(
                "-stack-info-depth --thread {} {}",
                stop.thread_id,
                depth.saturating_add(1)
            ))
            .await?;
        let available = results
            .get_str("depth")
            .and_then(|d| d.parse::<u32>().ok())
            .unwrap_or(0);
        if available <= depth {
            return Err(DebuggerError::FrameNotFound { depth, available });
        }

        let results = session
            .peer
            .execute(&format!(
                "-stack-list-frames --thread {} {depth} {depth}",
                stop.thread_id
            ))
            .await?;
        let function = results
            .get_list("stack")
            .and_then(|frames| frames.first())
            .and_then(|frame| frame.as_tuple())
            .and_then(|frame| frame.get_str("func"))
            .map(str::to_string);

        Ok(FrameRef {
            generation: stop.generation,
            thread_id: stop.thread_id,
            depth,
            function,
        })
    }

    async fn resolve_variable(
        &mut self,
        frame: &FrameRef,
        name: &str,
    ) -> Result<VariableHandle, DebuggerError> {
        let session = self.session_mut()?;
        session.ensure_current(frame.generation)?;

        let results = session
            .peer
            .execute(&format!(
                "-stack-list-variables --thread {} --frame {} --no-values",
                frame.thread_id, frame.depth
            ))
            .await?;
        let found = results
            .get_list("variables")
            .unwrap_or_default()
            .iter()
            .filter_map(|var| var.as_tuple())
            .any(|var| var.get_str("name") == Some(name));

        if !found {
            return Err(DebuggerError::VariableNotFound {
                name: name.to_string(),
                depth: frame.depth,
            });
        }

        Ok(VariableHandle {
            frame: frame.clone(),
            name: name.to_string(),
        })
    }

    async fn format_value(&mut self, handle: &VariableHandle) -> Result<String, DebuggerError> {
        let session = self.session_mut()?;
        session.ensure_current(handle.frame.generation)?;

        let results = session
            .peer
            .execute(&format!(
                "-data-evaluate-expression --thread {} --frame {} {}",
                handle.frame.thread_id,
                handle.frame.depth,
                mi::quote_arg(&handle.name)
            ))
            .await
            .map_err(|err| match err {
                DebuggerError::Command(msg) => DebuggerError::FormatFailed(msg),
                other => other,
            })?;

        let value = results.get_str("value").ok_or_else(|| {
            DebuggerError::FormatFailed("debugger returned no value".to_string())
        })?;
        if value.starts_with("<error") {
            return Err(DebuggerError::ValueUnreadable(value.to_string()));
        }
        Ok(value.to_string())
    }

    async fn resume(&mut self, token: Resume) -> Result<(), DebuggerError> {
        drop(token);
        let session = self.session_mut()?;
        session.suspended = false;
        session.peer.execute("-exec-continue").await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), DebuggerError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        if !session.exited {
            let command = match session.mode {
                SessionMode::Launch => "-interpreter-exec console kill",
                SessionMode::Attach => "-target-detach",
            };
            if let Err(err) = session.peer.execute(command).await {
                tracing::debug!(error = %err, command, "Failed to release target");
            }
        }

        // gdb may exit before it answers; the reply is not needed.
        if let Err(err) = session.peer.request("-gdb-exit").await {
            tracing::trace!(error = %err, "No reply to -gdb-exit");
        }

        match tokio::time::timeout(self.command_timeout, session.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(%status, "gdb exited");
                Ok(())
            }
            Ok(Err(err)) => Err(DebuggerError::Io(err)),
            Err(_) => {
                tracing::warn!("gdb did not exit in time, killing it");
                session.child.kill().await.map_err(DebuggerError::Io)
            }
        }
    }
}
