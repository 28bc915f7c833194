//! The conductor
//!
//! A conductor drives one interactive remote-shell transport: it owns the
//! command queue, reacts to parser events, launches and speaks to the
//! remote framer, tracks background jobs, and routes traffic for nested
//! conductors running inside the shell it controls.
//!
//! All event entry points take the `depth` the parser tagged the event
//! with. An event whose depth does not match a framing conductor belongs
//! to an ancestor and is forwarded up the parent chain unchanged; writes
//! travel the opposite way, each hop wrapping the bytes in a framer `send`
//! until the root hands them to the delegate.

use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Mutex, Weak};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use cox_core::config::ClientProfile;
use cox_core::error::ConductorError;
use cox_core::traits::{
    ConductorDelegate, NullInjector, PayloadPackager, ProcessInfoProvider, ShellIntegrationInjector,
};
use cox_core::types::{python_version_supported, ParsedArgs, RemotePid, ShellKind, AUTOPOLL_PID};

use cox_protocol::chunk::{chunked_record, FRAMER_CONTINUATION, MAX_LINE_BYTES};
use cox_protocol::command::{Command, FileSubcommand};
use cox_protocol::event::BoundaryKind;
use cox_protocol::recovery::{classify_recovery_line, ConductorRecovery, RecoveryLine};

use crate::framer::framer_source;
use crate::handler::{CompletionFn, ExecutionContext, Handler};
use crate::jobs::BackgroundJobs;
use crate::payload::{group_payloads, normalize_destination, Payload};
use crate::registry;
use crate::state::{RecoveryState, State};

/// A conductor shared between its owner and its children
pub type SharedConductor = Arc<Mutex<Conductor>>;

/// Everything the client decides at conductor creation time
#[derive(Debug, Clone)]
pub struct ConductorArgs {
    /// Opaque ssh arguments carried through to the remote end
    pub sshargs: String,
    /// Opaque boolean-flag arguments carried through to the remote end
    pub bool_args: String,
    /// Identifier used for banner routing
    pub dcs_id: String,
    /// Identifier used for ancestry lookup
    pub client_unique_id: String,
    /// Environment variables to apply on the remote shell
    pub vars_to_send: Vec<(String, String)>,
    /// Client-supplied metadata variables, also applied on the remote shell
    pub client_vars: Vec<(String, String)>,
    /// Directory to `cd` into before login
    pub initial_directory: Option<String>,
    /// Ask for shell-integration injection when the remote shell allows it
    pub should_inject_shell_integration: bool,
    /// Startup policy knobs
    pub profile: ClientProfile,
}

impl ConductorArgs {
    /// Args with freshly generated identifiers
    pub fn new(sshargs: impl Into<String>, bool_args: impl Into<String>) -> Self {
        Self {
            sshargs: sshargs.into(),
            bool_args: bool_args.into(),
            dcs_id: uuid::Uuid::new_v4().to_string(),
            client_unique_id: uuid::Uuid::new_v4().to_string(),
            vars_to_send: Vec::new(),
            client_vars: Vec::new(),
            initial_directory: None,
            should_inject_shell_integration: true,
            profile: ClientProfile::default(),
        }
    }
}

/// Remote shell facts reported by `getshell`
#[derive(Debug, Clone, Default)]
struct RemoteShellInfo {
    shell: String,
    home: String,
    version: String,
}

/// Driver for one hop of a remote session
pub struct Conductor {
    sshargs: String,
    bool_args: String,
    parsed_args: ParsedArgs,
    depth: u32,
    parent: Option<SharedConductor>,
    self_ref: Weak<Mutex<Conductor>>,
    dcs_id: String,
    client_unique_id: String,

    vars_to_send: Vec<(String, String)>,
    client_vars: Vec<(String, String)>,
    modified_vars: Option<Vec<(String, String)>>,
    modified_command_args: Option<Vec<String>>,
    initial_directory: Option<String>,
    should_inject_shell_integration: bool,
    payloads: Vec<Payload>,

    framed_pid: Option<RemotePid>,
    state: State,
    queue: VecDeque<ExecutionContext>,
    background_jobs: BackgroundJobs,
    autopoll: String,
    autopoll_enabled: bool,
    verbose_framer: bool,
    shell_info: Option<RemoteShellInfo>,

    queue_writes_flag: bool,
    writing: bool,
    pending_writes: VecDeque<String>,
    restored: bool,

    delegate: Option<Arc<dyn ConductorDelegate>>,
    process_info: Option<Arc<dyn ProcessInfoProvider>>,
    packager: Option<Arc<dyn PayloadPackager>>,
    injector: Arc<dyn ShellIntegrationInjector>,
}

impl Conductor {
    /// Create a conductor, optionally nested inside `parent`
    pub fn shared(args: ConductorArgs, parent: Option<SharedConductor>) -> SharedConductor {
        let depth = match &parent {
            Some(parent) => parent.lock().unwrap().depth + 1,
            None => 0,
        };
        let parsed_args = ParsedArgs::parse(&args.sshargs);

        Arc::new_cyclic(|self_ref| {
            Mutex::new(Conductor {
                sshargs: args.sshargs,
                bool_args: args.bool_args,
                parsed_args,
                depth,
                parent,
                self_ref: self_ref.clone(),
                dcs_id: args.dcs_id,
                client_unique_id: args.client_unique_id,
                vars_to_send: args.vars_to_send,
                client_vars: args.client_vars,
                modified_vars: None,
                modified_command_args: None,
                initial_directory: args.initial_directory,
                should_inject_shell_integration: args.should_inject_shell_integration,
                payloads: Vec::new(),
                framed_pid: None,
                state: State::Ground,
                queue: VecDeque::new(),
                background_jobs: BackgroundJobs::new(),
                autopoll: String::new(),
                autopoll_enabled: args.profile.autopoll,
                verbose_framer: args.profile.verbose_framer,
                shell_info: None,
                queue_writes_flag: true,
                writing: false,
                pending_writes: VecDeque::new(),
                restored: false,
                delegate: None,
                process_info: None,
                packager: None,
                injector: Arc::new(NullInjector),
            })
        })
    }

    // --- accessors -------------------------------------------------------

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn parent(&self) -> Option<SharedConductor> {
        self.parent.clone()
    }

    pub fn dcs_id(&self) -> &str {
        &self.dcs_id
    }

    pub fn client_unique_id(&self) -> &str {
        &self.client_unique_id
    }

    pub fn sshargs(&self) -> &str {
        &self.sshargs
    }

    pub fn framed_pid(&self) -> Option<RemotePid> {
        self.framed_pid
    }

    /// Login shell path reported by `getshell`, once known
    pub fn remote_shell(&self) -> Option<&str> {
        self.shell_info.as_ref().map(|info| info.shell.as_str())
    }

    /// Remote home directory reported by `getshell`, once known
    pub fn remote_home(&self) -> Option<&str> {
        self.shell_info.as_ref().map(|info| info.home.as_str())
    }

    /// The framer is up and owns the remote session
    pub fn framing(&self) -> bool {
        self.framed_pid.is_some()
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    pub fn background_job_count(&self) -> usize {
        self.background_jobs.len()
    }

    pub fn state_description(&self) -> &'static str {
        self.state.describe()
    }

    /// One-line summary for logs
    pub fn description(&self) -> String {
        format!(
            "conductor depth={} identity={} state={} framed_pid={}",
            self.depth,
            self.parsed_args.identity,
            self.state.describe(),
            self.framed_pid
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "-".to_string()),
        )
    }

    /// True only if this conductor and every ancestor queue writes and
    /// none of them is unhooked
    pub fn queue_writes(&self) -> bool {
        if !self.queue_writes_flag || matches!(self.state, State::Unhooked) {
            return false;
        }
        match &self.parent {
            Some(parent) => parent.lock().unwrap().queue_writes(),
            None => true,
        }
    }

    /// Keystrokes are routed through the framer rather than written raw
    pub fn handles_keystrokes(&self) -> bool {
        self.framing() && self.queue_writes()
    }

    // --- collaborators ---------------------------------------------------

    /// Attach or detach the transport. Detaching the root transport drains
    /// the queue, delivering `abort` to every pending handler.
    pub fn set_delegate(&mut self, delegate: Option<Arc<dyn ConductorDelegate>>) {
        let attached = delegate.is_some();
        self.delegate = delegate;
        if attached {
            self.restored = false;
            if self.state.can_dispatch() {
                self.dequeue();
            }
        } else if self.parent.is_none() {
            self.drain_queue_with_abort();
        }
    }

    pub fn set_process_info_provider(&mut self, provider: Option<Arc<dyn ProcessInfoProvider>>) {
        self.process_info = provider;
    }

    pub fn set_payload_packager(&mut self, packager: Option<Arc<dyn PayloadPackager>>) {
        self.packager = packager;
    }

    pub fn set_shell_integration_injector(&mut self, injector: Arc<dyn ShellIntegrationInjector>) {
        self.injector = injector;
    }

    // --- public operations -----------------------------------------------

    /// Begin the launch sequence: probe the remote shell, apply
    /// environment, upload payloads, then frame or fall back to a plain
    /// login.
    pub fn start(&mut self) {
        tracing::info!(depth = self.depth, identity = %self.parsed_args.identity, "starting conductor");
        self.send(Command::GetShell, Handler::GetShell { lines: Vec::new() });
    }

    /// Orderly shutdown of the remote session
    pub fn quit(&mut self) {
        let command = if self.framing() {
            Command::FramerQuit
        } else {
            Command::Quit
        };
        self.send(command, Handler::FireAndForget);
        registry::deregister(&self.client_unique_id);
        self.framed_pid = None;
        if let Some(delegate) = &self.delegate {
            delegate.conductor_quit();
        }
    }

    /// Queue a payload for upload during the launch sequence
    pub fn add(&mut self, local_path: impl Into<String>, destination: impl Into<String>) {
        self.payloads.push(Payload {
            local_path: local_path.into(),
            destination: destination.into(),
        });
    }

    /// Upload one blob to a remote directory right now, outside the launch
    /// sequence
    pub fn write_payload_now(&mut self, destination: &str, content: &[u8]) {
        let encoded = BASE64.encode(content);
        self.send(
            Command::Write {
                destination: normalize_destination(destination),
                content: encoded.clone(),
            },
            Handler::WriteOnSuccess { body: encoded },
        );
    }

    /// Deliver keystrokes. While framing, they ride the framer's `send`
    /// command; otherwise they go to the transport raw.
    pub fn send_keys(&mut self, data: &[u8]) {
        match (self.framed_pid, self.queue_writes()) {
            (Some(pid), true) => {
                self.send(
                    Command::FramerSend {
                        data: data.to_vec(),
                        pid,
                    },
                    Handler::FireAndForget,
                );
            }
            _ => {
                let text = String::from_utf8_lossy(data).into_owned();
                self.write(text);
            }
        }
    }

    /// Run a command line in the background on the remote host. The
    /// completion fires with the job's channel-1 output and exit code once
    /// its `terminate` event arrives.
    pub fn run_remote_command(&mut self, cmdline: &str, completion: CompletionFn) {
        if self.framed_pid.map(|pid| pid.0).unwrap_or(0) == 0 {
            completion(Vec::new(), -1);
            return;
        }
        self.send(
            Command::FramerRun(cmdline.to_string()),
            Handler::RunRemoteCommand {
                cmdline: cmdline.to_string(),
                completion: Some(completion),
            },
        );
    }

    /// Ask the framer for one round of buffered output from registered
    /// processes. A poll already queued or in flight absorbs this request;
    /// the later completion is dropped.
    pub fn poll(&mut self, completion: CompletionFn) {
        if self.poll_pending() {
            tracing::debug!(depth = self.depth, "poll already pending; dropping request");
            return;
        }
        self.send(
            Command::FramerPoll,
            Handler::Poll {
                lines: Vec::new(),
                completion: Some(completion),
            },
        );
    }

    /// Subscribe to a remote process's output
    pub fn register_process(&mut self, pid: RemotePid) {
        self.send(Command::FramerRegister(pid), Handler::FireAndForget);
    }

    /// Unsubscribe from a remote process's output
    pub fn deregister_process(&mut self, pid: RemotePid) {
        self.send(Command::FramerDeregister(pid), Handler::FireAndForget);
    }

    /// Kill a framed remote process
    pub fn framer_kill(&mut self, pid: RemotePid) {
        self.send(Command::FramerKill { pid }, Handler::FireAndForget);
    }

    /// Enqueue one file RPC round trip. The receiver resolves with
    /// `(joined lines, status)`, or `("", -1)` if the queue is drained.
    pub fn enqueue_file(
        &mut self,
        sub: FileSubcommand,
    ) -> tokio::sync::oneshot::Receiver<(String, i32)> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send(
            Command::FramerFile(sub),
            Handler::File {
                lines: Vec::new(),
                completion: Some(tx),
            },
        );
        rx
    }

    /// Abort everything queued and in flight, on this conductor and its
    /// ancestors, and return to ground
    pub fn force_return_to_ground_state(&mut self) {
        self.drain_queue_with_abort();
        if let Some(parent) = self.parent.clone() {
            parent.lock().unwrap().force_return_to_ground_state();
        }
    }

    /// Clear local routing state and ask the framer to do the same
    pub fn reset(&mut self) {
        self.drain_queue_with_abort();
        self.autopoll.clear();
        if self.framing() {
            self.send(Command::FramerReset, Handler::FireAndForget);
        }
    }

    /// Reset the whole chain, outermost hop first
    pub fn reset_transitively(&mut self) {
        if let Some(parent) = self.parent.clone() {
            parent.lock().unwrap().reset_transitively();
        }
        self.reset();
    }

    /// Arm the recovery banner reader
    pub fn start_recovery(&mut self) {
        self.state = State::Recovery(RecoveryState::Ground);
    }

    /// The client finished applying a recovery record; hold events until
    /// the parser resynchronizes
    pub fn recovery_did_finish(&mut self) {
        self.state = State::Recovered;
    }

    /// The parser caught up after recovery; resume dispatching
    pub fn did_resynchronize(&mut self) {
        if matches!(self.state, State::Recovered) {
            self.state = State::Ground;
            self.dequeue();
        }
    }

    // --- dispatcher ------------------------------------------------------

    /// Append a command to the queue; dispatch immediately when idle
    pub fn send(&mut self, command: Command, handler: Handler) {
        if matches!(command, Command::FramerPoll) && self.poll_pending() {
            tracing::debug!(depth = self.depth, "coalescing duplicate poll");
            return;
        }
        let was_empty = self.queue.is_empty();
        self.queue.push_back(ExecutionContext::new(command, handler));
        if was_empty && self.state.can_dispatch() {
            self.dequeue();
        }
    }

    fn poll_pending(&self) -> bool {
        let in_queue = self
            .queue
            .iter()
            .any(|ctx| matches!(ctx.command, Command::FramerPoll));
        let in_flight = match &self.state {
            State::WillExecute(ctx) | State::Executing(ctx) => {
                matches!(ctx.command, Command::FramerPoll)
            }
            _ => false,
        };
        in_queue || in_flight
    }

    fn has_transport(&self) -> bool {
        self.delegate.is_some() || self.parent.is_some()
    }

    /// Dispatch the queue head if nothing is in flight. With no transport,
    /// the whole queue drains with `abort` results instead.
    fn dequeue(&mut self) {
        if !self.has_transport() {
            self.drain_queue_with_abort();
            return;
        }
        if !self.state.can_dispatch() {
            return;
        }
        let Some(ctx) = self.queue.pop_front() else {
            return;
        };

        let continuation = if ctx.command.is_framer() {
            FRAMER_CONTINUATION
        } else {
            ""
        };
        let record = chunked_record(&ctx.command.wire_value(), MAX_LINE_BYTES, continuation);
        tracing::debug!(
            depth = self.depth,
            operation = %ctx.command.operation_description(),
            "dispatching"
        );
        self.state = State::WillExecute(ctx);
        self.write(format!("{}\n", record));
    }

    /// Deliver `abort` to the in-flight context and every queued handler,
    /// then return to ground
    fn drain_queue_with_abort(&mut self) {
        match mem::replace(&mut self.state, State::Ground) {
            State::WillExecute(ctx) | State::Executing(ctx) => self.abort_context(ctx),
            _ => {}
        }
        while let Some(ctx) = self.queue.pop_front() {
            self.abort_context(ctx);
        }
    }

    fn abort_context(&mut self, ctx: ExecutionContext) {
        tracing::debug!(
            depth = self.depth,
            operation = %ctx.command.operation_description(),
            "aborting"
        );
        match ctx.handler {
            Handler::RunRemoteCommand { completion, .. } | Handler::Poll { completion, .. } => {
                if let Some(completion) = completion {
                    completion(Vec::new(), -1);
                }
            }
            Handler::File { completion, .. } => {
                if let Some(completion) = completion {
                    let _ = completion.send((String::new(), -1));
                }
            }
            _ => {}
        }
    }

    /// Write through the transport. A non-root conductor hands its bytes
    /// to the parent, which wraps them as a framer `send`; the root writes
    /// to the delegate. Re-entrant writes are deferred until the current
    /// one finishes.
    fn write(&mut self, data: String) {
        if self.writing {
            self.pending_writes.push_back(data);
            return;
        }
        self.writing = true;
        let mut next = Some(data);
        while let Some(out) = next {
            if let Some(parent) = self.parent.clone() {
                parent.lock().unwrap().send_keys(out.as_bytes());
            } else if let Some(delegate) = self.delegate.clone() {
                delegate.conductor_write(&out);
            } else {
                tracing::warn!(depth = self.depth, "no transport; dropping {} bytes", out.len());
            }
            next = self.pending_writes.pop_front();
        }
        self.writing = false;
    }

    /// Protocol violations and fatal statuses land here: drain everything,
    /// leave the user a login shell, tell the delegate.
    fn fail(&mut self, error: ConductorError) {
        tracing::error!(depth = self.depth, "conductor failed: {}", error);
        self.force_return_to_ground_state();
        // Best effort: without this the user is stranded in the bootstrap
        // reader instead of a shell.
        self.write("exec_login_shell\n".to_string());
        if let Some(delegate) = &self.delegate {
            delegate.conductor_abort(&error.to_string());
        }
    }

    // --- parser events ---------------------------------------------------

    fn route_to_parent(&self, depth: u32) -> Option<SharedConductor> {
        if depth != self.depth && self.framing() {
            self.parent.clone()
        } else {
            None
        }
    }

    /// A full line of command output
    pub fn handle_line(&mut self, text: &str, depth: u32) {
        if let Some(parent) = self.route_to_parent(depth) {
            parent.lock().unwrap().handle_line(text, depth);
            return;
        }
        match mem::replace(&mut self.state, State::Ground) {
            State::WillExecute(mut ctx) | State::Executing(mut ctx) => {
                let violation = self.accumulate_line(&mut ctx, text);
                self.state = State::Executing(ctx);
                if let Some(reason) = violation {
                    self.fail(ConductorError::ProtocolViolation(reason));
                }
            }
            other => {
                tracing::debug!(
                    depth = self.depth,
                    state = other.describe(),
                    "discarding line outside command: {:?}",
                    text
                );
                self.state = other;
            }
        }
    }

    /// Feed one line to the in-flight handler. Returns a reason when the
    /// line is a protocol violation.
    fn accumulate_line(&mut self, ctx: &mut ExecutionContext, text: &str) -> Option<String> {
        match &mut ctx.handler {
            Handler::CheckForPython { lines }
            | Handler::FramerLogin { lines }
            | Handler::Poll { lines, .. }
            | Handler::GetShell { lines }
            | Handler::File { lines, .. } => {
                lines.push(text.to_string());
                None
            }
            Handler::RunRemoteCommand {
                cmdline,
                completion,
            } => {
                // First line is the spawned PID. Registering here, rather
                // than at command-end, keeps side-channel output that races
                // the boundary from being lost.
                if let Some(completion) = completion.take() {
                    match text.trim().parse::<i32>() {
                        Ok(pid) if pid > 0 => {
                            self.background_jobs
                                .insert(RemotePid(pid), cmdline.clone(), completion);
                            None
                        }
                        _ => {
                            completion(Vec::new(), -1);
                            Some(format!("malformed PID {:?} from run", text))
                        }
                    }
                } else {
                    None
                }
            }
            Handler::FailIfNonzeroStatus | Handler::FireAndForget | Handler::WriteOnSuccess { .. } => {
                None
            }
        }
    }

    /// The remote began executing the in-flight command
    pub fn handle_command_begin(&mut self, id: &str, depth: u32) {
        if let Some(parent) = self.route_to_parent(depth) {
            parent.lock().unwrap().handle_command_begin(id, depth);
            return;
        }
        match mem::replace(&mut self.state, State::Ground) {
            State::WillExecute(ctx) => self.state = State::Executing(ctx),
            State::Executing(ctx) => {
                tracing::debug!(depth = self.depth, id, "duplicate command-begin");
                self.state = State::Executing(ctx);
            }
            other => {
                tracing::debug!(
                    depth = self.depth,
                    state = other.describe(),
                    id,
                    "command-begin outside dispatch"
                );
                self.state = other;
            }
        }
    }

    /// The remote finished the in-flight command
    pub fn handle_command_end(&mut self, id: &str, kind: BoundaryKind, status: i32, depth: u32) {
        if let Some(parent) = self.route_to_parent(depth) {
            parent
                .lock()
                .unwrap()
                .handle_command_end(id, kind, status, depth);
            return;
        }
        // A framer boundary reaching a non-framing conductor whose
        // in-flight command is not a framer command belongs to a framing
        // ancestor.
        if kind == BoundaryKind::Framer && !self.framing() && !self.in_flight_is_framer() {
            if let Some(parent) = self.parent.clone() {
                parent
                    .lock()
                    .unwrap()
                    .handle_command_end(id, kind, status, depth);
                return;
            }
        }
        match mem::replace(&mut self.state, State::Ground) {
            State::WillExecute(ctx) | State::Executing(ctx) => {
                self.finalize(ctx, status);
                self.dequeue();
            }
            other => {
                tracing::debug!(
                    depth = self.depth,
                    state = other.describe(),
                    id,
                    status,
                    "command-end outside dispatch"
                );
                self.state = other;
            }
        }
    }

    fn in_flight_is_framer(&self) -> bool {
        match &self.state {
            State::WillExecute(ctx) | State::Executing(ctx) => ctx.command.is_framer(),
            _ => false,
        }
    }

    /// Output from a specific remote process on a numbered channel
    pub fn handle_side_channel_output(&mut self, text: &str, pid: i32, channel: u8, depth: u32) {
        if let Some(parent) = self.route_to_parent(depth) {
            parent
                .lock()
                .unwrap()
                .handle_side_channel_output(text, pid, channel, depth);
            return;
        }
        if pid == AUTOPOLL_PID.0 {
            self.handle_autopoll_line(text);
            return;
        }
        if channel == 1 && self.background_jobs.append_output(RemotePid(pid), text) {
            return;
        }
        tracing::debug!(
            depth = self.depth,
            pid,
            channel,
            "side-channel output for untracked process: {:?}",
            text
        );
    }

    fn handle_autopoll_line(&mut self, text: &str) {
        if text == "EOF" {
            let payload = mem::take(&mut self.autopoll);
            if let Some(provider) = &self.process_info {
                provider.autopoll_payload(&payload);
            }
            if self.autopoll_enabled && self.framing() {
                self.send(Command::FramerAutopoll, Handler::FireAndForget);
            }
        } else {
            self.autopoll.push_str(text);
            self.autopoll.push('\n');
        }
    }

    /// A framed process exited
    pub fn handle_terminate(&mut self, pid: i32, code: i32, depth: u32) {
        if let Some(parent) = self.route_to_parent(depth) {
            parent.lock().unwrap().handle_terminate(pid, code, depth);
            return;
        }
        if self.framed_pid == Some(RemotePid(pid)) {
            tracing::info!(depth = self.depth, pid, code, "framed login shell exited");
            self.quit();
            return;
        }
        if !self.background_jobs.terminate(RemotePid(pid), code) {
            tracing::debug!(depth = self.depth, pid, code, "terminate for untracked process");
        }
    }

    /// The remote framer was disabled; raw passthrough from here on
    pub fn handle_unhook(&mut self, depth: u32) {
        if let Some(parent) = self.route_to_parent(depth) {
            parent.lock().unwrap().handle_unhook(depth);
            return;
        }
        tracing::info!(depth = self.depth, "unhooked");
        self.state = State::Unhooked;
    }

    /// One `:recovery:` banner line. Returns the rebuilt identity once the
    /// banner completes successfully.
    pub fn handle_recovery_line(&mut self, line: &str) -> Option<ConductorRecovery> {
        let classified = classify_recovery_line(line);
        let state = mem::replace(&mut self.state, State::Ground);
        match (state, classified) {
            (State::Ground | State::Unhooked | State::Recovery(_), RecoveryLine::Begin) => {
                self.state = State::Recovery(RecoveryState::Building(Default::default()));
                None
            }
            (State::Recovery(RecoveryState::Building(mut builder)), RecoveryLine::Field { key, value }) => {
                builder.accumulate(&key, &value);
                self.state = State::Recovery(RecoveryState::Building(builder));
                None
            }
            (State::Recovery(RecoveryState::Building(builder)), RecoveryLine::End) => {
                self.state = State::Ground;
                match builder.build() {
                    Ok(recovery) => {
                        self.apply_recovery(&recovery);
                        Some(recovery)
                    }
                    Err(error) => {
                        tracing::warn!(depth = self.depth, "recovery banner rejected: {}", error);
                        self.quit();
                        None
                    }
                }
            }
            (state, classified) => {
                tracing::debug!(
                    depth = self.depth,
                    state = state.describe(),
                    "ignoring recovery line {:?} ({:?})",
                    line,
                    classified
                );
                self.state = state;
                None
            }
        }
    }

    fn apply_recovery(&mut self, recovery: &ConductorRecovery) {
        self.framed_pid = Some(recovery.pid);
        self.dcs_id = recovery.dcs_id.clone();
        self.sshargs = recovery.sshargs.clone();
        self.bool_args = recovery.bool_args.clone();
        self.client_unique_id = recovery.client_unique_id.clone();
        self.parsed_args = ParsedArgs::parse(&self.sshargs);
        registry::register(&self.client_unique_id, self.self_ref.clone());
        tracing::info!(
            depth = self.depth,
            pid = %recovery.pid,
            "recovered framer identity"
        );
    }

    // --- finalizers ------------------------------------------------------

    /// Consume the command boundary for the in-flight context
    fn finalize(&mut self, ctx: ExecutionContext, status: i32) {
        let operation = ctx.command.operation_description();
        match ctx.handler {
            Handler::FailIfNonzeroStatus => {
                if status != 0 {
                    self.fail(ConductorError::ProtocolViolation(format!(
                        "{} exited with status {}",
                        operation, status
                    )));
                }
            }
            Handler::FireAndForget => {}
            Handler::GetShell { lines } => self.finish_get_shell(lines, status),
            Handler::CheckForPython { lines } => self.finish_python_probe(lines, status),
            Handler::WriteOnSuccess { body } => {
                if status == 0 {
                    self.write(format!("{}\nEOF\n", body));
                } else {
                    self.fail(ConductorError::ProtocolViolation(format!(
                        "{} rejected with status {}",
                        operation, status
                    )));
                }
            }
            Handler::FramerLogin { lines } => self.finish_framer_login(lines, status),
            Handler::RunRemoteCommand { completion, .. } => {
                // The PID line never arrived.
                if let Some(completion) = completion {
                    completion(Vec::new(), -1);
                }
            }
            Handler::Poll { lines, completion } => {
                if let Some(completion) = completion {
                    completion(lines.join("\n").into_bytes(), status);
                }
            }
            Handler::File { lines, completion } => {
                if let Some(completion) = completion {
                    let _ = completion.send((lines.join("\n"), status));
                }
            }
        }
    }

    /// Parse `getshell` output and enqueue the rest of the launch sequence
    fn finish_get_shell(&mut self, lines: Vec<String>, status: i32) {
        if status != 0 {
            self.fail(ConductorError::ProtocolViolation(format!(
                "getshell exited with status {}",
                status
            )));
            return;
        }
        let joined = lines.join(" ");
        let parts: Vec<&str> = joined.split_whitespace().collect();
        if parts.len() < 2 {
            self.fail(ConductorError::ProtocolViolation(format!(
                "unparseable getshell output: {:?}",
                joined
            )));
            return;
        }
        let info = RemoteShellInfo {
            shell: parts[0].to_string(),
            home: parts[1].to_string(),
            // Older bootstrap readers omit the version token.
            version: if parts.len() >= 3 {
                parts[2..].join(" ")
            } else {
                String::new()
            },
        };
        tracing::debug!(
            depth = self.depth,
            shell = %info.shell,
            home = %info.home,
            "remote shell detected"
        );

        let kind = ShellKind::from_path(&info.shell);
        if self.should_inject_shell_integration && kind.supports_integration(&info.version) {
            let (vars, args) = self.injector.inject(
                kind,
                &self.vars_to_send,
                &self.parsed_args.command_args,
            );
            self.modified_vars = Some(vars);
            self.modified_command_args = Some(args);
        }
        self.shell_info = Some(info);

        let mut env = self
            .modified_vars
            .clone()
            .unwrap_or_else(|| self.vars_to_send.clone());
        env.extend(self.client_vars.clone());
        for (key, value) in env {
            self.send(Command::Setenv { key, value }, Handler::FailIfNonzeroStatus);
        }

        self.enqueue_payload_jobs();

        if let Some(dir) = self.initial_directory.clone() {
            self.send(Command::Cd(dir), Handler::FailIfNonzeroStatus);
        }

        self.send(
            Command::Shell("python3 -V".to_string()),
            Handler::CheckForPython { lines: Vec::new() },
        );
    }

    fn enqueue_payload_jobs(&mut self) {
        if self.payloads.is_empty() {
            return;
        }
        let Some(packager) = self.packager.clone() else {
            tracing::warn!(
                depth = self.depth,
                "payloads configured but no packager; skipping upload"
            );
            return;
        };
        for job in group_payloads(&self.payloads) {
            match packager.package(&job.local_paths) {
                Ok(blob) => {
                    let encoded = BASE64.encode(&blob);
                    self.send(
                        Command::Write {
                            destination: job.destination,
                            content: encoded.clone(),
                        },
                        Handler::WriteOnSuccess { body: encoded },
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        depth = self.depth,
                        destination = %job.destination,
                        "payload packaging failed: {}; skipping",
                        error
                    );
                }
            }
        }
    }

    /// Decide between framing and a plain login from the Python probe
    fn finish_python_probe(&mut self, lines: Vec<String>, status: i32) {
        if status != 0 {
            tracing::info!(depth = self.depth, "no usable python3; plain login");
            self.send(Command::ExecLoginShell, Handler::FireAndForget);
            return;
        }
        let Some(version_line) = lines.iter().find(|line| line.starts_with("Python ")) else {
            self.fail(ConductorError::ProtocolViolation(format!(
                "no version in python probe output: {:?}",
                lines
            )));
            return;
        };
        let mut numbers = version_line
            .trim_start_matches("Python ")
            .split('.')
            .map(|part| part.trim().parse::<u32>());
        let (major, minor) = match (numbers.next(), numbers.next()) {
            (Some(Ok(major)), Some(Ok(minor))) => (major, minor),
            _ => {
                self.fail(ConductorError::ProtocolViolation(format!(
                    "bad python version line: {:?}",
                    version_line
                )));
                return;
            }
        };

        if !python_version_supported(major, minor) {
            tracing::info!(
                depth = self.depth,
                major,
                minor,
                "remote python too old for framing; plain login"
            );
            self.send(Command::ExecLoginShell, Handler::FireAndForget);
            return;
        }
        self.launch_framer();
    }

    /// Steps 6-8 of the launch sequence: inject the framer, save identity,
    /// log in under its process manager
    fn launch_framer(&mut self) {
        let source = framer_source(self.depth, self.verbose_framer);
        self.send(
            Command::RunPython(source.clone()),
            Handler::WriteOnSuccess { body: source },
        );

        self.send(
            Command::FramerSave(vec![
                ("dcsID".to_string(), self.dcs_id.clone()),
                ("sshargs".to_string(), self.sshargs.clone()),
                ("boolArgs".to_string(), self.bool_args.clone()),
                ("clientUniqueID".to_string(), self.client_unique_id.clone()),
            ]),
            Handler::FireAndForget,
        );

        let cwd = self
            .initial_directory
            .clone()
            .unwrap_or_else(|| "$HOME".to_string());
        let args = self
            .modified_command_args
            .clone()
            .unwrap_or_else(|| self.parsed_args.command_args.clone());
        self.send(
            Command::FramerLogin { cwd, args },
            Handler::FramerLogin { lines: Vec::new() },
        );
    }

    /// The framer answered `login` with the shell's PID
    fn finish_framer_login(&mut self, lines: Vec<String>, status: i32) {
        if status != 0 {
            self.fail(ConductorError::ProtocolViolation(format!(
                "framer login exited with status {}",
                status
            )));
            return;
        }
        let body = lines.join("");
        let pid = match body.trim().parse::<i32>() {
            Ok(pid) if pid > 0 => RemotePid(pid),
            _ => {
                self.fail(ConductorError::ProtocolViolation(format!(
                    "malformed login PID: {:?}",
                    body
                )));
                return;
            }
        };
        self.framed_pid = Some(pid);
        registry::register(&self.client_unique_id, self.self_ref.clone());
        tracing::info!(depth = self.depth, %pid, "framing established");

        if self.autopoll_enabled {
            self.send(Command::FramerAutopoll, Handler::FireAndForget);
        }
    }

    // --- serialization support (see serialize.rs) ------------------------

    pub(crate) fn snapshot_fields(&self) -> crate::serialize::ConductorRecord {
        crate::serialize::ConductorRecord {
            sshargs: self.sshargs.clone(),
            bool_args: self.bool_args.clone(),
            parsed_args: self.parsed_args.clone(),
            depth: self.depth,
            parent: self
                .parent
                .as_ref()
                .map(|parent| Box::new(parent.lock().unwrap().snapshot_fields())),
            dcs_id: self.dcs_id.clone(),
            client_unique_id: self.client_unique_id.clone(),
            vars_to_send: self.vars_to_send.clone(),
            client_vars: self.client_vars.clone(),
            modified_vars: self.modified_vars.clone(),
            modified_command_args: self.modified_command_args.clone(),
            initial_directory: self.initial_directory.clone(),
            should_inject_shell_integration: self.should_inject_shell_integration,
            payloads: self.payloads.clone(),
            framed_pid: self.framed_pid.map(|pid| pid.0),
            autopoll_enabled: self.autopoll_enabled,
            verbose_framer: self.verbose_framer,
        }
    }

    pub(crate) fn restore_fields(
        record: crate::serialize::ConductorRecord,
        parent: Option<SharedConductor>,
    ) -> SharedConductor {
        Arc::new_cyclic(|self_ref| {
            Mutex::new(Conductor {
                sshargs: record.sshargs,
                bool_args: record.bool_args,
                parsed_args: record.parsed_args,
                depth: record.depth,
                parent,
                self_ref: self_ref.clone(),
                dcs_id: record.dcs_id,
                client_unique_id: record.client_unique_id,
                vars_to_send: record.vars_to_send,
                client_vars: record.client_vars,
                modified_vars: record.modified_vars,
                modified_command_args: record.modified_command_args,
                initial_directory: record.initial_directory,
                should_inject_shell_integration: record.should_inject_shell_integration,
                payloads: record.payloads,
                framed_pid: record.framed_pid.map(RemotePid),
                state: State::Ground,
                queue: VecDeque::new(),
                background_jobs: BackgroundJobs::new(),
                autopoll: String::new(),
                autopoll_enabled: record.autopoll_enabled,
                verbose_framer: record.verbose_framer,
                shell_info: None,
                queue_writes_flag: true,
                writing: false,
                pending_writes: VecDeque::new(),
                restored: true,
                delegate: None,
                process_info: None,
                packager: None,
                injector: Arc::new(NullInjector),
            })
        })
    }
}
