//! Line-oriented operator shell.
//!
//! Commands are parsed by a pure function and executed on the cooperative
//! loop. Nothing here talks to the engine directly except through the
//! `Controller` and the server-restart path.

use crate::core::arbiter::RequestArbiter;
use crate::core::controller::Controller;
use crate::core::engine::{start_server_with_retry, EngineCallback, TransferEngine};
use crate::core::error::CoreError;
use crate::core::registry::{PeerRegistry, PendingRequestRegistry};
use crate::ui::presenter::Presenter;
use crate::utils::format::{format_bytes, short_id};
use crate::utils::log_buffer::LogBuffer;
use crate::utils::sos::SignalOfStop;
use crate::workers::settings::{ConfigEditor, SettingValue};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Recognised shell commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `send <file> <peer-id>`
    Send { file_path: String, peer_id: String },
    /// `list` — known peers.
    List,
    /// `requests` — pending inbound offers.
    Requests,
    /// `accept [task-id]` — task id may be omitted when exactly one offer
    /// is pending.
    Accept { task_id: Option<String> },
    /// `reject [task-id]`
    Reject { task_id: Option<String> },
    /// `logs [n]` — recent log entries (default 20).
    Logs { count: usize },
    /// `config [show]` / `config set <key> <value>` — view or edit the
    /// engine configuration file.
    Config(ConfigAction),
    /// `reload` — restart the engine server.
    Reload,
    Help,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    Show,
    Set { key: String, value: String },
}

pub const COMMAND_HELP: &[(&str, &str)] = &[
    ("send <file> <peer-id>", "Queue a file transfer to a peer"),
    ("list", "Show active peers"),
    ("requests", "Show pending inbound requests"),
    ("accept [task-id]", "Accept a pending request"),
    ("reject [task-id]", "Reject a pending request"),
    ("logs [n]", "Show recent log entries"),
    ("config [show]", "Show the engine configuration"),
    ("config set <key> <val>", "Edit the engine configuration"),
    ("reload", "Restart the engine server"),
    ("help", "Show this help"),
    ("exit", "Quit"),
];

/// Parse one input line. Empty input is `Ok(None)`; an unknown command or
/// bad arity is `Err` with a usage message.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let Some(name) = parts.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();
    let command = match name.to_lowercase().as_str() {
        "send" => match args.as_slice() {
            [file_path, peer_id] => Command::Send {
                file_path: file_path.to_string(),
                peer_id: peer_id.to_string(),
            },
            _ => return Err("usage: send <file> <peer-id>".to_string()),
        },
        "list" => Command::List,
        "requests" => Command::Requests,
        "accept" => Command::Accept {
            task_id: args.first().map(|s| s.to_string()),
        },
        "reject" => Command::Reject {
            task_id: args.first().map(|s| s.to_string()),
        },
        "logs" => {
            let count = match args.first() {
                Some(n) => n
                    .parse::<usize>()
                    .map_err(|_| "usage: logs [n]".to_string())?,
                None => 20,
            };
            Command::Logs { count }
        }
        "config" => match args.as_slice() {
            [] | ["show"] => Command::Config(ConfigAction::Show),
            ["set", key, value] => Command::Config(ConfigAction::Set {
                key: key.to_string(),
                value: value.to_string(),
            }),
            _ => return Err("usage: config [show] | config set <key> <value>".to_string()),
        },
        "reload" => Command::Reload,
        "help" => Command::Help,
        "exit" | "quit" => Command::Exit,
        other => return Err(format!("unknown command: '{other}' (try 'help')")),
    };
    Ok(Some(command))
}

/// Map an editable key to the engine config section it lives in.
fn config_section(key: &str) -> Option<&'static str> {
    match key {
        "mode" | "port" => Some("server"),
        "save_path" => Some("storage"),
        _ => None,
    }
}

pub struct Shell {
    controller: Arc<Controller>,
    peers: Arc<PeerRegistry>,
    requests: Arc<PendingRequestRegistry>,
    arbiter: Arc<RequestArbiter>,
    engine: Arc<dyn TransferEngine>,
    callback: Arc<dyn EngineCallback>,
    engine_config: PathBuf,
    log_buffer: LogBuffer,
    sos: SignalOfStop,
}

impl Shell {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        controller: Arc<Controller>,
        peers: Arc<PeerRegistry>,
        requests: Arc<PendingRequestRegistry>,
        arbiter: Arc<RequestArbiter>,
        engine: Arc<dyn TransferEngine>,
        callback: Arc<dyn EngineCallback>,
        engine_config: PathBuf,
        log_buffer: LogBuffer,
        sos: SignalOfStop,
    ) -> Self {
        Self {
            controller,
            peers,
            requests,
            arbiter,
            engine,
            callback,
            engine_config,
            log_buffer,
            sos,
        }
    }

    pub fn print_banner(&self, identity: &str) {
        println!("droplink — P2P transfer console");
        println!("identity: {identity}");
        println!("type 'help' for commands");
    }

    pub fn print_prompt(&self, identity: &str) {
        use std::io::Write;
        let pending = self.requests.len();
        if pending > 0 {
            print!("droplink ({identity}) [{pending} pending] > ");
        } else {
            print!("droplink ({identity}) > ");
        }
        let _ = std::io::stdout().flush();
    }

    /// Execute one input line. Errors print to the terminal; only `exit`
    /// cancels the stop signal.
    pub async fn execute(&self, line: &str, presenter: &mut dyn Presenter) {
        let command = match parse_command(line) {
            Ok(Some(command)) => command,
            Ok(None) => return,
            Err(usage) => {
                println!("{usage}");
                return;
            }
        };
        match command {
            Command::Send { file_path, peer_id } => {
                match self.controller.enqueue_send(&file_path, &peer_id) {
                    Ok(task_id) => presenter.on_task_added(&task_id, &file_path),
                    Err(e) => println!("error: {e}"),
                }
            }
            Command::List => self.cmd_list(),
            Command::Requests => self.cmd_requests(),
            Command::Accept { task_id } => self.cmd_resolve(task_id, true),
            Command::Reject { task_id } => self.cmd_resolve(task_id, false),
            Command::Logs { count } => self.cmd_logs(count),
            Command::Config(action) => self.cmd_config(action).await,
            Command::Reload => self.cmd_reload().await,
            Command::Help => {
                for (usage, description) in COMMAND_HELP {
                    println!("  {usage:24} {description}");
                }
            }
            Command::Exit => {
                info!(event = "operator_exit", "Exit requested");
                self.sos.cancel();
            }
        }
    }

    fn cmd_list(&self) {
        let peers = self.peers.snapshot();
        if peers.is_empty() {
            println!("no peers found");
            return;
        }
        println!("{:10} {:20} {:22} {}", "ID", "NAME", "ADDRESS", "TRANSPORT");
        for (id, peer) in &peers {
            println!(
                "{:10} {:20} {:22} {}",
                short_id(id),
                peer.name,
                format!("{}:{}", peer.ip, peer.port),
                peer.transport
            );
        }
    }

    fn cmd_requests(&self) {
        let requests = self.requests.snapshot();
        if requests.is_empty() {
            println!("no pending requests");
            return;
        }
        println!("{:24} {:28} {:12} {}", "TASK", "FILE", "SIZE", "FROM");
        for (task_id, request) in &requests {
            println!(
                "{:24} {:28} {:12} {} ({})",
                task_id,
                request.filename,
                format_bytes(request.filesize),
                request.sender_name,
                request.sender_device
            );
        }
        if self.requests.arbitration_active() {
            println!("the sender is blocked on your decision");
        }
    }

    /// Resolve a pending request. With no task id, falls back to the single
    /// pending request if there is exactly one.
    fn cmd_resolve(&self, task_id: Option<String>, accepted: bool) {
        let task_id = match task_id {
            Some(id) => id,
            None => {
                let pending = self.controller.pending_requests();
                match pending.len() {
                    1 => pending.keys().next().cloned().unwrap_or_default(),
                    0 => {
                        println!("no pending requests");
                        return;
                    }
                    _ => {
                        println!("several requests pending, specify a task id");
                        return;
                    }
                }
            }
        };
        let verdict = if accepted { "accepted" } else { "rejected" };
        let result = if accepted {
            self.controller.accept(&task_id)
        } else {
            self.controller.reject(&task_id)
        };
        match result {
            Ok(()) => println!("{verdict} {task_id}"),
            Err(CoreError::RegistryMiss { .. }) => {
                if self.arbiter.take_prompt_cancelled() {
                    println!(
                        "request '{task_id}': {}, auto-rejected",
                        CoreError::ArbitrationTimeout(self.arbiter.timeout())
                    );
                } else {
                    println!("no pending request '{task_id}'");
                }
            }
            Err(e) => println!("error: {e}"),
        }
    }

    fn cmd_logs(&self, count: usize) {
        let entries = self.log_buffer.entries();
        let skip = entries.len().saturating_sub(count);
        for entry in entries.iter().skip(skip) {
            println!("{} {:5} {}", entry.timestamp, entry.level, entry.message);
        }
    }

    /// View or patch the engine config file. Edits go through the
    /// comment-preserving editor and trigger a server reload on success.
    async fn cmd_config(&self, action: ConfigAction) {
        match action {
            ConfigAction::Show => match std::fs::read_to_string(&self.engine_config) {
                Ok(content) => {
                    println!("-- {} --", self.engine_config.display());
                    println!("{}", content.trim_end());
                }
                Err(e) => println!("cannot read {}: {e}", self.engine_config.display()),
            },
            ConfigAction::Set { key, value } => {
                let Some(section) = config_section(&key) else {
                    println!("unknown config key '{key}' (known: mode, port, save_path)");
                    return;
                };
                let value = if key == "port" {
                    match value.parse::<i64>() {
                        Ok(port) => SettingValue::Int(port),
                        Err(_) => {
                            println!("port must be an integer");
                            return;
                        }
                    }
                } else {
                    SettingValue::Str(value)
                };
                let editor = ConfigEditor::new(self.engine_config.clone());
                match editor.update_key(section, &key, &value) {
                    Ok(message) => {
                        println!("{message}");
                        self.cmd_reload().await;
                    }
                    Err(e) => println!("config edit failed: {e}"),
                }
            }
        }
    }

    async fn cmd_reload(&self) {
        println!("restarting engine server...");
        match start_server_with_retry(&self.engine, &self.engine_config, self.callback.clone())
            .await
        {
            Ok(()) => println!("server reloaded"),
            Err(e) => println!("reload failed: {e}"),
        }
    }
}
