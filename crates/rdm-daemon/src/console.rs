//! Line-based control surface on stdin/stdout
//!
//! Each configured remote can be listed with a checkmark derived from the
//! live-mount table, and mounted, unmounted, or toggled by name. The console
//! also answers the force/abort question when a mount refuses to go away
//! during shutdown.

use crate::daemon::shutdown::{ShutdownChoice, ShutdownPrompt};
use crate::daemon::watcher::reload_configs;
use crate::supervisor::{MountState, MountSupervisor, SupervisorError, UnmountOptions};
use anyhow::{Context, Result};
use rdm_core::ConfigStore;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::{debug, warn};

const HELP: &str = "\
Commands:
  list                 show configured remotes ([x] = mounted)
  mount <name>         mount a remote
  unmount <name>       unmount a remote
  force-unmount <name> unmount, stopping the mount process if needed
  toggle <name>        mount if unmounted, otherwise unmount
  reload               re-read the configuration file
  help                 show this help
  quit                 unmount everything and exit";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Mount(String),
    Unmount(String),
    ForceUnmount(String),
    Toggle(String),
    Reload,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next().map(str::to_string);
        if words.next().is_some() {
            return Err(format!("too many arguments for '{verb}'"));
        }

        let named = |make: fn(String) -> Self| {
            arg.clone()
                .map(make)
                .ok_or_else(|| format!("'{verb}' needs a remote name"))
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "list" | "ls" => Self::List,
            "mount" => named(Self::Mount)?,
            "unmount" | "umount" => named(Self::Unmount)?,
            "force-unmount" => named(Self::ForceUnmount)?,
            "toggle" => named(Self::Toggle)?,
            "reload" => Self::Reload,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '{other}' (try 'help')")),
        };
        Ok(Some(command))
    }
}

/// What the event loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console<R, W> {
    supervisor: Arc<MountSupervisor>,
    store: ConfigStore,
    lines: Lines<R>,
    out: W,
    closed: bool,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(supervisor: Arc<MountSupervisor>, store: ConfigStore, input: R, out: W) -> Self {
        Self {
            supervisor,
            store,
            lines: input.lines(),
            out,
            closed: false,
        }
    }

    /// Give back the output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    /// `true` once input reached end of file.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read the next line; `None` at end of input. Cancel safe.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let line = self
            .lines
            .next_line()
            .await
            .context("Failed to read console input")?;
        if line.is_none() {
            self.closed = true;
        }
        Ok(line)
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        match ConsoleCommand::parse(line) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => Ok(Flow::Continue),
            Err(message) => {
                self.say(&format!("error: {message}")).await?;
                Ok(Flow::Continue)
            }
        }
    }

    pub async fn execute(&mut self, command: ConsoleCommand) -> Result<Flow> {
        debug!("Console command: {:?}", command);
        match command {
            ConsoleCommand::List => self.list().await?,
            ConsoleCommand::Mount(name) => self.mount(&name).await?,
            ConsoleCommand::Unmount(name) => self.unmount(&name, UnmountOptions::clean()).await?,
            ConsoleCommand::ForceUnmount(name) => {
                self.unmount(&name, UnmountOptions::forced()).await?
            }
            ConsoleCommand::Toggle(name) => {
                if self.supervisor.is_mounted(&name) {
                    self.unmount(&name, UnmountOptions::clean()).await?
                } else {
                    self.mount(&name).await?
                }
            }
            ConsoleCommand::Reload => match reload_configs(&self.store, &self.supervisor) {
                Ok(count) => self.say(&format!("Loaded {count} remote(s)")).await?,
                Err(e) => self.say(&format!("error: {e:#}")).await?,
            },
            ConsoleCommand::Help => self.say(HELP).await?,
            ConsoleCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Print one line per configured remote, plus live mounts whose
    /// configuration has since been removed.
    pub async fn list(&mut self) -> Result<()> {
        let configs = self.supervisor.configs();
        let mut rows: Vec<(String, String, MountState)> = configs
            .iter()
            .map(|c| (c.name.clone(), c.mountpoint.clone(), self.supervisor.state(&c.name)))
            .collect();
        for info in self.supervisor.mounted() {
            if !configs.iter().any(|c| c.name == info.name) {
                rows.push((
                    info.name,
                    format!("{} (not in config)", info.mountpoint.display()),
                    MountState::Mounted,
                ));
            }
        }

        if rows.is_empty() {
            return self.say("No remotes configured").await;
        }

        let width = rows.iter().map(|(name, _, _)| name.len()).max().unwrap_or(0);
        let mut text = String::new();
        for (name, mountpoint, state) in rows {
            let mark = if state == MountState::Mounted { 'x' } else { ' ' };
            text.push_str(&format!("[{mark}] {name:<width$}  {mountpoint}"));
            if matches!(state, MountState::Starting | MountState::Unmounting) {
                text.push_str(&format!(" ({state})"));
            }
            text.push('\n');
        }
        self.say(text.trim_end()).await
    }

    async fn mount(&mut self, name: &str) -> Result<()> {
        match self.supervisor.mount(name).await {
            Ok(()) => self.say(&format!("Mounted {name}")).await,
            Err(e) => self.say(&format!("error: {e}")).await,
        }
    }

    async fn unmount(&mut self, name: &str, options: UnmountOptions) -> Result<()> {
        match self.supervisor.unmount(name, options).await {
            Ok(()) => self.say(&format!("Unmounted {name}")).await,
            Err(e @ SupervisorError::UnmountFailed { .. }) => {
                self.say(&format!("error: {e} (try 'force-unmount {name}')"))
                    .await
            }
            Err(e) => self.say(&format!("error: {e}")).await,
        }
    }

    async fn say(&mut self, text: &str) -> Result<()> {
        self.out
            .write_all(format!("{text}\n").as_bytes())
            .await
            .context("Failed to write console output")?;
        self.out.flush().await.context("Failed to flush console output")
    }
}

#[async_trait::async_trait]
impl<R, W> ShutdownPrompt for Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn choose(&mut self, name: &str, error: &SupervisorError) -> ShutdownChoice {
        loop {
            if self.closed {
                return ShutdownChoice::Force;
            }

            let question = format!("{error}. Force unmount of {name} or abort exit? [force/abort]");
            if let Err(e) = self.say(&question).await {
                warn!("{e:#}");
                return ShutdownChoice::Force;
            }

            match self.next_line().await {
                Ok(Some(answer)) => match answer.trim().to_ascii_lowercase().as_str() {
                    "f" | "force" => return ShutdownChoice::Force,
                    "a" | "abort" => return ShutdownChoice::Abort,
                    _ => continue,
                },
                Ok(None) => return ShutdownChoice::Force,
                Err(e) => {
                    warn!("{e:#}");
                    return ShutdownChoice::Force;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("list"), Ok(Some(ConsoleCommand::List)));
        assert_eq!(
            ConsoleCommand::parse("  mount gdrive "),
            Ok(Some(ConsoleCommand::Mount("gdrive".to_string())))
        );
        assert_eq!(
            ConsoleCommand::parse("force-unmount b2"),
            Ok(Some(ConsoleCommand::ForceUnmount("b2".to_string())))
        );
        assert_eq!(ConsoleCommand::parse("QUIT"), Ok(Some(ConsoleCommand::Quit)));
        assert_eq!(ConsoleCommand::parse("   "), Ok(None));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(ConsoleCommand::parse("mount").unwrap_err().contains("needs a remote"));
        assert!(ConsoleCommand::parse("mount a b").is_err());
        assert!(ConsoleCommand::parse("format c:").unwrap_err().contains("unknown"));
    }
}
