//! Integration tests for shutdown sequencing and the console event loop

use rdm_core::{ConfigItem, ConfigSnapshot, ConfigStore, MountConfig};
use rdm_daemon::console::Console;
use rdm_daemon::daemon::{
    LivenessSweep, ShutdownChoice, ShutdownOutcome, ShutdownPrompt, run, shutdown_all,
};
use rdm_daemon::supervisor::mock::{MockLauncher, MockUnmounter};
use rdm_daemon::supervisor::{MountSupervisor, SupervisorError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

struct ScriptedPrompt {
    answers: VecDeque<ShutdownChoice>,
    asked: Vec<String>,
}

impl ScriptedPrompt {
    fn new(answers: impl IntoIterator<Item = ShutdownChoice>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl ShutdownPrompt for ScriptedPrompt {
    async fn choose(&mut self, name: &str, _error: &SupervisorError) -> ShutdownChoice {
        self.asked.push(name.to_string());
        self.answers.pop_front().unwrap_or(ShutdownChoice::Force)
    }
}

fn supervisor(
    temp: &TempDir,
    names: &[&str],
    unmounter: &MockUnmounter,
) -> (Arc<MountSupervisor>, MockLauncher) {
    let launcher = MockLauncher::new();
    let configs = names
        .iter()
        .map(|name| MountConfig {
            name: name.to_string(),
            mountpoint: temp.path().join(name).to_string_lossy().into_owned(),
            args: Vec::new(),
        })
        .collect();
    let supervisor = Arc::new(MountSupervisor::new(
        configs,
        Arc::new(launcher.clone()),
        Arc::new(unmounter.clone()),
    ));
    (supervisor, launcher)
}

async fn mount_all(supervisor: &MountSupervisor, names: &[&str]) {
    for name in names {
        supervisor.mount(name).await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_clean_shutdown_unmounts_everything() {
    let temp = TempDir::new().unwrap();
    let unmounter = MockUnmounter::succeeding();
    let (supervisor, _) = supervisor(&temp, &["b", "a"], &unmounter);
    mount_all(&supervisor, &["b", "a"]).await;

    let mut sweep = LivenessSweep::new(Arc::clone(&supervisor), Duration::from_secs(5));
    sweep.start();
    let mut prompt = ScriptedPrompt::new([]);

    let outcome = shutdown_all(&supervisor, &mut sweep, &mut prompt).await;

    assert_eq!(outcome, ShutdownOutcome::Completed);
    assert!(supervisor.mounted().is_empty());
    assert!(prompt.asked.is_empty());
    assert!(!sweep.is_running());
    // Sorted order
    assert_eq!(
        unmounter.called_paths(),
        vec![temp.path().join("a"), temp.path().join("b")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_force_answer_tears_down_failing_mounts() {
    let temp = TempDir::new().unwrap();
    let unmounter = MockUnmounter::failing();
    unmounter.script([true]);
    let (supervisor, launcher) = supervisor(&temp, &["a", "b", "c"], &unmounter);
    mount_all(&supervisor, &["a", "b", "c"]).await;

    let mut sweep = LivenessSweep::new(Arc::clone(&supervisor), Duration::from_secs(5));
    let mut prompt = ScriptedPrompt::new([ShutdownChoice::Force, ShutdownChoice::Force]);

    let outcome = shutdown_all(&supervisor, &mut sweep, &mut prompt).await;

    assert_eq!(outcome, ShutdownOutcome::Completed);
    assert_eq!(prompt.asked, vec!["b".to_string(), "c".to_string()]);
    assert!(supervisor.mounted().is_empty());
    assert_eq!(launcher.process_for("b").unwrap().terminate_count(), 1);
    assert_eq!(launcher.process_for("c").unwrap().terminate_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abort_keeps_remaining_mounts_and_restarts_sweep() {
    let temp = TempDir::new().unwrap();
    let unmounter = MockUnmounter::failing();
    unmounter.script([true]);
    let (supervisor, launcher) = supervisor(&temp, &["a", "b", "c"], &unmounter);
    mount_all(&supervisor, &["a", "b", "c"]).await;

    let mut sweep = LivenessSweep::new(Arc::clone(&supervisor), Duration::from_secs(5));
    sweep.start();
    let mut prompt = ScriptedPrompt::new([ShutdownChoice::Abort]);

    let outcome = shutdown_all(&supervisor, &mut sweep, &mut prompt).await;

    assert_eq!(outcome, ShutdownOutcome::Aborted);
    assert_eq!(prompt.asked, vec!["b".to_string()]);
    assert_eq!(
        supervisor.mounted_names(),
        vec!["b".to_string(), "c".to_string()]
    );
    assert!(launcher.process_for("b").unwrap().is_alive());
    assert_eq!(launcher.process_for("c").unwrap().terminate_count(), 0);
    assert!(sweep.is_running());
    sweep.stop().await;
}

fn store_with(temp: &TempDir, names: &[&str]) -> ConfigStore {
    let store = ConfigStore::new(temp.path().join("data/config.json"));
    let items = names
        .iter()
        .map(|name| ConfigItem::new(*name, temp.path().join(name).to_string_lossy()))
        .collect();
    store.save(&ConfigSnapshot::new(items)).unwrap();
    store
}

#[tokio::test]
async fn test_event_loop_runs_console_commands_until_quit() {
    let temp = TempDir::new().unwrap();
    let unmounter = MockUnmounter::succeeding();
    let (supervisor, launcher) = supervisor(&temp, &["a"], &unmounter);
    let store = store_with(&temp, &["a"]);

    let input: &[u8] = b"mount a\nlist\nbogus\nquit\n";
    let mut console = Console::new(Arc::clone(&supervisor), store.clone(), input, Vec::new());
    let (_quit_tx, quit_rx) = mpsc::channel(1);

    run(
        Arc::clone(&supervisor),
        store,
        &mut console,
        quit_rx,
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    let output = String::from_utf8(console.into_output()).unwrap();
    assert!(output.contains("Mounted a"), "{output}");
    assert!(output.contains("[x] a"), "{output}");
    assert!(output.contains("unknown command 'bogus'"), "{output}");
    assert_eq!(launcher.launch_count(), 1);
    assert!(supervisor.mounted().is_empty());
}

#[tokio::test]
async fn test_signal_after_console_eof_forces_shutdown() {
    let temp = TempDir::new().unwrap();
    let unmounter = MockUnmounter::failing();
    let (supervisor, launcher) = supervisor(&temp, &["a"], &unmounter);
    supervisor.mount("a").await.unwrap();
    let store = store_with(&temp, &["a"]);

    let input: &[u8] = b"";
    let mut console = Console::new(Arc::clone(&supervisor), store.clone(), input, Vec::new());
    let (quit_tx, quit_rx) = mpsc::channel(1);
    quit_tx.send(()).await.unwrap();

    run(
        Arc::clone(&supervisor),
        store,
        &mut console,
        quit_rx,
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    assert!(supervisor.mounted().is_empty());
    assert_eq!(launcher.process_for("a").unwrap().terminate_count(), 1);
}

#[tokio::test]
async fn test_console_abort_then_force() {
    let temp = TempDir::new().unwrap();
    let unmounter = MockUnmounter::failing();
    let (supervisor, _) = supervisor(&temp, &["a"], &unmounter);
    supervisor.mount("a").await.unwrap();
    let store = store_with(&temp, &["a"]);

    let input: &[u8] = b"quit\nmaybe\nabort\nlist\nquit\nforce\n";
    let mut console = Console::new(Arc::clone(&supervisor), store.clone(), input, Vec::new());
    let (_quit_tx, quit_rx) = mpsc::channel(1);

    run(
        Arc::clone(&supervisor),
        store,
        &mut console,
        quit_rx,
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    let output = String::from_utf8(console.into_output()).unwrap();
    // "maybe" is not an answer, so the question is repeated before "abort".
    assert_eq!(output.matches("[force/abort]").count(), 3, "{output}");
    assert!(output.contains("[x] a"), "{output}");
    assert!(supervisor.mounted().is_empty());
}

#[tokio::test]
async fn test_console_reload_and_toggle() {
    let temp = TempDir::new().unwrap();
    let unmounter = MockUnmounter::succeeding();
    let (supervisor, _) = supervisor(&temp, &[], &unmounter);
    let store = store_with(&temp, &["fresh"]);

    let input: &[u8] = b"toggle fresh\nreload\ntoggle fresh\ntoggle fresh\n";
    let mut console = Console::new(Arc::clone(&supervisor), store, input, Vec::new());

    while let Some(line) = console.next_line().await.unwrap() {
        console.handle_line(&line).await.unwrap();
    }
    assert!(console.is_closed());

    let output = String::from_utf8(console.into_output()).unwrap();
    assert!(output.contains("no configuration named 'fresh'"), "{output}");
    assert!(output.contains("Loaded 1 remote(s)"), "{output}");
    assert!(output.contains("Mounted fresh"), "{output}");
    assert!(output.contains("Unmounted fresh"), "{output}");
    assert!(!supervisor.is_mounted("fresh"));
}
