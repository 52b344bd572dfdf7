use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("haunt").expect("Binary exists");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("scan").and(predicate::str::contains("report")));
}

#[test]
fn scan_rejects_missing_path() {
    let mut cmd = Command::cargo_bin("haunt").expect("Binary exists");
    cmd.arg("scan").arg("/nonexistent/haunt/input");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("neither a file nor a directory"));
}

#[test]
fn scan_of_folder_without_allowed_files_reports_empty_selection() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.md"), "# nothing to scan").unwrap();

    let mut cmd = Command::cargo_bin("haunt").expect("Binary exists");
    cmd.arg("scan")
        .arg(dir.path())
        .env("HAUNT_SERVER_URL", "http://127.0.0.1:9");
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("\"uploaded\": false"))
        .stdout(predicate::str::contains("no files selected"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use haunt::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Scan {
            path: std::path::PathBuf::from("dummy.py"),
            config: Some(std::path::PathBuf::from("dummy.yaml")),
            summary: None,
        },
    };

    let result = run(cli).await;
    assert!(result.is_err(), "missing config file should fail the run");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
