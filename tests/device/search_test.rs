//! Device search against a fake device directory and scripted udevadm
//! and chmod outcomes.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use zeroize::Zeroizing;

use octavi_manager::cache::CredentialCache;
use octavi_manager::device::{find_and_grant, SearchOutcome};
use octavi_manager::runner::{CommandOutput, PrivilegedRunner, SudoExecutor};

const VENDOR: &str = "04D8";
const PRODUCT: &str = "E6D6";

#[derive(Default)]
struct ScriptState {
    responses: Mutex<VecDeque<CommandOutput>>,
    commands: Mutex<Vec<String>>,
}

struct ScriptedExecutor(Arc<ScriptState>);

impl SudoExecutor for ScriptedExecutor {
    fn execute(&self, command: &str, _password: &str) -> io::Result<CommandOutput> {
        self.0
            .commands
            .lock()
            .expect("commands lock")
            .push(command.to_owned());
        let response = self
            .0
            .responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or(ok(""));
        Ok(response)
    }
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(0),
        stdout: stdout.to_owned(),
        stderr: String::new(),
    }
}

fn fail(stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_owned(),
    }
}

/// `udevadm info` style output for a HID device with the given IDs.
fn devinfo(vendor: &str, product: &str) -> CommandOutput {
    ok(&format!(
        "E: DEVPATH=/devices/pci0000:00/usb1/1-2/1-2:1.0/0003:{vendor}:{product}.0007/hidraw/hidraw0\n\
         E: DEVNAME=/dev/hidraw0\n"
    ))
}

/// Fake `/dev` with the given hidraw nodes plus an unrelated entry.
fn fake_dev_dir(nodes: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    for node in nodes {
        fs::write(dir.path().join(node), "").expect("create node");
    }
    fs::write(dir.path().join("null"), "").expect("create node");
    dir
}

fn scripted_runner(responses: Vec<CommandOutput>) -> (PrivilegedRunner, Arc<ScriptState>) {
    let state = Arc::new(ScriptState {
        responses: Mutex::new(responses.into()),
        commands: Mutex::new(Vec::new()),
    });
    let runner = PrivilegedRunner::with_executor(
        CredentialCache::new(),
        Box::new(ScriptedExecutor(Arc::clone(&state))),
    );
    (runner, state)
}

fn commands(state: &ScriptState) -> Vec<String> {
    state.commands.lock().expect("commands lock").clone()
}

#[test]
fn partial_chmod_failure_reports_every_device() {
    let dev = fake_dev_dir(&["hidraw0", "hidraw1", "hidraw2"]);
    // Three matching queries, then chmod: ok, fail, ok.
    let (mut runner, _) = scripted_runner(vec![
        devinfo(VENDOR, PRODUCT),
        devinfo(VENDOR, PRODUCT),
        devinfo(VENDOR, PRODUCT),
        ok(""),
        fail("chmod: changing permissions: Operation not permitted\n"),
        ok(""),
    ]);
    let mut prompt = || Some(Zeroizing::new("pw".to_owned()));

    let outcome = find_and_grant(&mut runner, &mut prompt, dev.path(), VENDOR, PRODUCT)
        .expect("search should succeed");
    let SearchOutcome::Report(report) = outcome else {
        panic!("search should not be cancelled");
    };

    assert_eq!(report.scanned, 3);
    assert_eq!(report.fixes.len(), 3);
    assert!(report.fixes[0].granted);
    assert!(!report.fixes[1].granted);
    assert!(report.fixes[2].granted);
    assert!(report.fixes[1].detail.contains("Failed to apply chmod 0666"));
}

#[test]
fn only_matching_devices_are_fixed() {
    let dev = fake_dev_dir(&["hidraw0", "hidraw1"]);
    let (mut runner, state) = scripted_runner(vec![
        devinfo(VENDOR, PRODUCT),
        devinfo("046D", "C52B"),
        ok(""),
    ]);
    let mut prompt = || Some(Zeroizing::new("pw".to_owned()));

    let outcome = find_and_grant(&mut runner, &mut prompt, dev.path(), VENDOR, PRODUCT)
        .expect("search should succeed");
    let SearchOutcome::Report(report) = outcome else {
        panic!("search should not be cancelled");
    };

    assert_eq!(report.scanned, 2);
    assert_eq!(report.fixes.len(), 1);
    let issued = commands(&state);
    let chmods: Vec<&String> = issued.iter().filter(|c| c.starts_with("chmod")).collect();
    assert_eq!(chmods.len(), 1);
    assert!(chmods[0].contains("hidraw0"));
}

#[test]
fn id_match_is_case_insensitive() {
    let dev = fake_dev_dir(&["hidraw0"]);
    let (mut runner, _) = scripted_runner(vec![devinfo("04d8", "e6d6"), ok("")]);
    let mut prompt = || Some(Zeroizing::new("pw".to_owned()));

    let outcome = find_and_grant(&mut runner, &mut prompt, dev.path(), VENDOR, PRODUCT)
        .expect("search should succeed");
    let SearchOutcome::Report(report) = outcome else {
        panic!("search should not be cancelled");
    };
    assert_eq!(report.fixes.len(), 1);
}

#[test]
fn failed_query_skips_device_but_continues() {
    let dev = fake_dev_dir(&["hidraw0", "hidraw1"]);
    let (mut runner, _) = scripted_runner(vec![
        fail("udevadm: unknown device\n"),
        devinfo(VENDOR, PRODUCT),
        ok(""),
    ]);
    let mut prompt = || Some(Zeroizing::new("pw".to_owned()));

    let outcome = find_and_grant(&mut runner, &mut prompt, dev.path(), VENDOR, PRODUCT)
        .expect("search should succeed");
    let SearchOutcome::Report(report) = outcome else {
        panic!("search should not be cancelled");
    };

    assert_eq!(report.scanned, 2);
    assert_eq!(report.fixes.len(), 1);
    assert!(report.fixes[0].device.ends_with("hidraw1"));
}

#[test]
fn queries_run_in_device_name_order() {
    let dev = fake_dev_dir(&["hidraw2", "hidraw0", "hidraw1"]);
    let (mut runner, state) = scripted_runner(vec![
        devinfo("0000", "0000"),
        devinfo("0000", "0000"),
        devinfo("0000", "0000"),
    ]);
    let mut prompt = || Some(Zeroizing::new("pw".to_owned()));

    find_and_grant(&mut runner, &mut prompt, dev.path(), VENDOR, PRODUCT)
        .expect("search should succeed");

    let issued = commands(&state);
    assert_eq!(issued.len(), 3);
    assert!(issued[0].ends_with("hidraw0"));
    assert!(issued[1].ends_with("hidraw1"));
    assert!(issued[2].ends_with("hidraw2"));
}

#[test]
fn cancelled_prompt_changes_nothing() {
    let dev = fake_dev_dir(&["hidraw0"]);
    let (mut runner, state) = scripted_runner(vec![]);
    let mut prompt = || None::<Zeroizing<String>>;

    let outcome = find_and_grant(&mut runner, &mut prompt, dev.path(), VENDOR, PRODUCT)
        .expect("enumeration should succeed");
    assert_eq!(outcome, SearchOutcome::Cancelled);
    assert!(commands(&state).is_empty());
}
