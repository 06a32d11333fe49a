
mod monitor;

use crate::common::{config, RecordingJournal};
use poolhit::channel::ScriptedChannel;
use poolhit::monitor::Monitor;
use serial_test::serial;

#[test]
#[serial]
fn test_logs_enabled_by_default() {
    assert!(poolhit::log::is_enabled());
}

#[test]
#[serial]
fn test_quiet_run_keeps_journal() {
    poolhit::log::disable();

    let mut channel = ScriptedChannel::new();
    let mut journal = RecordingJournal::default();
    let summary = Monitor::new(config("Toke", 2, "compact"), &mut channel, &mut journal)
        .arm()
        .unwrap()
        .run()
        .unwrap();

    poolhit::log::enable();

    assert_eq!(summary.iterations, 2);
    assert!(journal.text.ends_with("======================================\n\n"));
}
