use crate::common::{alloc_free_unmatched, config, RecordingJournal, STACK_HEADER};
use poolhit::channel::{ChannelError, ScriptedChannel};
use poolhit::evidence::{AllocationEvidence, DeallocationEvidence};
use poolhit::format::EvidenceFormat;
use poolhit::journal::Journal;
use poolhit::monitor::{CancelToken, Monitor, RunSummary};
use poolhit::Error;
use std::path::PathBuf;

#[test]
fn test_resume_once_per_iteration() {
    for n in [1, 3, 7] {
        let mut channel = ScriptedChannel::new();
        let mut journal = RecordingJournal::default();

        let summary = Monitor::new(config("Toke", n, "detailed"), &mut channel, &mut journal)
            .arm()
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(channel.count("g"), n as usize);
        assert_eq!(journal.opened, 1);
        assert_eq!(journal.closed, 1);
        assert_eq!(
            summary,
            RunSummary {
                iterations: n,
                unclassified: n,
                ..Default::default()
            }
        );
    }
}

#[test]
fn test_resume_count_does_not_depend_on_classification() {
    let mut channel = alloc_free_unmatched();
    let mut journal = RecordingJournal::default();

    let summary = Monitor::new(config("Toke", 3, "compact"), &mut channel, &mut journal)
        .arm()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(channel.count("g"), 3);
    assert_eq!(channel.count("gu"), 2);
    assert_eq!(channel.count("r rax"), 1);
    assert_eq!(channel.count("!stack -p"), 1);
    assert_eq!(summary.allocations, 1);
    assert_eq!(summary.deallocations, 1);
    assert_eq!(summary.unclassified, 1);
}

#[test]
fn test_detailed_snapshot_only_for_allocations() {
    let mut channel = alloc_free_unmatched();
    let mut journal = RecordingJournal::default();

    Monitor::new(config("Toke", 3, "detailed"), &mut channel, &mut journal)
        .arm()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(channel.count("kn"), 1);
    let history = channel.history();
    let kn = history.iter().position(|c| c == "kn").unwrap();
    let first_step_out = history.iter().position(|c| c == "gu").unwrap();
    assert!(kn < first_step_out);
}

#[test]
fn test_compact_snapshot_every_halt() {
    let mut channel = alloc_free_unmatched();
    let mut journal = RecordingJournal::default();

    Monitor::new(config("Toke", 3, "compact"), &mut channel, &mut journal)
        .arm()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(channel.count("kn"), 3);
}

#[test]
fn test_arm_sequence() {
    let mut cfg = config("Toke", 1, "detailed");
    cfg.engine_log = Some(PathBuf::from("/tmp/engine.log"));
    let mut channel = ScriptedChannel::new();
    let mut journal = RecordingJournal::default();

    Monitor::new(cfg, &mut channel, &mut journal)
        .arm()
        .unwrap()
        .run()
        .unwrap();

    let history = channel.history();
    assert_eq!(
        &history[..4],
        &[
            ".load cmkd".to_string(),
            ".logclose".to_string(),
            ".logopen /tmp/engine.log".to_string(),
            "ed nt!PoolHitTag 'ekoT'".to_string(),
        ]
    );
    assert_eq!(history.last().map(String::as_str), Some(".logclose"));
    assert_eq!(journal.path, Some(PathBuf::from("run.log")));
}

#[test]
fn test_no_engine_log_commands_by_default() {
    let mut channel = ScriptedChannel::new();
    let mut journal = RecordingJournal::default();

    Monitor::new(config("Toke", 1, "detailed"), &mut channel, &mut journal)
        .arm()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(channel.count(".logclose"), 0);
    assert_eq!(channel.count(".logopen run.log"), 0);
    assert_eq!(channel.count(".load cmkd"), 1);
}

#[test]
fn test_resume_after_arm() {
    let mut cfg = config("Toke", 2, "detailed");
    cfg.resume_after_arm = true;
    let mut channel = ScriptedChannel::new();
    let mut journal = RecordingJournal::default();

    Monitor::new(cfg, &mut channel, &mut journal)
        .arm()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(channel.count("g"), 3);
    assert_eq!(channel.history()[2], "g");
}

#[test]
fn test_channel_failure_leaves_journal_open() {
    // .load, trigger, the first halt (k 2, g) and k 2 of the second halt, then fail on resume
    let mut channel = ScriptedChannel::new().disconnect_after(5);
    let mut journal = RecordingJournal::default();

    let err = Monitor::new(config("Toke", 3, "detailed"), &mut channel, &mut journal)
        .arm()
        .unwrap()
        .run()
        .unwrap_err();

    assert!(matches!(err, Error::Channel(ChannelError::Disconnected(_))));
    assert!(err.is_fatal());
    assert_eq!(channel.count("g"), 1);
    assert_eq!(journal.opened, 1);
    assert_eq!(journal.closed, 0);
    assert!(journal.is_open());
    assert!(!journal.text.contains("======"));
}

#[test]
fn test_failure_while_arming() {
    let mut channel = ScriptedChannel::new().disconnect_after(0);
    let mut journal = RecordingJournal::default();

    let result = Monitor::new(config("Toke", 3, "detailed"), &mut channel, &mut journal).arm();

    assert!(matches!(
        result.err(),
        Some(Error::Channel(ChannelError::Disconnected(_)))
    ));
    assert_eq!(journal.opened, 0);
}

#[test]
fn test_cancelled_run_is_closed() {
    let mut channel = ScriptedChannel::new();
    let mut journal = RecordingJournal::default();
    let cancel = CancelToken::new();

    let armed = Monitor::new(config("Toke", 10, "detailed"), &mut channel, &mut journal)
        .with_cancel(cancel.clone())
        .arm()
        .unwrap();
    cancel.cancel();
    let summary = armed.run().unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.iterations, 0);
    assert_eq!(channel.count("g"), 0);
    assert_eq!(journal.closed, 1);
    assert!(journal.text.ends_with("======================================\n\n"));
}

struct AddressOnly;

impl EvidenceFormat for AddressOnly {
    fn allocation(&self, evidence: &AllocationEvidence) -> String {
        format!("A {}\n", evidence.return_value.join(""))
    }

    fn deallocation(&self, evidence: &DeallocationEvidence) -> String {
        format!("F {}\n", evidence.sites.len())
    }
}

#[test]
fn test_pluggable_format() {
    let mut channel = alloc_free_unmatched();
    let mut journal = RecordingJournal::default();

    Monitor::new(config("Toke", 3, "compact"), &mut channel, &mut journal)
        .with_format(Box::new(AddressOnly))
        .arm()
        .unwrap()
        .run()
        .unwrap();

    // no snapshot requested by the layout
    assert_eq!(channel.count("kn"), 0);
    assert!(journal
        .text
        .ends_with("gA rax=ffffb30c52a4e000\nF 1\n======================================\n\n"));
}

#[test]
fn test_unclassified_halts_are_not_journaled() {
    let mut channel = ScriptedChannel::new()
        .respond("k 2", [STACK_HEADER, "nt!KiSwapContext+0x76"])
        .respond("k 2", [STACK_HEADER, "nt!KiSwapThread+0x500"]);
    let mut journal = RecordingJournal::default();

    Monitor::new(config("Toke", 2, "detailed"), &mut channel, &mut journal)
        .arm()
        .unwrap()
        .run()
        .unwrap();

    assert!(!journal.text.contains(">>"));
    assert_eq!(channel.count("!process -1 0"), 0);
    assert_eq!(channel.count("!stack -p"), 0);
}
