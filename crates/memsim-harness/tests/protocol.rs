//! End-to-end protocol scenarios driven through a session, the same way
//! an external client would.

use memsim_core::Session;
use memsim_harness::{Script, run_script};

fn drive(session: &mut Session, lines: &[&str]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| session.handle_line(line))
        .collect()
}

#[test]
fn flat_session_full_lifecycle() {
    let mut session = Session::new();
    let replies = drive(
        &mut session,
        &[
            "init memory 1024",
            "malloc 100",
            "malloc 50",
            "dump",
            "free 0",
            "free 2",
            "dump",
            "stats",
            "exit",
        ],
    );

    assert_eq!(replies[0], "memory initialized: 1024 bytes");
    assert_eq!(replies[1], "allocated block id=0 at address=0x0 size=100");
    assert_eq!(replies[2], "allocated block id=2 at address=0x64 size=50");
    assert_eq!(
        replies[3],
        "[0x0 - 0x63] USED (id=0)\n[0x64 - 0x95] USED (id=2)\n[0x96 - 0x3ff] FREE"
    );
    assert_eq!(replies[4], "block 0 freed");
    assert_eq!(replies[5], "block 2 freed");
    assert_eq!(replies[6], "[0x0 - 0x3ff] FREE");
    assert!(replies[7].contains("free memory: 1024"));
    assert!(replies[7].contains("external fragmentation: 1.00"));
    assert_eq!(replies[8], "bye");
    assert!(session.is_terminated());
}

#[test]
fn strategies_change_placement_mid_session() {
    let mut session = Session::new();
    drive(
        &mut session,
        &[
            "init memory 1000",
            "malloc 100", // id 0 at 0
            "malloc 10",  // id 2 at 100, guard
            "malloc 40",  // id 4 at 110
            "malloc 10",  // id 6 at 150, guard
            "free 0",     // 100-byte hole at 0
            "free 4",     // 40-byte hole at 110
        ],
    );

    // best_fit takes the 40-byte hole, worst_fit the big tail.
    let best = session.handle_line("set allocator best_fit").unwrap();
    assert_eq!(best, "allocator set to best_fit");
    let reply = session.handle_line("malloc 40").unwrap();
    assert!(reply.contains("address=0x6e"), "{reply}");

    session.handle_line("set allocator worst_fit").unwrap();
    let reply = session.handle_line("malloc 40").unwrap();
    assert!(reply.contains("address=0xa0"), "{reply}");

    session.handle_line("set allocator first_fit").unwrap();
    let reply = session.handle_line("malloc 40").unwrap();
    assert!(reply.contains("address=0x0"), "{reply}");
}

#[test]
fn buddy_session_rounds_splits_and_merges() {
    let mut session = Session::new();
    let replies = drive(
        &mut session,
        &[
            "init buddy 100",
            "malloc 40",
            "stats",
            "dump",
            "free 0",
            "dump",
        ],
    );

    assert_eq!(replies[0], "buddy memory initialized: 128 bytes");
    assert_eq!(replies[1], "allocated block id=0 at address=0x0 size=64");
    assert!(replies[2].contains("internal fragmentation: 24 bytes"));
    assert_eq!(replies[3], "[0x0 - 0x3f] USED (id=0)\n[0x40 - 0x7f] FREE");
    assert_eq!(replies[4], "block 0 freed");
    assert_eq!(replies[5], "[0x0 - 0x7f] FREE");
}

#[test]
fn out_of_memory_is_recoverable() {
    let mut session = Session::new();
    let replies = drive(
        &mut session,
        &["init memory 128", "malloc 4096", "malloc 64", "dump"],
    );
    assert!(replies[1].contains("OUT_OF_MEMORY"));
    // The failed request changed nothing; the next one succeeds at 0.
    assert_eq!(replies[2], "allocated block id=0 at address=0x0 size=64");
}

#[test]
fn error_tags_are_machine_matchable() {
    let mut session = Session::new();
    assert!(session.handle_line("malloc 1").unwrap().contains("NOT_INITIALIZED"));
    assert!(session.handle_line("blorp").unwrap().contains("UNKNOWN_COMMAND"));
    session.handle_line("init buddy 64");
    assert!(
        session
            .handle_line("set allocator first_fit")
            .unwrap()
            .contains("INVALID_MODE")
    );
    assert!(
        session
            .handle_line("set allocator middle_fit")
            .unwrap()
            .contains("UNKNOWN_STRATEGY")
    );
    assert!(session.handle_line("free 5").unwrap().contains("INVALID_ID"));
    assert!(session.handle_line("malloc 0").unwrap().contains("BAD_ARGUMENT"));
}

#[test]
fn cache_survives_traffic_but_not_reinit() {
    let mut session = Session::new();
    drive(
        &mut session,
        &["init memory 1024", "malloc 100", "free 0", "malloc 50"],
    );
    // Offsets repeat across malloc/free, so hits accumulate.
    let cache = session.handle_line("cache").unwrap();
    assert!(cache.contains("L1: accesses=3 hits=2 misses=1"), "{cache}");

    session.handle_line("init memory 1024");
    let cache = session.handle_line("cache").unwrap();
    assert!(cache.contains("L1: accesses=0 hits=0 misses=0"), "{cache}");
}

#[test]
fn mode_switch_by_reinit() {
    let mut session = Session::new();
    session.handle_line("init memory 512");
    session.handle_line("malloc 10");
    let out = session.handle_line("init buddy 512").unwrap();
    assert_eq!(out, "buddy memory initialized: 512 bytes");
    // Old flat block ids are gone with the old arena.
    assert!(session.handle_line("free 0").unwrap().contains("INVALID_ID"));
    // And back again.
    session.handle_line("init memory 64");
    assert_eq!(
        session.handle_line("malloc 64").unwrap(),
        "allocated block id=0 at address=0x0 size=64"
    );
}

#[test]
fn scripted_session_matches_interactive_behavior() {
    let script = Script::from_json(
        r#"{
            "version": "v1",
            "name": "cross_check",
            "steps": [
                {"send": "init buddy 64", "expect": "buddy memory initialized: 64 bytes"},
                {"send": "malloc 16", "expect": "allocated block id=0 at address=0x0 size=16"},
                {"send": "malloc 16", "expect": "allocated block id=1 at address=0x10 size=16"},
                {"send": "free 0", "expect": "block 0 freed"},
                {"send": "free 1", "expect": "block 1 freed"},
                {"send": "dump", "expect": "[0x0 - 0x3f] FREE"},
                {"send": "cache", "expect_contains": "L2:"}
            ]
        }"#,
    )
    .expect("valid script");

    let results = run_script(&script);
    for result in &results {
        assert!(result.passed, "step `{}` got `{}`", result.command, result.actual);
    }
}
