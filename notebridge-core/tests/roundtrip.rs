//! Serialisation round trips for persisted `notebridge-core` types.
//!
//! Each `#[case]` is isolated; no shared state.

use std::path::Path;

use notebridge_core::{
    Direction, Mtime, ResolutionPolicy, SyncConfig, SyncState, TrackedFileState,
};
use rstest::rstest;

fn populated_state() -> SyncState {
    let mut state = SyncState::default();
    let org = Path::new("/n/org/inbox.org");
    let md = Path::new("/n/md/inbox.md");
    let stamp = Mtime {
        secs: 1_705_300_000,
        nanos: 250_000_000,
    };
    state.record(org, TrackedFileState::new(stamp, "sha256:aa".into(), md));
    state.record(md, TrackedFileState::new(stamp, "sha256:bb".into(), org));
    state.register_id("5f1c3b9e-0000-4000-8000-000000000001", "inbox");
    state
}

#[rstest]
#[case::empty(SyncState::default())]
#[case::populated(populated_state())]
fn state_json_roundtrip(#[case] state: SyncState) {
    let json = serde_json::to_string_pretty(&state).expect("serialize");
    let back: SyncState = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, state);
}

#[test]
fn state_json_tolerates_missing_sections_and_nanos() {
    let json = r#"{"files":{"/a.org":{"mtime":5,"hash":"sha256:x","paired_with":"/a.md"}}}"#;
    let state: SyncState = serde_json::from_str(json).expect("deserialize");
    assert!(state.id_map.is_empty());
    let entry = state.get(Path::new("/a.org")).expect("entry");
    assert_eq!(entry.mtime(), Mtime { secs: 5, nanos: 0 });
}

#[rstest]
#[case(ResolutionPolicy::LastWriteWins, "last-write-wins")]
#[case(ResolutionPolicy::UseOrg, "use-org")]
#[case(ResolutionPolicy::UseMarkdown, "use-markdown")]
fn policy_yaml_uses_kebab_case(#[case] policy: ResolutionPolicy, #[case] expected: &str) {
    let mut cfg = SyncConfig::new("/o", "/m");
    cfg.resolution_strategy = policy;
    let yaml = serde_yaml::to_string(&cfg).expect("serialize");
    assert!(yaml.contains(expected), "yaml was: {yaml}");
    let back: SyncConfig = serde_yaml::from_str(&yaml).expect("deserialize");
    assert_eq!(back, cfg);
}

#[rstest]
#[case("org", Direction::Org)]
#[case("markdown", Direction::Markdown)]
#[case("obsidian", Direction::Markdown)]
#[case("last-write-wins", Direction::LastWriteWins)]
#[case("skip", Direction::Skip)]
fn direction_strings_parse(#[case] raw: &str, #[case] expected: Direction) {
    assert_eq!(raw.parse::<Direction>().expect("parse"), expected);
}
