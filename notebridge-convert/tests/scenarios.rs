use notebridge_convert::{
    convert, is_uuid, markdown_to_org, note_id, org_to_markdown, ConvertError,
};
use notebridge_core::{IdMap, Side};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn no_ids() -> IdMap {
    IdMap::new()
}

#[test]
fn task_with_priority_and_schedule_both_ways() {
    let org = "** TODO [#A] Write tests\nSCHEDULED: <2024-01-15>";
    let md = "## - [ ] Write tests\n⏳ 2024-01-15\nPriority: high";
    assert_eq!(org_to_markdown(org, &no_ids()).expect("org").text, md);
    assert_eq!(markdown_to_org(md, &no_ids()).expect("md").text, org);
}

#[test]
fn hint_callout_canonicalises_to_tip() {
    let out = markdown_to_org("> [!hint]\n> Body", &no_ids()).expect("md");
    assert_eq!(out.text, "#+BEGIN_TIP\nBody\n#+END_TIP");
}

#[test]
fn unresolved_wikilink_mints_a_new_id() {
    let ids = IdMap::from([("known".to_string(), "Known".to_string())]);
    let out = markdown_to_org("[[Unknown Note]]", &ids).expect("md");
    let id = out.minted.get("Unknown Note").expect("minted id");
    assert!(is_uuid(id), "not a uuid: {id}");
    assert!(!ids.contains_key(id));
    assert_eq!(out.text, format!("[[id:{id}]]"));
}

#[test]
fn front_matter_becomes_drawer_and_keywords() {
    let md = "---\nid: abc\ntitle: \"Re: planning\"\naliases: [Plan]\ntags: [work]\n---\n\n# Agenda\n";
    let out = markdown_to_org(md, &no_ids()).expect("md");
    assert_eq!(
        out.text,
        ":PROPERTIES:\n:ID: abc\n:ROAM_ALIASES: \"Plan\"\n:END:\n#+title: Re: planning\n#+filetags: :work:\n\n* Agenda\n"
    );
    let back = org_to_markdown(&out.text, &no_ids()).expect("org");
    assert_eq!(
        back.text,
        "---\nid: abc\ntitle: \"Re: planning\"\naliases:\n  - Plan\ntags:\n  - work\n---\n\n# Agenda\n"
    );
}

#[rstest]
#[case("note", "NOTE")]
#[case("abstract", "ABSTRACT")]
#[case("summary", "ABSTRACT")]
#[case("tldr", "ABSTRACT")]
#[case("info", "INFO")]
#[case("todo", "TODO")]
#[case("tip", "TIP")]
#[case("important", "TIP")]
#[case("success", "SUCCESS")]
#[case("check", "SUCCESS")]
#[case("done", "SUCCESS")]
#[case("question", "QUESTION")]
#[case("help", "QUESTION")]
#[case("faq", "QUESTION")]
#[case("warning", "WARNING")]
#[case("caution", "WARNING")]
#[case("attention", "WARNING")]
#[case("failure", "FAILURE")]
#[case("fail", "FAILURE")]
#[case("missing", "FAILURE")]
#[case("danger", "DANGER")]
#[case("error", "DANGER")]
#[case("bug", "BUG")]
#[case("example", "EXAMPLE")]
#[case("quote", "QUOTE")]
#[case("cite", "QUOTE")]
fn every_callout_alias_maps_to_its_family(#[case] alias: &str, #[case] block: &str) {
    let md = format!("> [!{alias}]\n> Content");
    let out = markdown_to_org(&md, &no_ids()).expect("md");
    assert_eq!(out.text, format!("#+BEGIN_{block}\nContent\n#+END_{block}"));
}

#[rstest]
#[case("NOTE", "> [!note]\n> Content")]
#[case("example", "> [!example]\n> Content")]
#[case("QUOTE", "> Content")]
#[case("Sidebar", "> [!sidebar]\n> Content")]
fn org_blocks_become_callouts(#[case] name: &str, #[case] md: &str) {
    let org = format!("#+BEGIN_{name}\nContent\n#+END_{name}");
    assert_eq!(org_to_markdown(&org, &no_ids()).expect("org").text, md);
}

#[test]
fn links_inside_code_are_untouched() {
    let md = "```\n[[Not A Link]]\n```";
    let out = markdown_to_org(md, &no_ids()).expect("md");
    assert_eq!(out.text, "#+BEGIN_SRC\n[[Not A Link]]\n#+END_SRC");
    assert!(out.minted.is_empty());
}

#[test]
fn convert_dispatches_on_the_source_side() {
    let from_org = convert(Side::Org, "* Title", &no_ids()).expect("org");
    let from_md = convert(Side::Markdown, "# Title", &no_ids()).expect("md");
    assert_eq!(from_org.text, "# Title");
    assert_eq!(from_md.text, "* Title");
}

#[test]
fn structural_errors_are_reported() {
    assert!(matches!(
        org_to_markdown(":PROPERTIES:\n:ID: x\n", &no_ids()),
        Err(ConvertError::UnterminatedDrawer { .. })
    ));
    assert!(matches!(
        markdown_to_org("---\ntitle: [oops\n---\nbody", &no_ids()),
        Err(ConvertError::FrontMatter(_))
    ));
}

#[test]
fn note_ids_come_from_headers() {
    let org = ":PROPERTIES:\n:ID: 550e8400-e29b-41d4-a716-446655440000\n:END:\n#+title: x\n";
    assert_eq!(
        note_id(org, Side::Org).as_deref(),
        Some("550e8400-e29b-41d4-a716-446655440000")
    );
    assert_eq!(note_id("# no header", Side::Markdown), None);
}
