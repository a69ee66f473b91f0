use pretty_assertions::assert_eq;
use tender_core::{render, ChapterAccumulator, OutlineNode, SectionState};

fn outline() -> Vec<OutlineNode> {
    vec![
        OutlineNode::new("1", "Company Profile", 1).with_children(vec![
            OutlineNode::new("1.1", "History", 2),
            OutlineNode::new("1.2", "Certifications", 2),
        ]),
        OutlineNode::new("2", "Technical Approach", 1),
    ]
}

#[test]
fn outline_nodes_render_depth_first_with_empty_pending_sections() {
    let mut acc = ChapterAccumulator::new();
    acc.on_section_start("1.2", None);
    acc.on_fragment("1.2", "ISO 9001");

    let tree = render(&outline(), &acc);
    let rows: Vec<_> = tree
        .sections
        .iter()
        .map(|s| (s.id.as_str(), s.level, s.body.as_str(), s.state))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("1", 1, "", SectionState::Pending),
            ("1.1", 2, "", SectionState::Pending),
            ("1.2", 2, "ISO 9001", SectionState::Streaming),
            ("2", 1, "", SectionState::Pending),
        ]
    );
}

#[test]
fn sections_outside_the_outline_are_appended_in_first_seen_order() {
    let mut acc = ChapterAccumulator::new();
    acc.on_section_start("appendix-b", Some("Appendix B"));
    acc.on_fragment("2", "Agile delivery.");
    acc.on_fragment("appendix-a", "Rates");
    acc.on_section_end("2");

    let tree = render(&outline(), &acc);
    let tail: Vec<_> = tree
        .sections
        .iter()
        .filter(|s| !s.in_outline)
        .map(|s| (s.id.as_str(), s.title.as_str()))
        .collect();
    assert_eq!(
        tail,
        vec![("appendix-b", "Appendix B"), ("appendix-a", "appendix-a")]
    );
    assert_eq!(tree.section("2").unwrap().state, SectionState::Done);
}

#[test]
fn empty_outline_falls_back_to_buffers() {
    let mut acc = ChapterAccumulator::new();
    acc.on_section_start("b", Some("Second"));
    acc.on_section_start("a", Some("First"));
    acc.on_fragment("a", "alpha");

    let tree = acc.materialize(&[]);
    let ids: Vec<_> = tree.sections.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(tree.body_text(), "alpha");
}

#[test]
fn markdown_uses_outline_levels_as_headings() {
    let mut acc = ChapterAccumulator::new();
    acc.on_fragment("1", "We are a team.");
    acc.on_fragment("1.1", "Since 1999.");
    let tree = render(&outline()[..1], &acc);
    assert_eq!(
        tree.to_markdown(),
        "# Company Profile\n\nWe are a team.\n\n## History\n\nSince 1999.\n\n## Certifications\n"
    );
}

#[test]
fn rendering_does_not_mutate_buffers() {
    let mut acc = ChapterAccumulator::new();
    acc.on_fragment("1", "x");
    let before = acc.clone();
    let first = acc.materialize(&outline());
    let second = acc.materialize(&outline());
    assert_eq!(first, second);
    assert_eq!(acc, before);
}
