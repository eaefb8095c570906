use agent_session::sanitizer::MAX_TAG_ARGUMENT_CHARS;
use agent_session::{sanitize, StreamSanitizer};
use pretty_assertions::assert_eq;

const SAMPLES: &[&str] = &[
    "Done. [EDIT_FILE:a.py]",
    "I'll update it.\n\n[EDIT_FILE:src/app.py]\n```python\nprint(1)\n```",
    "Run the tests: [RUN_COMMAND: `pytest -q`] then report.",
    "[EDIT_FILE:a.py], as shown above",
    "Handing over [→JUNIOR] .",
    "See [the docs] and [EDIT] for details [DONE]",
    "Shipped it! [MISSION ACCOMPLISHED]",
    "Looking this up [SEARCH:rust async traits] now.\n\n\n\nMore soon [→RESEARCH]",
    "[READ_URL:https://example.com\nnot a tag",
    "ok [ED[DONE]IT_FILE:a.py] end",
    "values [[DONE]",
    "The last entry is arr[",
];

fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(index, _)| index)
        .chain(std::iter::once(text.len()))
        .collect()
}

#[test]
fn partial_tag_is_hidden_until_completed() {
    let mut sanitizer = StreamSanitizer::new();

    sanitizer.push("Done. [EDIT_FI");
    assert_eq!(sanitizer.display(), "Done.");
    assert!(sanitizer.has_pending_tag());

    sanitizer.push("LE:a.py]");
    assert_eq!(sanitizer.display(), "Done.");
    assert!(!sanitizer.has_pending_tag());
}

#[test]
fn no_prefix_of_a_streamed_tag_is_ever_displayed() {
    let full = "Done. [EDIT_FILE:a.py]";
    for end in char_boundaries(full) {
        let mut sanitizer = StreamSanitizer::new();
        sanitizer.push(&full[..end]);
        let display = sanitizer.display();
        assert!(
            !display.contains('['),
            "prefix {:?} leaked {:?}",
            &full[..end],
            display
        );
    }
}

#[test]
fn snapshot_is_independent_of_chunking() {
    for sample in SAMPLES {
        let expected = sanitize(sample);

        for split in char_boundaries(sample) {
            let mut sanitizer = StreamSanitizer::new();
            sanitizer.push(&sample[..split]);
            sanitizer.push(&sample[split..]);
            assert_eq!(
                sanitizer.final_snapshot(),
                expected,
                "split at {split} of {sample:?}"
            );
        }

        let mut per_char = StreamSanitizer::new();
        for ch in sample.chars() {
            per_char.push(ch.encode_utf8(&mut [0; 4]));
        }
        assert_eq!(per_char.final_snapshot(), expected, "per-char feed of {sample:?}");
    }
}

#[test]
fn sanitizing_display_text_again_changes_nothing() {
    for sample in SAMPLES {
        let once = sanitize(sample).display;
        assert_eq!(sanitize(&once).display, once, "sample {sample:?}");
    }
}

#[test]
fn directive_spliced_together_by_a_removal_is_removed_too() {
    assert_eq!(sanitize("ok [ED[DONE]IT_FILE:a.py] end").display, "ok end");

    let mut sanitizer = StreamSanitizer::new();
    for chunk in ["ok [ED", "[DONE]", "IT_FI", "LE:a.py] end"] {
        sanitizer.push(chunk);
        assert!(!sanitizer.display().contains("IT_FI"), "after {chunk:?}");
    }
    assert_eq!(sanitizer.display(), "ok end");
}

#[test]
fn bracket_left_before_a_removed_directive_survives_the_end_of_the_stream() {
    let mut sanitizer = StreamSanitizer::new();
    sanitizer.push("values [[DONE]");

    assert_eq!(sanitizer.display(), "values");
    assert_eq!(sanitizer.final_snapshot().display, "values [");
    assert_eq!(sanitize("values [").display, "values [");
}

#[test]
fn unresolved_tail_is_shown_once_the_stream_ends() {
    let mut sanitizer = StreamSanitizer::new();
    sanitizer.push("Done. [EDIT_FI");

    assert_eq!(sanitizer.display(), "Done.");
    assert_eq!(sanitizer.final_snapshot().display, "Done. [EDIT_FI");
    assert_eq!(sanitize("The last entry is arr[").display, "The last entry is arr[");
}

#[test]
fn search_handoff_markers_are_removed() {
    assert_eq!(sanitize("Passing this on [→SEARCH]").display, "Passing this on");
    assert_eq!(
        sanitize("[→FILE_SEARCH] Looking through the repo.").display,
        "Looking through the repo."
    );
}

#[test]
fn file_tag_before_code_block_leaves_clean_paragraphs() {
    assert_eq!(
        sanitize("I'll update it.\n\n[EDIT_FILE:src/app.py]\n```python\nprint(1)\n```").display,
        "I'll update it.\n\n```python\nprint(1)\n```"
    );
}

#[test]
fn run_command_is_extracted_and_removed_from_prose() {
    let text = sanitize("Run the tests: [RUN_COMMAND: `pytest -q`] then report.");

    assert_eq!(text.display, "Run the tests: then report.");
    assert_eq!(text.commands, vec!["pytest -q".to_string()]);
}

#[test]
fn multiple_run_commands_keep_stream_order() {
    let text = sanitize("[RUN_COMMAND:npm install]\n[RUN_COMMAND:\"npm test\"]\nThen check output.");

    assert_eq!(
        text.commands,
        vec!["npm install".to_string(), "npm test".to_string()]
    );
    assert_eq!(text.display, "Then check output.");
}

#[test]
fn space_before_punctuation_left_by_removed_tag_is_collapsed() {
    assert_eq!(sanitize("All set [DONE].").display, "All set.");
    assert_eq!(sanitize("Handing over [→JUNIOR] .").display, "Handing over.");
    assert_eq!(sanitize("Done [DONE], next up").display, "Done, next up");
}

#[test]
fn stray_punctuation_at_line_start_is_dropped() {
    assert_eq!(
        sanitize("[EDIT_FILE:a.py], as shown above").display,
        "as shown above"
    );
    assert_eq!(sanitize("Line one\n[DONE]: next").display, "Line one\nnext");
}

#[test]
fn brackets_outside_the_vocabulary_are_shown() {
    assert_eq!(
        sanitize("See [the docs] and [EDIT] for details [DONE]").display,
        "See [the docs] and [EDIT] for details"
    );
    assert_eq!(sanitize("items[0] = [1, 2]").display, "items[0] = [1, 2]");
}

#[test]
fn keywords_are_case_sensitive() {
    assert_eq!(sanitize("all [done] here").display, "all [done] here");
}

#[test]
fn newline_inside_argument_disproves_the_tag() {
    assert_eq!(
        sanitize("[READ_URL:https://example.com\nnot a tag").display,
        "[READ_URL:https://example.com\nnot a tag"
    );
}

#[test]
fn overlong_argument_disproves_the_tag() {
    let argument = "a".repeat(MAX_TAG_ARGUMENT_CHARS + 20);
    let raw = format!("[SEARCH:{argument}] tail");

    assert_eq!(sanitize(&raw).display, raw);

    let within = format!("[SEARCH:{}] tail", "a".repeat(MAX_TAG_ARGUMENT_CHARS));
    assert_eq!(sanitize(&within).display, "tail");
}

#[test]
fn runs_of_blank_lines_collapse_to_one_paragraph_break() {
    assert_eq!(
        sanitize("Looking this up [SEARCH:rust async traits] now.\n\n\n\nMore soon [→RESEARCH]").display,
        "Looking this up now.\n\nMore soon"
    );
}

#[test]
fn handoff_and_completion_markers_are_removed() {
    assert_eq!(sanitize("Shipped it! [MISSION ACCOMPLISHED]").display, "Shipped it!");
    assert_eq!(
        sanitize("[HANDOFF:Junior Dev] Please add tests.").display,
        "Please add tests."
    );
}
