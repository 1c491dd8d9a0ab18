use quotereel::{FixedAdvanceMeasure, TextMeasure, wrap};

fn m10() -> FixedAdvanceMeasure {
    FixedAdvanceMeasure::new(10.0, 12.0)
}

const SAMPLE_TEXTS: &[&str] = &[
    "",
    "word",
    "two words",
    "You are stronger than you think.",
    "a bb ccc dddd eeeee ffffff ggggggg hhhhhhhh",
    "short\nlines\nwith breaks",
    "para one runs along\n\npara two after a blank",
    "anextraordinarilyoverlongsingleword and more",
];

#[test]
fn wrapped_lines_fit_the_budget_or_are_lone_words() {
    let m = m10();
    for text in SAMPLE_TEXTS {
        for width in [40.0, 80.0, 150.0, 500.0] {
            for line in wrap(text, width, &m) {
                let fits = m.width_px(&line) <= width;
                let lone_word = !line.contains(' ');
                assert!(
                    fits || lone_word,
                    "line {line:?} at width {width} is wide and not a lone word"
                );
            }
        }
    }
}

#[test]
fn no_word_is_dropped_duplicated_or_reordered() {
    let m = m10();
    for text in SAMPLE_TEXTS {
        for width in [40.0, 80.0, 150.0] {
            let lines = wrap(text, width, &m);
            let wrapped_words: Vec<&str> = lines
                .iter()
                .flat_map(|l| l.split_whitespace())
                .collect();
            let source_words: Vec<&str> = text.split_whitespace().collect();
            assert_eq!(wrapped_words, source_words, "word stream changed for {text:?}");
        }
    }
}

#[test]
fn single_paragraph_wrap_is_idempotent_under_rejoin() {
    let m = m10();
    for text in [
        "You are stronger than you think.",
        "a bb ccc dddd eeeee ffffff",
        "one",
    ] {
        for width in [40.0, 90.0, 200.0] {
            let first = wrap(text, width, &m);
            let rejoined = first.join(" ");
            assert_eq!(wrap(&rejoined, width, &m), first);
        }
    }
}

#[test]
fn reference_scenario_from_greedy_accumulation() {
    // 10px per char, 100px budget: lines of at most 10 chars.
    let lines = wrap("The quick brown fox jumps", 100.0, &m10());
    assert_eq!(lines, vec!["The quick", "brown fox", "jumps"]);
}

#[test]
fn empty_and_whitespace_inputs_give_one_empty_line() {
    let m = m10();
    assert_eq!(wrap("", 100.0, &m), vec![String::new()]);
    assert_eq!(wrap("  \t ", 100.0, &m), vec![String::new()]);
}

#[test]
fn blank_source_lines_are_preserved_in_position() {
    let m = m10();
    let lines = wrap("first\n\nsecond", 200.0, &m);
    assert_eq!(lines, vec!["first", "", "second"]);
}
