use engine::normalize::{normalize, normalize_word};

fn normalized(input: &str) -> String {
    normalize(input).join(" ")
}

#[test]
fn it_cleans_message_text() {
    let cases: &[(&str, &str, &str)] = &[
        ("no op", "noop test", "noop test"),
        ("multiple types of whitespace", "foo\tfoo\n foo foo", "foo foo foo foo"),
        ("lowercase", "LoWERcase", "lowercas"),
        (
            "urls stripped",
            "foo https://www.example.com/foo/?foo=foo foo",
            "foo foo",
        ),
        ("urls stripped regardless of case", "foo HTTPS://example.com foo", "foo foo"),
        ("person mentions stripped", "foo <@!837476904742289429> foo", "foo foo"),
        ("channel mentions stripped", "foo <#837826557477126219> foo", "foo foo"),
        ("dashes as spaces", "foo-bar foo", "foo bar foo"),
        ("slashes as spaces", "foo/bar foo", "foo bar foo"),
        ("punctuation stripped", "foo & (foo)!", "foo foo"),
        ("stemming", "procrastination", "procrastin"),
        ("markdown", "foo **bar baz** _zing_", "foo bar baz zing"),
        ("stop words dropped", "the quick brown fox is a fox", "quick brown fox fox"),
        ("nothing left", "the a is <@123> https://x.dev", ""),
    ];

    for (description, input, expected) in cases {
        assert_eq!(&normalized(input), expected, "case: {description}");
    }
}

#[test]
fn it_is_deterministic() {
    let input = "Procrastination procrastinate foo-bar <#123> https://example.com baz!";
    assert_eq!(normalize(input), normalize(input));
}

#[test]
fn it_is_idempotent_on_surviving_tokens() {
    // already-stemmed lowercase alphanumeric tokens map to themselves (not
    // guaranteed for every stem the algorithm can emit, so the sample sticks
    // to stable ones)
    let words = normalize("Running procrastination diamonds quick brown blarg");
    for word in &words {
        assert_eq!(
            normalize_word(word).as_deref(),
            Some(word.as_str()),
            "{word} did not survive a second pass unchanged"
        );
    }
}

#[test]
fn it_preserves_duplicates_and_order() {
    assert_eq!(normalize("foo bar foo"), vec!["foo", "bar", "foo"]);
}
