//! Markdown stripping for replies when a connection has formatting disabled.
//!
//! Rules run in a fixed order; later rules see text already simplified by
//! earlier ones:
//!
//! | Rule | Input                 | Output  |
//! |------|-----------------------|---------|
//! | 1    | ` ```js\ncode\n``` `  | `code\n`|
//! | 2    | `` `code` ``          | `code`  |
//! | 3    | `**bold**`            | `bold`  |
//! | 4    | `*italic*`            | `italic`|
//! | 5    | `__bold__`            | `bold`  |
//! | 6    | `_italic_`            | `italic`|
//! | 7    | `~~struck~~`          | `struck`|
//! | 8    | `## Heading`          | `Heading` |
//! | 9    | `- item`              | `item`  |
//! | 10   | `1. item`             | `item`  |
//! | 11   | `[text](url)`         | `text`  |
//!
//! Rules 8 to 10 run as one rule that removes every stacked marker at the
//! start of a line, so `- # 1. item` becomes `item` in a single pass.
//!
//! The full pass repeats until the text stops changing, which makes the
//! transform idempotent. The number of passes is capped at [`MAX_PASSES`];
//! only deeply nested emphasis or code spans come near it.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```[\s\S]*?```").unwrap());
static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[a-zA-Z0-9_-]*\n?").unwrap());
static CLOSING_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```$").unwrap());
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static BOLD_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__([^_]+)__").unwrap());
static ITALIC_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_([^_]+)_").unwrap());
static STRIKETHROUGH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~~([^~]+)~~").unwrap());
static LINE_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:#{1,6}\s+|\s*[-*+]\s+|\s*[0-9]+\.\s+)+").unwrap()
});
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(.*?)\]\((.*?)\)").unwrap());

/// Upper bound on full passes over one reply.
pub const MAX_PASSES: usize = 32;

/// Remove markdown markup, keeping the text it wraps.
pub fn strip_formatting(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_PASSES {
        let next = strip_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Apply the reply policy of a connection.
pub fn apply_formatting(reply: String, formatting_enabled: bool) -> String {
    if formatting_enabled {
        reply
    } else {
        strip_formatting(&reply)
    }
}

fn strip_once(text: &str) -> String {
    let out = FENCED_BLOCK.replace_all(text, |caps: &Captures| {
        let block = caps.get(0).map_or("", |m| m.as_str());
        let without_opening = OPENING_FENCE.replace(block, "");
        CLOSING_FENCE.replace(&without_opening, "").into_owned()
    });
    let out = INLINE_CODE.replace_all(&out, "${1}");
    let out = BOLD.replace_all(&out, "${1}");
    let out = ITALIC.replace_all(&out, "${1}");
    let out = BOLD_UNDERSCORE.replace_all(&out, "${1}");
    let out = ITALIC_UNDERSCORE.replace_all(&out, "${1}");
    let out = STRIKETHROUGH.replace_all(&out, "${1}");
    let out = LINE_MARKERS.replace_all(&out, "");
    let out = LINK.replace_all(&out, "${1}");
    out.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    // ── Single constructs ───────────────────────────────────────────

    #[test_case("**bold**", "bold" ; "bold")]
    #[test_case("`code`", "code" ; "inline code")]
    #[test_case("```js\nprint(1)\n```", "print(1)\n" ; "fenced block with language")]
    #[test_case("```\nplain\n```", "plain\n" ; "fenced block without language")]
    #[test_case("# Title", "Title" ; "h1")]
    #[test_case("###### Deep", "Deep" ; "h6")]
    #[test_case("[link](http://x)", "link" ; "link")]
    #[test_case("*italic*", "italic" ; "italic")]
    #[test_case("__under__", "under" ; "bold underscore")]
    #[test_case("_under_", "under" ; "italic underscore")]
    #[test_case("~~gone~~", "gone" ; "strikethrough")]
    #[test_case("- item", "item" ; "dash list")]
    #[test_case("+ item", "item" ; "plus list")]
    #[test_case("12. item", "item" ; "ordered list")]
    fn strips_construct(input: &str, expected: &str) {
        assert_eq!(strip_formatting(input), expected);
    }

    // ── Combined documents ──────────────────────────────────────────

    #[test]
    fn strips_mixed_document() {
        let input = "## Summary\n- **Fast** startup\n- Uses `tokio`\n1. See [docs](https://docs.rs)";
        let expected = "Summary\nFast startup\nUses tokio\nSee docs";
        assert_eq!(strip_formatting(input), expected);
    }

    #[test]
    fn code_block_content_is_kept_verbatim() {
        let input = "Run this:\n```bash\ncargo run\n```\nDone.";
        assert_eq!(strip_formatting(input), "Run this:\ncargo run\n\nDone.");
    }

    #[test]
    fn nested_emphasis_is_fully_removed() {
        assert_eq!(strip_formatting("***both***"), "both");
    }

    #[test]
    fn stacked_list_markers_reach_fixed_point() {
        assert_eq!(strip_formatting("- - x"), "x");
        assert_eq!(strip_formatting("- # 1. x"), "x");
        assert_eq!(strip_once("# - + 2. x"), "x");
    }

    #[test]
    fn indented_heading_marker_is_kept() {
        assert_eq!(strip_formatting("  # not a heading"), "  # not a heading");
    }

    #[test]
    fn thousands_of_stacked_markers_strip_in_one_pass() {
        let input = format!("{}x", "- # ".repeat(5_000));
        assert_eq!(strip_once(&input), "x");
        assert_eq!(strip_formatting(&input), "x");
    }

    #[test]
    fn deep_emphasis_nesting_is_bounded() {
        let depth = 1_000;
        let input = format!("{}x{}", "_".repeat(depth), "_".repeat(depth));
        let output = strip_formatting(&input);
        assert!(output.len() < input.len());
        assert!(output.contains('x'));
    }

    // ── Identity ────────────────────────────────────────────────────

    #[test_case("" ; "empty")]
    #[test_case("Just a plain sentence." ; "sentence")]
    #[test_case("Line one\nLine two\n\nLine four" ; "multi line")]
    #[test_case("3 * 4 = 12" ; "lone asterisk")]
    #[test_case("snake_case words" ; "lone underscore")]
    fn plain_prose_is_unchanged(input: &str) {
        assert_eq!(strip_formatting(input), input);
    }

    #[test]
    fn apply_formatting_respects_flag() {
        assert_eq!(apply_formatting("**hi**".into(), true), "**hi**");
        assert_eq!(apply_formatting("**hi**".into(), false), "hi");
    }

    proptest! {
        #[test]
        fn strip_is_idempotent(input in "\\PC{0,64}") {
            let once = strip_formatting(&input);
            prop_assert_eq!(strip_formatting(&once), once);
        }

        #[test]
        fn strip_is_idempotent_on_markdown_alphabet(input in "[a-z #*_~`\\[\\]()0-9.+\n-]{0,48}") {
            let once = strip_formatting(&input);
            prop_assert_eq!(strip_formatting(&once), once);
        }
    }
}
