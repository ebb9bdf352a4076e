use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Markdown image link: `![description](target)`.
///
/// The description may hold one level of balanced brackets (`![see [1]](a.png)`)
/// and the target one level of balanced parentheses, which covers file names
/// like `Screenshot (1).png`. The target must be non-empty. Matching is
/// left-to-right and non-overlapping, so two adjacent tags never share a
/// target, and an unterminated tag is skipped in favor of any well-formed tag
/// that follows it.
static IMAGE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[(?:[^\[\]\n]|\[[^\[\]\n]*\])*\]\(((?:[^()\n]|\([^()\n]*\))+)\)").unwrap()
});

/// Characters of surrounding text kept on each side of a match in `Position::context`.
pub const CONTEXT_RADIUS: usize = 30;

/// One occurrence of an image link inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Zero-based line index in the source text.
    pub line_number: usize,
    /// Full text of the line at extraction time.
    pub line_content: String,
    /// Window of `line_content` around the match, for previews.
    pub context: String,
    /// Character offset of the `!` within `line_content`.
    pub match_offset: usize,
}

/// Canonical index key for an image target: everything after the final `/`.
///
/// Returns `None` when the target ends with `/` and therefore names no file.
pub fn image_key_for_target(target: &str) -> Option<&str> {
    let key = target.rsplit('/').next().unwrap_or(target);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Extract every image link in `text`, grouped by image key.
///
/// Positions within a key are ordered by line, then by offset within the line.
/// Text without image links yields an empty map.
pub fn extract_image_references(text: &str) -> BTreeMap<String, Vec<Position>> {
    let mut references: BTreeMap<String, Vec<Position>> = BTreeMap::new();

    for (line_number, line) in text.split('\n').enumerate() {
        for cap in IMAGE_LINK_RE.captures_iter(line) {
            let full_match = cap.get(0).unwrap();
            let Some(key) = image_key_for_target(&cap[1]) else {
                continue;
            };

            let match_offset = line[..full_match.start()].chars().count();
            let match_len = full_match.as_str().chars().count();

            references
                .entry(key.to_string())
                .or_default()
                .push(Position {
                    line_number,
                    line_content: line.to_string(),
                    context: context_window(line, match_offset, match_len),
                    match_offset,
                });
        }
    }

    references
}

/// Distinct image keys referenced by `text`, in first-seen order.
pub fn extract_image_keys(text: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for line in text.split('\n') {
        for cap in IMAGE_LINK_RE.captures_iter(line) {
            if let Some(key) = image_key_for_target(&cap[1]) {
                if !keys.iter().any(|k| k == key) {
                    keys.push(key.to_string());
                }
            }
        }
    }
    keys
}

/// Slice of `line` spanning `CONTEXT_RADIUS` characters either side of a match.
/// Offsets are in characters, not bytes.
fn context_window(line: &str, match_offset: usize, match_len: usize) -> String {
    let start = match_offset.saturating_sub(CONTEXT_RADIUS);
    let end = match_offset + match_len + CONTEXT_RADIUS;
    line.chars().skip(start).take(end - start).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_empty_for_no_images() {
        let result = extract_image_references("no images here");
        assert!(result.is_empty());
    }

    #[test]
    fn plain_links_are_not_images() {
        let result = extract_image_references("see [docs](guide/readme.md)");
        assert!(result.is_empty());
    }

    #[test]
    fn extracts_basename_as_key() {
        let result = extract_image_references("![x](imgs/deep/pic.png)");
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["pic.png"]);
    }

    #[test]
    fn target_without_slash_is_used_verbatim() {
        let result = extract_image_references("![x](pic.png)");
        assert!(result.contains_key("pic.png"));
    }

    #[test]
    fn url_targets_use_last_segment() {
        let result = extract_image_references("![x](https://cdn.example.com/a/b/logo.svg)");
        assert!(result.contains_key("logo.svg"));
    }

    #[test]
    fn records_position_fidelity() {
        let result = extract_image_references("intro\n![x](imgs/pic.png) tail\n");
        let positions = &result["pic.png"];
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].line_number, 1);
        assert_eq!(positions[0].line_content, "![x](imgs/pic.png) tail");
        assert_eq!(positions[0].match_offset, 0);
    }

    #[test]
    fn match_offset_points_at_bang() {
        let line = "before text ![alt](a/b.png)";
        let result = extract_image_references(line);
        let pos = &result["b.png"][0];
        assert_eq!(pos.match_offset, line.find('!').unwrap());
    }

    #[test]
    fn same_key_on_two_lines_gives_two_positions() {
        let result = extract_image_references("![a](x/foo.png)\n![b](y/foo.png)");
        let positions = &result["foo.png"];
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].line_number, 0);
        assert_eq!(positions[1].line_number, 1);
    }

    #[test]
    fn adjacent_tags_do_not_consume_each_other() {
        let result = extract_image_references("![a](one.png)![b](two.png)");
        assert_eq!(result["one.png"][0].match_offset, 0);
        assert_eq!(result["two.png"][0].match_offset, 13);
    }

    #[test]
    fn repeated_tag_on_one_line_records_each_offset() {
        let result = extract_image_references("![a](p.png) and ![a](p.png)");
        let offsets: Vec<usize> = result["p.png"].iter().map(|p| p.match_offset).collect();
        assert_eq!(offsets, vec![0, 16]);
    }

    #[test]
    fn missing_closing_paren_is_not_matched() {
        let result = extract_image_references("![broken](img/a.png and more");
        assert!(result.is_empty());
    }

    #[test]
    fn unterminated_tag_does_not_swallow_following_tag() {
        let result = extract_image_references("![a](broken ![b](ok.png)");
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["ok.png"]);
        assert_eq!(result["ok.png"][0].match_offset, 12);
    }

    #[test]
    fn bracketed_text_inside_description_is_matched() {
        let result = extract_image_references("![see [1]](img/a.png) after");
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["a.png"]);
        assert_eq!(result["a.png"][0].match_offset, 0);
    }

    #[test]
    fn bracketed_description_does_not_merge_adjacent_tags() {
        let result = extract_image_references("![a [1]](one.png)![b](two.png)");
        assert_eq!(result["one.png"][0].match_offset, 0);
        assert_eq!(result["two.png"][0].match_offset, 17);
    }

    #[test]
    fn balanced_parens_in_target_are_kept() {
        let result = extract_image_references("![s](shots/Screenshot (1).png) done");
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["Screenshot (1).png"]);
    }

    #[test]
    fn trailing_parenthetical_is_not_part_of_target() {
        let result = extract_image_references("![a](x.png) (see above)");
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["x.png"]);
    }

    #[test]
    fn empty_target_is_not_matched() {
        assert!(extract_image_references("![a]()").is_empty());
    }

    #[test]
    fn directory_target_is_skipped() {
        assert!(extract_image_references("![a](assets/)").is_empty());
    }

    #[test]
    fn empty_description_is_allowed() {
        let result = extract_image_references("![](pic.png)");
        assert!(result.contains_key("pic.png"));
    }

    #[test]
    fn context_is_bounded_around_match() {
        let prefix = "a".repeat(50);
        let suffix = "b".repeat(50);
        let tag = "![x](p.png)";
        let line = format!("{prefix}{tag}{suffix}");
        let result = extract_image_references(&line);
        let pos = &result["p.png"][0];
        assert_eq!(pos.match_offset, 50);
        assert_eq!(
            pos.context,
            format!("{}{}{}", "a".repeat(30), tag, "b".repeat(30))
        );
    }

    #[test]
    fn context_clamps_at_line_edges() {
        let result = extract_image_references("hi ![x](p.png) yo");
        assert_eq!(result["p.png"][0].context, "hi ![x](p.png) yo");
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let result = extract_image_references("图片：![示意](图/猫.png)");
        let pos = &result["猫.png"][0];
        assert_eq!(pos.match_offset, 3);
        assert_eq!(pos.context, "图片：![示意](图/猫.png)");
    }

    #[test]
    fn extraction_is_deterministic() {
        let text = "![a](x/1.png)\ntext ![b](2.png) ![c](y/1.png)";
        assert_eq!(extract_image_references(text), extract_image_references(text));
    }

    #[test]
    fn image_keys_are_distinct_in_first_seen_order() {
        let keys = extract_image_keys("![a](b.png) ![c](a.png)\n![d](x/b.png)");
        assert_eq!(keys, vec!["b.png", "a.png"]);
    }

    #[test]
    fn key_for_target_strips_directories() {
        assert_eq!(image_key_for_target("a/b/c.jpg"), Some("c.jpg"));
        assert_eq!(image_key_for_target("c.jpg"), Some("c.jpg"));
        assert_eq!(image_key_for_target("a/"), None);
    }
}
