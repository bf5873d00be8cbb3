use similar::{ChangeTag, TextDiff};

/// Generate a unified diff between two strings.
///
/// # Arguments
/// * `original` - The captured content
/// * `modified` - The rendered content
/// * `context` - Unchanged lines shown around each hunk
///
/// # Returns
/// A string with `@@` hunk headers and `+`, `-`, ` ` prefixed lines, or an
/// empty string when both sides are identical.
pub fn generate_unified_diff(original: &str, modified: &str, context: usize) -> String {
    if original == modified {
        return String::new();
    }

    let diff = TextDiff::from_lines(original, modified);
    let mut output = String::new();

    for group in diff.grouped_ops(context) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old_range = first.old_range().start..last.old_range().end;
        let new_range = first.new_range().start..last.new_range().end;
        output.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            old_range.start + 1,
            old_range.len(),
            new_range.start + 1,
            new_range.len()
        ));

        for op in &group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };
                output.push_str(sign);
                output.push_str(change.value());
                if change.missing_newline() {
                    output.push('\n');
                }
            }
        }
    }

    output
}
