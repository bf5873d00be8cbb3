use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{PatchError, Result};
use crate::intent::{Intent, IntentKind, NodeId, ParentNode, PositionResolver};
use crate::language::{Language, detect_language};
use crate::position::Range;
use crate::registry::ChangeRegistry;
use crate::repr::CodeContext;

/// Separator placed between children of a parent.
pub const SEPARATOR: &str = ", ";

/// An intent that was dropped without aborting its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedIntent {
    /// Index into the submitted intent list.
    pub index: usize,
    pub error: PatchError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Intents turned into replacements (or merged into one).
    pub applied: usize,
    pub skipped: Vec<SkippedIntent>,
}

/// Compute the replacements for one parent.
///
/// # Arguments
/// * `node` - The parent, with its delimiter tokens
/// * `survivors` - One entry per original child: its range, or `None` if the
///   child is deleted
/// * `to_insert` - Rendered code to insert before the child with that index
///   (index `survivors.len()` appends)
///
/// # Returns
/// At most one replacement per gap between surviving children, plus one for
/// the gap before the closing delimiter when needed. Gaps that need no change
/// are left untouched.
pub fn sequence_update(
    node: &ParentNode,
    survivors: &[Option<Range>],
    to_insert: &BTreeMap<usize, Vec<String>>,
) -> Result<Vec<(Range, String)>> {
    let mut edits = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut deleted = false;
    let mut last_end = node.open.end();
    let mut is_start = true;
    let mut elements = 0usize;

    for (index, entry) in survivors.iter().enumerate() {
        if let Some(codes) = to_insert.get(&index) {
            pending.extend(codes.iter().cloned());
        }
        let Some(range) = entry else {
            deleted = true;
            continue;
        };

        elements += pending.len() + 1;
        if deleted || !pending.is_empty() {
            let mut code = String::new();
            if !is_start {
                code.push_str(SEPARATOR);
            }
            for inserted in pending.drain(..) {
                code.push_str(&inserted);
                code.push_str(SEPARATOR);
            }
            edits.push((Range::new(last_end, range.start())?, code));
        }
        deleted = false;
        last_end = range.end();
        is_start = false;
    }

    if let Some(codes) = to_insert.get(&survivors.len()) {
        pending.extend(codes.iter().cloned());
    }
    elements += pending.len();

    let singleton = node.kind.needs_singleton_separator();
    if !pending.is_empty() || deleted || (singleton && (elements == 1 || survivors.len() == 1)) {
        let mut code = String::new();
        if !pending.is_empty() {
            if !is_start {
                code.push_str(SEPARATOR);
            }
            code.push_str(&pending.join(SEPARATOR));
        }
        if singleton && elements == 1 {
            code.push(',');
        }
        edits.push((Range::new(last_end, node.close.start())?, code));
    }

    Ok(edits)
}

/// Turn every intent into ledger replacements in `registry`.
///
/// Intents without a parent become one replacement each. Intents aimed at the
/// children of one parent are merged, so separators are decided in one place.
///
/// Errors tied to a single intent (unresolvable node or element, missing
/// external value) skip that intent. Structural errors (invalid or
/// overlapping ranges, unreadable file) abort the patch of the whole file in
/// the registry; other files are unaffected.
pub fn apply_all(
    registry: &mut ChangeRegistry,
    intents: &[Intent],
    resolver: &dyn PositionResolver,
    context: &CodeContext<'_>,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    let mut groups: BTreeMap<NodeId, Vec<usize>> = BTreeMap::new();

    for (index, intent) in intents.iter().enumerate() {
        match intent.kind.parent() {
            Some(parent) => groups.entry(parent).or_default().push(index),
            None => match apply_direct(registry, intent, context) {
                Ok(()) => report.applied += 1,
                Err(error) => route_error(registry, &mut report, index, &intent.file, error),
            },
        }
    }

    for (parent, members) in groups {
        apply_group(registry, &mut report, parent, &members, intents, resolver, context);
    }

    debug!(
        applied = report.applied,
        skipped = report.skipped.len(),
        "consolidated intents"
    );
    report
}

fn route_error(
    registry: &mut ChangeRegistry,
    report: &mut ApplyReport,
    index: usize,
    path: &Path,
    error: PatchError,
) {
    match error {
        PatchError::StorageLookup { .. }
        | PatchError::UnknownNode(_)
        | PatchError::UnknownElement { .. }
        | PatchError::Request(_) => {
            warn!(index, %error, "skipping intent");
            report.skipped.push(SkippedIntent { index, error });
        }
        error => registry.abort_file(path, error),
    }
}

fn apply_direct(
    registry: &mut ChangeRegistry,
    intent: &Intent,
    context: &CodeContext<'_>,
) -> Result<()> {
    let language = detect_language(&intent.file);
    let (range, text) = match &intent.kind {
        IntentKind::Replace { range, code } => (*range, context.render(code, language)?),
        IntentKind::Insert { at, code } => (Range::point(*at), context.render(code, language)?),
        IntentKind::Delete { range } => (*range, String::new()),
        _ => {
            return Err(PatchError::Request(
                "parented intent submitted as a direct edit".to_string(),
            ));
        }
    };
    let change = registry.new_change(Some(intent.category));
    registry.replace(change, &intent.file, range, text)
}

/// Accumulated state of one parent while its intents are collected.
struct ParentEdit<'a> {
    node: &'a ParentNode,
    language: Language,
    survivors: Vec<Option<Range>>,
    to_insert: BTreeMap<usize, Vec<String>>,
    /// Keyword arguments, placed after positional ones at the same point.
    keywords: BTreeMap<usize, Vec<String>>,
}

impl<'a> ParentEdit<'a> {
    fn new(node: &'a ParentNode, language: Language) -> Self {
        Self {
            node,
            language,
            survivors: node.elements.iter().map(|e| Some(e.range)).collect(),
            to_insert: BTreeMap::new(),
            keywords: BTreeMap::new(),
        }
    }

    fn insertion_point(&self, position: usize) -> Result<usize> {
        if position > self.node.elements.len() {
            return Err(PatchError::UnknownElement {
                node: self.node.id,
                index: position,
            });
        }
        Ok(position)
    }

    /// Fold one intent in. Nothing is recorded when an error is returned.
    fn collect(&mut self, kind: &IntentKind, context: &CodeContext<'_>) -> Result<()> {
        let language = self.language;
        match kind {
            IntentKind::DeleteElement { index, .. } => {
                self.node.element(*index)?;
                self.survivors[*index] = None;
            }
            IntentKind::CallArgumentInsert {
                position,
                name,
                code,
                ..
            } => {
                let position = match (position, name) {
                    (Some(position), _) => *position,
                    (None, Some(_)) => self.node.elements.len(),
                    (None, None) => {
                        return Err(PatchError::Request(format!(
                            "positional argument for {} needs an explicit position",
                            self.node.id
                        )));
                    }
                };
                let at = self.insertion_point(position)?;
                let code = context.render(code, language)?;
                match name {
                    Some(name) => self
                        .keywords
                        .entry(at)
                        .or_default()
                        .push(language.keyword_argument(name, &code)),
                    None => self.to_insert.entry(at).or_default().push(code),
                }
            }
            IntentKind::SequenceInsert {
                position, items, ..
            } => {
                let at = self.insertion_point(*position)?;
                let codes = items
                    .iter()
                    .map(|item| context.render(item, language))
                    .collect::<Result<Vec<_>>>()?;
                self.to_insert.entry(at).or_default().extend(codes);
            }
            IntentKind::MappingInsert {
                position, entries, ..
            } => {
                let at = self.insertion_point(*position)?;
                let codes = entries
                    .iter()
                    .map(|entry| {
                        let key = context.render(&entry.key, language)?;
                        let value = context.render(&entry.value, language)?;
                        Ok(format!("{key}: {value}"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.to_insert.entry(at).or_default().extend(codes);
            }
            IntentKind::Replace { .. } | IntentKind::Insert { .. } | IntentKind::Delete { .. } => {
                return Err(PatchError::Request(
                    "direct edit submitted under a parent".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn is_noop(&self) -> bool {
        self.to_insert.is_empty()
            && self.keywords.is_empty()
            && self.survivors.iter().all(Option::is_some)
    }

    /// Code to insert per position, positional arguments first.
    fn insertions(&self) -> BTreeMap<usize, Vec<String>> {
        let mut merged = self.to_insert.clone();
        for (at, codes) in &self.keywords {
            merged.entry(*at).or_default().extend(codes.iter().cloned());
        }
        merged
    }
}

fn apply_group(
    registry: &mut ChangeRegistry,
    report: &mut ApplyReport,
    parent: NodeId,
    members: &[usize],
    intents: &[Intent],
    resolver: &dyn PositionResolver,
    context: &CodeContext<'_>,
) {
    let path = intents[members[0]].file.clone();
    let node = match resolver.resolve(parent) {
        Ok(node) => node,
        Err(error) => {
            for &index in members {
                route_error(registry, report, index, &path, error.clone());
            }
            return;
        }
    };

    let mut edit = ParentEdit::new(node, detect_language(&path));
    let mut categories = BTreeSet::new();
    for &index in members {
        let intent = &intents[index];
        let collected = if intent.file != path {
            Err(PatchError::Request(format!(
                "{parent} belongs to {}, not {}",
                path.display(),
                intent.file.display()
            )))
        } else {
            edit.collect(&intent.kind, context)
        };
        match collected {
            Ok(()) => {
                categories.insert(intent.category);
                report.applied += 1;
            }
            Err(error) => route_error(registry, report, index, &path, error),
        }
    }

    if edit.is_noop() {
        return;
    }

    let edits = match sequence_update(node, &edit.survivors, &edit.insertions()) {
        Ok(edits) => edits,
        Err(error) => {
            registry.abort_file(&path, error);
            return;
        }
    };

    let category = match categories.len() {
        1 => categories.into_iter().next(),
        _ => None,
    };
    let change = registry.new_change(category);
    for (range, text) in edits {
        if let Err(error) = registry.replace(change, &path, range, text) {
            registry.abort_file(&path, error);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Element, NodeKind};
    use crate::position::Position;

    fn range(start: usize, end: usize) -> Range {
        Range::new(Position::new(1, start), Position::new(1, end)).unwrap()
    }

    /// Node for a one-line literal whose delimiters sit at `open` and `close`
    /// and whose elements span the given columns.
    fn node(kind: NodeKind, open: usize, close: usize, elements: &[(usize, usize)]) -> ParentNode {
        ParentNode {
            id: NodeId(1),
            kind,
            open: range(open, open + 1),
            close: range(close, close + 1),
            elements: elements
                .iter()
                .map(|&(s, e)| Element::new(range(s, e)))
                .collect(),
        }
    }

    fn render(text: &str, edits: &[(Range, String)]) -> String {
        let mut out = text.to_string();
        let mut sorted = edits.to_vec();
        sorted.sort_by(|a, b| b.0.cmp(&a.0));
        for (range, code) in sorted {
            let (s, e) = (range.start().column, range.end().column);
            out.replace_range(s..e, &code);
        }
        out
    }

    #[test]
    fn test_delete_and_insert_share_one_gap() {
        // [1, 2, 3]
        let list = node(NodeKind::List, 0, 8, &[(1, 2), (4, 5), (7, 8)]);
        let survivors = vec![Some(range(1, 2)), None, Some(range(7, 8))];
        let to_insert = BTreeMap::from([(2, vec!["4".to_string()])]);

        let edits = sequence_update(&list, &survivors, &to_insert).unwrap();

        assert_eq!(edits, vec![(range(2, 7), ", 4, ".to_string())]);
        assert_eq!(render("[1, 2, 3]", &edits), "[1, 4, 3]");
    }

    #[test]
    fn test_delete_last_element() {
        // [1, 2, 3]
        let list = node(NodeKind::List, 0, 8, &[(1, 2), (4, 5), (7, 8)]);
        let survivors = vec![Some(range(1, 2)), Some(range(4, 5)), None];

        let edits = sequence_update(&list, &survivors, &BTreeMap::new()).unwrap();

        assert_eq!(edits, vec![(range(5, 8), String::new())]);
        assert_eq!(render("[1, 2, 3]", &edits), "[1, 2]");
    }

    #[test]
    fn test_delete_first_element() {
        let list = node(NodeKind::List, 0, 8, &[(1, 2), (4, 5), (7, 8)]);
        let survivors = vec![None, Some(range(4, 5)), Some(range(7, 8))];

        let edits = sequence_update(&list, &survivors, &BTreeMap::new()).unwrap();

        assert_eq!(render("[1, 2, 3]", &edits), "[2, 3]");
    }

    #[test]
    fn test_insert_into_empty() {
        let list = node(NodeKind::List, 0, 1, &[]);
        let to_insert = BTreeMap::from([(0, vec!["1".to_string(), "2".to_string()])]);

        let edits = sequence_update(&list, &[], &to_insert).unwrap();

        assert_eq!(render("[]", &edits), "[1, 2]");
    }

    #[test]
    fn test_tuple_keeps_singleton_comma() {
        // (1, 2)
        let tuple = node(NodeKind::Tuple, 0, 5, &[(1, 2), (4, 5)]);

        let edits =
            sequence_update(&tuple, &[Some(range(1, 2)), None], &BTreeMap::new()).unwrap();
        assert_eq!(render("(1, 2)", &edits), "(1,)");

        let edits =
            sequence_update(&tuple, &[None, Some(range(4, 5))], &BTreeMap::new()).unwrap();
        assert_eq!(render("(1, 2)", &edits), "(2,)");

        let edits = sequence_update(&tuple, &[None, None], &BTreeMap::new()).unwrap();
        assert_eq!(render("(1, 2)", &edits), "()");
    }

    #[test]
    fn test_singleton_tuple_growing_drops_comma() {
        // (1,)
        let tuple = node(NodeKind::Tuple, 0, 3, &[(1, 2)]);
        let to_insert = BTreeMap::from([(0, vec!["0".to_string()])]);

        let edits = sequence_update(&tuple, &[Some(range(1, 2))], &to_insert).unwrap();

        assert_eq!(render("(1,)", &edits), "(0, 1)");
    }

    #[test]
    fn test_list_singleton_has_no_comma() {
        let list = node(NodeKind::List, 0, 5, &[(1, 2), (4, 5)]);

        let edits =
            sequence_update(&list, &[Some(range(1, 2)), None], &BTreeMap::new()).unwrap();

        assert_eq!(render("[1, 2]", &edits), "[1]");
    }

    #[test]
    fn test_untouched_gaps_produce_no_edits() {
        let list = node(NodeKind::List, 0, 8, &[(1, 2), (4, 5), (7, 8)]);
        let survivors = vec![Some(range(1, 2)), Some(range(4, 5)), Some(range(7, 8))];
        let to_insert = BTreeMap::from([(1, vec!["9".to_string()])]);

        let edits = sequence_update(&list, &survivors, &to_insert).unwrap();

        assert_eq!(edits, vec![(range(2, 4), ", 9, ".to_string())]);
        assert_eq!(render("[1, 2, 3]", &edits), "[1, 9, 2, 3]");
    }
}
