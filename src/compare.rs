use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::align::{Op, align};
use crate::error::{PatchError, Result};
use crate::intent::{Intent, IntentKind, MappingEntry, NewCode, ParentNode};
use crate::policy::Category;

fn check_shape(node: &ParentNode, old_len: usize) -> Result<()> {
    if node.elements.len() != old_len {
        return Err(PatchError::Request(format!(
            "{} has {} elements but {} old values were given",
            node.id,
            node.elements.len(),
            old_len
        )));
    }
    Ok(())
}

/// Queue `code` for insertion before old element `position`, extending the
/// previous insert intent when it targets the same position.
fn push_item(
    intents: &mut Vec<Intent>,
    file: &Path,
    node: &ParentNode,
    position: usize,
    code: NewCode,
    category: Category,
) {
    if let Some(Intent {
        kind: IntentKind::SequenceInsert {
            position: last,
            items,
            ..
        },
        ..
    }) = intents.last_mut()
    {
        if *last == position {
            items.push(code);
            return;
        }
    }
    intents.push(Intent::new(
        category,
        file,
        IntentKind::SequenceInsert {
            parent: node.id,
            position,
            items: vec![code],
        },
    ));
}

fn push_entry(
    intents: &mut Vec<Intent>,
    file: &Path,
    node: &ParentNode,
    position: usize,
    entry: MappingEntry,
    category: Category,
) {
    if let Some(Intent {
        kind: IntentKind::MappingInsert {
            position: last,
            entries,
            ..
        },
        ..
    }) = intents.last_mut()
    {
        if *last == position {
            entries.push(entry);
            return;
        }
    }
    intents.push(Intent::new(
        category,
        file,
        IntentKind::MappingInsert {
            parent: node.id,
            position,
            entries: vec![entry],
        },
    ));
}

/// Intents that turn the list, tuple or set `node` holding `old` into one
/// holding `new`.
///
/// Changed elements are replaced in place, surplus ones deleted and missing
/// ones inserted at their aligned position.
pub fn diff_sequence(
    file: &Path,
    node: &ParentNode,
    old: &[Value],
    new: &[Value],
    category: Category,
) -> Result<Vec<Intent>> {
    check_shape(node, old.len())?;
    let alignment = align(old, new);
    debug!(node = %node.id, %alignment, "aligned sequence");

    let mut intents = Vec::new();
    let mut cursor = 0;
    for (op, old_idx, new_idx) in alignment.steps() {
        match (op, old_idx, new_idx) {
            (Op::Match, Some(o), _) => cursor = o + 1,
            (Op::Replace, Some(o), Some(n)) => {
                intents.push(Intent::new(
                    category,
                    file,
                    IntentKind::Replace {
                        range: node.elements[o].value_range(),
                        code: NewCode::Value(new[n].clone()),
                    },
                ));
                cursor = o + 1;
            }
            (Op::Delete, Some(o), _) => {
                intents.push(Intent::new(
                    category,
                    file,
                    IntentKind::DeleteElement {
                        parent: node.id,
                        index: o,
                    },
                ));
                cursor = o + 1;
            }
            (Op::Insert, _, Some(n)) => {
                let code = NewCode::Value(new[n].clone());
                push_item(&mut intents, file, node, cursor, code, category);
            }
            _ => {}
        }
    }
    Ok(intents)
}

/// Intents that turn the dict `node` holding the `old` entries into one
/// holding `new`.
///
/// Entries are aligned by key. Kept keys with a changed value get their value
/// replaced; every other difference deletes or inserts whole entries.
pub fn diff_mapping(
    file: &Path,
    node: &ParentNode,
    old: &[(String, Value)],
    new: &[(String, Value)],
    category: Category,
) -> Result<Vec<Intent>> {
    check_shape(node, old.len())?;
    let old_keys: Vec<&str> = old.iter().map(|(k, _)| k.as_str()).collect();
    let new_keys: Vec<&str> = new.iter().map(|(k, _)| k.as_str()).collect();
    let alignment = align(&old_keys, &new_keys);
    debug!(node = %node.id, %alignment, "aligned mapping keys");

    let entry = |n: usize| MappingEntry {
        key: NewCode::Value(Value::String(new[n].0.clone())),
        value: NewCode::Value(new[n].1.clone()),
    };

    let mut intents = Vec::new();
    let mut cursor = 0;
    for (op, old_idx, new_idx) in alignment.steps() {
        match (op, old_idx, new_idx) {
            (Op::Match, Some(o), Some(n)) => {
                if old[o].1 != new[n].1 {
                    intents.push(Intent::new(
                        category,
                        file,
                        IntentKind::Replace {
                            range: node.elements[o].value_range(),
                            code: NewCode::Value(new[n].1.clone()),
                        },
                    ));
                }
                cursor = o + 1;
            }
            (Op::Replace, Some(o), Some(n)) => {
                push_entry(&mut intents, file, node, o, entry(n), category);
                intents.push(Intent::new(
                    category,
                    file,
                    IntentKind::DeleteElement {
                        parent: node.id,
                        index: o,
                    },
                ));
                cursor = o + 1;
            }
            (Op::Delete, Some(o), _) => {
                intents.push(Intent::new(
                    category,
                    file,
                    IntentKind::DeleteElement {
                        parent: node.id,
                        index: o,
                    },
                ));
                cursor = o + 1;
            }
            (Op::Insert, _, Some(n)) => {
                push_entry(&mut intents, file, node, cursor, entry(n), category);
            }
            _ => {}
        }
    }
    Ok(intents)
}
