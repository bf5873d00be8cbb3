use serde_json::Value;

use crate::error::{PatchError, Result};
use crate::intent::NewCode;
use crate::language::Language;
use crate::storage::ExternalStore;

type Predicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;
type RenderFn = Box<dyn Fn(&Value, &Repr<'_>) -> Option<String> + Send + Sync>;

struct Handler {
    predicate: Predicate,
    render: RenderFn,
}

/// Rendering state handed to every handler, used to render nested values.
pub struct Repr<'a> {
    translator: &'a CodeTranslator,
    pub language: Language,
}

impl Repr<'_> {
    pub fn to_code(&self, value: &Value) -> String {
        self.translator.to_code(value, self.language)
    }
}

/// Chain of `(predicate, render)` handlers, tried newest first.
///
/// Registering a handler after the defaults overrides how matching values are
/// spelled.
pub struct CodeTranslator {
    handlers: Vec<Handler>,
}

impl Default for CodeTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeTranslator {
    /// A translator with handlers for every JSON value shape.
    pub fn new() -> Self {
        let mut translator = Self::empty();
        translator.register(Value::is_null, |_, repr| {
            Some(repr.language.null_literal().to_string())
        });
        translator.register(Value::is_boolean, |value, repr| {
            value.as_bool().map(|b| repr.language.bool_literal(b).to_string())
        });
        translator.register(Value::is_number, |value, _| Some(value.to_string()));
        translator.register(Value::is_string, |value, _| Some(value.to_string()));
        translator.register(Value::is_array, |value, repr| {
            let items = value.as_array()?;
            let parts: Vec<String> = items.iter().map(|item| repr.to_code(item)).collect();
            Some(format!("[{}]", parts.join(", ")))
        });
        translator.register(Value::is_object, |value, repr| {
            let entries = value.as_object()?;
            let parts: Vec<String> = entries
                .iter()
                .map(|(key, item)| {
                    let key = Value::String(key.clone());
                    format!("{}: {}", repr.to_code(&key), repr.to_code(item))
                })
                .collect();
            Some(format!("{{{}}}", parts.join(", ")))
        });
        translator
    }

    /// A translator without handlers; every value falls back to JSON.
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler. It takes precedence over every handler registered
    /// before it.
    pub fn register<P, R>(&mut self, predicate: P, render: R)
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
        R: Fn(&Value, &Repr<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.handlers.push(Handler {
            predicate: Box::new(predicate),
            render: Box::new(render),
        });
    }

    pub fn to_code(&self, value: &Value, language: Language) -> String {
        let repr = Repr {
            translator: self,
            language,
        };
        self.handlers
            .iter()
            .rev()
            .filter(|handler| (handler.predicate)(value))
            .find_map(|handler| (handler.render)(value, &repr))
            .unwrap_or_else(|| value.to_string())
    }
}

/// Everything needed to turn a [`NewCode`] into source text.
#[derive(Clone, Copy)]
pub struct CodeContext<'a> {
    pub translator: &'a CodeTranslator,
    pub store: Option<&'a dyn ExternalStore>,
}

impl<'a> CodeContext<'a> {
    pub fn new(translator: &'a CodeTranslator) -> Self {
        Self {
            translator,
            store: None,
        }
    }

    pub fn with_store(mut self, store: &'a dyn ExternalStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Render `code` for a file written in `language`.
    ///
    /// External values must resolve in the store, otherwise this fails with
    /// `StorageLookup`.
    pub fn render(&self, code: &NewCode, language: Language) -> Result<String> {
        match code {
            NewCode::Code(code) => Ok(code.clone()),
            NewCode::Value(value) => Ok(self.translator.to_code(value, language)),
            NewCode::External(location) => {
                let store = self.store.ok_or_else(|| PatchError::StorageLookup {
                    location: location.clone(),
                    reason: "no external store configured".to_string(),
                })?;
                if !store.contains(location)? {
                    return Err(PatchError::StorageLookup {
                        location: location.clone(),
                        reason: "no such entry".to_string(),
                    });
                }
                Ok(language.external_reference(location))
            }
        }
    }
}
