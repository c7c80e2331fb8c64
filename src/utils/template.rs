use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Za-z0-9_-]+)\}\}").expect("valid placeholder pattern"));

/// How substituted values are escaped for the document they land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    Xml,
    Json,
    None,
}

impl Escape {
    fn apply(&self, value: &str) -> String {
        match self {
            Escape::Xml => quick_xml::escape::escape(value).into_owned(),
            Escape::Json => {
                let quoted = serde_json::Value::String(value.to_string()).to_string();
                quoted[1..quoted.len() - 1].to_string()
            }
            Escape::None => value.to_string(),
        }
    }
}

/// A document with `{{name}}` placeholders.
///
/// Bindings are resolved in one pass at [`Template::render`], so substituted
/// text is never scanned for further placeholders. Anything left unbound
/// renders empty. Rendered templates can be appended to one another or
/// spliced into a placeholder of a parent, which is how nested,
/// variable-length blocks are built.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    escape: Escape,
    bindings: HashMap<String, String>,
    appended: Vec<String>,
}

impl Template {
    pub fn new(source: impl Into<String>, escape: Escape) -> Self {
        Self {
            source: source.into(),
            escape,
            bindings: HashMap::new(),
            appended: Vec::new(),
        }
    }

    /// A template with no source of its own, only what gets appended.
    pub fn empty() -> Self {
        Self::new(String::new(), Escape::None)
    }

    /// Binds a value, escaped for this document.
    pub fn replace(&mut self, key: &str, value: &str) -> &mut Self {
        let escaped = self.escape.apply(value);
        self.bindings.insert(key.to_string(), escaped);
        self
    }

    pub fn replace_all<'a, I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in values {
            self.replace(key, value);
        }
        self
    }

    /// Binds an already rendered block verbatim.
    pub fn replace_block(&mut self, key: &str, block: &Template) -> &mut Self {
        self.bindings.insert(key.to_string(), block.render());
        self
    }

    pub fn append(&mut self, other: &Template) -> &mut Self {
        self.appended.push(other.render());
        self
    }

    pub fn append_raw(&mut self, text: &str) -> &mut Self {
        self.appended.push(text.to_string());
        self
    }

    /// Drops bindings and appended content, keeping the source.
    pub fn reset(&mut self) {
        self.bindings.clear();
        self.appended.clear();
    }

    pub fn render(&self) -> String {
        let mut out = PLACEHOLDER
            .replace_all(&self.source, |caps: &Captures| {
                self.bindings.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned();
        for block in &self.appended {
            out.push_str(block);
        }
        out
    }
}
