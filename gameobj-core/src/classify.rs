//! Regex classification of entities into type and sellable tags.
//!
//! Tables come from an XML document shaped like:
//!
//! ```xml
//! <data>
//!   <type name="gem">
//!     <name>\b(?:ruby|emerald)\b</name>
//!     <noun>^(?:ruby|emerald)$</noun>
//!     <exclude>\bfake\b</exclude>
//!   </type>
//!   <sellable name="gemshop">
//!     <name>\b(?:ruby|emerald)\b</name>
//!   </sellable>
//! </data>
//! ```
//!
//! A custom override file next to the main one may add patterns to existing
//! tags (they are unioned) or introduce new tags.

use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory, beside the main data file, holding the custom override.
pub const CUSTOM_DIR: &str = "gameobj-custom";

/// Errors from loading classification tables.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error in {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Invalid pattern for tag '{tag}': {source}")]
    Regex {
        tag: String,
        #[source]
        source: regex::Error,
    },

    #[error("<{section}> element in {path} has no name attribute")]
    MissingTagName { section: String, path: PathBuf },
}

/// Path of the custom override file for a data file.
pub fn custom_override_path(data_file: &Path) -> PathBuf {
    let file_name = data_file
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("gameobj-data.xml"));
    data_file
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(CUSTOM_DIR)
        .join(file_name)
}

/// Pattern sources collected for one tag before compilation.
#[derive(Debug, Default, Clone)]
struct RawRule {
    name: Vec<String>,
    noun: Vec<String>,
    exclude: Vec<String>,
}

#[derive(Debug, Default)]
struct RawTables {
    types: IndexMap<String, RawRule>,
    sellable: IndexMap<String, RawRule>,
}

impl RawTables {
    fn parse_into(&mut self, text: &str, origin: &Path) -> Result<(), ClassifyError> {
        let doc = roxmltree::Document::parse(text).map_err(|source| ClassifyError::Xml {
            path: origin.to_path_buf(),
            source,
        })?;

        for element in doc.root_element().children().filter(|n| n.is_element()) {
            let section = element.tag_name().name();
            let table = match section {
                "type" => &mut self.types,
                "sellable" => &mut self.sellable,
                _ => continue,
            };
            let tag = element
                .attribute("name")
                .ok_or_else(|| ClassifyError::MissingTagName {
                    section: section.to_string(),
                    path: origin.to_path_buf(),
                })?;

            let rule = table.entry(tag.to_string()).or_default();
            for child in element.children().filter(|n| n.is_element()) {
                let Some(pattern) = child.text().map(str::trim).filter(|t| !t.is_empty()) else {
                    continue;
                };
                match child.tag_name().name() {
                    "name" => rule.name.push(pattern.to_string()),
                    "noun" => rule.noun.push(pattern.to_string()),
                    "exclude" => rule.exclude.push(pattern.to_string()),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn compile(self) -> Result<ClassTables, ClassifyError> {
        Ok(ClassTables {
            types: compile_table(self.types)?,
            sellable: compile_table(self.sellable)?,
        })
    }
}

fn compile_table(raw: IndexMap<String, RawRule>) -> Result<IndexMap<String, TagRule>, ClassifyError> {
    raw.into_iter()
        .map(|(tag, rule)| {
            let compiled = TagRule {
                name: union(&tag, &rule.name)?,
                noun: union(&tag, &rule.noun)?,
                exclude: union(&tag, &rule.exclude)?,
            };
            Ok((tag, compiled))
        })
        .collect()
}

/// Compile several patterns into one alternation.
fn union(tag: &str, patterns: &[String]) -> Result<Option<Regex>, ClassifyError> {
    let source = match patterns {
        [] => return Ok(None),
        [single] => single.clone(),
        many => many
            .iter()
            .map(|p| format!("(?:{})", p))
            .collect::<Vec<_>>()
            .join("|"),
    };
    Regex::new(&source)
        .map(Some)
        .map_err(|source| ClassifyError::Regex {
            tag: tag.to_string(),
            source,
        })
}

/// Compiled patterns for one tag.
#[derive(Debug, Clone)]
struct TagRule {
    name: Option<Regex>,
    noun: Option<Regex>,
    exclude: Option<Regex>,
}

impl TagRule {
    fn matches(&self, name: Option<&str>, noun: Option<&str>) -> bool {
        let by_name = matches_opt(&self.name, name);
        let by_noun = matches_opt(&self.noun, noun);
        let excluded = matches_opt(&self.exclude, name);
        (by_name || by_noun) && !excluded
    }
}

fn matches_opt(pattern: &Option<Regex>, text: Option<&str>) -> bool {
    match (pattern, text) {
        (Some(re), Some(text)) => re.is_match(text),
        _ => false,
    }
}

/// Compiled type and sellable tables.
#[derive(Debug, Clone, Default)]
pub struct ClassTables {
    types: IndexMap<String, TagRule>,
    sellable: IndexMap<String, TagRule>,
}

impl ClassTables {
    /// Parse a single document.
    pub fn from_xml_str(xml: &str) -> Result<Self, ClassifyError> {
        let mut raw = RawTables::default();
        raw.parse_into(xml, Path::new("<inline>"))?;
        raw.compile()
    }

    /// Load the data file, merging the custom override when it exists.
    pub fn load(data_file: &Path) -> Result<Self, ClassifyError> {
        let mut raw = RawTables::default();
        let text = read(data_file)?;
        raw.parse_into(&text, data_file)?;

        let custom = custom_override_path(data_file);
        if custom.is_file() {
            let text = read(&custom)?;
            raw.parse_into(&text, &custom)?;
            tracing::debug!(path = %custom.display(), "merged custom classification data");
        }
        raw.compile()
    }

    /// Comma-joined type tags for a name/noun pair.
    pub fn type_of(&self, name: Option<&str>, noun: Option<&str>) -> Option<String> {
        joined_matches(&self.types, name, noun)
    }

    /// Comma-joined sellable tags for a name/noun pair.
    pub fn sellable_of(&self, name: Option<&str>, noun: Option<&str>) -> Option<String> {
        joined_matches(&self.sellable, name, noun)
    }

    /// Type tag keys in file order.
    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Sellable tag keys in file order.
    pub fn sellable_tags(&self) -> impl Iterator<Item = &str> {
        self.sellable.keys().map(String::as_str)
    }
}

fn read(path: &Path) -> Result<String, ClassifyError> {
    std::fs::read_to_string(path).map_err(|source| ClassifyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn joined_matches(
    table: &IndexMap<String, TagRule>,
    name: Option<&str>,
    noun: Option<&str>,
) -> Option<String> {
    let tags: Vec<&str> = table
        .iter()
        .filter(|(_, rule)| rule.matches(name, noun))
        .map(|(tag, _)| tag.as_str())
        .collect();
    if tags.is_empty() {
        None
    } else {
        Some(tags.join(","))
    }
}

/// Lazily loaded tables plus the per-name type memo.
#[derive(Debug)]
pub struct Classifier {
    data_file: PathBuf,
    tables: Option<ClassTables>,
    load_attempted: bool,
    type_cache: HashMap<String, Option<String>>,
}

impl Classifier {
    /// Create a classifier that loads `data_file` on first use.
    pub fn new(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
            tables: None,
            load_attempted: false,
            type_cache: HashMap::new(),
        }
    }

    /// Create a classifier from already compiled tables.
    pub fn with_tables(tables: ClassTables) -> Self {
        Self {
            data_file: PathBuf::new(),
            tables: Some(tables),
            load_attempted: true,
            type_cache: HashMap::new(),
        }
    }

    /// Whether tables are currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.tables.is_some()
    }

    /// The data file the next default reload reads.
    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    /// (Re)load tables, from `path` if given (which becomes the new
    /// default), else from the current data file.
    ///
    /// On failure the tables are emptied and the error is logged;
    /// classification returns `None` until a later reload succeeds.
    pub fn reload(&mut self, path: Option<&Path>) -> bool {
        if let Some(path) = path {
            self.data_file = path.to_path_buf();
        }
        self.load_attempted = true;
        self.type_cache.clear();

        match ClassTables::load(&self.data_file) {
            Ok(tables) => {
                tracing::debug!(
                    path = %self.data_file.display(),
                    types = tables.types.len(),
                    sellable = tables.sellable.len(),
                    "loaded classification data"
                );
                self.tables = Some(tables);
                true
            }
            Err(e) => {
                tracing::error!("Failed to load classification data: {}", e);
                self.tables = None;
                false
            }
        }
    }

    fn ensure_loaded(&mut self) -> Option<&ClassTables> {
        if !self.load_attempted {
            self.reload(None);
        }
        self.tables.as_ref()
    }

    /// Type tags, memoized per name.
    pub fn type_of(&mut self, name: Option<&str>, noun: Option<&str>) -> Option<String> {
        if let Some(cached) = name.and_then(|n| self.type_cache.get(n)) {
            return cached.clone();
        }
        let result = self.ensure_loaded()?.type_of(name, noun);
        if let Some(name) = name {
            self.type_cache.insert(name.to_string(), result.clone());
        }
        result
    }

    /// Sellable tags.
    pub fn sellable_of(&mut self, name: Option<&str>, noun: Option<&str>) -> Option<String> {
        self.ensure_loaded()?.sellable_of(name, noun)
    }
}
