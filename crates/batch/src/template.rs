//! Prompt templates.
//!
//! Folders may name a template that is rendered per image and handed to the
//! metadata generator as extra instructions. Templates use [upon] syntax
//! (`{{ variable }}`, `{% if %}`, `{% for %}`) with these variables:
//!
//! | Variable             | Type           |
//! |----------------------|----------------|
//! | `file_name`          | `String`       |
//! | `folder_name`        | `String`       |
//! | `title_limit`        | integer        |
//! | `description_limit`  | integer        |
//! | `keyword_limit`      | integer        |
//! | `include_place_name` | `bool`         |
//! | `avoid.title`        | list of string |
//! | `avoid.description`  | list of string |
//! | `avoid.keywords`     | list of string |

use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use stocktag_config::Config;
use upon::{Engine, Template, Value};

/// Per-image values a template can refer to.
pub struct TemplateContext<'a> {
    pub file_name: &'a str,
    pub folder_name: &'a str,
    pub config: &'a Config,
}
impl TemplateContext<'_> {
    fn value(&self) -> Value {
        fn list(words: &[String]) -> Value {
            Value::List(words.iter().map(|w| Value::String(w.clone())).collect())
        }
        let limits = self.config.limits;
        let avoid = &self.config.avoid_words;
        upon::value! {
            file_name: self.file_name,
            folder_name: self.folder_name,
            title_limit: i64::from(limits.title_limit),
            description_limit: i64::from(limits.description_limit),
            keyword_limit: i64::from(limits.keyword_limit),
            include_place_name: self.config.include_place_name,
            avoid: upon::value! {
                title: list(&avoid.title),
                description: list(&avoid.description),
                keywords: list(&avoid.keywords),
            },
        }
    }
}

/// A single compiled template.
pub struct PromptTemplate {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl FromStr for PromptTemplate {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let engine = Engine::new();
        let template = engine.compile(s.to_string()).or_raise(|| ErrorKind::InvalidTemplate(s.to_string()))?;
        Ok(Self { engine, template })
    }
}
impl PromptTemplate {
    pub fn render(&self, context: &TemplateContext<'_>) -> std::result::Result<String, upon::Error> {
        self.template.render(&self.engine, context.value()).to_string()
    }
}

/// Templates by id.
#[derive(Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, PromptTemplate>,
}
impl TemplateRegistry {
    /// Compile every template up front, so a syntax error stops the run
    /// before any image is touched.
    pub fn compile(sources: &BTreeMap<String, String>) -> Result<Self> {
        let mut templates = HashMap::with_capacity(sources.len());
        for (id, source) in sources {
            let template = source.parse::<PromptTemplate>().or_raise(|| ErrorKind::InvalidTemplate(id.clone()))?;
            templates.insert(id.clone(), template);
        }
        Ok(Self { templates })
    }

    /// Render the template `id`. An unknown id is not an error: it is logged
    /// and treated as no template at all.
    pub fn render(&self, id: Option<&str>, context: &TemplateContext<'_>) -> Result<Option<String>> {
        let Some(id) = id else {
            return Ok(None);
        };
        let Some(template) = self.templates.get(id) else {
            tracing::warn!(template = id, "Prompt template not found; continuing without one");
            return Ok(None);
        };
        let rendered = template.render(context).or_raise(|| ErrorKind::Template(id.to_string()))?;
        Ok(Some(rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(entries: &[(&str, &str)]) -> Result<TemplateRegistry> {
        let sources = entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        TemplateRegistry::compile(&sources)
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.limits.keyword_limit = 30;
        config.include_place_name = true;
        config.avoid_words.keywords = vec!["ai".into(), "generated".into()];
        config
    }

    #[test]
    fn test_render_variables() {
        let registry = registry(&[(
            "travel",
            "{{ file_name }} from {{ folder_name }}: max {{ keyword_limit }} keywords\
             {% if include_place_name %}, name the place{% endif %}\
             {% for w in avoid.keywords %} -{{ w }}{% endfor %}",
        )])
        .unwrap();
        let config = config();
        let context = TemplateContext { file_name: "a.jpg", folder_name: "Iceland", config: &config };
        let rendered = registry.render(Some("travel"), &context).unwrap().unwrap();
        assert_eq!(rendered, "a.jpg from Iceland: max 30 keywords, name the place -ai -generated");
    }

    #[test]
    fn test_unknown_or_missing_id_is_no_template() {
        let registry = registry(&[]).unwrap();
        let config = config();
        let context = TemplateContext { file_name: "a.jpg", folder_name: "f", config: &config };
        assert!(registry.render(Some("nope"), &context).unwrap().is_none());
        assert!(registry.render(None, &context).unwrap().is_none());
    }

    #[test]
    fn test_syntax_error_at_compile_time() {
        let Err(err) = registry(&[("broken", "{{ unclosed")]) else {
            panic!("a template with an unclosed tag compiled");
        };
        assert!(matches!(&*err, ErrorKind::InvalidTemplate(id) if id == "broken"));
    }

    #[test]
    fn test_render_error() {
        let registry = registry(&[("bad", "{{ no_such_variable }}")]).unwrap();
        let config = config();
        let context = TemplateContext { file_name: "a.jpg", folder_name: "f", config: &config };
        let err = registry.render(Some("bad"), &context).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Template(id) if id == "bad"));
    }
}
