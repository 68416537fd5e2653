use serde::{Deserialize, Serialize};

/// Stock-photo metadata generated for a single image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}
impl Metadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Keywords as a single comma-separated string, the shape both the tag
    /// embedder and the export layouts expect.
    pub fn keywords_joined(&self) -> String {
        self.keywords.iter().map(|k| k.trim()).filter(|k| !k.is_empty()).collect::<Vec<_>>().join(", ")
    }
}

/// Platform category selections.
///
/// Used at three levels: per image (user selection), per folder, and global
/// (configuration). Export resolves each slot independently, falling back from
/// the most specific level to the least.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Categories {
    pub adobe: Option<String>,
    pub shutterstock_primary: Option<String>,
    pub shutterstock_secondary: Option<String>,
}
impl Categories {
    /// Fill every unset (or blank) slot from `fallback`.
    pub fn or(&self, fallback: &Categories) -> Categories {
        fn pick(own: &Option<String>, other: &Option<String>) -> Option<String> {
            own.as_ref().filter(|s| !s.trim().is_empty()).or(other.as_ref()).cloned()
        }
        Categories {
            adobe: pick(&self.adobe, &fallback.adobe),
            shutterstock_primary: pick(&self.shutterstock_primary, &fallback.shutterstock_primary),
            shutterstock_secondary: pick(&self.shutterstock_secondary, &fallback.shutterstock_secondary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_joined_skips_blanks() {
        let metadata = Metadata::new("t", "d", ["sunset", " ", "beach ", ""]);
        assert_eq!(metadata.keywords_joined(), "sunset, beach");
    }

    #[test]
    fn test_categories_fallback_per_slot() {
        let image = Categories {
            adobe: Some("Landscapes".into()),
            shutterstock_primary: Some("  ".into()),
            shutterstock_secondary: None,
        };
        let default = Categories {
            adobe: Some("Travel".into()),
            shutterstock_primary: Some("Nature".into()),
            shutterstock_secondary: Some("Backgrounds/Textures".into()),
        };
        let resolved = image.or(&default);
        assert_eq!(resolved.adobe.as_deref(), Some("Landscapes"));
        assert_eq!(resolved.shutterstock_primary.as_deref(), Some("Nature"));
        assert_eq!(resolved.shutterstock_secondary.as_deref(), Some("Backgrounds/Textures"));
    }
}
