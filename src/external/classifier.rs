use async_trait::async_trait;

use super::error::CollaboratorError;

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SpeciesClassifier: Send + Sync {
    /// Predict the herb species shown in `image`.
    async fn classify(&self, image: &[u8]) -> Result<String, CollaboratorError>;
}

/// Answers the same label for every image.
#[derive(Debug, Clone)]
pub struct StaticClassifier {
    label: String,
}

impl StaticClassifier {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
        }
    }
}

#[async_trait]
impl SpeciesClassifier for StaticClassifier {
    async fn classify(&self, image: &[u8]) -> Result<String, CollaboratorError> {
        if image.is_empty() {
            return Err(CollaboratorError::rejected("species classifier", "empty image"));
        }
        Ok(self.label.clone())
    }
}

/// Exact species comparison, ignoring case and punctuation.
///
/// A label such as "Tulsi (Holy Basil)" names the species "tulsi" and "holy basil";
/// the herb matches when it shares one of those names. Partial words never match.
pub fn species_matches(herb_name: &str, label: &str) -> bool {
    let predicted = species_names(label);
    species_names(herb_name)
        .iter()
        .any(|name| predicted.contains(name))
}

/// Main name plus parenthesised qualifiers, normalized.
fn species_names(label: &str) -> Vec<String> {
    label
        .split(['(', ')'])
        .map(|part| {
            part.chars()
                .filter(|c| c.is_alphanumeric() || c.is_whitespace())
                .collect::<String>()
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|name| !name.is_empty())
        .collect()
}
