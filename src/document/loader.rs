use std::fs;
use std::path::Path;

use anyhow::{Context as AnyhowContext, Result};

use crate::document::ScriptDocument;
use crate::dsl::Script;

/// Reads a script document from a `.json`, `.yaml` or `.yml` file.
pub fn load_document(path: &Path) -> Result<ScriptDocument> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script file from {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    let document = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to deserialize YAML script from {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to deserialize JSON script from {}", path.display()))?
    };

    Ok(document)
}

/// Reads and reconstructs a validated script.
pub fn load_script(path: &Path) -> Result<Script> {
    let document = load_document(path)?;
    Script::from_document(document).with_context(|| format!("Invalid script in {}", path.display()))
}
