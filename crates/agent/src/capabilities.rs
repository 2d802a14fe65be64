//! Builtin capabilities registered by default.
//!
//! Each one is deliberately small: the dispatcher contract does the heavy
//! lifting (argument schemas, failure conversion, file resolution).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::{Capability, CapabilityContext, CapabilityRegistry};

fn required_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("missing required string argument `{key}`"))
}

/// Reads a text file resolved through the two-location lookup
/// (working directory, then attachments directory).
pub struct ReadFile;

#[async_trait]
impl Capability for ReadFile {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the contents of a text file by name. Attached files are found automatically."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_name": {
                    "type": "string",
                    "description": "Bare file name, e.g. `data.csv`"
                }
            },
            "required": ["file_name"]
        })
    }

    async fn invoke(&self, args: Value, ctx: &CapabilityContext) -> Result<String> {
        let file_name = required_str(&args, "file_name")?;
        let path = ctx.resolve_file(&file_name)?;
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("could not read `{}` as text", path.display()))
    }
}

/// Reverses the characters of a string. Useful for questions that arrive
/// written backwards.
pub struct WordReversal;

#[async_trait]
impl Capability for WordReversal {
    fn name(&self) -> &'static str {
        "word_reversal"
    }

    fn description(&self) -> &'static str {
        "Reverse the characters of the given text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to reverse" }
            },
            "required": ["text"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &CapabilityContext) -> Result<String> {
        let text = required_str(&args, "text")?;
        Ok(text.chars().rev().collect())
    }
}

/// Splits a comma separated list, trims each item, drops empties, and
/// returns the items sorted alphabetically.
pub struct ListFilter;

#[async_trait]
impl Capability for ListFilter {
    fn name(&self) -> &'static str {
        "list_filter"
    }

    fn description(&self) -> &'static str {
        "Clean up a comma separated list: trim items, drop blanks, sort alphabetically."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Comma separated list, e.g. `pear, apple, , banana`"
                }
            },
            "required": ["text"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &CapabilityContext) -> Result<String> {
        let text = required_str(&args, "text")?;
        let mut items: Vec<&str> =
            text.split(',').map(str::trim).filter(|item| !item.is_empty()).collect();
        items.sort_unstable();
        Ok(items.join(", "))
    }
}

/// Registry with all builtin capabilities registered.
pub fn builtin_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::default();
    registry.register(ReadFile);
    registry.register(WordReversal);
    registry.register(ListFilter);
    registry
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use crate::tools::{Capability, CapabilityContext};

    use super::{builtin_registry, ListFilter, ReadFile, WordReversal};

    fn ctx(dir: &TempDir) -> CapabilityContext {
        CapabilityContext::new(dir.path(), dir.path().join("attachments"))
    }

    #[tokio::test]
    async fn read_file_falls_back_to_attachments_dir() {
        let dir = TempDir::new().expect("create temp dir");
        let attachments = dir.path().join("attachments");
        fs::create_dir_all(&attachments).expect("create attachments dir");
        fs::write(attachments.join("notes.txt"), "hello from attachment")
            .expect("write attachment");

        let content = ReadFile
            .invoke(json!({"file_name": "notes.txt"}), &ctx(&dir))
            .await
            .expect("read attached file");
        assert_eq!(content, "hello from attachment");
    }

    #[tokio::test]
    async fn word_reversal_reverses_characters() {
        let dir = TempDir::new().expect("create temp dir");
        let reversed = WordReversal
            .invoke(json!({"text": ".tfel"}), &ctx(&dir))
            .await
            .expect("reverse text");
        assert_eq!(reversed, "left.");
    }

    #[tokio::test]
    async fn list_filter_trims_sorts_and_drops_blanks() {
        let dir = TempDir::new().expect("create temp dir");
        let cleaned = ListFilter
            .invoke(json!({"text": "pear,  apple , , banana"}), &ctx(&dir))
            .await
            .expect("filter list");
        assert_eq!(cleaned, "apple, banana, pear");
    }

    #[test]
    fn builtin_registry_exposes_all_definitions() {
        let registry = builtin_registry();
        let names: Vec<String> =
            registry.definitions().into_iter().map(|definition| definition.name).collect();
        assert_eq!(names, vec!["list_filter", "read_file", "word_reversal"]);
    }
}
