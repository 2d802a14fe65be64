use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use solvent_core::{ToolCall, ToolResult};

use crate::llm::ToolDefinition;

/// A named operation the reasoning engine may request.
///
/// `parameters` returns a JSON-schema-shaped description of the expected
/// arguments; it is forwarded verbatim to the engine so the model knows
/// how to call the capability.
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters(&self) -> Value;
    async fn invoke(&self, args: Value, ctx: &CapabilityContext) -> Result<String>;
}

/// Execution environment shared by all capabilities of one run.
pub struct CapabilityContext {
    working_dir: PathBuf,
    attachments_dir: PathBuf,
}

impl CapabilityContext {
    pub fn new(working_dir: impl Into<PathBuf>, attachments_dir: impl Into<PathBuf>) -> Self {
        Self { working_dir: working_dir.into(), attachments_dir: attachments_dir.into() }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn attachments_dir(&self) -> &Path {
        &self.attachments_dir
    }

    /// Resolves a bare file name against the working directory first,
    /// then the attachments directory. The error names both attempted
    /// locations so the engine can see why the lookup failed.
    pub fn resolve_file(&self, name: &str) -> Result<PathBuf> {
        let candidates = [self.working_dir.join(name), self.attachments_dir.join(name)];
        for candidate in &candidates {
            if candidate.exists() {
                return Ok(candidate.clone());
            }
        }

        bail!(
            "file `{name}` not found (looked in `{}` and `{}`)",
            candidates[0].display(),
            candidates[1].display()
        )
    }
}

/// Name-keyed set of capabilities. Registering a duplicate name replaces
/// the previous capability.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Box<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn register<C>(&mut self, capability: C)
    where
        C: Capability + 'static,
    {
        self.capabilities.insert(capability.name().to_string(), Box::new(capability));
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.capabilities
            .values()
            .map(|capability| ToolDefinition {
                name: capability.name().to_string(),
                description: capability.description().to_string(),
                parameters: capability.parameters(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    fn get(&self, name: &str) -> Option<&dyn Capability> {
        self.capabilities.get(name).map(Box::as_ref)
    }
}

/// Executes engine-requested tool calls against the registry.
///
/// Dispatch never propagates an error: unknown names and capability
/// failures both become failure `ToolResult`s that flow back to the
/// engine as observations.
pub struct CapabilityDispatcher {
    registry: CapabilityRegistry,
    context: CapabilityContext,
}

impl CapabilityDispatcher {
    pub fn new(registry: CapabilityRegistry, context: CapabilityContext) -> Self {
        Self { registry, context }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let Some(capability) = self.registry.get(&call.name) else {
            warn!(call_id = %call.id, name = %call.name, "unknown capability requested");
            return ToolResult::failure(&call.id, format!("unknown capability `{}`", call.name));
        };

        debug!(call_id = %call.id, name = %call.name, "dispatching capability");
        match capability.invoke(call.arguments.clone(), &self.context).await {
            Ok(content) => ToolResult::success(&call.id, content),
            Err(error) => {
                warn!(call_id = %call.id, name = %call.name, error = %format!("{error:#}"), "capability failed");
                ToolResult::failure(&call.id, format!("{error:#}"))
            }
        }
    }

    /// Executes calls strictly one at a time, preserving request order.
    pub async fn dispatch_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.dispatch(call).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use solvent_core::ToolCall;

    use super::{Capability, CapabilityContext, CapabilityDispatcher, CapabilityRegistry};

    struct Echo;

    #[async_trait]
    impl Capability for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "returns its text argument"
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn invoke(&self, args: Value, _ctx: &CapabilityContext) -> anyhow::Result<String> {
            args.get("text")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| anyhow!("missing `text` argument"))
        }
    }

    fn dispatcher(dir: &TempDir) -> CapabilityDispatcher {
        let mut registry = CapabilityRegistry::default();
        registry.register(Echo);
        CapabilityDispatcher::new(
            registry,
            CapabilityContext::new(dir.path(), dir.path().join("attachments")),
        )
    }

    #[tokio::test]
    async fn unknown_capability_yields_a_failure_result() {
        let dir = TempDir::new().expect("create temp dir");
        let call = ToolCall::new("call-1", "no_such_tool", json!({}));

        let result = dispatcher(&dir).dispatch(&call).await;
        assert!(result.is_failure());
        assert_eq!(result.call_id, "call-1");
        assert!(result.content.contains("unknown capability"));
    }

    #[tokio::test]
    async fn capability_errors_become_failure_results() {
        let dir = TempDir::new().expect("create temp dir");
        let call = ToolCall::new("call-2", "echo", json!({}));

        let result = dispatcher(&dir).dispatch(&call).await;
        assert!(result.is_failure());
        assert!(result.content.contains("missing `text` argument"));
    }

    #[tokio::test]
    async fn dispatch_all_preserves_request_order() {
        let dir = TempDir::new().expect("create temp dir");
        let calls = vec![
            ToolCall::new("call-1", "echo", json!({"text": "first"})),
            ToolCall::new("call-2", "echo", json!({"text": "second"})),
        ];

        let results = dispatcher(&dir).dispatch_all(&calls).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].call_id, "call-1");
        assert_eq!(results[0].content, "first");
        assert_eq!(results[1].call_id, "call-2");
        assert_eq!(results[1].content, "second");
    }

    #[test]
    fn resolve_file_prefers_working_dir_then_attachments() {
        let dir = TempDir::new().expect("create temp dir");
        let attachments = dir.path().join("attachments");
        fs::create_dir_all(&attachments).expect("create attachments dir");
        fs::write(attachments.join("data.xlsx"), b"bytes").expect("write attachment");

        let ctx = CapabilityContext::new(dir.path(), &attachments);
        let resolved = ctx.resolve_file("data.xlsx").expect("resolve attachment");
        assert_eq!(resolved, attachments.join("data.xlsx"));

        fs::write(dir.path().join("data.xlsx"), b"local").expect("write local file");
        let resolved = ctx.resolve_file("data.xlsx").expect("resolve local file");
        assert_eq!(resolved, dir.path().join("data.xlsx"));
    }

    #[test]
    fn resolve_file_error_lists_both_locations() {
        let dir = TempDir::new().expect("create temp dir");
        let ctx = CapabilityContext::new(dir.path(), dir.path().join("attachments"));

        let error = ctx.resolve_file("missing.txt").expect_err("lookup should fail");
        let message = format!("{error:#}");
        assert!(message.contains("missing.txt"));
        assert!(message.contains("attachments"));
    }
}
