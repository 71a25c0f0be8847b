//! Tool catalog rendering for the system message.

use std::collections::HashMap;
use std::sync::Arc;

use crate::hash::canonical_json;
use crate::tools::Tool;

/// Per-tool schemas inline, one block per tool.
pub fn verbose_catalog(tools: &[Arc<dyn Tool>]) -> String {
    let mut sorted: Vec<&Arc<dyn Tool>> = tools.iter().collect();
    sorted.sort_by_key(|t| t.name());

    let body = sorted
        .iter()
        .map(|t| t.plain_description())
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n<TOOLS>\n{body}\n</TOOLS>\n")
}

/// Compact mode: each distinct parameter schema is emitted once under
/// a global schemas block and referenced by id from the tool list.
pub fn centralized_catalog(tools: &[Arc<dyn Tool>]) -> String {
    let mut sorted: Vec<&Arc<dyn Tool>> = tools.iter().collect();
    sorted.sort_by_key(|t| t.name());

    let mut schema_ids: HashMap<String, String> = HashMap::new();
    let mut schemas: Vec<(String, String)> = Vec::new();
    let mut lines = Vec::new();

    for tool in sorted {
        let schema = tool.parameters().to_json_schema();
        let canonical = canonical_json(&schema);
        let id = schema_ids
            .entry(canonical.clone())
            .or_insert_with(|| {
                let id = format!("S{}", schemas.len() + 1);
                schemas.push((id.clone(), canonical));
                id
            })
            .clone();
        lines.push(format!("> {}: {} [params: {}]", tool.name(), tool.description(), id));
    }

    let schema_block = schemas
        .iter()
        .map(|(id, schema)| format!("{id}: {schema}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\n<TOOLS>\n{}\n</TOOLS>\n<SCHEMAS>\n{}\n</SCHEMAS>\n",
        lines.join("\n"),
        schema_block
    )
}
