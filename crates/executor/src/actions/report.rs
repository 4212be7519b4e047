//! Local-file reporting and assertion actions. These touch the executor's
//! own filesystem, not the page.

use std::fs;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::actions::{absolutize, first_non_empty, param_str};
use crate::errors::ExecError;
use crate::output::ActionOutput;
use crate::registry::{ActionContext, ActionHandler};

fn markdown_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]+\]\((https?://[^)]+)\)").unwrap())
}

fn step_path(ctx: &ActionContext<'_>, action: &str) -> Result<String, ExecError> {
    let path = first_non_empty(&[
        &ctx.step.target,
        &ctx.step.value,
        &param_str(ctx.step, "path"),
    ]);
    if path.is_empty() {
        return Err(ExecError::Validation(format!(
            "{action} requires a path in target/value/params.path"
        )));
    }
    Ok(path)
}

#[derive(Debug, PartialEq)]
struct ReportItem {
    title: String,
    url: String,
}

impl ReportItem {
    fn from_value(value: &Value) -> Self {
        if let Value::String(s) = value {
            return ReportItem { title: s.clone(), url: String::new() };
        }
        let field = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| value.get(*k))
                .filter_map(Value::as_str)
                .map(str::trim)
                .find(|s| !s.is_empty())
                .unwrap_or("")
                .to_string()
        };
        ReportItem {
            title: field(&["title", "name"]),
            url: field(&["url", "link"]),
        }
    }

    fn is_empty(&self) -> bool {
        self.title.is_empty() && self.url.is_empty()
    }
}

fn build_markdown(title: &str, items: &[ReportItem]) -> String {
    let mut out = format!("# {title}\n\n");
    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            if item.url.is_empty() {
                format!("{}. {}", index + 1, item.title)
            } else {
                let label = if item.title.is_empty() { &item.url } else { &item.title };
                format!("{}. [{label}]({})", index + 1, item.url)
            }
        })
        .collect();
    out.push_str(&lines.join("\n"));
    out.push('\n');
    out
}

/// `write_markdown` - render a titled, numbered link list to a file. Items
/// come from the variable named by `params.items_var`, falling back to the
/// literal `params.items` array.
pub struct WriteMarkdownAction;

#[async_trait]
impl ActionHandler for WriteMarkdownAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let path = step_path(&ctx, "write_markdown")?;
        let title = {
            let t = param_str(ctx.step, "title");
            if t.is_empty() { "Generated Results".to_string() } else { t }
        };

        let items_var = param_str(ctx.step, "items_var");
        let raw_items = if !items_var.is_empty() {
            ctx.runtime.get_var(&items_var).cloned()
        } else {
            None
        }
        .or_else(|| ctx.step.params.get("items").cloned())
        .unwrap_or(Value::Array(Vec::new()));

        let Value::Array(raw_items) = raw_items else {
            return Err(ExecError::Validation(
                "write_markdown items must be an array".to_string(),
            ));
        };
        let items: Vec<ReportItem> = raw_items
            .iter()
            .map(ReportItem::from_value)
            .filter(|item| !item.is_empty())
            .collect();

        let absolute = absolutize(&path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&absolute, build_markdown(&title, &items))?;

        let absolute = absolute.to_string_lossy().into_owned();
        ctx.runtime.artifacts.record(&absolute);
        Ok(ActionOutput::Report {
            path: absolute,
            items: Some(items.len()),
            appended: false,
        })
    }
}

/// `append_markdown_section` - append a `## heading` block (with optional
/// source link and content) to an existing report file.
pub struct AppendMarkdownSectionAction;

#[async_trait]
impl ActionHandler for AppendMarkdownSectionAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let path = step_path(&ctx, "append_markdown_section")?;
        let heading = param_str(ctx.step, "heading");
        let content = param_str(ctx.step, "content");
        let source_url = param_str(ctx.step, "url");
        if heading.is_empty() && content.is_empty() && source_url.is_empty() {
            return Err(ExecError::Validation(
                "append_markdown_section requires at least heading/content/url".to_string(),
            ));
        }

        let absolute = absolutize(&path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut lines = vec![String::new()];
        lines.push(format!(
            "## {}",
            if heading.is_empty() { "Section" } else { &heading }
        ));
        if !source_url.is_empty() {
            lines.push(format!("Source: [{source_url}]({source_url})"));
        }
        lines.push(String::new());
        if !content.is_empty() {
            lines.push(content);
        }
        lines.push(String::new());

        let mut file = fs::OpenOptions::new().create(true).append(true).open(&absolute)?;
        std::io::Write::write_all(&mut file, lines.join("\n").as_bytes())?;

        let absolute = absolute.to_string_lossy().into_owned();
        ctx.runtime.artifacts.record(&absolute);
        Ok(ActionOutput::Report {
            path: absolute,
            items: None,
            appended: true,
        })
    }
}

/// `assert_file` - fail unless the file exists and meets `params.min_bytes`
/// (default 1).
pub struct AssertFileAction;

#[async_trait]
impl ActionHandler for AssertFileAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let path = step_path(&ctx, "assert_file")?;
        let absolute = absolutize(&path)?;
        let meta = fs::metadata(&absolute)
            .map_err(|_| ExecError::Io(format!("file not found: {}", absolute.display())))?;
        let min_bytes = ctx
            .step
            .params
            .get("min_bytes")
            .and_then(Value::as_u64)
            .unwrap_or(1);
        if meta.len() < min_bytes {
            return Err(ExecError::Io(format!(
                "file size {} < expected {min_bytes}",
                meta.len()
            )));
        }
        Ok(ActionOutput::Assertion {
            path: absolute.to_string_lossy().into_owned(),
            size: Some(meta.len()),
            link_count: None,
        })
    }
}

/// `assert_markdown` - fail unless the markdown file contains at least
/// `params.min_links` (default 1) absolute links and every
/// `params.must_include` token.
pub struct AssertMarkdownAction;

#[async_trait]
impl ActionHandler for AssertMarkdownAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let path = step_path(&ctx, "assert_markdown")?;
        let absolute = absolutize(&path)?;
        let text = fs::read_to_string(&absolute)
            .map_err(|_| ExecError::Io(format!("markdown file not found: {}", absolute.display())))?;

        let link_count = markdown_link_re().find_iter(&text).count();
        let min_links = ctx
            .step
            .params
            .get("min_links")
            .and_then(Value::as_u64)
            .unwrap_or(1) as usize;
        if link_count < min_links {
            return Err(ExecError::Io(format!(
                "markdown link count {link_count} < expected {min_links}"
            )));
        }

        if let Some(Value::Array(tokens)) = ctx.step.params.get("must_include") {
            for token in tokens {
                let token = match token {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if !text.contains(&token) {
                    return Err(ExecError::Io(format!(
                        "markdown missing required token: {token}"
                    )));
                }
            }
        }

        Ok(ActionOutput::Assertion {
            path: absolute.to_string_lossy().into_owned(),
            size: None,
            link_count: Some(link_count),
        })
    }
}
