// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of code artifact content while it streams in.
//!
//! Content may open with an `<artifact ...>` tag carrying `identifier`,
//! `type`, `language`, and `title` attributes, or with a fenced code block
//! naming the language. Closing tags and fences are optional because the
//! content is usually incomplete.

use std::sync::LazyLock;

use regex::Regex;

static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*"([^"]*)""#).unwrap());

const ARTIFACT_OPEN: &str = "<artifact";
const ARTIFACT_CLOSE: &str = "</artifact>";
const FENCE: &str = "```";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeMeta {
    pub identifier: Option<String>,
    pub artifact_type: Option<String>,
    pub language: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCode {
    pub meta: CodeMeta,
    pub body: String,
}

/// Splits streamed code artifact content into metadata and code body.
pub fn parse_code_artifact(content: &str) -> ParsedCode {
    let trimmed = content.trim_start();
    if let Some(rest) = trimmed.strip_prefix(ARTIFACT_OPEN) {
        return parse_tagged(rest);
    }
    if trimmed.starts_with(FENCE) {
        return parse_fenced(trimmed);
    }
    ParsedCode {
        meta: CodeMeta::default(),
        body: content.to_string(),
    }
}

fn parse_tagged(rest: &str) -> ParsedCode {
    // Until the opening tag is complete there is no body yet.
    let (attrs, body) = match rest.find('>') {
        Some(end) => (&rest[..end], &rest[end + 1..]),
        None => (rest, ""),
    };

    let mut meta = CodeMeta::default();
    for cap in ATTRIBUTE.captures_iter(attrs) {
        let value = cap[2].to_string();
        match &cap[1] {
            "identifier" => meta.identifier = Some(value),
            "type" => meta.artifact_type = Some(value),
            "language" => meta.language = Some(value),
            "title" => meta.title = Some(value),
            _ => {}
        }
    }

    let body = match body.find(ARTIFACT_CLOSE) {
        Some(end) => &body[..end],
        None => body,
    };
    let body = body.trim_start_matches(['\r', '\n']);

    // A fenced block inside the tag still gets its fence stripped.
    if body.trim_start().starts_with(FENCE) {
        let inner = parse_fenced(body.trim_start());
        if meta.language.is_none() {
            meta.language = inner.meta.language;
        }
        return ParsedCode {
            meta,
            body: inner.body,
        };
    }

    ParsedCode {
        meta,
        body: body.to_string(),
    }
}

fn parse_fenced(content: &str) -> ParsedCode {
    let after_fence = &content[FENCE.len()..];
    let (info, body) = match after_fence.find('\n') {
        Some(nl) => (&after_fence[..nl], &after_fence[nl + 1..]),
        None => (after_fence, ""),
    };
    let language = info.trim();

    let body = match body.rfind(FENCE) {
        Some(end) if body[end + FENCE.len()..].trim().is_empty() => &body[..end],
        _ => body,
    };

    ParsedCode {
        meta: CodeMeta {
            language: (!language.is_empty()).then(|| language.to_string()),
            ..CodeMeta::default()
        },
        body: body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_content_is_all_body() {
        let parsed = parse_code_artifact("fn main() {}");
        assert_eq!(parsed.meta, CodeMeta::default());
        assert_eq!(parsed.body, "fn main() {}");
    }

    #[test]
    fn complete_artifact_tag() {
        let parsed = parse_code_artifact(
            "<artifact identifier=\"counter\" type=\"application/vnd.react\" language=\"tsx\" title=\"Counter\">\nexport default () => null;\n</artifact>",
        );
        assert_eq!(parsed.meta.identifier.as_deref(), Some("counter"));
        assert_eq!(parsed.meta.artifact_type.as_deref(), Some("application/vnd.react"));
        assert_eq!(parsed.meta.language.as_deref(), Some("tsx"));
        assert_eq!(parsed.meta.title.as_deref(), Some("Counter"));
        assert_eq!(parsed.body, "export default () => null;\n");
    }

    #[test]
    fn streaming_artifact_without_close_tag() {
        let parsed =
            parse_code_artifact("<artifact language=\"python\" title=\"Fib\">\ndef fib(n):\n    ");
        assert_eq!(parsed.meta.language.as_deref(), Some("python"));
        assert_eq!(parsed.body, "def fib(n):\n    ");
    }

    #[test]
    fn incomplete_opening_tag_has_no_body() {
        let parsed = parse_code_artifact("<artifact title=\"Fi");
        assert_eq!(parsed.body, "");
        assert_eq!(parsed.meta.title, None);
    }

    #[test]
    fn fenced_block_gives_language() {
        let parsed = parse_code_artifact("```rust\nfn main() {}\n```\n");
        assert_eq!(parsed.meta.language.as_deref(), Some("rust"));
        assert_eq!(parsed.body, "fn main() {}\n");

        let open = parse_code_artifact("```go\npackage main\n");
        assert_eq!(open.meta.language.as_deref(), Some("go"));
        assert_eq!(open.body, "package main\n");
    }

    #[test]
    fn fence_inside_tag_is_stripped() {
        let parsed = parse_code_artifact(
            "<artifact title=\"Script\">\n```bash\necho hi\n```\n</artifact>",
        );
        assert_eq!(parsed.meta.title.as_deref(), Some("Script"));
        assert_eq!(parsed.meta.language.as_deref(), Some("bash"));
        assert_eq!(parsed.body, "echo hi\n");
    }
}
