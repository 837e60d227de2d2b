//! Doc comment summaries.
//!
//! Only the parts shown to users are extracted: the summary paragraph and
//! the `@param`, `@return` and `@deprecated` tags. Types stay as written.

/// What a `/** ... */` comment says about a symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocBlock {
    pub summary: Option<String>,
    pub params: Vec<DocParam>,
    pub return_type: Option<String>,
    /// The deprecation note; empty when the tag has no text.
    pub deprecated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocParam {
    /// Without the leading `$`.
    pub name: String,
    pub type_text: Option<String>,
    pub description: Option<String>,
}

impl DocBlock {
    /// Markdown for hover and completion documentation.
    pub fn to_markdown(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(summary) = &self.summary {
            parts.push(summary.clone());
        }
        if !self.params.is_empty() {
            let params: Vec<String> = self
                .params
                .iter()
                .map(|p| {
                    let mut line = format!("- `${}`", p.name);
                    if let Some(ty) = &p.type_text {
                        line.push_str(&format!(" `{}`", ty));
                    }
                    if let Some(desc) = &p.description {
                        line.push(' ');
                        line.push_str(desc);
                    }
                    line
                })
                .collect();
            parts.push(format!("**Parameters:**\n\n{}", params.join("\n")));
        }
        if let Some(ret) = &self.return_type {
            parts.push(format!("**Returns:** `{}`", ret));
        }
        if let Some(note) = &self.deprecated {
            if note.is_empty() {
                parts.push("**Deprecated**".to_string());
            } else {
                parts.push(format!("**Deprecated:** {}", note));
            }
        }
        parts.join("\n\n")
    }
}

/// Parse a doc comment including its `/**` and `*/` markers.
pub fn parse_phpdoc(comment: &str) -> DocBlock {
    let mut doc = DocBlock::default();
    let mut summary: Vec<&str> = Vec::new();
    let mut in_summary = true;

    for line in comment_lines(comment) {
        if line.is_empty() {
            if !summary.is_empty() {
                in_summary = false;
            }
            continue;
        }
        if line.starts_with('@') {
            in_summary = false;
            parse_tag(line, &mut doc);
        } else if in_summary {
            summary.push(line);
        }
    }

    if !summary.is_empty() {
        doc.summary = Some(summary.join(" "));
    }
    doc
}

fn comment_lines(comment: &str) -> impl Iterator<Item = &str> {
    comment.lines().filter_map(|line| {
        let line = line.trim();
        if line.starts_with("*/") {
            return None;
        }
        let line = line
            .strip_prefix("/**")
            .or_else(|| line.strip_prefix('*'))
            .unwrap_or(line);
        Some(line.strip_suffix("*/").unwrap_or(line).trim())
    })
}

fn parse_tag(line: &str, doc: &mut DocBlock) {
    let (tag, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match tag {
        "@param" => {
            if let Some(param) = parse_param(rest) {
                doc.params.push(param);
            }
        }
        "@return" => {
            doc.return_type = rest.split_whitespace().next().map(str::to_string);
        }
        "@deprecated" => doc.deprecated = Some(rest.to_string()),
        _ => {}
    }
}

/// `[Type] $name [description]`
fn parse_param(rest: &str) -> Option<DocParam> {
    let mut words = rest.splitn(2, char::is_whitespace);
    let first = words.next()?;
    let (type_text, name, tail) = if first.starts_with('$') {
        (None, first, words.next())
    } else {
        let mut remaining = words.next()?.trim_start().splitn(2, char::is_whitespace);
        let name = remaining.next()?;
        if !name.starts_with('$') && !name.starts_with("...$") {
            return None;
        }
        (Some(first.to_string()), name, remaining.next())
    };

    Some(DocParam {
        name: name.trim_start_matches("...").trim_start_matches('$').to_string(),
        type_text,
        description: tail.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_and_tags() {
        let doc = parse_phpdoc(
            "/**\n * Sends a message.\n * Retries on failure.\n *\n * Longer text.\n * @param Message $message The message\n * @param int $retries\n * @return bool\n */",
        );
        assert_eq!(
            doc.summary.as_deref(),
            Some("Sends a message. Retries on failure.")
        );
        assert_eq!(doc.params.len(), 2);
        assert_eq!(doc.params[0].name, "message");
        assert_eq!(doc.params[0].type_text.as_deref(), Some("Message"));
        assert_eq!(doc.params[0].description.as_deref(), Some("The message"));
        assert_eq!(doc.params[1].description, None);
        assert_eq!(doc.return_type.as_deref(), Some("bool"));
        assert_eq!(doc.deprecated, None);
    }

    #[test]
    fn test_one_line_comment() {
        let doc = parse_phpdoc("/** Short. */");
        assert_eq!(doc.summary.as_deref(), Some("Short."));
    }

    #[test]
    fn test_untyped_and_variadic_params() {
        let doc = parse_phpdoc("/**\n * @param $plain\n * @param string ...$rest all of them\n */");
        assert_eq!(doc.params[0].name, "plain");
        assert_eq!(doc.params[0].type_text, None);
        assert_eq!(doc.params[1].name, "rest");
        assert_eq!(doc.params[1].description.as_deref(), Some("all of them"));
    }

    #[test]
    fn test_deprecated() {
        let bare = parse_phpdoc("/**\n * @deprecated\n */");
        assert_eq!(bare.deprecated.as_deref(), Some(""));
        let noted = parse_phpdoc("/** @deprecated use send() */");
        assert_eq!(noted.deprecated.as_deref(), Some("use send()"));
        assert!(noted.to_markdown().contains("**Deprecated:** use send()"));
    }

    #[test]
    fn test_markdown() {
        let doc = parse_phpdoc("/**\n * Adds.\n * @param int $a\n * @return int\n */");
        assert_eq!(
            doc.to_markdown(),
            "Adds.\n\n**Parameters:**\n\n- `$a` `int`\n\n**Returns:** `int`"
        );
        assert_eq!(DocBlock::default().to_markdown(), "");
    }
}
