//! `{{token}}` substitution
//!
//! Text values replace their token verbatim. List values become one
//! `&bull; {line}<br>` fragment per entry in HTML and one `- {line}` line in
//! plain text. Unknown tokens are left in place.

use std::collections::BTreeMap;

use keycycle_core::TemplateValue;

/// Render a template as HTML
pub fn render_html(template: &str, values: &BTreeMap<&'static str, TemplateValue>) -> String {
    render(template, values, |lines| {
        lines
            .iter()
            .map(|line| format!("&bull; {line}<br>"))
            .collect()
    })
}

/// Render a template as plain text, stripping markup
pub fn render_text(template: &str, values: &BTreeMap<&'static str, TemplateValue>) -> String {
    let rendered = render(template, values, |lines| {
        lines
            .iter()
            .map(|line| format!("- {line}\n"))
            .collect()
    });
    strip_markup(&rendered)
}

fn render(
    template: &str,
    values: &BTreeMap<&'static str, TemplateValue>,
    list: impl Fn(&[String]) -> String,
) -> String {
    values.iter().fold(template.to_string(), |body, (token, value)| {
        let placeholder = format!("{{{{{token}}}}}");
        if !body.contains(&placeholder) {
            return body;
        }
        let replacement = match value {
            TemplateValue::Text(text) => text.clone(),
            TemplateValue::List(lines) => list(lines),
        };
        body.replace(&placeholder, &replacement)
    })
}

/// Drop tags, turn line-breaking tags into newlines, decode the few
/// entities the templates use, and trim blank runs.
fn strip_markup(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut tag = String::new();
    let mut in_tag = false;

    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .next()
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if matches!(name.as_str(), "br" | "p" | "div" | "li" | "tr" | "h1" | "h2" | "h3") {
                    out.push('\n');
                }
            }
            _ if in_tag => tag.push(ch),
            _ => out.push(ch),
        }
    }

    let decoded = out
        .replace("&bull;", "•")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");

    let mut lines: Vec<&str> = Vec::new();
    for line in decoded.lines().map(str::trim_end) {
        let blank = line.trim().is_empty();
        if blank && lines.last().is_none_or(|prev| prev.trim().is_empty()) {
            continue;
        }
        lines.push(line.trim_start());
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn values() -> BTreeMap<&'static str, TemplateValue> {
        BTreeMap::from([
            ("account_name", TemplateValue::Text("sandbox".into())),
            (
                "actions",
                TemplateValue::List(vec![
                    "Rotating AKIA1 for alice".into(),
                    "Deleting AKIA2 for bob".into(),
                ]),
            ),
            ("pending_actions", TemplateValue::List(vec![])),
        ])
    }

    #[test]
    fn html_lists_use_bullets_and_breaks() {
        let html = render_html("<p>{{account_name}}</p><p>{{actions}}</p>", &values());
        assert_eq!(
            html,
            "<p>sandbox</p><p>&bull; Rotating AKIA1 for alice<br>&bull; Deleting AKIA2 for bob<br></p>"
        );
    }

    #[test]
    fn tokens_repeat_and_unknown_tokens_survive() {
        let html = render_html("{{account_name}}/{{account_name}} {{unknown}}", &values());
        assert_eq!(html, "sandbox/sandbox {{unknown}}");
    }

    #[test]
    fn empty_list_renders_nothing() {
        assert_eq!(render_html("[{{pending_actions}}]", &values()), "[]");
    }

    #[test]
    fn text_body_drops_markup() {
        let text = render_text(
            "<html><body><h1>Key rotation for {{account_name}}</h1>\n<p>{{actions}}</p></body></html>",
            &values(),
        );
        assert_eq!(
            text,
            "Key rotation for sandbox\n\n- Rotating AKIA1 for alice\n- Deleting AKIA2 for bob"
        );
    }

    #[test]
    fn entities_are_decoded_in_text() {
        assert_eq!(render_text("a &amp; b &lt;c&gt;", &values()), "a & b <c>");
    }
}
