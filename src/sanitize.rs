const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Isolates the JSON payload of a model response. Never fails: text without any
/// recognizable payload comes back trimmed so the parser can report it.
pub fn sanitize(raw: &str) -> String {
    let without_reasoning = strip_think_blocks(raw);

    if let Some(body) = fenced_body(&without_reasoning) {
        return match json_span(body) {
            Some(span) => span.trim().to_owned(),
            None => body.trim().to_owned(),
        };
    }

    match json_span(&without_reasoning) {
        Some(span) => span.trim().to_owned(),
        None => without_reasoning.trim().to_owned(),
    }
}

fn strip_think_blocks(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    loop {
        let Some(open) = rest.find(THINK_OPEN) else {
            out.push_str(rest);
            break;
        };
        let after_open = &rest[open + THINK_OPEN.len()..];
        let Some(close) = after_open.find(THINK_CLOSE) else {
            // unterminated: leave it for the JSON scan
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..open]);
        rest = &after_open[close + THINK_CLOSE.len()..];
    }
    out
}

/// Body of the fenced block wrapping the payload. A fence only counts when it
/// opens before any JSON does, so backticks inside string values are left alone.
fn fenced_body(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    if text.find(['{', '[']).is_some_and(|json| json < open) {
        return None;
    }
    let after_ticks = &text[open + 3..];
    // optional language tag up to the end of the fence line
    let body_start = match after_ticks.find('\n') {
        Some(newline) => {
            let tag = &after_ticks[..newline];
            if tag.trim().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                newline + 1
            } else {
                0
            }
        }
        None => 0,
    };
    let body = &after_ticks[body_start..];
    let close = body.rfind("```")?;
    Some(&body[..close])
}

/// First top-level JSON object or array, matched by depth. String literals are
/// skipped so braces inside values do not count.
pub fn json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    Some(&text[start..])
}
