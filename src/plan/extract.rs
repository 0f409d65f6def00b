//! 从模型原始文本中提取 JSON 对象
//!
//! 主规划与恢复规划共用的底层原语：
//! 1. 去掉成对的思考标记（如 `<think>...</think>`）之间的内容；缺少结束标记时保持原样
//! 2. 去掉 Markdown 代码块标记
//! 3. 从第一个 `{` 开始，截断到上限长度后做带字符串/转义感知的括号深度扫描
//!
//! 扫描只在字符串外计数花括号，`\"` 不改变字符串状态，深度回到 0 即结束；
//! 因此字符串值里嵌套的 `{}`（例如生成的 HTML / 内嵌 JSON）不会提前截断。

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

use crate::plan::ParseError;

static FENCE_RE: OnceLock<Regex> = OnceLock::new();

/// 删除每一对 start..end 标记及其中内容；找不到结束标记时停止，剩余文本保留
pub fn strip_thinking<'a>(text: &'a str, start: &str, end: &str) -> Cow<'a, str> {
    if start.is_empty() || end.is_empty() {
        return Cow::Borrowed(text);
    }
    let mut out = String::new();
    let mut rest = text;
    let mut changed = false;
    loop {
        let Some(s) = rest.find(start) else { break };
        let after = &rest[s + start.len()..];
        let Some(e) = after.find(end) else { break };
        out.push_str(&rest[..s]);
        rest = &after[e + end.len()..];
        changed = true;
    }
    if !changed {
        return Cow::Borrowed(text);
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// 删除 ``` / ```json 等代码块标记，保留块内内容
pub fn strip_code_fences(text: &str) -> Cow<'_, str> {
    let re = FENCE_RE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_+\-]*").unwrap());
    re.replace_all(text, "")
}

/// 按字符数截断（保证落在字符边界上）
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// 从以 `{` 开头的文本中扫描出第一个完整对象；扫描未闭合返回 None
pub fn scan_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// 定位并提取第一个 JSON 对象：无 `{` 返回 NoJsonObject，截断后仍未闭合返回 Unterminated
pub fn locate_json_object(text: &str, max_chars: usize) -> Result<&str, ParseError> {
    let start = text.find('{').ok_or(ParseError::NoJsonObject)?;
    let candidate = truncate_chars(&text[start..], max_chars);
    scan_object(candidate).ok_or(ParseError::Unterminated { scanned: candidate.chars().count() })
}
