use crate::models::PredictionAnalysis;

const HIGHEST_ACCURACY: &[&str] = &["highest accuracy"];
const TOP_TOPICS: &[&str] = &["top 3 topics", "topics"];
const RATING: &[&str] = &["rating"];
const BEST_PREDICTIONS: &[&str] = &["best predictions"];
const WORST_PREDICTIONS: &[&str] = &["worst predictions"];
const SUMMARY: &[&str] = &["summary"];
const NEXT_PICK: &[&str] = &["prediction for what they might pick next", "next pick"];
const CATCH_PHRASES: &[&str] = &["catch phrases", "catchphrases"];

/// 把 LLM 的自由文本解析为结构化结果
///
/// 按空行切分段落，用段落首行中的标签（不区分大小写）定位各字段。
/// 找不到的字段取默认值：数字为 0，列表为空，评级为 `Unknown`，其余为空字符串。
pub fn parse_analysis(text: &str) -> PredictionAnalysis {
    let sections = split_sections(text);
    let find = |labels: &[&str]| find_section(&sections, labels);
    let defaults = PredictionAnalysis::default();

    PredictionAnalysis {
        highest_accuracy: find(HIGHEST_ACCURACY)
            .and_then(|s| leading_number(inline_value(s)))
            .unwrap_or(defaults.highest_accuracy),
        top_topics: find(TOP_TOPICS).map(comma_list).unwrap_or_default(),
        rating: find(RATING)
            .map(inline_value)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or(defaults.rating),
        best_predictions: find(BEST_PREDICTIONS).map(line_list).unwrap_or_default(),
        worst_predictions: find(WORST_PREDICTIONS).map(line_list).unwrap_or_default(),
        summary: find(SUMMARY)
            .map(|s| inline_value(s).to_string())
            .unwrap_or(defaults.summary),
        next_pick: find(NEXT_PICK)
            .map(|s| inline_value(s).to_string())
            .unwrap_or(defaults.next_pick),
        catch_phrases: find(CATCH_PHRASES).map(line_list).unwrap_or_default(),
    }
}

fn split_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;

    for line in text.split_inclusive('\n') {
        let offset = line.as_ptr() as usize - text.as_ptr() as usize;
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                sections.push(text[s..end].trim_end());
            }
        } else {
            start.get_or_insert(offset);
            end = offset + line.len();
        }
    }
    if let Some(s) = start {
        sections.push(text[s..end].trim_end());
    }
    sections
}

fn find_section<'a>(sections: &[&'a str], labels: &[&str]) -> Option<&'a str> {
    sections.iter().copied().find(|section| {
        let heading = section.lines().next().unwrap_or_default().to_lowercase();
        labels.iter().any(|label| heading.contains(label))
    })
}

// 首行冒号之后的内容
fn inline_value(section: &str) -> &str {
    let heading = section.lines().next().unwrap_or_default();
    heading
        .split_once(':')
        .map(|(_, value)| value.trim())
        .unwrap_or_default()
}

fn body_lines(section: &str) -> Vec<String> {
    section
        .lines()
        .skip(1)
        .map(strip_bullet)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn comma_list(section: &str) -> Vec<String> {
    let inline = inline_value(section);
    if inline.is_empty() {
        return body_lines(section);
    }
    inline
        .split(',')
        .map(|item| item.trim().trim_end_matches('.'))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn line_list(section: &str) -> Vec<String> {
    let lines = body_lines(section);
    if !lines.is_empty() {
        return lines;
    }
    let inline = inline_value(section);
    if inline.is_empty() {
        Vec::new()
    } else {
        vec![inline.to_string()]
    }
}

// 去掉 "- "、"* "、"1. "、"2) " 之类的列表前缀
fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(['-', '*', '•']).trim_start();
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
    }
    line
}

// 解析开头的数字，行为类似 JavaScript 的 parseFloat
fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    for (i, c) in text.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }

    if !seen_digit {
        return None;
    }
    text[..end].trim_end_matches('.').parse().ok()
}
