use serde::Serialize;
use serde_json::Value;

/// Depth bound for the fallback text walk. Engine output is shallow in
/// practice; anything deeper is treated as unwalkable and stringified.
const MAX_WALK_DEPTH: usize = 50;

/// One detected text line: content, recognition confidence and the bounding
/// polygon as plain coordinate pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRecord {
    pub text: String,
    pub confidence: f64,
    pub bbox: Vec<Vec<f64>>,
}

/// Stable response contract produced from the engine's raw output.
///
/// `text` is the newline-joined concatenation of all extracted line texts, or
/// a best-effort fallback string when no known result shape matched. `lines`
/// preserves the engine's emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedResponse {
    pub text: String,
    pub lines: Vec<LineRecord>,
}

/// Normalizes the raw output of the recognition engine.
///
/// The engine's output shape varies across its versions: newer releases emit
/// one page object with parallel `rec_texts`/`rec_scores`/`rec_polys` arrays,
/// older ones a list of `[bbox, (text, score)]` entries per page. Anything
/// else degrades to a best-effort text scrape. This never fails; the worst
/// case is an empty `lines` array with a stringified `text`.
pub fn normalize(raw: &Value) -> NormalizedResponse {
    if is_empty_result(raw) {
        return NormalizedResponse::default();
    }

    let first_page = first_element(raw);
    let mut texts: Vec<String> = Vec::new();
    let mut lines: Vec<LineRecord> = Vec::new();

    match first_page {
        // Dict shape wins whenever the key is present, even if it yields no
        // lines; a blank page must not be re-parsed as the list shape.
        Some(page) if has_dict_shape(page) => extract_dict_shape(page, &mut texts, &mut lines),
        Some(Value::Array(entries)) => extract_list_shape(entries, &mut texts, &mut lines),
        _ => {}
    }

    if texts.is_empty() {
        let text = match harvest_strings(raw) {
            Some(found) if !found.is_empty() => found.join("\n"),
            _ => raw.to_string(),
        };
        return NormalizedResponse {
            text,
            lines: Vec::new(),
        };
    }

    NormalizedResponse {
        text: texts.join("\n"),
        lines,
    }
}

fn is_empty_result(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn first_element(raw: &Value) -> Option<&Value> {
    raw.as_array().and_then(|items| items.first())
}

fn has_dict_shape(page: &Value) -> bool {
    page.as_object()
        .is_some_and(|map| map.contains_key("rec_texts"))
}

fn extract_dict_shape(page: &Value, texts: &mut Vec<String>, lines: &mut Vec<LineRecord>) {
    let rec_texts = array_field(page, "rec_texts");
    let rec_scores = array_field(page, "rec_scores");
    let rec_polys = array_field(page, "rec_polys");

    for (index, entry) in rec_texts.iter().enumerate() {
        let Some(text) = entry.as_str() else {
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }
        let confidence = rec_scores
            .get(index)
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let bbox = rec_polys.get(index).map(plain_polygon).unwrap_or_default();
        lines.push(LineRecord {
            text: text.to_string(),
            confidence,
            bbox,
        });
        texts.push(text.to_string());
    }
}

fn extract_list_shape(entries: &[Value], texts: &mut Vec<String>, lines: &mut Vec<LineRecord>) {
    for entry in entries {
        let Some(parts) = entry.as_array() else {
            continue;
        };
        if parts.len() < 2 {
            continue;
        }
        let Some(info) = parts[1].as_array() else {
            continue;
        };
        if info.len() < 2 {
            continue;
        }
        let Some(text) = info[0].as_str() else {
            continue;
        };
        let Some(confidence) = info[1].as_f64() else {
            continue;
        };
        lines.push(LineRecord {
            text: text.to_string(),
            confidence,
            bbox: plain_polygon(&parts[0]),
        });
        texts.push(text.to_string());
    }
}

/// Non-indexable parallel arrays count as zero-length rather than failing.
fn array_field<'a>(page: &'a Value, key: &str) -> &'a [Value] {
    page.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Converts a polygon of whatever array-like encoding the engine used into
/// plain nested numbers. Points that are not coordinate sequences are
/// dropped, as are non-numeric coordinates.
fn plain_polygon(value: &Value) -> Vec<Vec<f64>> {
    let Some(points) = value.as_array() else {
        return Vec::new();
    };
    points
        .iter()
        .filter_map(|point| {
            point
                .as_array()
                .map(|coords| coords.iter().filter_map(Value::as_f64).collect())
        })
        .collect()
}

/// Collects every non-blank string in the structure, in traversal order.
/// Returns None when the depth bound was exceeded anywhere.
fn harvest_strings(raw: &Value) -> Option<Vec<String>> {
    let mut found = Vec::new();
    if walk(raw, 0, &mut found) {
        Some(found)
    } else {
        None
    }
}

fn walk(value: &Value, depth: usize, found: &mut Vec<String>) -> bool {
    if depth > MAX_WALK_DEPTH {
        return false;
    }
    match value {
        Value::String(text) => {
            if !text.trim().is_empty() {
                found.push(text.clone());
            }
            true
        }
        Value::Array(items) => items.iter().all(|item| walk(item, depth + 1, found)),
        Value::Object(map) => map.values().all(|item| walk(item, depth + 1, found)),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line(text: &str, confidence: f64, bbox: Vec<Vec<f64>>) -> LineRecord {
        LineRecord {
            text: text.to_string(),
            confidence,
            bbox,
        }
    }

    #[test]
    fn dict_shape_round_trip() {
        let raw = json!([{
            "rec_texts": ["A", "B"],
            "rec_scores": [0.9, 0.5],
            "rec_polys": [
                [[0, 0], [1, 0], [1, 1], [0, 1]],
                [[2, 2], [3, 2], [3, 3], [2, 3]],
            ],
        }]);
        let response = normalize(&raw);
        assert_eq!(response.text, "A\nB");
        assert_eq!(
            response.lines,
            vec![
                line(
                    "A",
                    0.9,
                    vec![
                        vec![0.0, 0.0],
                        vec![1.0, 0.0],
                        vec![1.0, 1.0],
                        vec![0.0, 1.0]
                    ]
                ),
                line(
                    "B",
                    0.5,
                    vec![
                        vec![2.0, 2.0],
                        vec![3.0, 2.0],
                        vec![3.0, 3.0],
                        vec![2.0, 3.0]
                    ]
                ),
            ]
        );
    }

    #[test]
    fn list_shape_round_trip() {
        let raw = json!([[
            [[[0, 0], [1, 0], [1, 1], [0, 1]], ["Hello", 0.8]],
        ]]);
        let response = normalize(&raw);
        assert_eq!(response.text, "Hello");
        assert_eq!(
            response.lines,
            vec![line(
                "Hello",
                0.8,
                vec![
                    vec![0.0, 0.0],
                    vec![1.0, 0.0],
                    vec![1.0, 1.0],
                    vec![0.0, 1.0]
                ]
            )]
        );
    }

    #[test]
    fn empty_inputs_yield_empty_response() {
        assert_eq!(normalize(&Value::Null), NormalizedResponse::default());
        assert_eq!(normalize(&json!([])), NormalizedResponse::default());
        assert_eq!(normalize(&json!({})), NormalizedResponse::default());
        assert_eq!(normalize(&json!("")), NormalizedResponse::default());
    }

    #[test]
    fn blank_texts_are_dropped_and_dict_shape_takes_precedence() {
        // Entries individually resemble the list shape, but the presence of
        // rec_texts must keep the parse on the dict path and then fall
        // through to the stringified fallback, never to list parsing.
        let raw = json!([{
            "rec_texts": ["", "  ", ""],
            "rec_scores": [0.9, 0.8, 0.7],
            "rec_polys": [[[0, 0]], [[1, 1]], [[2, 2]]],
        }]);
        let response = normalize(&raw);
        assert!(response.lines.is_empty());
        assert_eq!(response.text, raw.to_string());
    }

    #[test]
    fn missing_scores_and_polys_are_length_guarded() {
        let raw = json!([{
            "rec_texts": ["A", "B"],
            "rec_scores": [0.9],
            "rec_polys": [],
        }]);
        let response = normalize(&raw);
        assert_eq!(response.text, "A\nB");
        assert_eq!(
            response.lines,
            vec![line("A", 0.9, vec![]), line("B", 0.0, vec![])]
        );
    }

    #[test]
    fn non_indexable_scores_and_polys_count_as_empty() {
        let raw = json!([{
            "rec_texts": ["A"],
            "rec_scores": "broken",
            "rec_polys": 42,
        }]);
        let response = normalize(&raw);
        assert_eq!(response.lines, vec![line("A", 0.0, vec![])]);
    }

    #[test]
    fn non_string_texts_are_skipped() {
        let raw = json!([{
            "rec_texts": [17, "A", null],
            "rec_scores": [0.1, 0.2, 0.3],
        }]);
        let response = normalize(&raw);
        assert_eq!(response.text, "A");
        assert_eq!(response.lines, vec![line("A", 0.2, vec![])]);
    }

    #[test]
    fn fallback_walk_collects_nested_strings() {
        let raw = json!({ "foo": ["bar", "", ["baz"]] });
        let response = normalize(&raw);
        assert_eq!(response.text, "bar\nbaz");
        assert!(response.lines.is_empty());
    }

    #[test]
    fn fallback_walk_preserves_traversal_order() {
        let raw = json!({
            "first": "one",
            "second": { "inner": ["two", 3, "four"] },
            "third": "five",
        });
        let response = normalize(&raw);
        assert_eq!(response.text, "one\ntwo\nfour\nfive");
    }

    #[test]
    fn fallback_stringifies_when_no_strings_found() {
        let raw = json!([[1, 2], [3, 4]]);
        let response = normalize(&raw);
        assert_eq!(response.text, "[[1,2],[3,4]]");
        assert!(response.lines.is_empty());
    }

    #[test]
    fn fallback_stringifies_past_the_depth_bound() {
        let mut raw = json!(["leaf"]);
        for _ in 0..MAX_WALK_DEPTH + 5 {
            raw = json!([raw]);
        }
        let response = normalize(&raw);
        assert!(response.lines.is_empty());
        assert_eq!(response.text, raw.to_string());
    }

    #[test]
    fn list_shape_skips_malformed_entries() {
        let raw = json!([[
            [[[0, 0]], ["kept", 0.6]],
            [[[1, 1]]],
            [[[2, 2]], "not a tuple"],
            [[[3, 3]], [99, 0.4]],
            [[[4, 4]], ["no score"]],
        ]]);
        let response = normalize(&raw);
        assert_eq!(response.text, "kept");
        assert_eq!(response.lines.len(), 1);
    }

    #[test]
    fn flat_polygon_points_are_dropped() {
        let raw = json!([{
            "rec_texts": ["A"],
            "rec_scores": [0.9],
            "rec_polys": [[1, 2, [3, 4]]],
        }]);
        let response = normalize(&raw);
        assert_eq!(response.lines[0].bbox, vec![vec![3.0, 4.0]]);
    }

    #[test]
    fn renormalizing_extracted_lines_is_idempotent() {
        let raw = json!([{
            "rec_texts": ["TOTAL", "$42.00"],
            "rec_scores": [0.97, 0.88],
            "rec_polys": [
                [[0, 0], [10, 0], [10, 4], [0, 4]],
                [[0, 6], [8, 6], [8, 10], [0, 10]],
            ],
        }]);
        let first = normalize(&raw);
        assert!(!first.lines.is_empty());

        let rebuilt = json!([{
            "rec_texts": first.lines.iter().map(|l| l.text.clone()).collect::<Vec<_>>(),
            "rec_scores": first.lines.iter().map(|l| l.confidence).collect::<Vec<_>>(),
            "rec_polys": first.lines.iter().map(|l| l.bbox.clone()).collect::<Vec<_>>(),
        }]);
        let second = normalize(&rebuilt);
        assert_eq!(first, second);
    }

    #[test]
    fn top_level_string_is_scraped_by_the_fallback() {
        let raw = json!("TOTAL 12.80");
        let response = normalize(&raw);
        assert_eq!(response.text, "TOTAL 12.80");
        assert!(response.lines.is_empty());
    }
}
