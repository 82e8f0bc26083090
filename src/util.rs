/// Decimal rendering with at most six fractional digits and no trailing
/// zeros (`0.333333`, `1.5`, `2`).
pub fn format_float(value: f64) -> String {
    let formatted = format!("{:.6}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" => "0".to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
pub fn assert_eq_view(input: &str, view: crate::file::LineView, expected: &str) {
    let file = crate::parse_humdrum(input).expect("Failed to parse input");
    let rendered = file.display_view(view).to_string();
    assert_eq!(
        rendered.lines().count(),
        expected.lines().count(),
        "line count mismatch, output={:?}",
        rendered.lines().collect::<Vec<_>>(),
    );
    for (index, (line, expected)) in rendered.lines().zip(expected.lines()).enumerate() {
        assert_eq!(line, expected, "line {}", index + 1);
    }
}
