/// Canonical form of program output used for grading
///
/// Right-trims every line, drops blank lines at the start and the end, and
/// joins with `\n`. Leading whitespace, interior blank lines and case are
/// kept, so only trivial formatting differences disappear.
pub fn normalize(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim_end).collect();

    let Some(first) = lines.iter().position(|line| !line.is_empty()) else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !line.is_empty())
        .unwrap_or(first);

    lines[first..=last].join("\n")
}
