use diffy::{DiffOptions, PatchFormatter};

/// Unified diff between two renderings. Empty when they are identical.
pub fn unified_diff(before: &str, after: &str, from_label: &str, to_label: &str) -> String {
    if before == after {
        return String::new();
    }

    let mut diff_options = DiffOptions::new();
    diff_options.set_original_filename(from_label.to_string());
    diff_options.set_modified_filename(to_label.to_string());
    let patch = diff_options.create_patch(before, after);
    let formatter = PatchFormatter::new().missing_newline_message(false);
    let rendered = formatter.fmt_patch(&patch).to_string();
    rendered
}
