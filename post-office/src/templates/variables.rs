//! Placeholder extraction for dynamic preview forms

/// Extract all variable names from a template string
///
/// Splits on `{{` and keeps, for every fragment that contains `}}`, the text
/// before it. Fragments without a closing marker are skipped. The result is
/// de-duplicated in order of first occurrence. This is a lenient scan, not a
/// parser: nested or unbalanced markers give best-effort names.
pub fn extract_variables(template_str: &str) -> Vec<String> {
    let mut variables: Vec<String> = Vec::new();

    for fragment in template_str.split("{{").skip(1) {
        let Some((name, _)) = fragment.split_once("}}") else {
            continue;
        };

        let name = name.trim();
        if name.is_empty() || variables.iter().any(|v| v == name) {
            continue;
        }

        variables.push(name.to_string());
    }

    variables
}
