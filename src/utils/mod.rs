//! Common utility functions used across the application

pub mod logger;

/// Sanitize a name component so it is safe inside generated file names.
/// Keeps alphanumerics, `-` and `_`; everything else becomes `_`.
pub fn sanitize_component(value: &str, fallback: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_' || c == '-');
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Render a human readable file size label.
pub fn format_file_size(num_bytes: u64) -> String {
    if num_bytes < 1024 {
        return format!("{} B", num_bytes);
    }
    let mut size = num_bytes as f64;
    for unit in ["KB", "MB", "GB", "TB"] {
        size /= 1024.0;
        if size < 1024.0 || unit == "TB" {
            return format!("{:.1} {}", size, unit);
        }
    }
    format!("{} B", num_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("Scene 1", "segment"), "Scene_1");
        assert_eq!(sanitize_component("  ..--  ", "segment"), "segment");
        assert_eq!(sanitize_component("intro/outro", "x"), "intro_outro");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(2048), "2.0 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
    }
}
