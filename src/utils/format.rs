//! Small display helpers shared by the shell and presenter.

/// Converts bytes to a human-readable size.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Bytes-per-second as a human-readable rate.
pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec.max(0.0) as u64))
}

/// Shortens an id to its first 8 characters for table display.
/// Ids come from the engine and may be any UTF-8, so the cut is made on a
/// character boundary, never a byte offset.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Truncates a filename to `max_len` characters with an ellipsis.
/// Filenames arrive unvalidated from peers; counting characters rather
/// than bytes keeps multi-byte names from splitting mid-character.
pub fn truncate_filename(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        name.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let cut = name
            .char_indices()
            .nth(max_len - 3)
            .map(|(idx, _)| idx)
            .unwrap_or(name.len());
        format!("{}...", &name[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("abcdefghijkl"), "abcdefgh");
    }

    #[test]
    fn test_short_id_multibyte() {
        assert_eq!(short_id("ระบบระบุตัวตน"), "ระบบระบุ");
        assert_eq!(short_id("日本"), "日本");
    }

    #[test]
    fn test_truncate_filename() {
        assert_eq!(truncate_filename("short.txt", 20), "short.txt");
        assert_eq!(truncate_filename("verylongfilename.txt", 10), "verylon...");
        assert_eq!(truncate_filename("test", 2), "...");
    }

    #[test]
    fn test_truncate_filename_multibyte() {
        // 17 characters, 45 bytes: the cut must land on a char boundary.
        let name = "รายงานประจำปี.pdf";
        assert_eq!(truncate_filename(name, 10), "รายงานป...");
        assert_eq!(truncate_filename(name, 40), name);
        assert_eq!(truncate_filename("📦📦📦📦📦.zip", 6), "📦📦📦...");
    }
}
