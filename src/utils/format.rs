use std::time::Duration;

/// 格式化文件大小，如 `1.5 KB`、`5 GB`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["Bytes", "KB", "MB", "GB"];
    const UNIT_SIZE: f64 = 1024.0;

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= UNIT_SIZE && unit_index < UNITS.len() - 1 {
        size /= UNIT_SIZE;
        unit_index += 1;
    }

    let rounded = (size * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit_index])
}

/// 格式化时长，`m:ss`，超过一小时为 `h:mm:ss`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
