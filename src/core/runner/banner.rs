//! Start/end banners framing every streamed command.

use std::time::Duration;

const RULE: &str = "=================================================";

pub fn start_banner(command: &str) -> String {
    format!("\n{RULE}\nStart: {command}\n{RULE}\n\n")
}

pub fn end_banner(command: &str, elapsed: Duration) -> String {
    format!(
        "{RULE}\nEnd: {command}\n> Time: {}ms\n{RULE}\n\n",
        format_millis(elapsed)
    )
}

/// Milliseconds with exactly two decimals and `.` as separator.
pub fn format_millis(elapsed: Duration) -> String {
    format!("{:.2}", elapsed.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_banner_frames_command() {
        let banner = start_banner("php bin/console -n cache:clear");
        let lines: Vec<&str> = banner.lines().collect();
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], RULE);
        assert_eq!(lines[2], "Start: php bin/console -n cache:clear");
        assert_eq!(lines[3], RULE);
        assert!(banner.ends_with("\n\n"));
    }

    #[test]
    fn end_banner_reports_elapsed_time() {
        let banner = end_banner("echo hi", Duration::from_micros(1_234_567));
        assert!(banner.contains("End: echo hi\n"));
        assert!(banner.contains("> Time: 1234.57ms\n"));
        assert!(banner.starts_with(RULE));
    }

    #[test]
    fn format_millis_pads_two_decimals() {
        assert_eq!(format_millis(Duration::from_millis(5)), "5.00");
        assert_eq!(format_millis(Duration::ZERO), "0.00");
    }
}
