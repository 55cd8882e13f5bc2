use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

use crate::param::status_text;

/// HTTP-date 的 IMF-fixdate 格式，例如 `Sun, 06 Nov 1994 08:49:37 GMT`
const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
/// 已废弃的 RFC 850 格式
const RFC850_DATE: &str = "%A, %d-%b-%y %H:%M:%S GMT";
/// ANSI C `asctime()` 格式
const ASCTIME_DATE: &str = "%a %b %e %H:%M:%S %Y";

pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => n,
            None => status_text(code).unwrap_or("Unknown Status"),
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}

pub fn format_file_size(size: u64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < units.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", size, units[unit_index])
}

/// 格式化为 HTTP-date（IMF-fixdate），用于 `Last-Modified` 与 `Date`
pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format(IMF_FIXDATE).to_string()
}

/// 解析 HTTP-date，依次尝试 IMF-fixdate（含一般的 RFC 2822）、RFC 850 与 asctime 三种格式
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    [IMF_FIXDATE, RFC850_DATE, ASCTIME_DATE]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// 截断到秒。HTTP-date 只有秒级精度，比较之前必须先截断。
pub fn truncate_to_seconds(time: SystemTime) -> DateTime<Utc> {
    let date: DateTime<Utc> = time.into();
    date.with_nanosecond(0).unwrap_or(date)
}
