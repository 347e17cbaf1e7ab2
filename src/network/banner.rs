use std::env;

use atty::Stream;
use chrono::{DateTime, Local};
use owo_colors::OwoColorize;
use sysinfo::System;

/// Полный баннер с информацией о брокере.
pub const ASCII_FULL: &str = r#"
    Rach {version}
    ----------------------------------------------
    Mode:             {mode}
    Listening:        ws://{listen}
    Auth:             {auth}
    Services:         {services}
    PID:              {pid}
    Host:             {host}
    OS/Arch:          {os}/{arch}
    CPU(s):           {cpus}
    Memory:           {mem_value} {mem_unit}
    Build:            {git} ({build_time})
"#;

/// Компактный баннер в одну строку.
pub const ASCII_COMPACT: &str = r#"
Rach {version} | {mode} | ws://{listen} | PID {pid}
"#;

/// Что показать в баннере о запускаемом брокере.
#[derive(Debug, Clone)]
pub struct BannerInfo<'a> {
    pub listen: &'a str,
    /// Режим допуска: `anonymous`, `password`, `closed`
    pub auth: &'a str,
    pub services: usize,
}

/// Выбор полного или компактного вида: `RACH_BANNER=full|compact`, иначе
/// полный в debug-сборке.
fn full_banner() -> bool {
    match env::var("RACH_BANNER").ok().as_deref() {
        Some("full") => true,
        Some("compact") => false,
        _ => cfg!(debug_assertions),
    }
}

fn format_memory(bytes: u64) -> (f64, &'static str) {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    let gb = mb / 1024.0;
    if gb >= 1.0 {
        (gb, "GB")
    } else if mb >= 1.0 {
        (mb, "MB")
    } else {
        (kb, "KB")
    }
}

fn build_time() -> String {
    let raw = option_env!("BUILD_TIME").unwrap_or("unknown");
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%d.%m.%Y %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}

/// Подставляет значения в шаблон баннера.
pub fn render_banner(
    info: &BannerInfo<'_>,
    full: bool,
) -> String {
    let version = format!(
        "{} ({}-bit)",
        env!("CARGO_PKG_VERSION"),
        std::mem::size_of::<usize>() * 8
    );
    let mode = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };
    let pid = std::process::id().to_string();

    if !full {
        return ASCII_COMPACT
            .replace("{version}", &version)
            .replace("{mode}", mode)
            .replace("{listen}", info.listen)
            .replace("{pid}", &pid);
    }

    let mut sys = System::new();
    sys.refresh_memory();
    let (mem_value, mem_unit) = format_memory(sys.total_memory());
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".into());

    ASCII_FULL
        .replace("{version}", &version)
        .replace("{mode}", mode)
        .replace("{listen}", info.listen)
        .replace("{auth}", info.auth)
        .replace("{services}", &info.services.to_string())
        .replace("{pid}", &pid)
        .replace("{host}", &host)
        .replace("{os}", env::consts::OS)
        .replace("{arch}", env::consts::ARCH)
        .replace("{cpus}", &num_cpus::get().to_string())
        .replace("{mem_value}", &format!("{mem_value:.1}"))
        .replace("{mem_unit}", mem_unit)
        .replace("{git}", option_env!("GIT_COMMIT").unwrap_or("unknown"))
        .replace("{build_time}", &build_time())
}

/// Печатает баннер; цвет только при выводе в терминал.
pub fn print_banner(info: &BannerInfo<'_>) {
    let full = full_banner();
    let text = render_banner(info, full);

    if !atty::is(Stream::Stdout) {
        println!("{text}");
        return;
    }

    if !full {
        println!("{}", text.bold().green());
        return;
    }

    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        if i == 1 {
            println!("{}", line.bold().bright_blue());
        } else if trimmed.starts_with("Listening:") || trimmed.starts_with("PID:") {
            println!("{}", line.magenta());
        } else if trimmed.starts_with("Auth:") && trimmed.ends_with("closed") {
            println!("{}", line.yellow());
        } else if trimmed.starts_with("Build:") {
            println!("{}", line.dimmed());
        } else {
            println!("{line}");
        }
    }
}

/// Строка готовности с меткой времени до миллисекунд.
pub fn print_startup_log() {
    let pid = std::process::id();
    let ts = Local::now().format("%d %b %Y %H:%M:%S%.3f");

    if atty::is(Stream::Stdout) {
        println!(
            "[{}] {} {}",
            pid.to_string().red(),
            ts.to_string().white(),
            "* Ready to accept connections".green()
        );
    } else {
        println!("[{pid}] {ts} * Ready to accept connections");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> BannerInfo<'static> {
        BannerInfo {
            listen: "127.0.0.1:9000",
            auth: "password",
            services: 3,
        }
    }

    #[test]
    fn test_compact_banner() {
        let s = render_banner(&info(), false);
        assert!(s.contains("ws://127.0.0.1:9000"));
        assert!(s.contains(&std::process::id().to_string()));
        assert!(!s.contains('{'));
    }

    /// Тест проверяет, что в полном баннере не остаётся незаполненных
    /// подстановок.
    #[test]
    fn test_full_banner_has_no_placeholders() {
        let s = render_banner(&info(), true);
        assert!(s.contains("Auth:             password"));
        assert!(s.contains("Services:         3"));
        assert!(!s.contains('{'), "unfilled placeholder in: {s}");
    }

    #[test]
    fn test_format_memory_units() {
        assert_eq!(format_memory(512 * 1024).1, "KB");
        assert_eq!(format_memory(3 * 1024 * 1024).1, "MB");
        let (v, unit) = format_memory(8 * 1024 * 1024 * 1024);
        assert_eq!(unit, "GB");
        assert!((v - 8.0).abs() < f64::EPSILON);
    }
}
