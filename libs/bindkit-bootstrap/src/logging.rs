use crate::config::{LoggingConfig, Section};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, util::SubscriberInitExt, Layer};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_MAX_BACKUPS: usize = 3;

// The non-blocking console writer stops when its guard is dropped.
static CONSOLE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" | "" => Some(LevelFilter::INFO),
        "warn" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        "off" | "none" => Some(LevelFilter::OFF),
        _ => None,
    }
}

/// Returns true if target == prefix or target starts with "prefix::"
fn matches_target(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

// ================= rotating file sinks =================

type Rotating = Arc<Mutex<FileRotate<AppendTimestamp>>>;

#[derive(Clone)]
struct FileSink(Option<Rotating>);

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(file) => file.lock().write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(file) => file.lock().flush(),
            None => Ok(()),
        }
    }
}

/// Routes records to per-target files, falling back to the default file.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<Rotating>,
    by_target: Vec<(String, Rotating)>,
}

impl FileRouter {
    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_target.is_empty()
    }

    fn route(&self, target: &str) -> Option<Rotating> {
        self.by_target
            .iter()
            .find(|(prefix, _)| matches_target(target, prefix))
            .map(|(_, file)| file.clone())
            .or_else(|| self.default.clone())
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = FileSink;

    fn make_writer(&'a self) -> Self::Writer {
        FileSink(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        FileSink(self.route(meta.target()))
    }
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn open_rotating(section: &Section, base_dir: &Path) -> std::io::Result<Option<Rotating>> {
    if section.file.trim().is_empty() {
        return Ok(None);
    }
    let path = resolve_log_path(&section.file, base_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) as usize * 1024 * 1024;
    let backups = section.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);
    let rotate = FileRotate::new(
        path,
        AppendTimestamp::default(FileLimit::MaxFiles(backups)),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        None,
    );
    Ok(Some(Arc::new(Mutex::new(rotate))))
}

fn build_file_router(cfg: &LoggingConfig, base_dir: &Path) -> FileRouter {
    let mut router = FileRouter::default();
    for (name, section) in cfg {
        match open_rotating(section, base_dir) {
            Ok(Some(file)) if name == DEFAULT_SECTION => router.default = Some(file),
            Ok(Some(file)) => router.by_target.push((name.clone(), file)),
            Ok(None) => {}
            Err(e) => eprintln!("Failed to open log file '{}' for '{name}': {e}", section.file),
        }
    }
    // Longest prefix wins.
    router
        .by_target
        .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
    router
}

// ================= level filters =================

fn console_targets(cfg: &LoggingConfig) -> Targets {
    let default = cfg
        .get(DEFAULT_SECTION)
        .and_then(|s| parse_level(&s.console_level))
        .unwrap_or(LevelFilter::INFO);

    cfg.iter()
        .filter(|(name, _)| name.as_str() != DEFAULT_SECTION)
        .filter_map(|(name, s)| parse_level(&s.console_level).map(|l| (name.clone(), l)))
        .fold(Targets::new().with_default(default), |t, (name, level)| {
            t.with_target(name, level)
        })
}

fn file_targets(cfg: &LoggingConfig, router: &FileRouter) -> Targets {
    let default = match cfg.get(DEFAULT_SECTION) {
        Some(s) if router.default.is_some() => parse_level(&s.file_level).unwrap_or(LevelFilter::INFO),
        _ => LevelFilter::OFF,
    };

    cfg.iter()
        .filter(|(name, s)| name.as_str() != DEFAULT_SECTION && !s.file.trim().is_empty())
        .filter_map(|(name, s)| parse_level(&s.file_level).map(|l| (name.clone(), l)))
        .fold(Targets::new().with_default(default), |t, (name, level)| {
            t.with_target(name, level)
        })
}

// ================= public init =================

/// Install the global subscriber: console (always) plus JSON files for the
/// sections that name one. `RUST_LOG`, when set, caps both sinks.
pub fn init_logging(cfg: &LoggingConfig, base_dir: &Path) {
    use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

    // Bridge `log` → `tracing` before installing the subscriber
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    let env = EnvFilter::try_from_default_env().ok();

    let (stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);

    let console_layer = fmt::layer()
        .with_writer(stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console_targets(cfg));

    let router = build_file_router(cfg, base_dir);
    let file_layer = (!router.is_empty()).then(|| {
        let targets = file_targets(cfg, &router);
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(router)
            .with_filter(targets)
    });

    let subscriber = Registry::default()
        .with(env)
        .with(console_layer)
        .with(file_layer);

    let _ = subscriber.try_init();
}

/// Console-only logging at INFO (honors `RUST_LOG`); used before config is known.
pub fn init_minimal() {
    let mut cfg = HashMap::new();
    cfg.insert(
        DEFAULT_SECTION.to_string(),
        Section {
            console_level: "info".to_string(),
            file: String::new(),
            file_level: String::new(),
            max_backups: None,
            max_size_mb: None,
        },
    );
    init_logging(&cfg, Path::new("."));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(console: &str, file: &str, file_level: &str) -> Section {
        Section {
            console_level: console.to_string(),
            file: file.to_string(),
            file_level: file_level.to_string(),
            max_backups: Some(1),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn target_prefix_matching_respects_module_boundaries() {
        assert!(matches_target("bindkit", "bindkit"));
        assert!(matches_target("bindkit::resolver", "bindkit"));
        assert!(!matches_target("bindkit_bootstrap", "bindkit"));
        assert!(!matches_target("catalog", "bindkit"));
    }

    #[test]
    fn levels_parse_leniently() {
        assert_eq!(parse_level("DEBUG"), Some(LevelFilter::DEBUG));
        assert_eq!(parse_level(""), Some(LevelFilter::INFO));
        assert_eq!(parse_level("none"), Some(LevelFilter::OFF));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn file_router_prefers_the_longest_matching_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "all.log", "info"));
        cfg.insert("bindkit".into(), section("info", "bindkit.log", "debug"));
        cfg.insert("bindkit::resolver".into(), section("info", "resolver.log", "trace"));
        cfg.insert("catalog".into(), section("debug", "", ""));

        let router = build_file_router(&cfg, dir.path());
        assert_eq!(router.by_target.len(), 2);
        assert_eq!(router.by_target[0].0, "bindkit::resolver");

        let resolver = router.route("bindkit::resolver").unwrap();
        assert!(Arc::ptr_eq(&resolver, &router.by_target[0].1));
        let planner = router.route("bindkit::planner").unwrap();
        assert!(Arc::ptr_eq(&planner, &router.by_target[1].1));
        let catalog = router.route("catalog::api").unwrap();
        assert!(Arc::ptr_eq(&catalog, router.default.as_ref().unwrap()));
    }

    #[test]
    fn file_sink_without_target_drops_writes() {
        let mut sink = FileSink(None);
        assert_eq!(sink.write(b"ignored").unwrap(), 7);
        sink.flush().unwrap();
    }
}
