//! Configuration loading and parsing.
//!
//! Parses `ox-complete.toml` (or an override path provided by the binary) and
//! extracts the `[completion]` table. Every key is optional; absent keys take
//! the defaults below. Unknown fields are ignored so the file can carry
//! settings for other subsystems. A missing or malformed file never fails the
//! load: the defaults are used instead and the problem is logged.
//!
//! After parsing, `Config::normalize` clamps values the engine cannot use
//! (a zero poll frequency, a menu shorter than a page step) and records the
//! adjustment under the `config` target.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "ox-complete.toml";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Presentation flags, written in TOML as a list: `completeopt = ["menuone", "longest"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "Vec<String>")]
pub struct CompleteOpt {
    /// Show the menu when at least two candidates match.
    pub menu: bool,
    /// Show the menu even for a single candidate.
    pub menuone: bool,
    /// Insert only the longest common prefix of the candidates.
    pub longest: bool,
    /// Leave the highlight on the original text in fuzzy mode.
    pub noselect: bool,
    /// Never insert a candidate until the user cycles to it.
    pub noinsert: bool,
    /// Rank candidates by fuzzy score instead of prefix filtering.
    pub fuzzy: bool,
}

impl From<Vec<String>> for CompleteOpt {
    fn from(flags: Vec<String>) -> Self {
        let mut opt = CompleteOpt::default();
        for flag in flags {
            match flag.trim() {
                "menu" => opt.menu = true,
                "menuone" => opt.menuone = true,
                "longest" => opt.longest = true,
                "noselect" => opt.noselect = true,
                "noinsert" => opt.noinsert = true,
                "fuzzy" => opt.fuzzy = true,
                other => warn!(target: "config", flag = other, "completeopt_unknown_flag"),
            }
        }
        opt
    }
}

impl CompleteOpt {
    pub const fn menu_only() -> Self {
        Self {
            menu: true,
            menuone: false,
            longest: false,
            noselect: false,
            noinsert: false,
            fuzzy: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    /// Source tokens scanned by keyword completion, in order.
    #[serde(default = "CompletionConfig::default_complete")]
    pub complete: String,
    #[serde(default)]
    pub dictionary: Vec<PathBuf>,
    #[serde(default)]
    pub thesaurus: Vec<PathBuf>,
    #[serde(default = "CompletionConfig::default_completeopt")]
    pub completeopt: CompleteOpt,
    #[serde(default)]
    pub ignorecase: bool,
    #[serde(default)]
    pub smartcase: bool,
    #[serde(default)]
    pub infercase: bool,
    #[serde(default)]
    pub fileignorecase: bool,
    /// Dispatcher steps between two checks for typed-ahead keys.
    #[serde(default = "CompletionConfig::default_poll_frequency")]
    pub poll_frequency: u32,
    /// Menu rows; page keys move by `menu_height - 2`.
    #[serde(default = "CompletionConfig::default_menu_height")]
    pub menu_height: u16,
    #[serde(default = "CompletionConfig::default_tag_limit")]
    pub tag_limit: usize,
    #[serde(default)]
    pub completefunc: Option<String>,
    #[serde(default)]
    pub omnifunc: Option<String>,
    #[serde(default)]
    pub thesaurusfunc: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            complete: Self::default_complete(),
            dictionary: Vec::new(),
            thesaurus: Vec::new(),
            completeopt: Self::default_completeopt(),
            ignorecase: false,
            smartcase: false,
            infercase: false,
            fileignorecase: false,
            poll_frequency: Self::default_poll_frequency(),
            menu_height: Self::default_menu_height(),
            tag_limit: Self::default_tag_limit(),
            completefunc: None,
            omnifunc: None,
            thesaurusfunc: None,
        }
    }
}

impl CompletionConfig {
    fn default_complete() -> String {
        ".,w,b,u,t,i".to_string()
    }
    const fn default_completeopt() -> CompleteOpt {
        CompleteOpt::menu_only()
    }
    const fn default_poll_frequency() -> u32 {
        50
    }
    const fn default_menu_height() -> u16 {
        10
    }
    const fn default_tag_limit() -> usize {
        300
    }

    /// Rows moved by one page key.
    pub fn page_step(&self) -> usize {
        usize::from(self.menu_height.saturating_sub(2)).max(1)
    }
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("ox-complete").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        info!(target: "config", path = %path.display(), "config_missing_using_defaults");
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            let mut cfg = Config {
                raw: Some(content),
                file,
            };
            cfg.normalize();
            Ok(cfg)
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

impl Config {
    pub fn completion(&self) -> &CompletionConfig {
        &self.file.completion
    }

    /// Clamp values the engine cannot honor. Returns true when anything changed.
    pub fn normalize(&mut self) -> bool {
        let c = &mut self.file.completion;
        let mut changed = false;
        if c.poll_frequency == 0 {
            info!(target: "config", raw = 0, clamped = 1, "poll_frequency_clamped");
            c.poll_frequency = 1;
            changed = true;
        }
        if c.menu_height < 3 {
            info!(target: "config", raw = c.menu_height, clamped = 3, "menu_height_clamped");
            c.menu_height = 3;
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn capture_logs(f: impl FnOnce()) -> String {
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();
        with_default(subscriber, f);
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), body).unwrap();
        tmp
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        let c = cfg.completion();
        assert_eq!(c.complete, ".,w,b,u,t,i");
        assert!(c.dictionary.is_empty());
        assert_eq!(c.completeopt, CompleteOpt::menu_only());
        assert_eq!(c.poll_frequency, 50);
        assert_eq!(c.tag_limit, 300);
        assert!(cfg.raw.is_none());
    }

    #[test]
    fn parses_completion_table() {
        let tmp = write_config(
            "[completion]\n\
             complete = \".,k\"\n\
             dictionary = [\"/usr/share/dict/words\"]\n\
             completeopt = [\"menuone\", \"longest\", \"fuzzy\"]\n\
             ignorecase = true\n\
             infercase = true\n\
             poll_frequency = 10\n\
             completefunc = \"MyComplete\"\n",
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let c = cfg.completion();
        assert_eq!(c.complete, ".,k");
        assert_eq!(c.dictionary, vec![PathBuf::from("/usr/share/dict/words")]);
        assert!(c.completeopt.menuone && c.completeopt.longest && c.completeopt.fuzzy);
        assert!(!c.completeopt.menu);
        assert!(c.ignorecase && c.infercase);
        assert_eq!(c.poll_frequency, 10);
        assert_eq!(c.completefunc.as_deref(), Some("MyComplete"));
        assert!(cfg.raw.is_some());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = write_config("[completion\npoll_frequency = ");
        let out = capture_logs(|| {
            let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
            assert_eq!(cfg.completion().poll_frequency, 50);
        });
        assert!(out.contains("config_parse_failed_using_defaults"));
    }

    #[test]
    fn unknown_completeopt_flag_is_ignored_with_warning() {
        let tmp = write_config("[completion]\ncompleteopt = [\"menu\", \"preview\"]\n");
        let out = capture_logs(|| {
            let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
            assert!(cfg.completion().completeopt.menu);
        });
        assert!(out.contains("WARN config:"));
        assert!(out.contains("completeopt_unknown_flag"));
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let tmp = write_config("[completion]\npoll_frequency = 0\nmenu_height = 1\n");
        let out = capture_logs(|| {
            let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
            assert_eq!(cfg.completion().poll_frequency, 1);
            assert_eq!(cfg.completion().menu_height, 3);
            assert_eq!(cfg.completion().page_step(), 1);
        });
        assert!(out.contains("INFO config:"));
        assert!(out.contains("poll_frequency_clamped"));
        assert!(out.contains("menu_height_clamped"));
    }

    #[test]
    fn page_step_follows_menu_height() {
        let c = CompletionConfig::default();
        assert_eq!(c.page_step(), 8);
    }
}
