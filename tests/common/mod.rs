#![allow(dead_code)]

pub use shepherd_test_utils::builders;
pub use shepherd_test_utils::fake_process;
pub use shepherd_test_utils::fake_worker;
pub use shepherd_test_utils::{init_tracing, with_timeout};

use std::path::{Path, PathBuf};

/// Framing lines in `path` whose `event=` field equals `event`.
pub fn count_events(path: &Path, event: &str) -> usize {
    let Ok(text) = std::fs::read_to_string(path) else {
        return 0;
    };
    text.lines()
        .filter_map(shepherd::journal::parse_line)
        .filter(|l| l.event() == Some(event))
        .count()
}

/// Write `body` as `Shepherd.toml` in `dir` and return its path.
pub fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("Shepherd.toml");
    std::fs::write(&path, body).expect("write config");
    path
}
