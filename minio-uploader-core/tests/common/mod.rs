#![allow(dead_code)]

use minio_uploader_core::logger::RunLog;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Console sink that keeps everything written to it.
#[derive(Clone, Default)]
pub struct SharedConsole(Arc<Mutex<Vec<u8>>>);

impl SharedConsole {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedConsole {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn quiet_log(dir: &Path) -> RunLog {
    RunLog::open_with_console(dir, Box::new(io::sink())).expect("log should open")
}

pub fn captured_log(dir: &Path) -> (RunLog, SharedConsole) {
    let console = SharedConsole::default();
    let log = RunLog::open_with_console(dir, Box::new(console.clone())).expect("log should open");
    (log, console)
}

/// Drop the `[YYYY-MM-DD HH:MM:SS] ` prefix from every line.
pub fn strip_timestamps(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| match line.find("] ") {
            Some(idx) if line.starts_with('[') => line[idx + 2..].to_string(),
            _ => line.to_string(),
        })
        .collect()
}
