use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("No clipboard tool available")]
    Unavailable,
    #[error("Clipboard tool failed: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// System clipboard reached through the platform's command-line tools
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        for (program, args) in clipboard_tools() {
            match pipe_into(program, args, text) {
                Ok(true) => return Ok(()),
                Ok(false) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ClipboardError::Unavailable)
    }
}

type ClipboardTool = (&'static str, &'static [&'static str]);

fn clipboard_tools() -> &'static [ClipboardTool] {
    #[cfg(target_os = "macos")]
    const TOOLS: &[ClipboardTool] = &[("pbcopy", &[])];

    #[cfg(target_os = "windows")]
    const TOOLS: &[ClipboardTool] = &[("clip", &[])];

    // Try xclip first, then xsel
    #[cfg(target_os = "linux")]
    const TOOLS: &[ClipboardTool] = &[
        ("xclip", &["-selection", "clipboard", "-i"]),
        ("xsel", &["--clipboard", "--input"]),
    ];

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    const TOOLS: &[ClipboardTool] = &[];

    TOOLS
}

/// Run `program`, feed `text` on stdin, report whether it exited cleanly
fn pipe_into(program: &str, args: &[&str], text: &str) -> std::io::Result<bool> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    // Stdin closes at the end of the match so the child sees EOF
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(text.as_bytes()),
        None => Ok(()),
    };

    let status = child.wait()?;
    written?;
    Ok(status.success())
}

/// Keeps everything written to it; used where no system clipboard exists
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        *self.contents.lock().unwrap_or_else(|e| e.into_inner()) = Some(text.to_string());
        Ok(())
    }
}
