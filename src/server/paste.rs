//! Host clipboard access for `request_paste`

use std::process::Command;

use super::error::{Error, Result};

/// Reads clipboard text; called from a blocking task
pub trait PasteSource: Send + Sync {
    fn read(&self) -> Result<String>;
}

/// Helper programs tried in order when no native clipboard is available
const PASTE_COMMANDS: &[(&str, &[&str])] = &[
    ("pbpaste", &[]),
    ("xclip", &["-o", "-selection", "clipboard"]),
    ("xsel", &["-o", "-b"]),
    ("wl-paste", &["-n"]),
];

/// The clipboard of the machine the server runs on
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPaste;

impl PasteSource for SystemPaste {
    fn read(&self) -> Result<String> {
        #[cfg(feature = "clipboard")]
        {
            use copypasta::{ClipboardContext, ClipboardProvider};
            match ClipboardContext::new().and_then(|mut ctx| ctx.get_contents()) {
                Ok(text) => return Ok(text),
                Err(e) => tracing::debug!(error = %e, "native clipboard unavailable"),
            }
        }

        for (program, args) in PASTE_COMMANDS {
            match Command::new(program).args(*args).output() {
                Ok(output) if output.status.success() => {
                    return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
                }
                Ok(output) => {
                    tracing::debug!(program, status = %output.status, "paste helper failed");
                }
                Err(_) => {}
            }
        }
        Err(Error::PasteSourceUnavailable)
    }
}

/// A source that always fails; for hosts where pasting is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPaste;

impl PasteSource for NoPaste {
    fn read(&self) -> Result<String> {
        Err(Error::PasteSourceUnavailable)
    }
}
