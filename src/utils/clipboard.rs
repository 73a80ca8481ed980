use std::io::Write;
use std::process::{Command, Stdio};

/// Place text on the system clipboard using the platform's copy utility.
pub fn copy_to_clipboard(text: &str) -> Result<(), String> {
    #[cfg(target_os = "macos")]
    {
        return run_with_stdin("pbcopy", &[], text);
    }
    #[cfg(target_os = "windows")]
    {
        return run_with_stdin("cmd", &["/C", "clip"], text);
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        const CANDIDATES: &[(&str, &[&str])] = &[
            ("wl-copy", &[]),
            ("xclip", &["-selection", "clipboard"]),
            ("xsel", &["--clipboard", "--input"]),
        ];
        for (cmd, args) in CANDIDATES {
            if run_with_stdin(cmd, args, text).is_ok() {
                return Ok(());
            }
        }
        Err("No clipboard command found (install wl-copy, xclip, or xsel)".to_string())
    }
}

fn run_with_stdin(cmd: &str, args: &[&str], input: &str) -> Result<(), String> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|_| format!("Clipboard command `{cmd}` not available"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .map_err(|err| format!("Clipboard command `{cmd}` rejected input: {err}"))?;
    }

    match child.wait() {
        Ok(status) if status.success() => Ok(()),
        _ => Err(format!("Clipboard command `{cmd}` failed")),
    }
}
