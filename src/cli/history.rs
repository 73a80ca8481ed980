//! Transcript printing, copying and attachment export

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::attachment::{Attachment, AttachmentPayload};
use crate::core::message::{Message, Role};
use crate::core::session::SessionState;
use crate::utils::clipboard::copy_to_clipboard;
use crate::utils::data_url::decode_data_url;

pub fn run_history(
    session: &SessionState,
    copy: Option<usize>,
    attachment: Option<usize>,
    export: Option<(usize, PathBuf)>,
) -> Result<(), Box<dyn Error>> {
    if let Some(entry) = copy {
        let text = copy_text(session.messages(), entry, attachment)?;
        copy_to_clipboard(text)?;
        println!("✅ Copied entry {entry} to the clipboard");
        return Ok(());
    }

    if let Some((entry, dir)) = export {
        let message = entry_at(session.messages(), entry)?;
        for path in export_attachments(message, &dir)? {
            println!("✅ Wrote {}", path.display());
        }
        return Ok(());
    }

    if session.messages().is_empty() {
        println!("No messages yet.");
    }
    for (index, message) in session.messages().iter().enumerate() {
        print!("{}", render_entry(index + 1, message));
    }
    Ok(())
}

fn entry_at(messages: &[Message], entry: usize) -> Result<&Message, String> {
    let count = messages.len();
    entry
        .checked_sub(1)
        .and_then(|index| messages.get(index))
        .ok_or_else(|| format!("No entry {entry}; the transcript has {count}"))
}

/// Text copied for an entry: the message itself, or one of its text
/// attachments.
fn copy_text(
    messages: &[Message],
    entry: usize,
    attachment: Option<usize>,
) -> Result<&str, String> {
    let message = entry_at(messages, entry)?;
    let Some(number) = attachment else {
        return Ok(&message.content);
    };

    let attachment = number
        .checked_sub(1)
        .and_then(|index| message.attachments.get(index))
        .ok_or_else(|| format!("Entry {entry} has no attachment {number}"))?;
    attachment
        .text()
        .ok_or_else(|| format!("{} is not a text attachment", attachment.name))
}

fn export_attachments(message: &Message, dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for attachment in &message.attachments {
        let bytes = match &attachment.payload {
            AttachmentPayload::Text(text) => text.as_bytes().to_vec(),
            AttachmentPayload::DataUrl(url) => decode_data_url(url)
                .ok_or_else(|| format!("{} has a malformed data URL", attachment.name))?,
        };
        let path = dir.join(file_name(attachment));
        fs::write(&path, bytes)?;
        written.push(path);
    }
    Ok(written)
}

/// Attachment name without any directory components.
fn file_name(attachment: &Attachment) -> String {
    Path::new(&attachment.name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}

fn render_entry(number: usize, message: &Message) -> String {
    let label = match message.role {
        Role::User => "You",
        Role::Assistant => "Assistant",
        Role::System => "System",
    };
    let mut out = format!("[{number}] {label}: {}\n", message.content);
    for attachment in &message.attachments {
        out.push_str(&format!(
            "    📎 {} ({}, {} bytes)\n",
            attachment.name, attachment.mime_type, attachment.size_bytes
        ));
    }
    out
}
