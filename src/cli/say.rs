//! One-shot "say" command

use std::error::Error;
use std::io;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::cli::open_session;
use crate::core::attachment::{AttachmentProcessor, SelectedFile};
use crate::core::config::Config;
use crate::core::dispatch::Dispatcher;
use crate::core::session::SubmitOutcome;

pub async fn run_say(
    config: &Config,
    prompt: Vec<String>,
    model: Option<String>,
    attach: Vec<PathBuf>,
    paste: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let dispatcher = Dispatcher::from_config(config)?;
    let mut session = open_session(config, dispatcher.registry())?;

    if let Some(model) = model {
        session.set_selected_model(&model, dispatcher.registry())?;
    }

    let processor = AttachmentProcessor::new(config.max_attachment_bytes());
    let selection: Vec<SelectedFile> = attach.iter().map(SelectedFile::from_path).collect();
    let batch = processor.process_batch(&selection).await;
    for err in &batch.rejected {
        eprintln!("⚠️  Skipped {}: {err}", err.file_name());
    }
    session.add_attachments(batch.accepted);

    if let Some(mime_type) = paste {
        let bytes = read_paste(tokio::io::stdin(), processor.max_bytes()).await?;
        match processor
            .process_pasted("pasted-image", &mime_type, bytes)
            .await
        {
            Ok(attachment) => session.add_attachments([attachment]),
            Err(err) => eprintln!("⚠️  Ignored paste: {err}"),
        }
    }

    for attachment in session.pending_attachments() {
        eprintln!(
            "📎 {} ({}, {} bytes)",
            attachment.name, attachment.mime_type, attachment.size_bytes
        );
    }

    match session.submit(&dispatcher, &prompt.join(" ")).await? {
        SubmitOutcome::Replied(reply) => {
            println!("{reply}");
            Ok(())
        }
        SubmitOutcome::Failed(err) => Err(format!("API call failed: {err}").into()),
    }
}

/// Read pasted bytes, at most one byte past `limit`.
async fn read_paste(reader: impl AsyncRead + Unpin, limit: u64) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .await?;
    Ok(bytes)
}
