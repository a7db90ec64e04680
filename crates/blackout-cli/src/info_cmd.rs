use std::path::Path;

use blackout::{Encryption, PageHandle, RedactOptions};

use crate::cli::OutputFormat;
use crate::shared::open_document;

fn page_to_json(page: &PageHandle) -> serde_json::Value {
    let size = page.doc_size();
    serde_json::json!({
        "page": page.number(),
        "width": size.width,
        "height": size.height,
        "rotation": page.geometry.rotation(),
    })
}

pub async fn run(file: &Path, password: Option<&str>, format: OutputFormat) -> Result<(), i32> {
    let redactor = open_document(file, password, true, RedactOptions::default()).await?;
    let session = redactor.session();
    let Some(document) = session.document() else {
        eprintln!("Error: no document loaded");
        return Err(1);
    };
    let kind = document.kind();
    let encrypted = session.encryption() != Encryption::Unlocked;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match format {
        OutputFormat::Text => {
            println!("File: {name}");
            println!("Kind: {kind}");
            println!("Encrypted: {}", if encrypted { "yes" } else { "no" });
            println!("Pages: {}", document.page_count());
            for page in document.pages() {
                let size = page.doc_size();
                println!(
                    "Page {}: {:.2} x {:.2} (rotation {})",
                    page.number(),
                    size.width,
                    size.height,
                    page.geometry.rotation()
                );
            }
        }
        OutputFormat::Json => {
            let pages: Vec<serde_json::Value> = document.pages().iter().map(page_to_json).collect();
            let output = serde_json::json!({
                "file": name,
                "kind": kind.to_string(),
                "media_type": kind.output_media_type(),
                "encrypted": encrypted,
                "page_count": document.page_count(),
                "pages": pages,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string())
            );
        }
    }
    Ok(())
}
