use std::path::{Path, PathBuf};

use blackout::{Encryption, RedactOptions};
use tracing::{info, warn};

use crate::plan::{PlannedRect, parse_plan, parse_rect};
use crate::shared::{EXIT_ERROR, open_document, report};

pub struct RedactArgs<'a> {
    pub file: &'a Path,
    pub rects: &'a [String],
    pub plan: Option<&'a Path>,
    pub password: Option<&'a str>,
    pub keep_encryption: bool,
    pub output: Option<&'a Path>,
    pub force: bool,
}

fn collect_rects(args: &RedactArgs<'_>) -> Result<(Vec<PlannedRect>, RedactOptions), i32> {
    let mut options = RedactOptions::default();
    let mut planned = Vec::new();

    if let Some(path) = args.plan {
        let json = std::fs::read_to_string(path).map_err(|e| {
            eprintln!("Error: failed to read plan {}: {e}", path.display());
            EXIT_ERROR
        })?;
        let plan = parse_plan(&json).map_err(|e| {
            eprintln!("Error: {e}");
            EXIT_ERROR
        })?;
        if let Some(plan_options) = plan.options {
            options = plan_options;
        }
        planned.extend(plan.redactions);
    }
    for spec in args.rects {
        planned.push(parse_rect(spec).map_err(|e| {
            eprintln!("Error: {e}");
            EXIT_ERROR
        })?);
    }
    if planned.is_empty() {
        eprintln!("Error: no redactions given (use --rect or --plan)");
        return Err(EXIT_ERROR);
    }
    if args.keep_encryption {
        options.remove_encryption = false;
    }
    Ok((planned, options))
}

pub async fn run(args: RedactArgs<'_>) -> Result<(), i32> {
    let (planned, options) = collect_rects(&args)?;
    let remove_encryption = options.remove_encryption;
    let mut redactor = open_document(args.file, args.password, remove_encryption, options).await?;

    let mut surface_rects = Vec::with_capacity(planned.len());
    {
        let session = redactor.session();
        let Some(document) = session.document() else {
            eprintln!("Error: no document loaded");
            return Err(EXIT_ERROR);
        };
        for r in &planned {
            let Some(page) = document.page(r.page - 1) else {
                eprintln!(
                    "Error: page {} out of range (document has {} pages)",
                    r.page,
                    document.page_count()
                );
                return Err(EXIT_ERROR);
            };
            surface_rects.push((r.page, r.to_surface(page.doc_size())));
        }
        if !remove_encryption && session.encryption() != Encryption::Unlockable {
            warn!("source is not encrypted; keeping encryption has no effect");
        }
    }

    for (page, (rect, width, height)) in surface_rects {
        let added = redactor
            .add_surface_redaction(page, rect, width, height)
            .map_err(|e| report(&e))?;
        if !added {
            eprintln!("Warning: skipped a region on page {page}: too small to redact");
        }
    }

    let count = redactor.session().redactions().len();
    let exported = redactor.export().await.map_err(|e| report(&e))?;

    let path = match args.output {
        Some(p) => p.to_path_buf(),
        None => args
            .file
            .parent()
            .map(|dir| dir.join(&exported.file_name))
            .unwrap_or_else(|| PathBuf::from(&exported.file_name)),
    };
    if path.exists() && !args.force {
        eprintln!(
            "Error: {} already exists (use --force to overwrite)",
            path.display()
        );
        return Err(EXIT_ERROR);
    }
    std::fs::write(&path, &exported.bytes).map_err(|e| {
        eprintln!("Error: failed to write {}: {e}", path.display());
        EXIT_ERROR
    })?;
    info!(path = %path.display(), bytes = exported.bytes.len(), "wrote redacted copy");
    println!("Wrote {} ({count} redactions)", path.display());
    Ok(())
}
