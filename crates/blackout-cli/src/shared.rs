use std::path::Path;

use blackout::{LoadStatus, Password, RedactError, RedactOptions, Redactor, SourceFile};
use tracing::warn;

/// Exit code for every error except password problems.
pub const EXIT_ERROR: i32 = 1;
/// Exit code when a password is missing or wrong.
pub const EXIT_PASSWORD: i32 = 2;

/// Print a redaction error and map it to an exit code.
pub fn report(err: &RedactError) -> i32 {
    eprintln!("Error: {}", err.user_message());
    tracing::debug!(error = %err, "command failed");
    if err.is_password_error() {
        EXIT_PASSWORD
    } else {
        EXIT_ERROR
    }
}

/// Initialise the tracing subscriber on stderr.
///
/// `RUST_LOG` wins over the `-v` count.
pub fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "blackout={level},blackout_core={level},blackout_parse={level},blackout_cli={level}"
        ))
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

/// Read `file` and bring a session to the ready state.
///
/// Returns `Err(2)` when the document needs a password that was not given
/// or is wrong, `Err(1)` for anything else.
pub async fn open_document(
    file: &Path,
    password: Option<&str>,
    remove_encryption: bool,
    options: RedactOptions,
) -> Result<Redactor, i32> {
    if !file.exists() {
        eprintln!("Error: file not found: {}", file.display());
        return Err(EXIT_ERROR);
    }
    let bytes = std::fs::read(file).map_err(|e| {
        eprintln!("Error: failed to read {}: {e}", file.display());
        EXIT_ERROR
    })?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut redactor = Redactor::new(options);
    let outcome = redactor.load(SourceFile::new(name, bytes)).await;
    let status = settle(&redactor, outcome)?;
    if status == LoadStatus::PasswordRequired {
        let Some(password) = password else {
            return Err(report(&RedactError::PasswordRequired));
        };
        let outcome = redactor
            .submit_password(Password::new(password), remove_encryption)
            .await;
        settle(&redactor, outcome)?;
    } else {
        redactor.set_remove_encryption(remove_encryption);
    }
    Ok(redactor)
}

/// A render failure leaves a usable session; the command does not need the
/// raster, so it only warns.
fn settle(
    redactor: &Redactor,
    outcome: Result<LoadStatus, RedactError>,
) -> Result<LoadStatus, i32> {
    match outcome {
        Ok(status) => Ok(status),
        Err(e @ RedactError::RenderFailure { .. }) => {
            warn!(error = %e, "continuing without a page render");
            Ok(LoadStatus::Ready {
                page_count: redactor.session().page_count(),
            })
        }
        Err(e) => Err(report(&e)),
    }
}
