pub mod config;
mod error;
mod fonts;
pub mod layout;
mod logo;
mod model;
mod pdf;
pub mod source;
pub mod verify;

pub use config::{
    Config, LogoConfig, RecipientStyle, ReturnAddressConfig, RowErrorPolicy, VerificationConfig,
    VerifyFailurePolicy,
};
pub use error::{Error, LayoutError, VerifyError};
pub use model::{PageGeometry, RecipientRecord, RunSummary};
pub use pdf::{EnvelopeRenderer, write_atomically};
pub use source::RowSource;
pub use verify::{AddressVerifier, Verdict};

use std::path::Path;

/// Render one envelope page per row of `input` into a PDF at `output`.
///
/// Rows are drawn in file order. When `verifier` is given, each recipient is
/// checked first and `config.verification.on_failure` decides what happens to
/// those that fail. Nothing is written to `output` unless the whole run
/// succeeds.
pub fn generate_envelopes(
    input: &Path,
    output: &Path,
    config: &Config,
    verifier: Option<&dyn AddressVerifier>,
) -> Result<RunSummary, Error> {
    let rows = RowSource::open(input)?;
    let mut renderer = EnvelopeRenderer::new(config);
    let mut summary = RunSummary {
        output: output.to_path_buf(),
        ..RunSummary::default()
    };

    for row in rows {
        let record = match row {
            Ok(record) => record,
            Err(e) => {
                skip_or_abort(config.row_errors, e)?;
                summary.skipped_rows += 1;
                continue;
            }
        };

        if let Some(verifier) = verifier
            && !passes_verification(verifier, &record, config.verification.on_failure, &mut summary)?
        {
            summary.skipped_rows += 1;
            continue;
        }

        match renderer.render_page(&record) {
            Ok(()) => {}
            Err(e @ (Error::Layout { .. } | Error::RowData { .. })) => {
                skip_or_abort(config.row_errors, e)?;
                summary.skipped_rows += 1;
            }
            Err(e) => return Err(e),
        }
    }

    summary.pages = renderer.page_count();
    let bytes = renderer.finish();
    pdf::write_atomically(output, &bytes)?;
    log::info!(
        "Wrote {} envelope page(s) to {} ({} row(s) skipped)",
        summary.pages,
        output.display(),
        summary.skipped_rows
    );
    Ok(summary)
}

/// Row-level data errors: propagate under `Abort`, log under `Skip`.
fn skip_or_abort(policy: RowErrorPolicy, err: Error) -> Result<(), Error> {
    match (policy, &err) {
        (RowErrorPolicy::Skip, Error::RowData { .. } | Error::Layout { .. }) => {
            log::warn!("Skipping {err}");
            Ok(())
        }
        _ => Err(err),
    }
}

/// Returns whether the record should be rendered.
fn passes_verification(
    verifier: &dyn AddressVerifier,
    record: &RecipientRecord,
    policy: VerifyFailurePolicy,
    summary: &mut RunSummary,
) -> Result<bool, Error> {
    let reason = match verifier.verify(record) {
        Ok(Verdict {
            deliverable: true,
            detail,
        }) => {
            if let Some(detail) = detail {
                log::info!("Row {}: verified ({detail})", record.row);
            }
            return Ok(true);
        }
        Ok(Verdict { detail, .. }) => {
            detail.unwrap_or_else(|| "address is not deliverable".to_string())
        }
        Err(e) => format!("verification could not be performed: {e}"),
    };

    summary.unverified += 1;
    match policy {
        VerifyFailurePolicy::Render => {
            log::warn!("Row {}: {reason}; rendering anyway", record.row);
            Ok(true)
        }
        VerifyFailurePolicy::Skip => {
            log::warn!("Row {}: {reason}; skipping", record.row);
            Ok(false)
        }
        VerifyFailurePolicy::Abort => Err(Error::Verification {
            row: record.row,
            reason,
        }),
    }
}
