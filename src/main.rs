use clap::Parser;
use std::path::PathBuf;

use envelope_pdf::{AddressVerifier, Config};

#[derive(Parser)]
#[command(name = "envelope-pdf", about = "Render #10 envelopes for a CSV mailing list")]
struct Args {
    /// Input CSV (FirstName,LastName,Address1,Address2,City,State,PostalCode)
    input: PathBuf,
    /// Output PDF file (defaults to input with .pdf extension)
    output: Option<PathBuf>,
    /// JSON configuration file (return address, fonts, policies)
    #[arg(long, env = "ENVELOPES_CONFIG")]
    config: Option<PathBuf>,
    /// Verify each address with USPS before rendering it
    #[arg(long)]
    verify: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if !args.input.is_file() {
        eprintln!("Error: file not found: {}", args.input.display());
        std::process::exit(1);
    }

    let output = args
        .output
        .unwrap_or_else(|| args.input.with_extension("pdf"));

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if args.verify {
        config.verification.enabled = true;
        if let Err(e) = config.validate() {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }

    let verifier = match build_verifier(&config) {
        Ok(verifier) => verifier,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match envelope_pdf::generate_envelopes(&args.input, &output, &config, verifier.as_deref()) {
        Ok(summary) => {
            println!(
                "Envelopes saved to {} ({} page(s))",
                summary.output.display(),
                summary.pages
            );
            if summary.skipped_rows > 0 || summary.unverified > 0 {
                println!(
                    "{} row(s) skipped, {} address(es) not verified",
                    summary.skipped_rows, summary.unverified
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "usps")]
fn build_verifier(config: &Config) -> Result<Option<Box<dyn AddressVerifier>>, envelope_pdf::Error> {
    if !config.verification.enabled {
        return Ok(None);
    }
    let verifier = envelope_pdf::verify::UspsVerifier::new(&config.verification)?;
    Ok(Some(Box::new(verifier)))
}

#[cfg(not(feature = "usps"))]
fn build_verifier(config: &Config) -> Result<Option<Box<dyn AddressVerifier>>, envelope_pdf::Error> {
    if config.verification.enabled {
        return Err(envelope_pdf::Error::Config(
            "built without the `usps` feature; verification is unavailable".into(),
        ));
    }
    Ok(None)
}
