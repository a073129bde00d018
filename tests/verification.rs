use std::cell::RefCell;
use std::fs;

use envelope_pdf::{
    AddressVerifier, Config, Error, RecipientRecord, Verdict, VerifyError, VerifyFailurePolicy,
    generate_envelopes,
};
use tempfile::TempDir;

const CSV: &str = "FirstName,LastName,Address1,Address2,City,State,PostalCode\n\
                   ann,good,1 First St,,Alpha,AK,99501\n\
                   bob,bad,2 Second St,,Bravo,AL,35004\n\
                   cy,offline,3 Third St,,Charlie,AZ,85001\n\
                   dee,good,4 Fourth St,,Delta,AR,71601\n";

/// Decides by last name: "bad" is undeliverable, "offline" cannot be checked.
#[derive(Default)]
struct ScriptedVerifier {
    seen: RefCell<Vec<usize>>,
}

impl AddressVerifier for ScriptedVerifier {
    fn verify(&self, record: &RecipientRecord) -> Result<Verdict, VerifyError> {
        self.seen.borrow_mut().push(record.row);
        match record.last_name.as_str() {
            "bad" => Ok(Verdict::undeliverable("Address Not Found.")),
            "offline" => Err(VerifyError::Network("connection refused".into())),
            _ => Ok(Verdict::deliverable()),
        }
    }
}

fn run(policy: VerifyFailurePolicy) -> (TempDir, Result<envelope_pdf::RunSummary, Error>, ScriptedVerifier) {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.csv");
    fs::write(&input, CSV).unwrap();
    let output = dir.path().join("out.pdf");

    let mut config = Config::default();
    config.verification.on_failure = policy;
    let verifier = ScriptedVerifier::default();
    let result = generate_envelopes(&input, &output, &config, Some(&verifier));
    (dir, result, verifier)
}

#[test]
fn render_policy_keeps_every_page() {
    let (_dir, result, verifier) = run(VerifyFailurePolicy::Render);
    let summary = result.unwrap();
    assert_eq!(summary.pages, 4);
    assert_eq!(summary.unverified, 2);
    assert_eq!(summary.skipped_rows, 0);
    assert_eq!(*verifier.seen.borrow(), vec![1, 2, 3, 4]);
}

#[test]
fn skip_policy_drops_unverified_recipients() {
    let (dir, result, _verifier) = run(VerifyFailurePolicy::Skip);
    let summary = result.unwrap();
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.unverified, 2);
    assert_eq!(summary.skipped_rows, 2);

    let pdf = fs::read(dir.path().join("out.pdf")).unwrap();
    let text = String::from_utf8_lossy(&pdf);
    assert!(text.contains("(Ann Good) Tj"));
    assert!(text.contains("(Dee Good) Tj"));
    assert!(!text.contains("Bob Bad"));
    assert!(!text.contains("Cy Offline"));
}

#[test]
fn abort_policy_stops_at_first_failure() {
    let (dir, result, verifier) = run(VerifyFailurePolicy::Abort);
    match result {
        Err(Error::Verification { row, reason }) => {
            assert_eq!(row, 2);
            assert_eq!(reason, "Address Not Found.");
        }
        other => panic!("expected verification error, got {other:?}"),
    }
    assert_eq!(*verifier.seen.borrow(), vec![1, 2]);
    assert!(!dir.path().join("out.pdf").exists());
}

#[test]
fn rows_are_not_verified_without_a_verifier() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.csv");
    fs::write(&input, CSV).unwrap();
    let output = dir.path().join("out.pdf");
    let summary = generate_envelopes(&input, &output, &Config::default(), None).unwrap();
    assert_eq!(summary.pages, 4);
    assert_eq!(summary.unverified, 0);
}
