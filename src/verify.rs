//! Optional postal verification of recipients before their envelope is drawn.
//!
//! The renderer only relies on [`AddressVerifier`]. [`UspsVerifier`] talks to
//! the USPS Web Tools `Verify` API; tests and other services plug in their own
//! implementation.

use crate::error::VerifyError;
use crate::model::RecipientRecord;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub deliverable: bool,
    /// Service-provided explanation, if any.
    pub detail: Option<String>,
}

impl Verdict {
    pub fn deliverable() -> Self {
        Self {
            deliverable: true,
            detail: None,
        }
    }

    pub fn undeliverable(detail: impl Into<String>) -> Self {
        Self {
            deliverable: false,
            detail: Some(detail.into()),
        }
    }
}

pub trait AddressVerifier {
    /// `Err` means the check could not be performed, not that the address is bad.
    fn verify(&self, record: &RecipientRecord) -> Result<Verdict, VerifyError>;
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Split "62704-1234" into ("62704", "1234").
fn split_zip(postal_code: &str) -> (&str, &str) {
    let code = postal_code.trim();
    match code.split_once('-') {
        Some((zip5, zip4)) => (zip5.trim(), zip4.trim()),
        None if code.len() == 9 && code.chars().all(|c| c.is_ascii_digit()) => {
            (&code[..5], &code[5..])
        }
        None => (code, ""),
    }
}

/// `AddressValidateRequest` document for one recipient.
///
/// USPS swaps the usual meaning of the address lines: `Address1` holds the
/// apartment/suite and `Address2` the street.
pub fn usps_request_xml(user_id: &str, record: &RecipientRecord) -> String {
    let (zip5, zip4) = split_zip(&record.postal_code);
    let name = format!("{} {}", record.first_name.trim(), record.last_name.trim());
    format!(
        "<AddressValidateRequest USERID=\"{}\"><Revision>1</Revision><Address ID=\"0\">\
         <FirmName>{}</FirmName><Address1>{}</Address1><Address2>{}</Address2>\
         <City>{}</City><State>{}</State><Zip5>{}</Zip5><Zip4>{}</Zip4>\
         </Address></AddressValidateRequest>",
        escape_xml(user_id),
        escape_xml(name.trim()),
        escape_xml(record.address2.as_deref().unwrap_or("").trim()),
        escape_xml(record.address1.trim()),
        escape_xml(record.city.trim()),
        escape_xml(record.state.trim()),
        escape_xml(zip5),
        escape_xml(zip4),
    )
}

fn child_text<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn error_description(error: roxmltree::Node) -> String {
    child_text(error, "Description")
        .unwrap_or("unspecified error")
        .to_string()
}

/// Interpret a USPS `Verify` response body.
pub fn parse_usps_response(body: &str) -> Result<Verdict, VerifyError> {
    let xml = roxmltree::Document::parse(body)?;
    let root = xml.root_element();

    // A top-level <Error> means the request itself was rejected (bad USERID, etc.).
    if root.has_tag_name("Error") {
        return Err(VerifyError::Service(error_description(root)));
    }
    if !root.has_tag_name("AddressValidateResponse") {
        return Err(VerifyError::MalformedResponse(format!(
            "unexpected root element <{}>",
            root.tag_name().name()
        )));
    }
    let Some(address) = root.children().find(|n| n.has_tag_name("Address")) else {
        return Err(VerifyError::MalformedResponse(
            "response has no <Address> element".into(),
        ));
    };

    if let Some(error) = address.children().find(|n| n.has_tag_name("Error")) {
        return Ok(Verdict::undeliverable(error_description(error)));
    }

    let detail = child_text(address, "ReturnText").map(String::from);
    match child_text(address, "DPVConfirmation") {
        // Y: confirmed. S/D: building confirmed, secondary missing or unconfirmed.
        None | Some("Y" | "S" | "D") => Ok(Verdict {
            deliverable: true,
            detail,
        }),
        Some(code) => Ok(Verdict {
            deliverable: false,
            detail: Some(detail.unwrap_or_else(|| format!("DPV confirmation code {code}"))),
        }),
    }
}

#[cfg(feature = "usps")]
pub use usps::UspsVerifier;

#[cfg(feature = "usps")]
mod usps {
    use std::time::Duration;

    use super::{AddressVerifier, Verdict, parse_usps_response, usps_request_xml};
    use crate::config::VerificationConfig;
    use crate::error::{Error, VerifyError};
    use crate::model::RecipientRecord;

    pub struct UspsVerifier {
        user_id: String,
        base_url: String,
        client: reqwest::blocking::Client,
    }

    impl UspsVerifier {
        pub fn new(config: &VerificationConfig) -> Result<Self, Error> {
            let user_id = config
                .user_id
                .clone()
                .ok_or_else(|| Error::Config("USPS user id is not set".into()))?;
            let client = reqwest::blocking::Client::builder()
                .user_agent(concat!("envelope-pdf/", env!("CARGO_PKG_VERSION")))
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .map_err(|e| Error::Config(format!("cannot create HTTP client: {e}")))?;
            Ok(Self {
                user_id,
                base_url: config.base_url.clone(),
                client,
            })
        }
    }

    impl AddressVerifier for UspsVerifier {
        fn verify(&self, record: &RecipientRecord) -> Result<Verdict, VerifyError> {
            let xml = usps_request_xml(&self.user_id, record);
            let response = self
                .client
                .get(&self.base_url)
                .query(&[("API", "Verify"), ("XML", xml.as_str())])
                .send()
                .map_err(|e| VerifyError::Network(e.to_string()))?;

            if !response.status().is_success() {
                return Err(VerifyError::Service(format!(
                    "HTTP {} from {}",
                    response.status(),
                    self.base_url
                )));
            }
            let body = response
                .text()
                .map_err(|e| VerifyError::Network(e.to_string()))?;
            log::debug!("USPS response for row {}: {body}", record.row);
            parse_usps_response(&body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RecipientRecord {
        RecipientRecord {
            row: 3,
            first_name: "jane".into(),
            last_name: "doe".into(),
            address1: "123 Main St".into(),
            address2: Some("Apt <4>".into()),
            city: "Springfield".into(),
            state: "IL".into(),
            postal_code: "62704-1234".into(),
        }
    }

    #[test]
    fn request_swaps_address_lines_and_escapes() {
        let xml = usps_request_xml("ID&1", &record());
        assert!(xml.contains("USERID=\"ID&amp;1\""));
        assert!(xml.contains("<Address1>Apt &lt;4&gt;</Address1>"));
        assert!(xml.contains("<Address2>123 Main St</Address2>"));
        assert!(xml.contains("<Zip5>62704</Zip5><Zip4>1234</Zip4>"));
        assert!(xml.contains("<FirmName>jane doe</FirmName>"));
        roxmltree::Document::parse(&xml).unwrap();
    }

    #[test]
    fn zip_plus_four_forms() {
        assert_eq!(split_zip("62704"), ("62704", ""));
        assert_eq!(split_zip("627041234"), ("62704", "1234"));
        assert_eq!(split_zip(" 62704 - 1234 "), ("62704", "1234"));
    }

    #[test]
    fn confirmed_address_is_deliverable() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
            <AddressValidateResponse><Address ID="0">
                <Address2>123 MAIN ST</Address2><City>SPRINGFIELD</City><State>IL</State>
                <Zip5>62704</Zip5><Zip4>1234</Zip4><DPVConfirmation>Y</DPVConfirmation>
            </Address></AddressValidateResponse>"#;
        assert_eq!(parse_usps_response(body).unwrap(), Verdict::deliverable());
    }

    #[test]
    fn missing_secondary_is_deliverable_with_detail() {
        let body = r#"<AddressValidateResponse><Address ID="0">
                <DPVConfirmation>D</DPVConfirmation>
                <ReturnText>Default address: more information is needed.</ReturnText>
            </Address></AddressValidateResponse>"#;
        let verdict = parse_usps_response(body).unwrap();
        assert!(verdict.deliverable);
        assert!(verdict.detail.unwrap().starts_with("Default address"));
    }

    #[test]
    fn unconfirmed_dpv_is_undeliverable() {
        let body = r#"<AddressValidateResponse><Address ID="0">
                <DPVConfirmation>N</DPVConfirmation>
            </Address></AddressValidateResponse>"#;
        let verdict = parse_usps_response(body).unwrap();
        assert!(!verdict.deliverable);
        assert_eq!(verdict.detail.as_deref(), Some("DPV confirmation code N"));
    }

    #[test]
    fn address_error_is_undeliverable() {
        let body = r#"<AddressValidateResponse><Address ID="0"><Error>
                <Number>-2147219401</Number><Description>Address Not Found.  </Description>
            </Error></Address></AddressValidateResponse>"#;
        assert_eq!(
            parse_usps_response(body).unwrap(),
            Verdict::undeliverable("Address Not Found.")
        );
    }

    #[test]
    fn top_level_error_is_a_service_error() {
        let body = "<Error><Number>80040B1A</Number>\
                    <Description>Authorization failure.</Description></Error>";
        match parse_usps_response(body) {
            Err(VerifyError::Service(msg)) => assert_eq!(msg, "Authorization failure."),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_usps_response("<html>oops"),
            Err(VerifyError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_usps_response("<Foo/>"),
            Err(VerifyError::MalformedResponse(_))
        ));
    }
}
