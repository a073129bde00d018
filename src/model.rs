use std::path::PathBuf;

/// Points per inch.
pub const PT_PER_INCH: f32 = 72.0;

/// One mailing-list row. Built by the row source, consumed by the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct RecipientRecord {
    /// 1-based data row (header excluded), for diagnostics only.
    pub row: usize,
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub width: f32,  // points
    pub height: f32, // points
}

impl PageGeometry {
    /// Standard #10 business envelope, 9.5in x 4.125in.
    pub const NO_10_ENVELOPE: PageGeometry = PageGeometry {
        width: 9.5 * PT_PER_INCH,
        height: 4.125 * PT_PER_INCH,
    };
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::NO_10_ENVELOPE
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub pages: usize,
    pub skipped_rows: usize,
    /// Recipients whose verification failed or could not be performed.
    pub unverified: usize,
}
