use std::path::{Path, PathBuf};

use pdf_writer::{Content, Name, Pdf, Rect, Ref, Str};

use crate::config::{Config, RecipientStyle, ReturnAddressConfig};
use crate::error::Error;
use crate::fonts::{FontEntry, register_font, to_winansi_bytes, unencodable_chars};
use crate::layout::{place_block, recipient_lines, scaled_logo_size};
use crate::logo::LogoImage;
use crate::model::{PageGeometry, RecipientRecord};

const LOGO_NAME: &[u8] = b"Im1";
/// How far the top of the logo rises above the first return-address baseline.
const LOGO_BASELINE_RAISE: f32 = 2.0;

struct PlacedLogo {
    image_ref: Ref,
    width: f32,
    height: f32,
    gap: f32,
}

/// Builds the envelope document, one page per recipient.
///
/// Owns the PDF for the whole run. [`EnvelopeRenderer::finish`] consumes
/// the renderer, so the document can only be finalized once.
pub struct EnvelopeRenderer {
    pdf: Pdf,
    next_ref: i32,
    catalog_id: Ref,
    pages_id: Ref,
    page_ids: Vec<Ref>,
    page: PageGeometry,
    return_address: ReturnAddressConfig,
    recipient: RecipientStyle,
    return_font: FontEntry,
    recipient_font: FontEntry,
    logo: Option<PlacedLogo>,
}

impl EnvelopeRenderer {
    pub fn new(config: &Config) -> Self {
        let mut pdf = Pdf::new();
        let catalog_id = Ref::new(1);
        let pages_id = Ref::new(2);
        let mut next_ref = 3;
        let mut alloc = || {
            let r = Ref::new(next_ref);
            next_ref += 1;
            r
        };

        let return_font = register_font(
            &mut pdf,
            &config.return_address.font,
            "F1".into(),
            &mut alloc,
        );
        let recipient_font = if config.recipient.font == config.return_address.font {
            return_font.clone()
        } else {
            register_font(&mut pdf, &config.recipient.font, "F2".into(), &mut alloc)
        };

        for line in &config.return_address.lines {
            let dropped = unencodable_chars(line);
            if !dropped.is_empty() {
                log::warn!(
                    "Return address line {line:?} has characters that will not print: {}",
                    dropped.iter().collect::<String>()
                );
            }
        }

        let logo = config.return_address.logo.as_ref().and_then(|logo_config| {
            match LogoImage::load(&logo_config.path) {
                Ok(image) => {
                    let image_ref = alloc();
                    image.write(&mut pdf, image_ref, &mut alloc);
                    let (width, height) =
                        scaled_logo_size(image.pixel_width, image.pixel_height, logo_config.height);
                    log::debug!("Logo {}: {width:.1}x{height:.1}pt", logo_config.path.display());
                    Some(PlacedLogo {
                        image_ref,
                        width,
                        height,
                        gap: logo_config.gap,
                    })
                }
                Err(e) => {
                    log::warn!("Could not load logo image, continuing without it: {e}");
                    None
                }
            }
        });

        Self {
            pdf,
            next_ref,
            catalog_id,
            pages_id,
            page_ids: Vec::new(),
            page: config.page,
            return_address: config.return_address.clone(),
            recipient: config.recipient.clone(),
            return_font,
            recipient_font,
            logo,
        }
    }

    fn alloc(&mut self) -> Ref {
        let r = Ref::new(self.next_ref);
        self.next_ref += 1;
        r
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Lay out and append one envelope page for `record`.
    ///
    /// Layout is computed before anything is written, so an error leaves
    /// the document unchanged.
    pub fn render_page(&mut self, record: &RecipientRecord) -> Result<(), Error> {
        let font_size = self.recipient.font_size;
        let lines = recipient_lines(record, &self.recipient.city_separator);
        let unencodable: Vec<char> = lines.iter().flat_map(|l| unencodable_chars(l)).collect();
        if !unencodable.is_empty() {
            return Err(Error::RowData {
                row: record.row,
                reason: format!(
                    "characters cannot be printed in the recipient font: {}",
                    unencodable.iter().collect::<String>()
                ),
            });
        }
        let widths: Vec<f32> = lines
            .iter()
            .map(|line| self.recipient_font.measure(line, font_size))
            .collect();
        let placement = place_block(&widths, self.recipient.line_height, self.page).map_err(
            |source| Error::Layout {
                row: record.row,
                source,
            },
        )?;
        log::debug!(
            "Row {}: {} lines at x={:.1}, top baseline {:.1}",
            record.row,
            lines.len(),
            placement.x,
            placement.baselines[0]
        );

        let page_id = self.alloc();
        let content_id = self.alloc();

        let mut content = Content::new();
        self.draw_return_address(&mut content);

        let recipient_name = Name(self.recipient_font.pdf_name.as_bytes());
        for (line, y) in lines.iter().zip(&placement.baselines) {
            content
                .begin_text()
                .set_font(recipient_name, font_size)
                .next_line(placement.x, *y)
                .show(Str(&to_winansi_bytes(line)))
                .end_text();
        }
        self.pdf.stream(content_id, &content.finish());

        {
            let mut page = self.pdf.page(page_id);
            page.media_box(Rect::new(0.0, 0.0, self.page.width, self.page.height))
                .parent(self.pages_id)
                .contents(content_id);
            let mut resources = page.resources();
            {
                let mut fonts = resources.fonts();
                fonts.pair(
                    Name(self.return_font.pdf_name.as_bytes()),
                    self.return_font.font_ref,
                );
                if self.recipient_font.pdf_name != self.return_font.pdf_name {
                    fonts.pair(recipient_name, self.recipient_font.font_ref);
                }
            }
            if let Some(logo) = &self.logo {
                resources.x_objects().pair(Name(LOGO_NAME), logo.image_ref);
            }
        }

        self.page_ids.push(page_id);
        Ok(())
    }

    fn draw_return_address(&self, content: &mut Content) {
        let ra = &self.return_address;
        let text_x = match &self.logo {
            Some(logo) => ra.origin_x + logo.width + logo.gap,
            None => ra.origin_x,
        };
        let font_name = Name(self.return_font.pdf_name.as_bytes());
        for (i, line) in ra.lines.iter().enumerate() {
            let y = ra.origin_y - i as f32 * ra.line_height;
            content
                .begin_text()
                .set_font(font_name, ra.font_size)
                .next_line(text_x, y)
                .show(Str(&to_winansi_bytes(line)))
                .end_text();
        }

        if let Some(logo) = &self.logo {
            let bottom = ra.origin_y - logo.height + LOGO_BASELINE_RAISE;
            content
                .save_state()
                .transform([logo.width, 0.0, 0.0, logo.height, ra.origin_x, bottom])
                .x_object(Name(LOGO_NAME))
                .restore_state();
        }
    }

    /// Close the page tree and return the finished PDF bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.pdf.catalog(self.catalog_id).pages(self.pages_id);
        let count = self.page_ids.len() as i32;
        self.pdf
            .pages(self.pages_id)
            .kids(self.page_ids.iter().copied())
            .count(count);
        self.pdf.finish()
    }
}

/// Write `bytes` to `path` via a sibling temp file, so a failed write never
/// leaves a truncated document at `path`.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".part");
    let tmp = path.with_file_name(tmp_name);

    let output_error = |source| Error::Output {
        path: PathBuf::from(path),
        source,
    };
    if let Err(e) = std::fs::write(&tmp, bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(output_error(e));
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(output_error(e));
    }
    Ok(())
}
