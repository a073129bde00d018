//! Recipient block formatting and placement. Pure geometry, no PDF state.

use crate::error::LayoutError;
use crate::model::{PageGeometry, RecipientRecord};

/// First character upper-cased, the rest of the token lower-cased.
///
/// Applied to the whole token, so `"O'Brien"` becomes `"O'brien"` and
/// `"mary ann"` becomes `"Mary ann"`.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// The recipient block, top to bottom.
pub fn recipient_lines(record: &RecipientRecord, city_separator: &str) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{} {}",
            capitalize(record.first_name.trim()),
            capitalize(record.last_name.trim())
        ),
        record.address1.trim().to_uppercase(),
    ];
    if let Some(address2) = &record.address2
        && !address2.trim().is_empty()
    {
        lines.push(address2.clone());
    }
    lines.push(format!(
        "{}{}{} {}",
        record.city.trim().to_uppercase(),
        city_separator,
        record.state.trim().to_uppercase(),
        record.postal_code.trim()
    ));
    lines
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockPlacement {
    /// Shared left edge of every line.
    pub x: f32,
    /// Baselines, top line first.
    pub baselines: Vec<f32>,
    pub width: f32,
    pub height: f32,
}

/// Center a block of left-aligned lines on the page as a unit.
///
/// `line_widths` are the measured widths of each line in points.
pub fn place_block(
    line_widths: &[f32],
    line_height: f32,
    page: PageGeometry,
) -> Result<BlockPlacement, LayoutError> {
    if line_widths.is_empty() {
        return Err(LayoutError::EmptyBlock);
    }
    let width = line_widths.iter().copied().fold(0.0_f32, f32::max);
    let height = line_widths.len() as f32 * line_height;

    let x = (page.width - width) / 2.0;
    if x < 0.0 {
        return Err(LayoutError::BlockTooWide {
            width,
            page_width: page.width,
        });
    }
    let y_start = (page.height + height) / 2.0;
    let baselines = (0..line_widths.len())
        .map(|i| y_start - i as f32 * line_height)
        .collect();

    Ok(BlockPlacement {
        x,
        baselines,
        width,
        height,
    })
}

/// Display size for an image scaled to `target_height`, keeping its aspect ratio.
pub fn scaled_logo_size(pixel_width: u32, pixel_height: u32, target_height: f32) -> (f32, f32) {
    if pixel_height == 0 {
        return (0.0, target_height);
    }
    let aspect = pixel_width as f32 / pixel_height as f32;
    (aspect * target_height, target_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(address2: Option<&str>) -> RecipientRecord {
        RecipientRecord {
            row: 1,
            first_name: "jane".into(),
            last_name: "DOE".into(),
            address1: "123 Main St".into(),
            address2: address2.map(String::from),
            city: "Springfield".into(),
            state: "il".into(),
            postal_code: "62704".into(),
        }
    }

    #[test]
    fn capitalize_whole_token() {
        assert_eq!(capitalize("joel"), "Joel");
        assert_eq!(capitalize("O'Brien"), "O'brien");
        assert_eq!(capitalize("mcDONALD"), "Mcdonald");
        assert_eq!(capitalize("élodie"), "Élodie");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn three_lines_without_address2() {
        let lines = recipient_lines(&record(None), ", ");
        assert_eq!(lines, vec!["Jane Doe", "123 MAIN ST", "SPRINGFIELD, IL 62704"]);
    }

    #[test]
    fn four_lines_with_address2_verbatim() {
        let lines = recipient_lines(&record(Some("Suite 5b")), " ");
        assert_eq!(
            lines,
            vec!["Jane Doe", "123 MAIN ST", "Suite 5b", "SPRINGFIELD IL 62704"]
        );
    }

    #[test]
    fn whitespace_address2_is_dropped() {
        let lines = recipient_lines(&record(Some("   ")), " ");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn block_is_centered_as_a_unit() {
        let page = PageGeometry::NO_10_ENVELOPE;
        let placement = place_block(&[100.0, 180.0, 140.0], 14.0, page).unwrap();
        assert_eq!(placement.width, 180.0);
        assert_eq!(placement.x, (684.0 - 180.0) / 2.0);
        assert_eq!(placement.height, 42.0);
        assert_eq!(placement.baselines, vec![169.5, 155.5, 141.5]);
    }

    #[test]
    fn too_wide_block_is_rejected() {
        let page = PageGeometry::NO_10_ENVELOPE;
        let err = place_block(&[700.0], 14.0, page).unwrap_err();
        assert_eq!(
            err,
            LayoutError::BlockTooWide {
                width: 700.0,
                page_width: 684.0
            }
        );
    }

    #[test]
    fn empty_block_is_rejected() {
        let page = PageGeometry::NO_10_ENVELOPE;
        assert_eq!(place_block(&[], 14.0, page), Err(LayoutError::EmptyBlock));
    }

    #[test]
    fn logo_scales_by_height() {
        assert_eq!(scaled_logo_size(200, 100, 28.0), (56.0, 28.0));
        assert_eq!(scaled_logo_size(50, 100, 28.0), (14.0, 28.0));
    }
}
