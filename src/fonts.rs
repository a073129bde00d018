use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

/// A font registered in the output document, with the metrics needed to
/// measure text set in it.
#[derive(Clone)]
pub(crate) struct FontEntry {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    /// Advance widths at 1000 units/em for WinAnsi codes 32..=255.
    pub(crate) widths_1000: Vec<f32>,
}

impl FontEntry {
    /// Width of `text` in points at `size`.
    pub(crate) fn measure(&self, text: &str, size: f32) -> f32 {
        let units: f32 = to_winansi_bytes(text)
            .iter()
            .filter(|&&b| b >= 32)
            .map(|&b| self.widths_1000[(b - 32) as usize])
            .sum();
        units * size / 1000.0
    }
}

/// lowercase family name -> (file path, face index within TTC)
type FontLookup = HashMap<String, (PathBuf, u32)>;

static FONT_INDEX: OnceLock<FontLookup> = OnceLock::new();

fn font_family_name(face: &Face) -> Option<String> {
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::FAMILY
            && name.is_unicode()
            && let Some(s) = name.to_string()
        {
            return Some(s);
        }
    }
    None
}

fn font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    // 1. User-configured directories via ENVELOPES_FONTS env var
    if let Ok(val) = std::env::var("ENVELOPES_FONTS") {
        let sep = if cfg!(windows) { ';' } else { ':' };
        for part in val.split(sep) {
            let trimmed = part.trim();
            if !trimmed.is_empty() {
                dirs.push(PathBuf::from(trimmed));
            }
        }
    }

    // 2. Platform-specific system font directories
    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend([
            "/usr/share/fonts".into(),
            "/usr/local/share/fonts".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        } else {
            dirs.push("C:\\Windows\\Fonts".into());
        }
    }

    dirs
}

fn scan_font_dirs() -> FontLookup {
    let mut index = FontLookup::new();

    // Recursive walk using a stack
    let mut stack: Vec<PathBuf> = font_directories();
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let is_collection = match path.extension().and_then(|e| e.to_str()) {
                Some("ttf" | "otf" | "TTF" | "OTF") => false,
                Some("ttc" | "TTC") => true,
                _ => continue,
            };
            let Ok(data) = std::fs::read(&path) else {
                continue;
            };
            let face_count = if is_collection {
                ttf_parser::fonts_in_collection(&data).unwrap_or(1)
            } else {
                1
            };
            for face_idx in 0..face_count {
                let Ok(face) = Face::parse(&data, face_idx) else {
                    continue;
                };
                // Regular faces only; envelopes use a single weight per block.
                if face.is_bold() || face.is_italic() {
                    continue;
                }
                if let Some(family) = font_family_name(&face) {
                    index
                        .entry(family.to_lowercase())
                        .or_insert((path.clone(), face_idx));
                }
            }
        }
    }
    log::debug!("Indexed {} font families", index.len());
    index
}

/// Resolve a font setting to a file: either a direct path to a font file or
/// a family name looked up in the font directories.
fn find_font_file(font_name: &str) -> Option<(PathBuf, u32)> {
    let as_path = Path::new(font_name);
    if matches!(
        as_path.extension().and_then(|e| e.to_str()),
        Some("ttf" | "otf" | "TTF" | "OTF")
    ) {
        return as_path.is_file().then(|| (as_path.to_path_buf(), 0));
    }
    FONT_INDEX
        .get_or_init(scan_font_dirs)
        .get(&font_name.to_lowercase())
        .cloned()
}

/// Windows-1252 (WinAnsi) byte to Unicode char mapping.
/// Bytes 0x80-0x9F are remapped; all others map directly to their Unicode codepoint.
fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => byte as char,
    }
}

/// WinAnsi (Windows-1252) byte for `c`, if it has one.
fn winansi_byte(c: char) -> Option<u8> {
    match c as u32 {
        0x0000..=0x007F => Some(c as u8),
        0x00A0..=0x00FF => Some(c as u8),
        0x20AC => Some(0x80),
        0x201A => Some(0x82),
        0x0192 => Some(0x83),
        0x201E => Some(0x84),
        0x2026 => Some(0x85),
        0x2020 => Some(0x86),
        0x2021 => Some(0x87),
        0x02C6 => Some(0x88),
        0x2030 => Some(0x89),
        0x0160 => Some(0x8A),
        0x2039 => Some(0x8B),
        0x0152 => Some(0x8C),
        0x017D => Some(0x8E),
        0x2018 => Some(0x91),
        0x2019 => Some(0x92),
        0x201C => Some(0x93),
        0x201D => Some(0x94),
        0x2022 => Some(0x95),
        0x2013 => Some(0x96),
        0x2014 => Some(0x97),
        0x02DC => Some(0x98),
        0x2122 => Some(0x99),
        0x0161 => Some(0x9A),
        0x203A => Some(0x9B),
        0x0153 => Some(0x9C),
        0x017E => Some(0x9E),
        0x0178 => Some(0x9F),
        _ => None,
    }
}

/// Convert a UTF-8 string to WinAnsi (Windows-1252) bytes for PDF Str encoding.
/// Characters outside WinAnsi are dropped; check with [`unencodable_chars`] first.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars().filter_map(winansi_byte).collect()
}

/// Characters of `s` that WinAnsi cannot represent, in order of appearance.
pub(crate) fn unencodable_chars(s: &str) -> Vec<char> {
    s.chars().filter(|&c| winansi_byte(c).is_none()).collect()
}

/// Helvetica AFM widths for printable ASCII (32..=126).
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // sp ! " # $ % & ' ( ) * + , - . /
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    278, 278, 584, 584, 584, 556, 1015, // : ; < = > ? @
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
    278, 278, 278, 469, 556, 333, // [ \ ] ^ _ `
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a-m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n-z
    334, 260, 334, 584, // { | } ~
];

/// Helvetica AFM widths for WinAnsi 127..=255. Unassigned codes get 556.
const HELVETICA_HIGH: [u16; 129] = [
    556, // 127
    556, 556, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 556, 611, 556, // 0x80-0x8F
    556, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 556, 500, 667, // 0x90-0x9F
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333, // 0xA0-0xAF
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611, // 0xB0-0xBF
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278, // 0xC0-0xCF
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611, // 0xD0-0xDF
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278, // 0xE0-0xEF
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500, // 0xF0-0xFF
];

/// Helvetica widths for WinAnsi chars 32..=255.
fn helvetica_widths() -> Vec<f32> {
    (32u8..=255u8)
        .map(|b| match b {
            32..=126 => HELVETICA_ASCII[(b - 32) as usize] as f32,
            _ => HELVETICA_HIGH[(b - 127) as usize] as f32,
        })
        .collect()
}

/// Base-14 fonts we can set without embedding: (name, widths).
fn standard_font(font_name: &str) -> Option<(&'static str, Vec<f32>)> {
    match font_name {
        "Helvetica" => Some(("Helvetica", helvetica_widths())),
        "Courier" => Some(("Courier", vec![600.0; 224])),
        "Courier-Bold" => Some(("Courier-Bold", vec![600.0; 224])),
        "Courier-Oblique" => Some(("Courier-Oblique", vec![600.0; 224])),
        _ => None,
    }
}

/// Embed a TrueType/OpenType font (raw bytes) into the PDF.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    descriptor_ref: Ref,
    data_ref: Ref,
    font_name: &str,
    font_data: &[u8],
    face_index: u32,
) -> Option<Vec<f32>> {
    let face = Face::parse(font_data, face_index).ok()?;

    let units = face.units_per_em() as f32;
    let ascent = face.ascender() as f32 / units * 1000.0;
    let descent = face.descender() as f32 / units * 1000.0;
    let cap_height = face
        .capital_height()
        .map(|h| h as f32 / units * 1000.0)
        .unwrap_or(700.0);

    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        bb.x_min as f32 / units * 1000.0,
        bb.y_min as f32 / units * 1000.0,
        bb.x_max as f32 / units * 1000.0,
        bb.y_max as f32 / units * 1000.0,
    );

    let widths: Vec<f32> = (32u8..=255u8)
        .map(|byte| {
            face.glyph_index(winansi_to_char(byte))
                .and_then(|gid| face.glyph_hor_advance(gid))
                .map(|adv| adv as f32 / units * 1000.0)
                .unwrap_or(0.0)
        })
        .collect();

    let data_len = i32::try_from(font_data.len()).ok()?;
    pdf.stream(data_ref, font_data)
        .pair(Name(b"Length1"), data_len);

    let ps_name = font_family_name(&face)
        .unwrap_or_else(|| font_name.to_string())
        .replace(' ', "");

    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(0.0)
        .ascent(ascent)
        .descent(descent)
        .cap_height(cap_height)
        .stem_v(80.0)
        .font_file2(data_ref);

    {
        let mut d = pdf.indirect(font_ref).dict();
        d.pair(Name(b"Type"), Name(b"Font"));
        d.pair(Name(b"Subtype"), Name(b"TrueType"));
        d.pair(Name(b"BaseFont"), Name(ps_name.as_bytes()));
        d.pair(Name(b"Encoding"), Name(b"WinAnsiEncoding"));
        d.pair(Name(b"FirstChar"), 32i32);
        d.pair(Name(b"LastChar"), 255i32);
        d.pair(Name(b"FontDescriptor"), descriptor_ref);
        d.insert(Name(b"Widths"))
            .array()
            .items(widths.iter().copied());
    }

    Some(widths)
}

/// Register `font_name` in the document: a base-14 font by name, otherwise an
/// embedded TrueType font, otherwise Helvetica with a warning.
pub(crate) fn register_font(
    pdf: &mut Pdf,
    font_name: &str,
    pdf_name: String,
    alloc: &mut impl FnMut() -> Ref,
) -> FontEntry {
    let font_ref = alloc();

    if let Some((base, widths)) = standard_font(font_name) {
        pdf.type1_font(font_ref)
            .base_font(Name(base.as_bytes()))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
        return FontEntry {
            pdf_name,
            font_ref,
            widths_1000: widths,
        };
    }

    let descriptor_ref = alloc();
    let data_ref = alloc();

    let widths = find_font_file(font_name)
        .and_then(|(path, face_index)| {
            let data = std::fs::read(&path).ok()?;
            log::debug!("Embedding {font_name} from {}", path.display());
            embed_truetype(pdf, font_ref, descriptor_ref, data_ref, font_name, &data, face_index)
        })
        .unwrap_or_else(|| {
            log::warn!("Font not found: {font_name} — using Helvetica");
            pdf.type1_font(font_ref)
                .base_font(Name(b"Helvetica"))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
            helvetica_widths()
        });

    FontEntry {
        pdf_name,
        font_ref,
        widths_1000: widths,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helvetica() -> FontEntry {
        let mut pdf = Pdf::new();
        let mut next = 1;
        let mut alloc = || {
            next += 1;
            Ref::new(next)
        };
        register_font(&mut pdf, "Helvetica", "F1".into(), &mut alloc)
    }

    #[test]
    fn helvetica_widths_match_afm() {
        let font = helvetica();
        assert!((font.measure("0", 10.0) - 5.56).abs() < 1e-4);
        // J a n e ␣ D o e = 500+556+556+556+278+722+556+556
        assert!((font.measure("Jane Doe", 16.0) - 68.48).abs() < 1e-3);
        assert!(font.measure("MMM", 12.0) > font.measure("iii", 12.0));
    }

    #[test]
    fn courier_is_monospaced() {
        let mut pdf = Pdf::new();
        let mut next = 1;
        let mut alloc = || {
            next += 1;
            Ref::new(next)
        };
        let font = register_font(&mut pdf, "Courier", "F1".into(), &mut alloc);
        assert!((font.measure("iiii", 10.0) - font.measure("MMMM", 10.0)).abs() < 1e-6);
        assert!((font.measure("abc", 10.0) - 18.0).abs() < 1e-4);
    }

    #[test]
    fn unknown_font_falls_back_to_helvetica() {
        let mut pdf = Pdf::new();
        let mut next = 1;
        let mut alloc = || {
            next += 1;
            Ref::new(next)
        };
        let font = register_font(&mut pdf, "/no/such/font.ttf", "F1".into(), &mut alloc);
        assert_eq!(font.widths_1000, helvetica_widths());
    }

    #[test]
    fn helvetica_accented_capitals_use_afm_widths() {
        let font = helvetica();
        assert!((font.measure("É", 1000.0) - 667.0).abs() < 1e-3);
        assert!((font.measure("Ü", 1000.0) - 722.0).abs() < 1e-3);
        assert!((font.measure("Ø", 1000.0) - 778.0).abs() < 1e-3);
        assert!((font.measure("ß", 1000.0) - 611.0).abs() < 1e-3);
        assert!((font.measure("\u{2014}", 1000.0) - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn unencodable_chars_are_reported() {
        assert_eq!(unencodable_chars("Łukasz Żak"), vec!['Ł', 'Ż']);
        assert!(unencodable_chars("Zoë Müller").is_empty());
    }

    #[test]
    fn winansi_maps_latin1_and_drops_the_rest() {
        assert_eq!(to_winansi_bytes("Zoë"), vec![b'Z', b'o', 0xEB]);
        assert_eq!(to_winansi_bytes("a\u{2019}b"), vec![b'a', 0x92, b'b']);
        assert_eq!(to_winansi_bytes("東京"), Vec::<u8>::new());
    }
}
