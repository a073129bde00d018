//! Return-address logo: decoded once, embedded once, drawn on every page.

use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::GenericImageView;
use pdf_writer::{Filter, Pdf, Ref};

/// Image data ready to be written as a PDF image XObject.
pub(crate) struct LogoImage {
    pub(crate) pixel_width: u32,
    pub(crate) pixel_height: u32,
    gray: bool,
    filter: Filter,
    data: Vec<u8>,
    /// Flate-compressed 8-bit alpha channel, when the image has transparency.
    alpha: Option<Vec<u8>>,
}

impl LogoImage {
    pub(crate) fn load(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
        Self::decode(&bytes).map_err(|e| format!("{}: {e}", path.display()))
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, String> {
        let format = image::guess_format(bytes).map_err(|e| e.to_string())?;
        let decoded = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err("image has no pixels".into());
        }

        // JPEG streams go in as-is; PDF viewers decode DCT natively.
        if format == image::ImageFormat::Jpeg {
            let gray = matches!(
                decoded.color(),
                image::ColorType::L8 | image::ColorType::La8
            );
            return Ok(Self {
                pixel_width: width,
                pixel_height: height,
                gray,
                filter: Filter::DctDecode,
                data: bytes.to_vec(),
                alpha: None,
            });
        }

        let rgba = decoded.to_rgba8();
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        let mut has_alpha = false;
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            if a != 255 {
                has_alpha = true;
            }
            rgb.extend_from_slice(&[r, g, b]);
            alpha.push(a);
        }

        Ok(Self {
            pixel_width: width,
            pixel_height: height,
            gray: false,
            filter: Filter::FlateDecode,
            data: flate_compress(&rgb)?,
            alpha: if has_alpha {
                Some(flate_compress(&alpha)?)
            } else {
                None
            },
        })
    }

    /// Write the image (and its soft mask) into `pdf` as `image_ref`.
    pub(crate) fn write(&self, pdf: &mut Pdf, image_ref: Ref, alloc: &mut impl FnMut() -> Ref) {
        let mask_ref = self.alpha.as_ref().map(|alpha| {
            let mask_ref = alloc();
            let mut mask = pdf.image_xobject(mask_ref, alpha);
            mask.filter(Filter::FlateDecode);
            mask.width(self.pixel_width as i32);
            mask.height(self.pixel_height as i32);
            mask.color_space().device_gray();
            mask.bits_per_component(8);
            mask_ref
        });

        let mut xobject = pdf.image_xobject(image_ref, &self.data);
        xobject.filter(self.filter);
        xobject.width(self.pixel_width as i32);
        xobject.height(self.pixel_height as i32);
        if self.gray {
            xobject.color_space().device_gray();
        } else {
            xobject.color_space().device_rgb();
        }
        xobject.bits_per_component(8);
        if let Some(mask_ref) = mask_ref {
            xobject.s_mask(mask_ref);
        }
    }
}

fn flate_compress(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|e| e.to_string())?;
    encoder.finish().map_err(|e| e.to_string())
}
