//! Decoding and re-encoding of image XObject pixels.
//!
//! Handles 8-bit gray and RGB images stored raw, Flate-compressed, or as
//! JPEG. Anything else (CMYK, indexed, masks, JBIG2, CCITT, JPX) is reported
//! as undecodable.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Object, Stream};

use crate::error::BackendError;
use crate::font_metrics::{number, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Flate,
    Jpeg,
}

/// Decoded pixels of one image XObject.
#[derive(Debug, Clone)]
pub(crate) struct DecodedImage {
    pub width: u32,
    pub height: u32,
    components: usize,
    pixels: Vec<u8>,
    encoding: Encoding,
}

fn filter_names(doc: &lopdf::Document, stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter").map(|o| resolve(doc, o)) {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| resolve(doc, o).as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn colour_components(doc: &lopdf::Document, cs: &Object) -> Option<usize> {
    match resolve(doc, cs) {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
            _ => None,
        },
        Object::Array(items) => {
            let family = items.first().map(|o| resolve(doc, o))?.as_name().ok()?;
            match family {
                b"CalGray" => Some(1),
                b"CalRGB" => Some(3),
                b"ICCBased" => {
                    let profile = resolve(doc, items.get(1)?).as_stream().ok()?;
                    match number(doc, profile.dict.get(b"N").ok())? as usize {
                        n @ (1 | 3) => Some(n),
                        _ => None,
                    }
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Decode an image XObject's pixels, or `None` if the format is not handled.
pub(crate) fn decode_image_stream(doc: &lopdf::Document, stream: &Stream) -> Option<DecodedImage> {
    let dict = &stream.dict;
    let is_mask = matches!(dict.get(b"ImageMask").map(|o| resolve(doc, o)), Ok(Object::Boolean(true)));
    if is_mask {
        return None;
    }
    let width = number(doc, dict.get(b"Width").ok())? as u32;
    let height = number(doc, dict.get(b"Height").ok())? as u32;
    if width == 0 || height == 0 {
        return None;
    }
    let components = colour_components(doc, dict.get(b"ColorSpace").ok()?)?;

    let filters = filter_names(doc, stream);
    let (encoding, pixels) = match filters.last().map(Vec::as_slice) {
        None => (Encoding::Flate, stream.content.clone()),
        Some(b"FlateDecode") if filters.len() == 1 => {
            (Encoding::Flate, stream.decompressed_content().ok()?)
        }
        Some(b"DCTDecode") if filters.len() == 1 => {
            let img = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg).ok()?;
            let raw = match components {
                1 => img.to_luma8().into_raw(),
                _ => img.to_rgb8().into_raw(),
            };
            (Encoding::Jpeg, raw)
        }
        _ => return None,
    };

    if encoding == Encoding::Flate {
        let bpc = number(doc, dict.get(b"BitsPerComponent").ok())?;
        if bpc as u32 != 8 {
            return None;
        }
    }

    let expected = width as usize * height as usize * components;
    if pixels.len() < expected {
        return None;
    }
    let mut pixels = pixels;
    pixels.truncate(expected);

    Some(DecodedImage {
        width,
        height,
        components,
        pixels,
        encoding,
    })
}

impl DecodedImage {
    /// Paint pixel columns `x0..x1` of rows `y0..y1` (top-down) with `rgb`.
    pub fn fill(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, rgb: [u8; 3]) {
        let (x1, y1) = (x1.min(self.width), y1.min(self.height));
        let n = self.components;
        let colour = if n == 1 {
            let [r, g, b] = rgb.map(f64::from);
            [(0.299 * r + 0.587 * g + 0.114 * b).round() as u8, 0, 0]
        } else {
            rgb
        };
        let value = &colour[..n];
        for y in y0..y1 {
            for x in x0..x1 {
                let at = (y as usize * self.width as usize + x as usize) * n;
                self.pixels[at..at + n].copy_from_slice(value);
            }
        }
    }

    /// Build a replacement stream from `dict`, keeping the original
    /// encoding family.
    pub fn encode(self, mut dict: lopdf::Dictionary, jpeg_quality: u8) -> Result<Stream, BackendError> {
        dict.remove(b"DecodeParms");
        dict.remove(b"Filter");
        dict.set("BitsPerComponent", 8);
        match self.encoding {
            Encoding::Flate => {
                let mut stream = Stream::new(dict, self.pixels);
                stream
                    .compress()
                    .map_err(|e| BackendError::Serialize(format!("failed to compress image: {e}")))?;
                Ok(stream)
            }
            Encoding::Jpeg => {
                let img = if self.components == 1 {
                    GrayImage::from_raw(self.width, self.height, self.pixels).map(DynamicImage::ImageLuma8)
                } else {
                    RgbImage::from_raw(self.width, self.height, self.pixels).map(DynamicImage::ImageRgb8)
                }
                .ok_or_else(|| BackendError::Image("pixel buffer does not match image size".into()))?;
                let mut buf = Vec::new();
                JpegEncoder::new_with_quality(&mut buf, jpeg_quality.clamp(1, 100)).encode_image(&img)?;
                dict.set("Filter", "DCTDecode");
                Ok(Stream::new(dict, buf))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Document, dictionary};

    fn gray(width: i64, height: i64, data: Vec<u8>) -> Stream {
        Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            data,
        )
    }

    #[test]
    fn raw_gray_decodes_and_fills() {
        let doc = Document::with_version("1.7");
        let mut img = decode_image_stream(&doc, &gray(2, 2, vec![200; 4])).unwrap();
        img.fill(1, 0, 5, 1, [255, 255, 255]);
        img.fill(0, 1, 1, 2, [0, 0, 0]);
        assert_eq!(img.pixels, vec![200, 255, 0, 200]);
    }

    #[test]
    fn rgb_fill_writes_all_components() {
        let doc = Document::with_version("1.7");
        let stream = Stream::new(
            dictionary! {
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![1, 2, 3],
        );
        let mut img = decode_image_stream(&doc, &stream).unwrap();
        img.fill(0, 0, 1, 1, [9, 8, 7]);
        assert_eq!(img.pixels, vec![9, 8, 7]);
    }

    #[test]
    fn short_data_and_unsupported_formats_are_rejected() {
        let doc = Document::with_version("1.7");
        assert!(decode_image_stream(&doc, &gray(4, 4, vec![0; 3])).is_none());

        let mut cmyk = gray(1, 1, vec![0; 4]);
        cmyk.dict.set("ColorSpace", "DeviceCMYK");
        assert!(decode_image_stream(&doc, &cmyk).is_none());

        let mut one_bit = gray(8, 1, vec![0]);
        one_bit.dict.set("BitsPerComponent", 1);
        assert!(decode_image_stream(&doc, &one_bit).is_none());

        let mut mask = gray(1, 1, vec![0]);
        mask.dict.set("ImageMask", true);
        assert!(decode_image_stream(&doc, &mask).is_none());
    }

    #[test]
    fn icc_based_uses_component_count() {
        let mut doc = Document::with_version("1.7");
        let profile = doc.add_object(Stream::new(dictionary! { "N" => 3 }, Vec::new()));
        let mut stream = gray(1, 1, vec![1, 2, 3]);
        stream.dict.set(
            "ColorSpace",
            vec![Object::Name(b"ICCBased".to_vec()), Object::Reference(profile)],
        );
        let img = decode_image_stream(&doc, &stream).unwrap();
        assert_eq!(img.components, 3);
    }

    #[test]
    fn jpeg_round_trips_through_encoder() {
        let doc = Document::with_version("1.7");
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, image::Rgb([250, 250, 250])));
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 90)
            .encode_image(&source)
            .unwrap();
        let stream = Stream::new(
            dictionary! {
                "Width" => 8,
                "Height" => 8,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );
        let mut img = decode_image_stream(&doc, &stream).unwrap();
        img.fill(0, 0, 8, 8, [0, 0, 0]);
        let out = img.encode(stream.dict.clone(), 92).unwrap();
        assert_eq!(out.dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
        let decoded = image::load_from_memory_with_format(&out.content, ImageFormat::Jpeg)
            .unwrap()
            .to_rgb8();
        assert!(decoded.pixels().all(|p| p.0.iter().all(|&c| c < 16)));
    }
}
