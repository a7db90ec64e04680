//! Shared fixture builders for the integration tests.
//!
//! PDFs are created programmatically using lopdf; the encrypted fixtures are
//! sealed by lopdf's own standard security handler (RC4 and AES).

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use lopdf::encryption::crypt_filters::{Aes128CryptFilter, CryptFilter};
use lopdf::{
    EncryptionState, EncryptionVersion, Object, ObjectId, Permissions, Stream, StringFormat,
    dictionary,
};

/// A document whose pages each show one line of Helvetica 12 at (72, 720).
fn build(texts: &[&str]) -> lopdf::Document {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let mut kids = Vec::new();
    for text in texts {
        let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn pdf(texts: &[&str]) -> Vec<u8> {
    let mut doc = build(texts);
    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save PDF");
    buf
}

/// Same pages as [`pdf`], encrypted by lopdf under `user_password` with
/// RC4 (V2, 128-bit key).
pub fn encrypted_pdf(user_password: &str, texts: &[&str]) -> Vec<u8> {
    seal(texts, user_password, false)
}

/// Same pages as [`pdf`], encrypted by lopdf under `user_password` with
/// AES-128 (V4, `StdCF` crypt filter).
pub fn aes_encrypted_pdf(user_password: &str, texts: &[&str]) -> Vec<u8> {
    seal(texts, user_password, true)
}

fn seal(texts: &[&str], user_password: &str, aes: bool) -> Vec<u8> {
    let mut doc = build(texts);
    let id = Object::String(b"blackoutfixture1".to_vec(), StringFormat::Literal);
    doc.trailer.set("ID", Object::Array(vec![id.clone(), id]));
    let version = if aes {
        let filter: Arc<dyn CryptFilter> = Arc::new(Aes128CryptFilter);
        EncryptionVersion::V4 {
            document: &doc,
            encrypt_metadata: true,
            crypt_filters: BTreeMap::from([(b"StdCF".to_vec(), filter)]),
            stream_filter: b"StdCF".to_vec(),
            string_filter: b"StdCF".to_vec(),
            owner_password: "owner",
            user_password,
            permissions: Permissions::all(),
        }
    } else {
        EncryptionVersion::V2 {
            document: &doc,
            owner_password: "owner",
            user_password,
            key_length: 128,
            permissions: Permissions::all(),
        }
    };
    let state = EncryptionState::try_from(version).expect("encryption parameters");
    doc.encrypt(&state).expect("failed to encrypt PDF");
    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save encrypted PDF");
    buf
}

/// A PNG filled with one colour.
pub fn png(width: u32, height: u32, colour: [u8; 3]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([colour[0], colour[1], colour[2], 255]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("failed to encode PNG");
    buf
}

/// A white JPEG.
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .expect("failed to encode JPEG");
    buf
}

/// Decompressed content of every page, in page order.
pub fn page_contents(doc: &lopdf::Document) -> Vec<Vec<u8>> {
    doc.get_pages()
        .values()
        .map(|&id| doc.get_page_content(id).expect("page content"))
        .collect()
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
