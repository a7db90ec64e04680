//! lopdf-based PDF backend.
//!
//! Implements [`DocumentBackend`] using the [lopdf](https://crates.io/crates/lopdf)
//! crate. Redaction rewrites page content in place (see [`crate::scrub`]) and
//! unreferenced objects are pruned before writing, so replaced content
//! streams and images do not survive in the output.

use blackout_core::{Document, Password, Rect, RedactOptions};
use tracing::{debug, info};

use lopdf::EncryptionState;
use lopdf::encryption::DecryptionError;

use crate::backend::{DocumentBackend, PageHandle, SaveOptions};
use crate::error::BackendError;
use crate::font_metrics::number;
use crate::page_geometry::{PageBox, PageGeometry};
use crate::scrub::{ScrubReport, scrub_page};

/// A parsed PDF document backed by lopdf.
pub struct LopdfDocument {
    /// The underlying lopdf document, decrypted.
    inner: lopdf::Document,
    /// Ordered page ObjectIds (indexed by 0-based page number).
    page_ids: Vec<lopdf::ObjectId>,
    /// Security handler state of the source, reused to re-encrypt on save.
    encryption: Option<EncryptionState>,
}

impl LopdfDocument {
    /// Access the underlying lopdf document.
    pub fn inner(&self) -> &lopdf::Document {
        &self.inner
    }

    /// Encryption version (`/V`) of the source, if it was encrypted.
    pub fn encryption_version(&self) -> Option<i64> {
        self.encryption.as_ref().map(EncryptionState::version)
    }
}

impl std::fmt::Debug for LopdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfDocument")
            .field("page_count", &self.page_ids.len())
            .field("encrypted", &self.encryption.is_some())
            .finish_non_exhaustive()
    }
}

/// The lopdf-backed PDF backend.
pub struct LopdfBackend;

/// Look up a possibly inherited page attribute, walking `/Parent` links.
pub(crate) fn resolve_inherited<'a>(
    doc: &'a lopdf::Document,
    page_id: lopdf::ObjectId,
    key: &[u8],
) -> Result<Option<&'a lopdf::Object>, BackendError> {
    let mut current_id = page_id;
    // Bounded so that a cyclic page tree cannot hang.
    for _ in 0..64 {
        let dict = doc
            .get_object(current_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }

        match dict.get(b"Parent") {
            Ok(parent_obj) => {
                current_id = parent_obj
                    .as_reference()
                    .map_err(|e| BackendError::Parse(format!("invalid /Parent reference: {e}")))?;
            }
            Err(_) => return Ok(None),
        }
    }
    Err(BackendError::Parse("page tree too deep or cyclic".into()))
}

fn page_box(doc: &lopdf::Document, obj: &lopdf::Object, name: &str) -> Result<PageBox, BackendError> {
    let array = crate::font_metrics::resolve(doc, obj)
        .as_array()
        .map_err(|e| BackendError::Parse(format!("{name} is not an array: {e}")))?;
    let vals: Vec<f64> = array.iter().filter_map(|o| number(doc, Some(o))).collect();
    match vals.as_slice() {
        [x0, y0, x1, y1] => Ok(PageBox::new(*x0, *y0, *x1, *y1)),
        _ => Err(BackendError::Parse(format!(
            "{name} must have 4 numeric elements, got {}",
            vals.len()
        ))),
    }
}

fn load(bytes: &[u8]) -> Result<lopdf::Document, BackendError> {
    lopdf::Document::load_mem(bytes)
        .map_err(|e| BackendError::Parse(format!("failed to parse PDF: {e}")))
}

fn load_with_password(bytes: &[u8], password: &Password) -> Result<lopdf::Document, BackendError> {
    lopdf::Document::load_mem_with_password(bytes, password.expose()).map_err(|e| match e {
        lopdf::Error::InvalidPassword
        | lopdf::Error::Decryption(DecryptionError::IncorrectPassword) => {
            BackendError::InvalidPassword
        }
        other => BackendError::Parse(format!("failed to decrypt PDF: {other}")),
    })
}

impl DocumentBackend for LopdfBackend {
    type Document = LopdfDocument;

    /// lopdf decrypts files with an empty user password while loading, so
    /// only documents that still carry `/Encrypt` afterwards need a password.
    fn probe_encrypted(bytes: &[u8]) -> Result<bool, BackendError> {
        Ok(load(bytes)?.is_encrypted())
    }

    fn open(bytes: &[u8], password: Option<&Password>) -> Result<Self::Document, BackendError> {
        let inner = match password {
            Some(password) => load_with_password(bytes, password)?,
            None => load(bytes)?,
        };
        if inner.is_encrypted() {
            return Err(BackendError::PasswordRequired);
        }
        let encryption = inner.encryption_state.clone();

        let page_ids: Vec<lopdf::ObjectId> = inner.get_pages().values().copied().collect();
        if page_ids.is_empty() {
            return Err(BackendError::Parse("document has no pages".into()));
        }
        debug!(
            pages = page_ids.len(),
            encrypted = inner.was_encrypted(),
            "opened PDF"
        );

        Ok(LopdfDocument {
            inner,
            page_ids,
            encryption,
        })
    }

    fn page_count(doc: &Self::Document) -> usize {
        doc.page_ids.len()
    }

    fn is_encrypted(doc: &Self::Document) -> bool {
        doc.encryption.is_some()
    }

    fn page(doc: &Self::Document, index: usize) -> Result<PageHandle, BackendError> {
        let Some(&page_id) = doc.page_ids.get(index) else {
            return Err(BackendError::Parse(format!(
                "page index {index} out of range (0..{})",
                doc.page_ids.len()
            )));
        };
        let inner = &doc.inner;

        let media_box = match resolve_inherited(inner, page_id, b"MediaBox")? {
            Some(obj) => page_box(inner, obj, "MediaBox")?,
            // US Letter when absent.
            None => PageBox::new(0.0, 0.0, 612.0, 792.0),
        };
        let crop_box = match resolve_inherited(inner, page_id, b"CropBox")? {
            Some(obj) => Some(page_box(inner, obj, "CropBox")?),
            None => None,
        };
        let rotation = match resolve_inherited(inner, page_id, b"Rotate")? {
            Some(obj) => number(inner, Some(obj)).ok_or_else(|| {
                BackendError::Parse("Rotate is not a number".into())
            })? as i32,
            None => 0,
        };

        Ok(PageHandle {
            index,
            geometry: PageGeometry::new(media_box, crop_box, rotation),
        })
    }

    fn redact_page(
        doc: &mut Self::Document,
        page: &PageHandle,
        regions: &[Rect<Document>],
        options: &RedactOptions,
    ) -> Result<ScrubReport, BackendError> {
        let page_id = *doc.page_ids.get(page.index).ok_or_else(|| {
            BackendError::Parse(format!("page index {} out of range", page.index))
        })?;
        let report = scrub_page(&mut doc.inner, page_id, regions, options)?;
        debug!(page = page.number(), ?report, "scrubbed page");
        Ok(report)
    }

    fn save(mut doc: Self::Document, options: &SaveOptions) -> Result<Vec<u8>, BackendError> {
        doc.inner.trailer.remove(b"Encrypt");
        let pruned = doc.inner.prune_objects();
        debug!(pruned = pruned.len(), "pruned unreferenced objects");

        if !options.remove_encryption {
            if let Some(state) = &doc.encryption {
                doc.inner
                    .encrypt(state)
                    .map_err(|e| BackendError::Serialize(format!("failed to re-encrypt PDF: {e}")))?;
                info!(version = state.version(), "re-encrypted output with the source handler");
            }
        }

        let mut buf = Vec::new();
        doc.inner
            .save_to(&mut buf)
            .map_err(|e| BackendError::Serialize(format!("failed to write PDF: {e}")))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use lopdf::encryption::crypt_filters::{Aes128CryptFilter, CryptFilter};
    use lopdf::{EncryptionVersion, Object, Permissions, Stream, dictionary};

    #[derive(Clone, Copy)]
    enum Cipher {
        Rc4,
        Aes,
    }

    /// One Helvetica page showing `text` at (72, 720), encrypted by lopdf's
    /// own security handler.
    fn encrypted_pdf(user_password: &str, text: &str, cipher: Cipher) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1_i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set(
            "ID",
            vec![
                Object::string_literal(b"0123456789abcdef".to_vec()),
                Object::string_literal(b"0123456789abcdef".to_vec()),
            ],
        );

        let version = match cipher {
            Cipher::Rc4 => EncryptionVersion::V2 {
                document: &doc,
                owner_password: "owner",
                user_password,
                key_length: 128,
                permissions: Permissions::all(),
            },
            Cipher::Aes => {
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
            }
        };
        let state = EncryptionState::try_from(version).unwrap();
        doc.encrypt(&state).unwrap();
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// Two-page PDF: page 1 inherits MediaBox and Rotate from the page tree,
    /// page 2 has its own CropBox.
    fn two_page_pdf() -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let mut kids = Vec::new();
        for (i, text) in ["First page", "Second page"].iter().enumerate() {
            let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            };
            if i == 1 {
                page.set(
                    "CropBox",
                    vec![10.into(), 20.into(), 310.into(), 420.into()],
                );
                page.set("Rotate", 0);
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2_i64,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Rotate" => 90,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn page_text(doc: &lopdf::Document, page_number: u32) -> Vec<u8> {
        let page_id = doc.get_pages()[&page_number];
        doc.get_page_content(page_id).unwrap()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn plain_pdf_is_not_encrypted() {
        assert!(!LopdfBackend::probe_encrypted(&two_page_pdf()).unwrap());
    }

    #[test]
    fn garbage_fails_to_parse() {
        assert!(matches!(
            LopdfBackend::probe_encrypted(b"not a pdf"),
            Err(BackendError::Parse(_))
        ));
    }

    #[test]
    fn inherited_attributes_resolve() {
        let doc = LopdfBackend::open(&two_page_pdf(), None).unwrap();
        assert_eq!(LopdfBackend::page_count(&doc), 2);

        let first = LopdfBackend::page(&doc, 0).unwrap();
        assert_eq!(first.geometry.rotation(), 90);
        assert_eq!(first.doc_size().width, 792.0);
        assert_eq!(first.doc_size().height, 612.0);

        let second = LopdfBackend::page(&doc, 1).unwrap();
        assert_eq!(second.geometry.rotation(), 0);
        assert_eq!(second.geometry.visible_box(), PageBox::new(10.0, 20.0, 310.0, 420.0));

        assert!(LopdfBackend::page(&doc, 2).is_err());
    }

    /// Whether `/Encrypt` survives lopdf's empty-password attempt.
    fn needs_password(bytes: &[u8]) -> bool {
        lopdf::Document::load_mem(bytes).unwrap().is_encrypted()
    }

    #[test]
    fn encrypted_pdf_requires_password() {
        let bytes = encrypted_pdf("secret", "Hello World", Cipher::Rc4);
        assert!(needs_password(&bytes));
        assert!(matches!(
            LopdfBackend::open(&bytes, None),
            Err(BackendError::PasswordRequired)
        ));
    }

    #[test]
    fn wrong_password_is_rejected() {
        for cipher in [Cipher::Rc4, Cipher::Aes] {
            let bytes = encrypted_pdf("secret", "Hello World", cipher);
            let result = LopdfBackend::open(&bytes, Some(&Password::from("wrong")));
            assert!(matches!(result, Err(BackendError::InvalidPassword)));
        }
    }

    #[test]
    fn correct_password_decrypts() {
        for (cipher, version) in [(Cipher::Rc4, 2), (Cipher::Aes, 4)] {
            let bytes = encrypted_pdf("secret", "Hello World", cipher);
            let doc = LopdfBackend::open(&bytes, Some(&Password::from("secret"))).unwrap();
            assert!(LopdfBackend::is_encrypted(&doc));
            assert_eq!(LopdfBackend::page_count(&doc), 1);
            assert_eq!(doc.encryption_version(), Some(version));
            assert!(contains(&page_text(doc.inner(), 1), b"Hello World"));
        }
    }

    #[test]
    fn empty_user_password_opens_without_prompt() {
        let bytes = encrypted_pdf("", "Hello World", Cipher::Rc4);
        assert!(!needs_password(&bytes));
        let doc = LopdfBackend::open(&bytes, None).unwrap();
        assert!(LopdfBackend::is_encrypted(&doc));
        assert!(contains(&page_text(doc.inner(), 1), b"Hello World"));
    }

    #[test]
    fn redacted_text_is_gone_after_save() {
        let bytes = two_page_pdf();
        let mut doc = LopdfBackend::open(&bytes, None).unwrap();
        let page = LopdfBackend::page(&doc, 1).unwrap();
        // Covers the baseline run of "Second page" at (72, 720).
        let region = Rect::new(60.0, 710.0, 200.0, 30.0);
        let report =
            LopdfBackend::redact_page(&mut doc, &page, &[region], &RedactOptions::default())
                .unwrap();
        assert_eq!(report.glyphs_removed, "Second page".len());

        let out = LopdfBackend::save(doc, &SaveOptions::default()).unwrap();
        assert!(!contains(&out, b"Second page"));
        let reopened = lopdf::Document::load_mem(&out).unwrap();
        assert!(!contains(&page_text(&reopened, 2), b"Second"));
        assert!(contains(&page_text(&reopened, 1), b"First page"));
    }

    #[test]
    fn decrypted_output_opens_without_password() {
        for cipher in [Cipher::Rc4, Cipher::Aes] {
            let bytes = encrypted_pdf("secret", "Hello World", cipher);
            let doc = LopdfBackend::open(&bytes, Some(&Password::from("secret"))).unwrap();
            let out = LopdfBackend::save(doc, &SaveOptions::default()).unwrap();
            assert!(!needs_password(&out));
            let reopened = LopdfBackend::open(&out, None).unwrap();
            assert!(!LopdfBackend::is_encrypted(&reopened));
            assert!(contains(&page_text(reopened.inner(), 1), b"Hello World"));
        }
    }

    #[test]
    fn kept_encryption_reopens_with_same_password() {
        for (cipher, version) in [(Cipher::Rc4, 2), (Cipher::Aes, 4)] {
            let bytes = encrypted_pdf("secret", "Hello World", cipher);
            let mut doc = LopdfBackend::open(&bytes, Some(&Password::from("secret"))).unwrap();
            let page = LopdfBackend::page(&doc, 0).unwrap();
            LopdfBackend::redact_page(
                &mut doc,
                &page,
                &[Rect::new(60.0, 710.0, 40.0, 30.0)],
                &RedactOptions::default(),
            )
            .unwrap();
            let options = SaveOptions {
                remove_encryption: false,
                ..SaveOptions::default()
            };
            let out = LopdfBackend::save(doc, &options).unwrap();

            assert!(needs_password(&out));
            assert!(matches!(
                LopdfBackend::open(&out, Some(&Password::from("wrong"))),
                Err(BackendError::InvalidPassword)
            ));
            let reopened = LopdfBackend::open(&out, Some(&Password::from("secret"))).unwrap();
            assert_eq!(reopened.encryption_version(), Some(version));
            let text = page_text(reopened.inner(), 1);
            assert!(contains(&text, b"World"));
            assert!(!contains(&text, b"Hello"));
        }
    }
}
