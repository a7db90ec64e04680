//! End-to-end session flows: load, unlock, navigate, draw, export.

mod common;

use blackout::blackout_parse::{BackendError, DocumentBackend, LopdfBackend};
use blackout::{
    DocumentKind, Encryption, ImageFormat, LoadStatus, Password, Rect, RedactError,
    RedactOptions, RedactionApplier, RedactionStore, Redactor, SessionState, Size, SourceFile,
};
use common::{aes_encrypted_pdf, contains, encrypted_pdf, jpeg, page_contents, pdf, png};

/// Display size equal to a Letter page in points; the default renderer
/// draws PDFs at 1.5x, so display-to-surface scales by 1.5.
fn letter_display() -> Size<blackout::Display> {
    Size::new(612.0, 792.0)
}

/// Display rectangle over the line drawn at baseline 720 from x = 72.
fn over_first_word() -> Rect<blackout::Display> {
    Rect::new(60.0, 60.0, 35.0, 20.0)
}

#[tokio::test]
async fn plain_pdf_redaction_removes_only_covered_text() {
    let mut r = Redactor::default();
    let status = r
        .load(SourceFile::new("memo.pdf", pdf(&["Secret", "Public"])))
        .await
        .unwrap();
    assert_eq!(status, LoadStatus::Ready { page_count: 2 });
    assert!(r.add_redaction_from_drag(over_first_word(), letter_display()).unwrap());

    let file = r.export().await.unwrap();
    assert_eq!(file.file_name, "memo_redacted.pdf");
    assert_eq!(file.media_type, "application/pdf");

    let out = lopdf::Document::load_mem(&file.bytes).unwrap();
    let pages = page_contents(&out);
    assert!(!contains(&pages[0], b"Secret"));
    assert!(contains(&pages[1], b"Public"));
    assert!(!contains(&file.bytes, b"Secret"));
}

#[tokio::test]
async fn password_flow_with_retry() {
    let mut r = Redactor::default();
    let source = SourceFile::new("locked.pdf", encrypted_pdf("hunter2", &["Hello"]));
    assert_eq!(r.load(source).await.unwrap(), LoadStatus::PasswordRequired);
    assert_eq!(
        r.session().state(),
        SessionState::PasswordRequired { retry: false }
    );
    assert_eq!(r.session().encryption(), Encryption::Locked);

    let wrong = r.submit_password(Password::new("guess"), true).await;
    assert_eq!(wrong, Err(RedactError::DecryptionFailed));
    assert_eq!(
        r.session().state(),
        SessionState::PasswordRequired { retry: true }
    );

    let ok = r
        .submit_password(Password::new("hunter2"), true)
        .await
        .unwrap();
    assert_eq!(ok, LoadStatus::Ready { page_count: 1 });
    assert_eq!(r.session().encryption(), Encryption::Unlockable);
    assert!(r.session().has_password());
}

#[tokio::test]
async fn decrypted_export_needs_no_password() {
    let mut r = Redactor::default();
    r.load(SourceFile::new("locked.pdf", encrypted_pdf("pw", &["Hello World"])))
        .await
        .unwrap();
    r.submit_password(Password::new("pw"), true).await.unwrap();
    r.add_redaction_from_drag(over_first_word(), letter_display())
        .unwrap();

    let file = r.export().await.unwrap();
    let out = LopdfBackend::open(&file.bytes, None).unwrap();
    let content = page_contents(out.inner()).remove(0);
    assert!(!contains(&content, b"Hello"));
    assert!(contains(&content, b"World"));
}

#[tokio::test]
async fn kept_encryption_reopens_with_same_password() {
    let mut r = Redactor::default();
    r.load(SourceFile::new("locked.pdf", encrypted_pdf("pw", &["Hello World"])))
        .await
        .unwrap();
    r.submit_password(Password::new("pw"), false).await.unwrap();
    r.add_redaction_from_drag(over_first_word(), letter_display())
        .unwrap();

    let file = r.export().await.unwrap();
    assert!(LopdfBackend::open(&file.bytes, None).is_err());
    let reopened = LopdfBackend::open(&file.bytes, Some(&Password::new("pw"))).unwrap();
    let content = page_contents(reopened.inner()).remove(0);
    assert!(!contains(&content, b"Hello"));
    assert!(contains(&content, b"World"));
}

#[tokio::test]
async fn aes_password_flow_with_retry() {
    let mut r = Redactor::default();
    let source = SourceFile::new("locked.pdf", aes_encrypted_pdf("hunter2", &["One", "Two"]));
    assert_eq!(r.load(source).await.unwrap(), LoadStatus::PasswordRequired);

    let wrong = r.submit_password(Password::new("guess"), true).await;
    assert_eq!(wrong, Err(RedactError::DecryptionFailed));
    assert_eq!(
        r.session().state(),
        SessionState::PasswordRequired { retry: true }
    );

    let ok = r
        .submit_password(Password::new("hunter2"), true)
        .await
        .unwrap();
    assert_eq!(ok, LoadStatus::Ready { page_count: 2 });
    assert_eq!(r.session().encryption(), Encryption::Unlockable);
}

#[tokio::test]
async fn aes_decrypted_export_needs_no_password() {
    let mut r = Redactor::default();
    r.load(SourceFile::new("locked.pdf", aes_encrypted_pdf("pw", &["Hello World"])))
        .await
        .unwrap();
    r.submit_password(Password::new("pw"), true).await.unwrap();
    r.add_redaction_from_drag(over_first_word(), letter_display())
        .unwrap();

    let file = r.export().await.unwrap();
    let out = LopdfBackend::open(&file.bytes, None).unwrap();
    assert!(!LopdfBackend::is_encrypted(&out));
    let content = page_contents(out.inner()).remove(0);
    assert!(!contains(&content, b"Hello"));
    assert!(contains(&content, b"World"));
}

#[tokio::test]
async fn aes_kept_encryption_reopens_with_same_password() {
    let mut r = Redactor::default();
    r.load(SourceFile::new("locked.pdf", aes_encrypted_pdf("pw", &["Hello World"])))
        .await
        .unwrap();
    r.submit_password(Password::new("pw"), false).await.unwrap();
    r.add_redaction_from_drag(over_first_word(), letter_display())
        .unwrap();

    let file = r.export().await.unwrap();
    assert!(matches!(
        LopdfBackend::open(&file.bytes, None),
        Err(BackendError::PasswordRequired)
    ));
    assert!(LopdfBackend::open(&file.bytes, Some(&Password::new("nope"))).is_err());
    let reopened = LopdfBackend::open(&file.bytes, Some(&Password::new("pw"))).unwrap();
    assert_eq!(reopened.encryption_version(), Some(4));
    let content = page_contents(reopened.inner()).remove(0);
    assert!(!contains(&content, b"Hello"));
    assert!(contains(&content, b"World"));
}

#[tokio::test]
async fn cancel_password_discards_document() {
    let mut r = Redactor::default();
    r.load(SourceFile::new("locked.pdf", encrypted_pdf("pw", &["x"])))
        .await
        .unwrap();
    r.cancel_password().unwrap();
    assert_eq!(r.session().state(), SessionState::Empty);
    assert!(r.session().source().is_none());
}

#[tokio::test]
async fn clear_supersedes_in_flight_unlock() {
    let mut r = Redactor::default();
    r.load(SourceFile::new("locked.pdf", encrypted_pdf("pw", &["x"])))
        .await
        .unwrap();
    let ticket = r.begin_unlock(Password::new("pw"), true).unwrap();
    r.clear();
    let done = ticket.run().await;
    assert_eq!(r.finish_unlock(done), Err(RedactError::Superseded));
    assert_eq!(r.session().state(), SessionState::Empty);
}

#[tokio::test]
async fn navigation_keeps_redactions_per_page() {
    let mut r = Redactor::default();
    r.load(SourceFile::new("two.pdf", pdf(&["One", "Two"])))
        .await
        .unwrap();
    assert!(r.go_to_page(2).unwrap());
    assert!(!r.go_to_page(2).unwrap());
    assert!(!r.go_to_page(3).unwrap());
    r.add_redaction_from_drag(over_first_word(), letter_display())
        .unwrap();
    assert!(r.go_to_page(1).unwrap());
    assert!(r.undo_last().unwrap().is_none());
    assert_eq!(r.session().redactions().count_on_page(1), 1);

    let file = r.export().await.unwrap();
    let pages = page_contents(&lopdf::Document::load_mem(&file.bytes).unwrap());
    assert!(contains(&pages[0], b"One"));
    assert!(!contains(&pages[1], b"Two"));
}

#[tokio::test]
async fn gif_exports_as_jpeg_under_original_extension() {
    let img = image::RgbaImage::from_pixel(20, 20, image::Rgba([255, 255, 255, 255]));
    let mut gif = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut gif), image::ImageFormat::Gif)
        .unwrap();
    let mut r = Redactor::default();
    r.load(SourceFile::new("anim.gif", gif)).await.unwrap();
    let file = r.export().await.unwrap();
    assert_eq!(file.file_name, "anim_redacted.gif");
    assert_eq!(file.media_type, "image/jpeg");
    assert_eq!(
        image::guess_format(&file.bytes).unwrap(),
        image::ImageFormat::Jpeg
    );
}

#[tokio::test]
async fn png_named_jpeg_data_exports_as_png() {
    let mut r = Redactor::default();
    r.load(SourceFile::new("scan.png", jpeg(24, 24))).await.unwrap();
    assert!(
        r.add_redaction_from_drag(Rect::new(2.0, 2.0, 10.0, 10.0), Size::new(24.0, 24.0))
            .unwrap()
    );
    let file = r.export().await.unwrap();
    assert_eq!(file.file_name, "scan_redacted.png");
    assert_eq!(file.media_type, "image/png");
    assert_eq!(
        image::guess_format(&file.bytes).unwrap(),
        image::ImageFormat::Png
    );
    let img = image::load_from_memory(&file.bytes).unwrap().to_rgb8();
    assert_eq!(img.get_pixel(6, 6).0, [0, 0, 0]);
}

#[test]
fn image_burn_ignores_pages_past_the_first() {
    let source = png(30, 30, [255, 255, 255]);
    let mut store = RedactionStore::new();
    store.add(1, Rect::new(0.0, 0.0, 30.0, 30.0), 30, 30);
    let redactions: Vec<_> = store.iter().copied().collect();
    let out = RedactionApplier::burn(
        &source,
        &redactions,
        DocumentKind::Image(ImageFormat::Png),
        None,
        true,
        &RedactOptions::default(),
    )
    .unwrap();
    let img = image::load_from_memory(&out).unwrap().to_rgb8();
    assert!(img.pixels().all(|p| p.0 == [255, 255, 255]));
}

#[test]
fn empty_and_non_empty_burns_differ() {
    let source = png(30, 30, [200, 200, 200]);
    let kind = DocumentKind::Image(ImageFormat::Png);
    let options = RedactOptions::default();

    let empty = RedactionApplier::burn(&source, &[], kind, None, true, &options).unwrap();
    let empty = image::load_from_memory(&empty).unwrap().to_rgb8();
    assert!(empty.pixels().all(|p| p.0 == [200, 200, 200]));

    let mut store = RedactionStore::new();
    store.add(0, Rect::new(5.0, 5.0, 10.0, 10.0), 30, 30);
    let redactions: Vec<_> = store.iter().copied().collect();
    let burned = RedactionApplier::burn(&source, &redactions, kind, None, true, &options).unwrap();
    let burned = image::load_from_memory(&burned).unwrap().to_rgb8();
    for (x, y, p) in burned.enumerate_pixels() {
        let inside = (5..15).contains(&x) && (5..15).contains(&y);
        let expected = if inside { [0, 0, 0] } else { [200, 200, 200] };
        assert_eq!(p.0, expected, "pixel ({x}, {y})");
    }
}
