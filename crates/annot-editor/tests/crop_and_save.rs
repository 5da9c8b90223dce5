//! Integration tests: image crop and persistence (annot-editor).

use annot_core::document::{CanvasDocument, PersistedContent};
use annot_core::id::ObjectId;
use annot_core::model::{ObjectKind, Scene, SceneObject};
use annot_editor::persist::{EXPORT_FILENAME, EXPORT_MIME};
use annot_editor::{
    Clipboard, ContentSink, EditorConfig, EditorError, EditorSession, ImageLoader, IssueSink,
    IssueStore, MemoryLoader, Modifiers, PointerButton, SaveOutcome, SavePlan, ServiceError,
    UploadResult, UploadService,
};
use annot_render::{DecodedImage, RenderError};
use image::{Rgba, RgbaImage};
use kurbo::{Point, Rect, Size, Vec2};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

fn session() -> EditorSession {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut s = EditorSession::new(Size::new(1200.0, 800.0), EditorConfig::default())
        .with_clipboard(Clipboard::new());
    s.pump(Duration::ZERO);
    s
}

fn settle(s: &mut EditorSession, at_ms: u64) {
    s.pump(Duration::from_millis(at_ms));
    s.pump(Duration::from_millis(at_ms + 500));
}

fn photo(w: u32, h: u32) -> String {
    let img = RgbaImage::from_fn(w, h, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    });
    annot_render::pixels::png_data_uri(&img).unwrap()
}

fn drag_scene(s: &mut EditorSession, from: Point, to: Point) {
    let vt = *s.viewport();
    let a = vt.scene_to_screen(from);
    let b = vt.scene_to_screen(to);
    s.pointer_down(a.x, a.y, PointerButton::Primary, Modifiers::NONE);
    s.pointer_move(b.x, b.y, Modifiers::NONE);
    s.pointer_up(b.x, b.y, Modifiers::NONE);
}

/// Session holding one inserted 400x200 photo, selected.
fn session_with_photo() -> (EditorSession, ObjectId) {
    let mut s = session();
    s.insert_image(photo(400, 200));
    settle(&mut s, 0);
    let id = s.scene().objects[0].id;
    assert_eq!(s.selection(), &[id]);
    (s, id)
}

// ─── Crop ───────────────────────────────────────────────────────────────

#[test]
fn crop_rect_starts_centered_inside_image() {
    let (mut s, image) = session_with_photo();
    s.start_crop().unwrap();
    let crop = s.crop().unwrap();
    let bounds = crop.image_bounds();
    let rect = crop.crop_rect(s.scene()).unwrap();

    assert!((rect.width() - bounds.width() * 0.8).abs() < 1e-6);
    assert!((rect.center() - bounds.center()).hypot() < 1e-6);
    assert_eq!(s.selection(), &[crop.rect_id()]);
    assert!(!s.scene().get(image).unwrap().evented);
    assert!(s.is_editing());
}

#[test]
fn crop_rect_cannot_leave_image() {
    let (mut s, _) = session_with_photo();
    s.start_crop().unwrap();
    let rect = s.crop().unwrap().crop_rect(s.scene()).unwrap();
    let bounds = s.crop().unwrap().image_bounds();

    drag_scene(&mut s, rect.center(), rect.center() + kurbo::Vec2::new(5000.0, -5000.0));

    let moved = s.crop().unwrap().crop_rect(s.scene()).unwrap();
    assert!(moved.x0 >= bounds.x0 - 1e-6 && moved.x1 <= bounds.x1 + 1e-6);
    assert!(moved.y0 >= bounds.y0 - 1e-6 && moved.y1 <= bounds.y1 + 1e-6);
    assert!((moved.width() - rect.width()).abs() < 1e-6);
}

#[test]
fn crop_rect_keeps_minimum_size() {
    let (mut s, _) = session_with_photo();
    s.start_crop().unwrap();
    let rect = s.crop().unwrap().crop_rect(s.scene()).unwrap();

    // Drag the bottom-right handle almost onto the top-left corner
    drag_scene(
        &mut s,
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0 + 2.0, rect.y0 + 2.0),
    );

    let shrunk = s.crop().unwrap().crop_rect(s.scene()).unwrap();
    assert!(shrunk.width() >= 20.0 - 1e-6);
    assert!(shrunk.height() >= 20.0 - 1e-6);
}

/// Load one image at a fractional position and scale, then select it.
fn session_with_placed_image(w: u32, h: u32, left: f64, top: f64, scale: f64) -> EditorSession {
    let mut scene = Scene::new();
    let mut image = SceneObject::fresh(ObjectKind::Image {
        src: photo(w, h),
        natural_width: w,
        natural_height: h,
    })
    .at(left, top);
    image.transform.scale_x = scale;
    image.transform.scale_y = scale * 0.93;
    scene.add(image);

    let mut s = session();
    s.load_content(PersistedContent::Document(CanvasDocument::from_scene(&scene)));
    settle(&mut s, 0);
    let center = s.scene().objects[0].bounding_rect().center();
    drag_scene(&mut s, center, center);
    assert_eq!(s.selection().len(), 1);
    s
}

fn assert_inside(rect: Rect, bounds: Rect) {
    let eps = 1e-6;
    assert!(
        rect.x0 >= bounds.x0 - eps
            && rect.x1 <= bounds.x1 + eps
            && rect.y0 >= bounds.y0 - eps
            && rect.y1 <= bounds.y1 + eps,
        "{rect:?} escaped {bounds:?}"
    );
}

#[test]
fn crop_rect_stays_inside_after_any_gesture() {
    let placements = [
        (40, 40, 2400.001, 2400.37, 1.0),
        (40, 40, 2511.2866638113579, 2433.9, 1.37),
        (64, 48, 2686.2866638113579, 2500.123, 0.71),
        (400, 200, 2399.5, 2301.25, 2.25),
        (300, 300, 2576.8827842236487, 2450.0001, 0.333),
    ];
    let moves = [
        Vec2::new(13.7, -4.2),
        Vec2::new(-250.3, 77.1),
        Vec2::new(0.01, 999.9),
        Vec2::new(-0.5, -0.5),
        Vec2::new(4000.25, 3.3),
    ];
    for (w, h, left, top, scale) in placements {
        let mut s = session_with_placed_image(w, h, left, top, scale);
        s.start_crop().unwrap();
        let bounds = s.crop().unwrap().image_bounds();
        assert_inside(s.crop().unwrap().crop_rect(s.scene()).unwrap(), bounds);

        for delta in moves {
            let rect = s.crop().unwrap().crop_rect(s.scene()).unwrap();
            drag_scene(&mut s, rect.center(), rect.center() + delta);
            assert_inside(s.crop().unwrap().crop_rect(s.scene()).unwrap(), bounds);

            // Scale from the bottom-right handle.
            let rect = s.crop().unwrap().crop_rect(s.scene()).unwrap();
            let corner = Point::new(rect.x1, rect.y1);
            drag_scene(&mut s, corner, corner + delta * 0.5);
            let scaled = s.crop().unwrap().crop_rect(s.scene()).unwrap();
            assert_inside(scaled, bounds);
            let floor = 20.0_f64.min(bounds.width()).min(bounds.height());
            assert!(scaled.width() >= floor - 1e-6 && scaled.height() >= floor - 1e-6);
        }
        assert!(s.apply_crop().is_ok());
    }
}

#[test]
fn apply_crop_replaces_image() {
    let (mut s, image) = session_with_photo();
    let bounds = s.scene().get(image).unwrap().bounding_rect();
    s.start_crop().unwrap();
    let rect = s.crop().unwrap().crop_rect(s.scene()).unwrap();

    let cropped = s.apply_crop().unwrap();
    assert_ne!(cropped, image);
    assert!(!s.is_cropping());
    assert!(!s.is_editing());
    assert_eq!(s.scene().len(), 1);
    assert_eq!(s.selection(), &[cropped]);

    let obj = s.scene().get(cropped).unwrap();
    assert!(obj.selectable && obj.evented);
    let placed = obj.bounding_rect();
    assert!((placed.width() - rect.width()).abs() < 1e-6);
    assert!((placed.origin() - rect.origin()).hypot() < 1e-6);
    match obj.kind {
        // 80% of the 400 px source
        ObjectKind::Image { natural_width, .. } => assert!((319..=320).contains(&natural_width)),
        _ => panic!("expected Image"),
    }

    // The crop is one undoable step
    settle(&mut s, 1000);
    assert!(s.undo());
    settle(&mut s, 2000);
    assert_eq!(s.scene().len(), 1);
    assert_eq!(s.scene().objects[0].bounding_rect(), bounds);
}

#[test]
fn cancel_crop_restores_selection() {
    let (mut s, image) = session_with_photo();
    let before = s.scene().clone();
    s.start_crop().unwrap();
    s.cancel_crop().unwrap();
    assert_eq!(s.scene(), &before);
    assert_eq!(s.selection(), &[image]);
    assert!(matches!(s.apply_crop(), Err(EditorError::CropInactive)));
}

#[test]
fn crop_requires_one_image() {
    let mut s = session();
    assert!(matches!(s.start_crop(), Err(EditorError::NoSelection)));

    s.set_tool(annot_editor::ToolKind::Rect);
    drag_scene(&mut s, Point::new(0.0, 0.0), Point::new(50.0, 50.0));
    assert!(matches!(s.start_crop(), Err(EditorError::NotAnImage)));
    assert!(!s.is_cropping());
}

#[test]
fn undo_during_crop_cancels_it() {
    let (mut s, _) = session_with_photo();
    s.start_crop().unwrap();
    s.undo();
    assert!(!s.is_cropping());
    settle(&mut s, 1000);
    assert!(s.scene().iter().all(|o| o.evented && !o.exclude_from_export));
}

// ─── Save ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingUpload {
    calls: RefCell<Vec<(usize, String, String)>>,
    fail: bool,
}

impl UploadService for RecordingUpload {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        mime: &str,
        filename: &str,
    ) -> Result<UploadResult, ServiceError> {
        if self.fail {
            return Err(ServiceError("storage unavailable".into()));
        }
        self.calls
            .borrow_mut()
            .push((bytes.len(), mime.to_string(), filename.to_string()));
        Ok(UploadResult {
            url: "https://files.example/canvas-export.png".into(),
            key: "uploads/canvas-export.png".into(),
            mime: mime.to_string(),
            size: bytes.len(),
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    saved: RefCell<Vec<PersistedContent>>,
}

impl ContentSink for RecordingSink {
    async fn save(&self, content: PersistedContent) -> Result<(), ServiceError> {
        self.saved.borrow_mut().push(content);
        Ok(())
    }
}

#[derive(Default)]
struct MemoryIssues {
    issues: RefCell<HashMap<String, PersistedContent>>,
}

impl IssueStore for MemoryIssues {
    async fn save(&self, issue_id: &str, content: PersistedContent) -> Result<(), ServiceError> {
        self.issues
            .borrow_mut()
            .insert(issue_id.to_string(), content);
        Ok(())
    }

    async fn load(&self, issue_id: &str) -> Result<Option<PersistedContent>, ServiceError> {
        Ok(self.issues.borrow().get(issue_id).cloned())
    }
}

/// A scene whose structural JSON is well over the 900 KB limit while its
/// content stays small on screen.
fn crowded_document() -> PersistedContent {
    let mut scene = Scene::new();
    for i in 0..6000 {
        let x = f64::from(i % 60) * 4.0;
        let y = f64::from(i / 60) * 4.0;
        scene.add(
            SceneObject::fresh(ObjectKind::Rect {
                width: 3.0,
                height: 3.0,
            })
            .at(2400.0 + x, 2400.0 + y),
        );
    }
    PersistedContent::Document(CanvasDocument::from_scene(&scene))
}

#[tokio::test]
async fn small_scene_saves_structurally() {
    let mut s = session();
    s.set_tool(annot_editor::ToolKind::Circle);
    drag_scene(&mut s, Point::new(10.0, 10.0), Point::new(60.0, 60.0));
    let upload = RecordingUpload::default();
    let sink = RecordingSink::default();

    let outcome = s.save(&upload, &sink).await.unwrap();
    assert!(matches!(outcome, SaveOutcome::Structural { bytes } if bytes <= 921_600));
    assert!(upload.calls.borrow().is_empty());
    match &sink.saved.borrow()[0] {
        PersistedContent::Document(doc) => {
            assert_eq!(doc.objects.len(), 1);
            assert_eq!(doc.viewport_transform.as_ref(), Some(s.viewport()));
        }
        other => panic!("expected Document, got {other:?}"),
    }
}

#[tokio::test]
async fn oversized_scene_is_rasterized_and_uploaded() {
    let mut s = session();
    s.load_content(crowded_document());
    s.pump(Duration::from_millis(10));
    assert_eq!(s.scene().len(), 6000);

    let upload = RecordingUpload::default();
    let sink = RecordingSink::default();
    let outcome = s.save(&upload, &sink).await.unwrap();

    match outcome {
        SaveOutcome::Rasterized { upload: result } => {
            assert_eq!(result.url, "https://files.example/canvas-export.png");
        }
        other => panic!("expected Rasterized, got {other:?}"),
    }
    let calls = upload.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, EXPORT_MIME);
    assert_eq!(calls[0].2, EXPORT_FILENAME);
    assert_eq!(
        sink.saved.borrow()[0],
        PersistedContent::ImageRef {
            image_url: "https://files.example/canvas-export.png".into()
        }
    );
    // The canvas itself is untouched by a raster save
    assert_eq!(s.scene().len(), 6000);
}

#[tokio::test]
async fn failed_upload_leaves_description_alone() {
    let mut s = session();
    s.load_content(crowded_document());
    s.pump(Duration::from_millis(10));
    let before = s.scene().clone();

    let upload = RecordingUpload {
        fail: true,
        ..RecordingUpload::default()
    };
    let sink = RecordingSink::default();
    let err = s.save(&upload, &sink).await.unwrap_err();
    assert!(matches!(err, EditorError::Upload(_)));
    assert!(sink.saved.borrow().is_empty());
    assert_eq!(s.scene(), &before);
}

#[tokio::test]
async fn saved_issue_loads_back() {
    let issues = MemoryIssues::default();
    let mut s = session();
    s.set_tool(annot_editor::ToolKind::Rect);
    drag_scene(&mut s, Point::new(100.0, 100.0), Point::new(180.0, 140.0));
    s.save(&RecordingUpload::default(), &IssueSink::new(&issues, "ISSUE-7"))
        .await
        .unwrap();

    let stored = issues.load("ISSUE-7").await.unwrap().unwrap();
    let mut reopened = session();
    reopened.load_content(stored);
    reopened.pump(Duration::from_millis(10));
    assert_eq!(reopened.scene().objects, s.scene().objects);
    assert_eq!(reopened.viewport(), s.viewport());
    assert_eq!(reopened.history().len(), 1);
    assert!(!reopened.history().can_undo());
}

#[test]
fn image_reference_loads_centered_and_capped() {
    let mut s = session();
    let json = format!(
        r#"{{"canvas": null, "imageUrl": "{}", "isImage": true}}"#,
        photo(1000, 500)
    );
    s.load_json(&json).unwrap();
    s.pump(Duration::from_millis(10));

    assert_eq!(s.scene().len(), 1);
    let placed = s.scene().objects[0].bounding_rect();
    assert!((placed.width() - 800.0).abs() < 1e-6);
    assert!((placed.height() - 400.0).abs() < 1e-6);
    assert!((placed.center() - s.canvas().center()).hypot() < 1e-6);
    assert!(!s.history().can_undo());
}

/// Image bytes the test hands over after the session asked for them.
#[derive(Clone, Default)]
struct HostImages(Rc<RefCell<MemoryLoader>>);

impl ImageLoader for HostImages {
    fn load(&mut self, src: &str) -> Result<DecodedImage, RenderError> {
        self.0.borrow_mut().load(src)
    }
}

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    annot_render::pixels::encode_png(&RgbaImage::from_pixel(w, h, Rgba([20, 40, 60, 255]))).unwrap()
}

fn session_with_host_images() -> (EditorSession, HostImages) {
    let images = HostImages::default();
    let s = EditorSession::new(Size::new(1200.0, 800.0), EditorConfig::default())
        .with_clipboard(Clipboard::new())
        .with_loader(Box::new(images.clone()));
    (s, images)
}

#[test]
fn late_image_bytes_are_still_placed() {
    let url = "https://cdn.example/uploads/shot.png";
    let (mut s, images) = session_with_host_images();
    s.load_content(PersistedContent::ImageRef {
        image_url: url.into(),
    });
    s.pump(Duration::from_millis(0));
    s.pump(Duration::from_millis(16));

    assert_eq!(s.pending_image_sources(), vec![url.to_string()]);
    assert!(s.scene().is_empty());
    assert!(s.history().is_empty());
    assert!(s.take_notices().is_empty());
    assert!(matches!(s.plan_save(), Err(EditorError::ImagePending(_))));

    images.0.borrow_mut().provide(url, png_bytes(1000, 500));
    settle(&mut s, 2000);

    assert!(s.pending_image_sources().is_empty());
    assert_eq!(s.scene().len(), 1);
    let placed = s.scene().objects[0].bounding_rect();
    assert!((placed.width() - 800.0).abs() < 1e-6);
    assert_eq!(s.history().len(), 1);
    match s.plan_save().unwrap() {
        SavePlan::Structural {
            content: PersistedContent::Document(doc),
            ..
        } => assert_eq!(doc.objects.len(), 1),
        other => panic!("expected a structural save, got {other:?}"),
    }
}

#[test]
fn reported_fetch_failure_ends_the_wait() {
    let url = "https://cdn.example/uploads/missing.png";
    let (mut s, images) = session_with_host_images();
    s.load_content(PersistedContent::ImageRef {
        image_url: url.into(),
    });
    s.pump(Duration::from_millis(0));
    assert!(s.history().is_empty());

    images.0.borrow_mut().fail(url, "404 Not Found");
    s.pump(Duration::from_millis(16));

    let notices = s.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("404"));
    assert!(s.pending_image_sources().is_empty());
    assert!(s.scene().is_empty());
    assert_eq!(s.history().len(), 1);
}

#[test]
fn undelivered_images_time_out() {
    let (mut s, _images) = session_with_host_images();
    s.load_content(PersistedContent::ImageRef {
        image_url: "https://cdn.example/never.png".into(),
    });
    s.pump(Duration::from_millis(0));
    s.pump(Duration::from_secs(29));
    assert!(s.take_notices().is_empty());

    s.pump(Duration::from_secs(31));
    assert_eq!(s.take_notices().len(), 1);
    assert!(s.is_settled());
    assert_eq!(s.history().len(), 1);
}

#[test]
fn unreadable_content_starts_empty() {
    let mut s = session();
    assert!(s.load_json("{not json").is_err());
    s.pump(Duration::from_millis(10));
    assert!(s.scene().is_empty());
}

#[test]
fn export_covers_content_only() {
    let mut s = session();
    assert!(matches!(s.export_png(), Err(EditorError::EmptyScene)));
    s.set_tool(annot_editor::ToolKind::Rect);
    drag_scene(&mut s, Point::new(100.0, 100.0), Point::new(164.0, 132.0));
    let png = s.export_png().unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    let expected = s.scene().objects[0].bounding_rect();
    assert_eq!(
        (decoded.width(), decoded.height()),
        (expected.width().ceil() as u32, expected.height().ceil() as u32)
    );
}

fn text_document() -> PersistedContent {
    let mut scene = Scene::new();
    scene.add(
        SceneObject::fresh(ObjectKind::Text {
            text: "WWW\nWWW".into(),
            font_family: "Arial".into(),
            font_size: 40.0,
        })
        .at(2400.0, 2400.0)
        .with_style(annot_core::model::ObjectStyle::filled(annot_core::Color::BLACK)),
    );
    PersistedContent::Document(CanvasDocument::from_scene(&scene))
}

fn ink(png: &[u8]) -> usize {
    let decoded = image::load_from_memory(png).unwrap().to_rgba8();
    decoded.pixels().filter(|p| p.0[0] < 128).count()
}

#[test]
fn exported_text_uses_provided_fonts() {
    let mut s = session();
    s.load_content(text_document());
    settle(&mut s, 0);
    assert_eq!(s.text_runs().len(), 1);
    assert_eq!(s.text_runs()[0].lines, vec!["WWW".to_string(), "WWW".to_string()]);

    // No face registered: the box exports blank.
    assert_eq!(ink(&s.export_png().unwrap()), 0);

    assert!(matches!(
        s.provide_font("Arial", vec![0; 16]),
        Err(EditorError::Render(RenderError::Font(_)))
    ));
    let fonts = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
    ];
    let Some(bytes) = fonts.iter().find_map(|path| std::fs::read(path).ok()) else {
        eprintln!("no system font installed; skipping");
        return;
    };
    s.provide_font("Arial", bytes).unwrap();
    assert!(ink(&s.export_png().unwrap()) > 100);
}
