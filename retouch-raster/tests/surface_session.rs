//! Pixel surface driven through an editor session.

use base64::Engine;
use retouch_core::{
    Color, EditorError, EditorSession, ImageUpload, PointerEvent, PointerPhase, RasterSurface,
    SessionConfig, Tool,
};
use retouch_raster::image::{encode_png, to_data_uri};
use retouch_raster::PixelSurface;

const WHITE: [u8; 4] = [255, 255, 255, 255];

fn red_png(width: u32, height: u32) -> Vec<u8> {
    let surface = PixelSurface::filled(width, height, Color::rgb(255, 0, 0));
    encode_png(surface.pixels()).unwrap()
}

fn session() -> EditorSession<PixelSurface> {
    EditorSession::new(PixelSurface::default(), SessionConfig::default())
}

fn drag(session: &mut EditorSession<PixelSurface>, from: (f32, f32), to: (f32, f32)) {
    session
        .pointer(PointerEvent::new(PointerPhase::Down, from.0, from.1))
        .unwrap();
    session
        .pointer(PointerEvent::new(PointerPhase::Move, to.0, to.1))
        .unwrap();
    session
        .pointer(PointerEvent::new(PointerPhase::Up, to.0, to.1))
        .unwrap();
}

#[test]
fn test_blank_canvas_stroke_and_undo() {
    let mut session = session();
    session.set_tool(Tool::Brush);
    session.set_color(Color::rgb(0, 0, 255));
    session.set_stroke_width(10.0);

    drag(&mut session, (100.0, 100.0), (200.0, 100.0));
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.surface().pixel(150, 100), Some([0, 0, 255, 255]));

    drag(&mut session, (100.0, 300.0), (200.0, 300.0));
    session.undo().unwrap();
    assert_eq!(session.surface().pixel(150, 300), Some(WHITE));
    assert_eq!(session.surface().pixel(150, 100), Some([0, 0, 255, 255]));

    session.redo().unwrap();
    assert_eq!(session.surface().pixel(150, 300), Some([0, 0, 255, 255]));
}

#[test]
fn test_upload_replaces_canvas() {
    let mut session = session();
    let upload = ImageUpload::new("red.png", "image/png", red_png(32, 16));
    session.load_image(&upload, None).unwrap();

    assert_eq!(session.dimensions(), (32, 16));
    assert_eq!(session.surface().pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(session.history().len(), 1);
}

#[test]
fn test_undecodable_upload_is_rejected() {
    let mut session = session();
    // Passes type checks but is not an image
    let upload = ImageUpload::new("fake.png", "image/png", b"not really a png".to_vec());
    let err = session.load_image(&upload, None).unwrap_err();
    assert!(matches!(err, EditorError::Surface(_)));
    assert!(session.history().is_empty());
    assert_eq!(session.dimensions(), (800, 600));
}

#[test]
fn test_eraser_after_load() {
    let mut session = session();
    session
        .load_image(&ImageUpload::new("red.png", "image/png", red_png(50, 50)), None)
        .unwrap();
    session.set_tool(Tool::Eraser);
    session.set_stroke_width(8.0);
    drag(&mut session, (10.0, 25.0), (40.0, 25.0));

    assert_eq!(session.surface().pixel(25, 25).map(|p| p[3]), Some(0));
    assert_eq!(session.surface().pixel(25, 5), Some([255, 0, 0, 255]));

    // Erased pixels survive the PNG snapshot
    session.undo().unwrap();
    session.redo().unwrap();
    assert_eq!(session.surface().pixel(25, 25).map(|p| p[3]), Some(0));
}

#[test]
fn test_snapshot_as_data_uri() {
    let mut session = session();
    session.set_tool(Tool::Brush);
    drag(&mut session, (1.0, 1.0), (5.0, 5.0));

    let snapshot = session.current_snapshot().unwrap();
    let uri = to_data_uri("image/png", snapshot.as_bytes());
    let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .unwrap();

    let mut restored = PixelSurface::blank(1, 1);
    restored.load_from(&bytes).unwrap();
    assert_eq!(&restored, session.surface());
}
