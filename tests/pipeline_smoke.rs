use quotereel::{
    Background, Canvas, FrameIndex, FrameRange, PreparedAssets, RenderSettings, RenderThreading,
    Storyboard, render_frame, render_frames,
};

fn solid_storyboard(rgba: [u8; 4]) -> Storyboard {
    let mut sb = Storyboard::portrait_default();
    sb.canvas = Canvas {
        width: 48,
        height: 48,
    };
    sb.duration = FrameIndex(8);
    sb.background = Background::Solid { rgba8: rgba };
    sb
}

#[test]
fn solid_background_renders_the_requested_color() {
    let sb = solid_storyboard([120, 40, 200, 255]);
    let assets = PreparedAssets::prepare(&sb, std::env::temp_dir()).unwrap();

    let frame = render_frame(&sb, FrameIndex(0), &assets, &RenderSettings::default()).unwrap();
    assert_eq!(frame.width, 48);
    assert_eq!(frame.height, 48);
    for px in frame.data.chunks_exact(4) {
        assert_eq!(px, &[120, 40, 200, 255]);
    }
}

#[test]
fn render_frames_matches_per_frame_rendering() {
    let sb = solid_storyboard([1, 2, 3, 255]);
    let assets = PreparedAssets::prepare(&sb, std::env::temp_dir()).unwrap();
    let range = FrameRange::new(FrameIndex(0), FrameIndex(8)).unwrap();

    let frames = render_frames(
        &sb,
        range,
        &assets,
        &RenderSettings::default(),
        &RenderThreading::default(),
    )
    .unwrap();
    assert_eq!(frames.len(), 8);

    let single = render_frame(&sb, FrameIndex(5), &assets, &RenderSettings::default()).unwrap();
    assert_eq!(frames[5].data, single.data);
}

#[test]
fn image_background_is_stretched_over_the_canvas() {
    let dir = std::env::temp_dir().join(format!("quotereel_bg_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
    let bg_path = dir.join("bg.png");
    img.save(&bg_path).unwrap();

    let mut sb = solid_storyboard([0, 0, 0, 255]);
    sb.background = Background::Image {
        source: "bg.png".to_string(),
    };

    let assets = PreparedAssets::prepare(&sb, &dir).unwrap();
    let frame = render_frame(&sb, FrameIndex(0), &assets, &RenderSettings::default()).unwrap();

    for px in frame.data.chunks_exact(4) {
        assert_eq!(px, &[255, 0, 0, 255]);
    }

    std::fs::remove_file(&bg_path).ok();
    std::fs::remove_dir(&dir).ok();
}

#[test]
fn missing_background_image_fails_at_prepare_time() {
    let mut sb = solid_storyboard([0, 0, 0, 255]);
    sb.background = Background::Image {
        source: "nope/missing.png".to_string(),
    };
    assert!(PreparedAssets::prepare(&sb, std::env::temp_dir()).is_err());
}

#[test]
fn absolute_background_paths_are_rejected() {
    let mut sb = solid_storyboard([0, 0, 0, 255]);
    sb.background = Background::Image {
        source: "/etc/passwd".to_string(),
    };
    assert!(PreparedAssets::prepare(&sb, std::env::temp_dir()).is_err());
}
