mod common;

use glam::{DVec2, Mat4};
use planet_gl::camera::PITCH_LIMIT;
use planet_gl::pipeline::{ATMOSPHERE_PASS, PRESENT_PASS, SPACE_PASS};
use planet_gl::uniforms::ObjectUniform;
use planet_gl::{
    AppOptions, Application, DrawCmd, HeadlessBackend, KeyAction, KeyCode, MouseButton, Overlay,
    Program, SceneKind, SliderId, Target, TextureSource,
};
use tempfile::TempDir;

fn launch(width: u32, height: u32) -> (TempDir, Application<HeadlessBackend>) {
    let dir = common::asset_dir();
    let mut options = AppOptions::new(dir.path());
    options.width = width;
    options.height = height;
    let app = Application::new(HeadlessBackend::new(width, height), options)
        .expect("application builds from fixture assets");
    (dir, app)
}

fn press(app: &mut Application<HeadlessBackend>, key: char) {
    app.on_key(KeyCode::character(key), KeyAction::Press);
    app.on_key(KeyCode::character(key), KeyAction::Release);
}

#[test]
fn scenes_hold_declared_objects_and_lights() {
    let (_dir, app) = launch(640, 360);
    let scenes = app.scenes();
    assert_eq!(scenes.objects(SceneKind::Space).len(), 2);
    assert_eq!(scenes.objects(SceneKind::Room).len(), 12);
    assert_eq!(scenes.light_count(SceneKind::Space), 1);
    assert_eq!(scenes.light_count(SceneKind::Room), 2);

    let summary = app.summary();
    assert!(summary.contains("Space scene: 2 objects (1 light)"));
    assert!(summary.contains("Room scene: 12 objects (2 lights)"));
}

#[test]
fn every_frame_renders_space_then_scattering() {
    let (_dir, mut app) = launch(640, 360);
    for _ in 0..2 {
        app.render().unwrap();
        let frame = app.gpu().last_frame().unwrap();
        let labels: Vec<_> = frame.passes.iter().map(|pass| pass.label).collect();
        assert_eq!(labels, [SPACE_PASS, ATMOSPHERE_PASS, PRESENT_PASS]);
        press(&mut app, 't');
    }
    assert_eq!(app.gpu().frames_submitted(), 2);
}

#[test]
fn room_screen_samples_scattering_output() {
    let (_dir, mut app) = launch(640, 360);
    let screen_texture = app.scenes().room.screen.texture();
    press(&mut app, 't');
    assert_eq!(app.state().active, SceneKind::Room);

    for _ in 0..3 {
        app.update(16.0);
        app.render().unwrap();
    }

    let screen_fb = app.pipeline().screen_framebuffer().handle();
    let frame = app.gpu().last_frame().unwrap();
    let atmosphere = frame.pass(ATMOSPHERE_PASS).unwrap();
    assert_eq!(atmosphere.target, Target::Offscreen(screen_fb));

    let present = frame.pass(PRESENT_PASS).unwrap();
    assert_eq!(present.target, Target::Surface);
    assert_eq!(present.program, Program::Lit);
    let fed = present
        .draws
        .iter()
        .filter(|draw| {
            matches!(
                draw,
                DrawCmd::Object { texture: Some(TextureSource::RenderTarget(handle)), .. }
                    if *handle == screen_fb
            )
        })
        .count();
    assert_eq!(fed, 1);

    // The object's own texture stays put; the feed is chosen per frame.
    assert_eq!(app.scenes().room.screen.texture(), screen_texture);
}

#[test]
fn resize_round_trip_keeps_resource_counts() {
    let (_dir, mut app) = launch(640, 360);
    let buffers = app.gpu().live_buffers();
    let textures = app.gpu().live_textures();

    app.resize(1920, 1080).unwrap();
    app.resize(640, 360).unwrap();

    let targets = app.gpu().live_render_targets();
    assert_eq!(targets.len(), 2);
    assert!(targets.iter().all(|(_, desc)| (desc.width, desc.height) == (640, 360)));
    assert_eq!(app.gpu().live_buffers(), buffers);
    assert_eq!(app.gpu().live_textures(), textures);
    assert_eq!(app.gpu().surface_size(), (640, 360));
    app.render().unwrap();
}

#[test]
fn resize_updates_both_camera_aspects() {
    let (_dir, mut app) = launch(640, 360);
    app.resize(1000, 500).unwrap();
    assert_eq!(app.scenes().camera(SceneKind::Space).aspect, 2.0);
    assert_eq!(app.scenes().camera(SceneKind::Room).aspect, 2.0);
}

#[test]
fn toggling_twice_is_a_no_op() {
    let (_dir, mut app) = launch(640, 360);
    let before = app.state().clone();
    press(&mut app, 't');
    press(&mut app, 't');
    assert_eq!(app.state(), &before);

    app.render().unwrap();
    let present = app.gpu().last_frame().unwrap().pass(PRESENT_PASS).unwrap();
    assert_eq!(present.program, Program::Screen);
}

#[test]
fn earth_spin_accumulates_over_ticks() {
    let (_dir, mut app) = launch(640, 360);
    for _ in 0..4 {
        app.update(250.0);
    }
    let space = &app.scenes().space;
    // 0.036 degrees per millisecond
    assert!((space.earth_spin() - 36f32.to_radians()).abs() < 1e-4);

    let expected = space.earth_base() * Mat4::from_rotation_y(space.earth_spin());
    let record: ObjectUniform = app.gpu().read_buffer(space.earth.buffer()).unwrap();
    let uploaded = Mat4::from_cols_array_2d(&record.model);
    assert!(uploaded.abs_diff_eq(expected, 1e-5));
}

#[test]
fn pitch_never_leaves_limits() {
    let (_dir, mut app) = launch(640, 360);
    app.on_mouse_button(MouseButton::LEFT, true);
    let mut y = 0.0;
    for step in [0.0, -5.0e4, 1.0e7, -3.0e3, 2.5e2, -1.0e9] {
        y += step;
        app.on_cursor_moved(DVec2::new(100.0, y));
        let pitch = app.active_camera().look.pitch;
        assert!(pitch.abs() <= PITCH_LIMIT, "pitch {pitch}");
        assert!(app.active_camera().front.is_finite());
    }
}

#[test]
fn overlay_sliders_drive_the_atmosphere() {
    let (_dir, mut app) = launch(640, 360);
    assert!(matches!(app.overlay(), Overlay::Hint(_)));
    press(&mut app, 'm');
    assert_eq!(app.set_atmosphere(SliderId::ScatteringStrength, 100.0), Some(40.0));
    let Overlay::Atmosphere(sliders) = app.overlay() else {
        panic!("menu should show the atmosphere panel");
    };
    let strength = sliders
        .iter()
        .find(|slider| slider.id == SliderId::ScatteringStrength)
        .unwrap();
    assert_eq!(strength.value, 40.0);
    assert_eq!(app.scenes().space.atmosphere.scattering_strength, 40.0);
}

#[test]
fn sliders_refused_while_room_is_active() {
    let (_dir, mut app) = launch(640, 360);
    press(&mut app, 'm');
    press(&mut app, 't');
    assert_eq!(app.state().active, SceneKind::Room);
    let before = app.scenes().space.atmosphere.clone();
    assert_eq!(app.set_atmosphere(SliderId::ScatteringStrength, 5.0), None);
    assert_eq!(app.set_atmosphere(SliderId::DensityFalloff, 9.0), None);
    assert_eq!(app.scenes().space.atmosphere, before);
}

#[test]
fn look_resumes_without_jump_after_scene_round_trip() {
    let (_dir, mut app) = launch(640, 360);
    app.on_mouse_button(MouseButton::LEFT, true);
    app.on_cursor_moved(DVec2::new(0.0, 0.0));
    app.on_cursor_moved(DVec2::new(10.0, 0.0));
    app.on_mouse_button(MouseButton::LEFT, false);
    let yaw = app.active_camera().look.yaw;
    assert!(yaw > -90.0);

    press(&mut app, 't');
    app.on_cursor_moved(DVec2::new(800.0, 400.0));
    press(&mut app, 't');
    app.on_mouse_button(MouseButton::LEFT, true);
    app.on_cursor_moved(DVec2::new(800.0, 400.0));
    assert_eq!(app.active_camera().look.yaw, yaw);
    assert_eq!(app.active_camera().look.pitch, 0.0);
}

#[test]
fn shutdown_releases_everything() {
    let (_dir, mut app) = launch(640, 360);
    press(&mut app, 't');
    app.update(16.0);
    app.render().unwrap();
    app.resize(800, 600).unwrap();
    let gpu = app.shutdown();
    assert_eq!(gpu.live_buffers(), 0);
    assert_eq!(gpu.live_textures(), 0);
    assert_eq!(gpu.live_meshes(), 0);
    assert!(gpu.live_render_targets().is_empty());
}
