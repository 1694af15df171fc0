//! Multi-process protocol tests: a root and its satellites run as threads
//! connected by a [`LocalCluster`].
//!
//! Receives time out so a desynchronized protocol fails the test instead of
//! hanging it.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use paracompose::*;

const TIMEOUT: Duration = Duration::from_secs(10);

fn typed_surface(surface: MemorySurface) -> (Arc<Mutex<MemorySurface>>, SharedSurface) {
    let typed = Arc::new(Mutex::new(surface));
    let shared: SharedSurface = typed.clone();
    (typed, shared)
}

/// Runs a satellite's service loop on its own thread and hands back its
/// coordinator and surface once the root has released it.
fn spawn_satellite(
    channel: Arc<LocalChannel>,
    surface: MemorySurface,
) -> thread::JoinHandle<(RenderCoordinator, Arc<Mutex<MemorySurface>>)> {
    thread::spawn(move || {
        let (typed, shared) = typed_surface(surface);
        let mut coordinator = RenderCoordinator::new();
        coordinator.attach_surface(Some(shared)).unwrap();
        coordinator.attach_channel(Some(channel)).unwrap();
        coordinator.service_loop().unwrap();
        (coordinator, typed)
    })
}

fn root(
    channel: Arc<LocalChannel>,
    surface: MemorySurface,
) -> (RenderCoordinator, Arc<Mutex<MemorySurface>>) {
    let (typed, shared) = typed_surface(surface);
    let mut coordinator = RenderCoordinator::new();
    coordinator.attach_surface(Some(shared)).unwrap();
    coordinator.attach_channel(Some(channel)).unwrap();
    (coordinator, typed)
}

#[test]
fn test_end_to_end_reduced_cycle() {
    let channels = LocalCluster::new().with_timeout(TIMEOUT).build(3);
    let satellites: Vec<_> = channels[1..]
        .iter()
        .map(|channel| {
            let surface = MemorySurface::new(10, 10).with_viewport(Viewport::default());
            spawn_satellite(Arc::clone(channel), surface)
        })
        .collect();

    let mut viewport = Viewport::default().with_background(DVec3::new(0.0, 1.0, 0.0));
    viewport.camera.position = DVec3::new(1.0, 2.0, 3.0);
    viewport.camera.view_angle = 45.0;
    let (mut coordinator, root_surface) = root(
        Arc::clone(&channels[0]),
        MemorySurface::new(400, 300).with_viewport(viewport),
    );
    coordinator.set_image_reduction_factor(4);

    let rendered = coordinator.render();
    coordinator.stop_service_loop().unwrap();
    rendered.unwrap();

    assert_eq!(coordinator.full_image_size(), (400, 300));
    assert_eq!(coordinator.reduced_image_size(), (100, 75));
    {
        let surface = root_surface.lock().unwrap();
        assert_eq!(surface.viewports()[0].rect, DVec4::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(surface.front_buffer().pixel(399, 299), [0, 255, 0]);
    }

    for handle in satellites {
        let (satellite, typed) = handle.join().unwrap();
        assert_eq!(satellite.full_image_size(), (400, 300));
        assert_eq!(satellite.reduced_image_size(), (100, 75));
        assert_eq!(satellite.image_reduction_factor(), 4);
        assert!(satellite.compositing());

        let surface = typed.lock().unwrap();
        assert_eq!(surface.pixel_size(), (400, 300));
        assert_eq!(surface.render_count(), 1);
        let viewport = &surface.viewports()[0];
        assert!(viewport.lights.is_empty());
        assert_eq!(viewport.rect, DVec4::new(0.0, 0.0, 0.25, 0.25));
        assert_eq!(viewport.background, DVec3::new(0.0, 1.0, 0.0));
        assert_eq!(viewport.camera.position, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(viewport.camera.view_angle, 45.0);
        // Satellites magnify their own reduced rendering as well.
        assert_eq!(surface.front_buffer().pixel(399, 299), [0, 255, 0]);
    }
    assert_eq!(channels[0].stats().snapshot(), (8, 0, 4, 0));
}

#[test]
fn test_satellite_lights_reconciled() {
    let channels = LocalCluster::new().with_timeout(TIMEOUT).build(2);
    let satellite_viewport = Viewport::default()
        .with_light(Light::new(DVec3::X, DVec3::ZERO))
        .with_light(Light::new(DVec3::Y, DVec3::ZERO))
        .with_light(Light::new(DVec3::Z, DVec3::ZERO));
    let satellite = spawn_satellite(
        Arc::clone(&channels[1]),
        MemorySurface::new(8, 8).with_viewport(satellite_viewport),
    );

    let mut light = Light::new(DVec3::new(4.0, 5.0, 6.0), DVec3::new(0.5, 0.5, 0.5));
    light.kind = LightKind::Headlight;
    let (mut coordinator, _) = root(
        Arc::clone(&channels[0]),
        MemorySurface::new(8, 8).with_viewport(Viewport::default().with_light(light)),
    );

    let rendered = coordinator.render();
    coordinator.stop_service_loop().unwrap();
    rendered.unwrap();

    let (_, typed) = satellite.join().unwrap();
    let surface = typed.lock().unwrap();
    let lights = &surface.viewports()[0].lights;
    assert_eq!(lights.len(), 1);
    assert_eq!(lights[0].position, DVec3::new(4.0, 5.0, 6.0));
    assert_eq!(lights[0].focal_point, DVec3::new(0.5, 0.5, 0.5));
    assert_eq!(lights[0].kind, LightKind::Headlight);
}

#[test]
fn test_missing_lights_created() {
    let channels = LocalCluster::new().with_timeout(TIMEOUT).build(2);
    let satellite = spawn_satellite(
        Arc::clone(&channels[1]),
        MemorySurface::new(8, 8).with_viewport(Viewport::default()),
    );

    let viewport = Viewport::default()
        .with_light(Light::new(DVec3::X, DVec3::ZERO))
        .with_light(Light::new(DVec3::Y, DVec3::ZERO));
    let (mut coordinator, _) = root(
        Arc::clone(&channels[0]),
        MemorySurface::new(8, 8).with_viewport(viewport),
    );

    let rendered = coordinator.render();
    coordinator.stop_service_loop().unwrap();
    rendered.unwrap();

    let (_, typed) = satellite.join().unwrap();
    let surface = typed.lock().unwrap();
    let positions: Vec<_> = surface.viewports()[0]
        .lights
        .iter()
        .map(|l| l.position)
        .collect();
    assert_eq!(positions, vec![DVec3::X, DVec3::Y]);
}

#[test]
fn test_extra_announced_viewports_drained() {
    let channels = LocalCluster::new().with_timeout(TIMEOUT).build(2);
    // The satellite knows one viewport; the root announces two.
    let satellite = spawn_satellite(
        Arc::clone(&channels[1]),
        MemorySurface::new(8, 8).with_viewport(Viewport::default()),
    );

    let second = Viewport::new(DVec4::new(0.5, 0.0, 1.0, 1.0))
        .with_light(Light::new(DVec3::ONE, DVec3::ZERO));
    let (mut coordinator, _) = root(
        Arc::clone(&channels[0]),
        MemorySurface::new(8, 8)
            .with_viewport(Viewport::new(DVec4::new(0.0, 0.0, 0.5, 1.0)))
            .with_viewport(second),
    );

    // Two cycles: the second only lines up if the first was fully drained.
    for _ in 0..2 {
        coordinator.render().unwrap();
    }
    coordinator.stop_service_loop().unwrap();

    let (_, typed) = satellite.join().unwrap();
    let surface = typed.lock().unwrap();
    assert_eq!(surface.render_count(), 2);
    assert_eq!(surface.viewports()[0].rect, DVec4::new(0.0, 0.0, 0.5, 1.0));
    assert_eq!(channels[1].stats().snapshot().1, 2 * 7);
}

#[test]
fn test_compositing_disabled_on_satellites() {
    let channels = LocalCluster::new().with_timeout(TIMEOUT).build(2);
    let satellite = spawn_satellite(
        Arc::clone(&channels[1]),
        MemorySurface::new(8, 8).with_viewport(Viewport::default()),
    );

    let (mut coordinator, _) = root(
        Arc::clone(&channels[0]),
        MemorySurface::new(8, 8).with_viewport(Viewport::default()),
    );
    coordinator.set_compositing(false);
    coordinator.set_image_reduction_factor(2);

    let rendered = coordinator.render();
    coordinator.stop_service_loop().unwrap();
    rendered.unwrap();

    let (satellite, _) = satellite.join().unwrap();
    assert!(!satellite.compositing());
    assert!(!satellite.frame().is_reduced_image_fresh());
    assert!(!satellite.frame().is_surface_image_written());
}

#[test]
fn test_visible_prop_bounds_across_processes() {
    let channels = LocalCluster::new().with_timeout(TIMEOUT).build(3);
    let near = spawn_satellite(
        Arc::clone(&channels[1]),
        MemorySurface::new(4, 4).with_viewport(Viewport::default().with_drawable(Box::new(
            BoxActor::new(DVec3::new(5.0, 0.0, 0.0), DVec3::new(6.0, 1.0, 1.0)),
        ))),
    );
    let hidden = spawn_satellite(
        Arc::clone(&channels[2]),
        MemorySurface::new(4, 4).with_viewport(Viewport::default().with_drawable(Box::new(
            BoxActor::new(DVec3::splat(100.0), DVec3::splat(101.0)).with_visibility(false),
        ))),
    );

    let (mut coordinator, _) = root(
        Arc::clone(&channels[0]),
        MemorySurface::new(4, 4).with_viewport(
            Viewport::default().with_drawable(Box::new(BoxActor::new(DVec3::ZERO, DVec3::ONE))),
        ),
    );

    let bounds = coordinator.compute_visible_prop_bounds(0);
    // Unknown index: every process falls back to its first viewport.
    let fallback = coordinator.compute_visible_prop_bounds(7);
    coordinator.stop_service_loop().unwrap();

    let expected = Bounds::new(DVec3::ZERO, DVec3::new(6.0, 1.0, 1.0));
    assert_eq!(bounds.unwrap(), expected);
    assert_eq!(fallback.unwrap(), expected);

    near.join().unwrap();
    hidden.join().unwrap();
}

#[test]
fn test_start_interactive_runs_every_role() {
    let channels = LocalCluster::new().with_timeout(TIMEOUT).build(3);
    let handles: Vec<_> = channels
        .into_iter()
        .map(|channel| {
            thread::spawn(move || {
                let (typed, shared) = typed_surface(
                    MemorySurface::new(16, 16)
                        .with_viewport(Viewport::default().with_background(DVec3::ONE))
                        .with_interactive_frames(3),
                );
                let mut coordinator = RenderCoordinator::new();
                coordinator.set_image_reduction_factor(2);
                coordinator.attach_surface(Some(shared)).unwrap();
                coordinator.attach_channel(Some(channel)).unwrap();
                coordinator.enable_offscreen_if_satellite().unwrap();
                coordinator.start_interactive().unwrap();
                let count = typed.lock().unwrap().render_count();
                count
            })
        })
        .collect();

    let counts: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(counts, vec![3, 3, 3]);
}

#[test]
fn test_root_pixels_after_cycle() {
    let channels = LocalCluster::new().with_timeout(TIMEOUT).build(2);
    let satellite = spawn_satellite(
        Arc::clone(&channels[1]),
        MemorySurface::new(8, 8).with_viewport(Viewport::default()),
    );
    let (mut coordinator, _) = root(
        Arc::clone(&channels[0]),
        MemorySurface::new(12, 8)
            .with_viewport(Viewport::default().with_background(DVec3::new(0.0, 0.0, 1.0))),
    );
    coordinator.set_image_reduction_factor(4);
    let rendered = coordinator.render();
    coordinator.stop_service_loop().unwrap();
    rendered.unwrap();
    satellite.join().unwrap();

    let pixels = coordinator.pixels(0, 0, 11, 7).unwrap();
    assert_eq!(pixels.len(), 12 * 8 * 3);
    assert!(pixels.chunks(3).all(|px| px == [0, 0, 255]));

    let png = encode_png(coordinator.full_image()).unwrap();
    let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (12, 8));
}
