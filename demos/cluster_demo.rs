//! Demo running a three-process cluster inside one program.
//!
//! Every process renders the same two-viewport scene at a quarter of the
//! window resolution; the root magnifies its image back to full size and
//! saves it as a PNG.
//!
//! Run with `cargo run --example cluster_demo -- [output.png]`.

use std::thread;
use std::time::Duration;

use paracompose::{
    init_logging, save_image, share_surface, BoxActor, DVec3, DVec4, LocalChannel, LocalCluster,
    MemorySurface, ProcessChannel, RenderCoordinator, Result, Role, Viewport,
};

const PROCESSES: usize = 3;
const FRAMES: u32 = 5;

fn scene() -> MemorySurface {
    let left = Viewport::new(DVec4::new(0.0, 0.0, 0.5, 1.0))
        .with_background(DVec3::new(0.1, 0.2, 0.4))
        .with_drawable(Box::new(BoxActor::new(DVec3::ZERO, DVec3::new(3.0, 1.0, 1.0))));
    let right = Viewport::new(DVec4::new(0.5, 0.0, 1.0, 1.0))
        .with_background(DVec3::new(0.8, 0.5, 0.1));
    MemorySurface::new(480, 320)
        .with_viewport(left)
        .with_viewport(right)
        .with_interactive_frames(FRAMES)
}

fn run_process(channel: std::sync::Arc<LocalChannel>, output: &str) -> Result<()> {
    let id = channel.local_process_id();
    let mut coordinator = RenderCoordinator::new();
    coordinator.set_image_reduction_factor(4);
    coordinator.add_cycle_listener(move |event| log::debug!("process {id}: {event:?}"));
    coordinator.attach_surface(Some(share_surface(scene())))?;
    coordinator.attach_channel(Some(channel))?;
    coordinator.initialize_local_piece_assignment()?;
    coordinator.enable_offscreen_if_satellite()?;

    if coordinator.role() == Some(Role::Root) {
        let bounds = coordinator.compute_visible_prop_bounds(0)?;
        println!("visible bounds: {:?} .. {:?}", bounds.min, bounds.max);
    }

    coordinator.start_interactive()?;

    if coordinator.role() == Some(Role::Root) {
        let (width, height) = coordinator.full_image_size();
        println!(
            "rendered {FRAMES} frames at {width}x{height} (reduced {:?}), last cycle {:.3} ms",
            coordinator.reduced_image_size(),
            coordinator.last_cycle_seconds() * 1000.0
        );
        if let Err(e) = save_image(output, coordinator.full_image()) {
            eprintln!("failed to save {output}: {e}");
        } else {
            println!("saved {output}");
        }
    }
    Ok(())
}

fn main() {
    init_logging();
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "cluster_demo.png".to_string());

    let channels = LocalCluster::new()
        .with_timeout(Duration::from_secs(30))
        .build(PROCESSES);
    let handles: Vec<_> = channels
        .into_iter()
        .map(|channel| {
            let output = output.clone();
            thread::spawn(move || run_process(channel, &output))
        })
        .collect();

    for (id, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => eprintln!("process {id} failed: {e}"),
            Err(_) => eprintln!("process {id} panicked"),
        }
    }
}
