//! Records one clear-color frame against the headless null backend and
//! prints the submitted command stream. Useful as a smoke test on
//! machines without a GPU.

use levikno_render::backend::RenderInitInfo;
use levikno_render::null::{HeadlessWindow, NullBackend, NullWindow};
use levikno_render::*;

fn main() -> Result<()> {
    let info = ContextCreateInfo {
        application_name: String::from("headless frame"),
        logging: LoggingInfo {
            enable_logging: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut ctx = Context::create(info, Box::new(NullBackend::new()))?;

    let devices = ctx.physical_devices();
    ctx.render_init(&RenderInitInfo {
        physical_device: devices[0].clone(),
        max_frames_in_flight: 2,
        gamma_correction: true,
    })?;

    let window = ctx.create_window(
        WindowCreateInfo {
            width: 800,
            height: 600,
            title: String::from("levikno"),
            vsync: true,
        },
        Box::new(HeadlessWindow::new(800, 600)),
    )?;

    ctx.render_begin_next_frame(window)?;
    ctx.render_begin_command_recording(window)?;
    ctx.render_cmd_begin_render_pass(window)?;
    ctx.render_clear_color(window, 0.1, 0.2, 0.3, 1.0)?;
    ctx.render_cmd_end_render_pass(window)?;
    ctx.render_end_command_recording(window)?;
    ctx.render_draw_submit(window)?;

    {
        let window = ctx.window(window)?;
        let data = window.backend().downcast_ref::<NullWindow>().unwrap();
        println!("submitted frames: {}", data.frames_submitted);
        for (index, frame) in data.submitted.iter().enumerate() {
            println!("frame {}: {:?}", index, frame);
        }
    }

    ctx.destroy_window(window)?;
    ctx.terminate();
    Ok(())
}
