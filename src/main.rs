use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::DVec2;
use log::{error, info};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton as WinitMouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode as WinitKeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use planet_gl::{
    AppOptions, Application, AtmosphereParams, Command, GpuBackend, HeadlessBackend, KeyAction,
    KeyCode, MouseButton, NamedKey, WgpuBackend,
};

const USAGE: &str = "Usage: planet-gl <assets-dir> [--summary-only] [--atmosphere <preset.json>] \
                     [--save-atmosphere <preset.json>] [--shaders <dir>]";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = CliOptions::parse(env::args().skip(1))?;
    let mut options = AppOptions::new(&cli.assets);
    options.shaders_dir = cli.shaders;
    if let Some(path) = &cli.atmosphere {
        options.atmosphere = AtmosphereParams::load(path)
            .with_context(|| format!("failed to load atmosphere preset {}", path.display()))?;
    }

    let save = cli.save_atmosphere.as_deref();
    if cli.summary_only {
        return run_headless(options, save);
    }
    match run_interactive(options.clone(), save) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
            );
            run_headless(options, save)
        }
        Err(err) => Err(err),
    }
}

fn run_headless(options: AppOptions, save: Option<&Path>) -> Result<()> {
    let gpu = HeadlessBackend::new(options.width, options.height);
    let mut app = Application::new(gpu, options).context("failed to build scenes")?;
    app.render().context("failed to render the first frame")?;
    print!("{}", app.summary());
    let saved = save_preset(&app, save);
    let gpu = app.shutdown();
    saved?;
    info!("headless run submitted {} frame(s)", gpu.frames_submitted());
    Ok(())
}

/// Writes the final atmosphere parameters when `--save-atmosphere` was given.
fn save_preset<G: GpuBackend>(app: &Application<G>, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    app.save_atmosphere(path)
        .with_context(|| format!("failed to save atmosphere preset {}", path.display()))
}

fn run_interactive(options: AppOptions, save: Option<&Path>) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut shell = Shell::new(options);
    event_loop
        .run_app(&mut shell)
        .context("event loop terminated with error")?;

    let mut saved = Ok(());
    if let Some(app) = shell.app.take() {
        saved = save_preset(&app, save);
        app.shutdown();
    }
    match shell.error {
        Some(err) => Err(err),
        None => saved,
    }
}

/// Window owner driving the application from winit callbacks.
struct Shell {
    options: AppOptions,
    app: Option<Application<WgpuBackend>>,
    last_tick: Option<Instant>,
    title: String,
    error: Option<anyhow::Error>,
}

impl Shell {
    fn new(options: AppOptions) -> Self {
        Self {
            options,
            app: None,
            last_tick: None,
            title: String::new(),
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }

    fn create_app(&self, event_loop: &ActiveEventLoop) -> Result<Application<WgpuBackend>> {
        let attrs = Window::default_attributes()
            .with_title("PlanetGL")
            .with_inner_size(LogicalSize::new(
                self.options.width as f64,
                self.options.height as f64,
            ));
        let window = event_loop
            .create_window(attrs)
            .map_err(|err| WindowInitError::from_error("window", err))?;
        let window = Arc::new(window);
        let size = window.inner_size();

        let gpu = pollster::block_on(WgpuBackend::new(Arc::clone(&window)))?;
        let mut options = self.options.clone();
        options.width = size.width.max(1);
        options.height = size.height.max(1);
        let app = Application::new(gpu, options).context("failed to build scenes")?;
        info!("{}", app.summary().trim_end());
        Ok(app)
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(app) = self.app.as_mut() else {
            return Ok(());
        };
        let now = Instant::now();
        let delta_ms = self
            .last_tick
            .map(|last| now.duration_since(last).as_secs_f32() * 1000.0)
            .unwrap_or(0.0);
        self.last_tick = Some(now);

        app.update(delta_ms);
        app.render()?;

        let title = app.overlay().title();
        if title != self.title {
            app.gpu().window().set_title(&title);
            self.title = title;
        }
        Ok(())
    }
}

impl ApplicationHandler for Shell {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_some() {
            return;
        }
        match self.create_app(event_loop) {
            Ok(app) => self.app = Some(app),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(app) = self.app.as_mut() else {
            return;
        };
        if window_id != app.gpu().window_id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Err(err) = app.resize(size.width, size.height) {
                    self.fail(event_loop, err.into());
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                let Some(key) = map_keycode(code) else {
                    return;
                };
                let action = match (event.state, event.repeat) {
                    (ElementState::Pressed, false) => KeyAction::Press,
                    (ElementState::Pressed, true) => KeyAction::Repeat,
                    (ElementState::Released, _) => KeyAction::Release,
                };
                if let Some(Command::Quit) = app.on_key(key, action) {
                    event_loop.exit();
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let index = match button {
                    WinitMouseButton::Left => 0,
                    WinitMouseButton::Right => 1,
                    WinitMouseButton::Middle => 2,
                    WinitMouseButton::Back => 3,
                    WinitMouseButton::Forward => 4,
                    WinitMouseButton::Other(value) => value.min(u8::MAX as u16) as u8,
                };
                app.on_mouse_button(MouseButton::new(index), state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                app.on_cursor_moved(DVec2::new(position.x, position.y));
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.redraw() {
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(app) = &self.app {
            app.gpu().window().request_redraw();
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

fn map_keycode(code: WinitKeyCode) -> Option<KeyCode> {
    use WinitKeyCode as Key;
    Some(match code {
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::KeyA => KeyCode::Character('A'),
        Key::KeyD => KeyCode::Character('D'),
        Key::KeyM => KeyCode::Character('M'),
        Key::KeyR => KeyCode::Character('R'),
        Key::KeyS => KeyCode::Character('S'),
        Key::KeyT => KeyCode::Character('T'),
        Key::KeyW => KeyCode::Character('W'),
        _ => return None,
    })
}

struct CliOptions {
    assets: PathBuf,
    summary_only: bool,
    atmosphere: Option<PathBuf>,
    save_atmosphere: Option<PathBuf>,
    shaders: Option<PathBuf>,
}

impl CliOptions {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let Some(assets) = args.next() else {
            return Err(anyhow!(USAGE));
        };
        let mut options = Self {
            assets: PathBuf::from(assets),
            summary_only: false,
            atmosphere: None,
            save_atmosphere: None,
            shaders: None,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => options.summary_only = true,
                "--atmosphere" => options.atmosphere = Some(Self::value(&mut args, &arg)?),
                "--save-atmosphere" => {
                    options.save_atmosphere = Some(Self::value(&mut args, &arg)?)
                }
                "--shaders" => options.shaders = Some(Self::value(&mut args, &arg)?),
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(options)
    }

    fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<PathBuf> {
        args.next()
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("{flag} expects a path. {USAGE}"))
    }
}
