//! Tilefall entry point
//!
//! Handles platform-specific initialization and runs the frame and tick loops.

use glam::Vec2;

use tilefall::atlas::{TileCode, Tileset};
use tilefall::consts::AIR;
use tilefall::settings::Settings;
use tilefall::sim::{TileGrid, WorldState};

const WORLD_WIDTH: u32 = 128;
const WORLD_HEIGHT: u32 = 64;
/// Height of the ground surface, in tiles
const GROUND_LEVEL: i32 = 24;

const TILE_NAMES: &[&str] = &["stone", "dirt", "grass", "brick"];
const PLAYER_SPRITE: &str = "player";
const PLAYER_HITBOX: Vec2 = Vec2::new(0.75, 1.75);

fn code_or_air(tileset: &Tileset, name: &str) -> TileCode {
    tileset.to_code(name).unwrap_or_else(|| {
        log::warn!("tileset has no '{name}', using air");
        AIR
    })
}

/// Layered ground with a few ledges, and the player standing on top
fn build_world(tileset: &Tileset, settings: &Settings) -> WorldState {
    let stone = code_or_air(tileset, "stone");
    let dirt = code_or_air(tileset, "dirt");
    let grass = code_or_air(tileset, "grass");
    let brick = code_or_air(tileset, "brick");

    let width = WORLD_WIDTH as i32;
    let mut grid = TileGrid::new(WORLD_WIDTH, WORLD_HEIGHT);
    grid.fill(0, 0, width, GROUND_LEVEL - 4, stone);
    grid.fill(0, GROUND_LEVEL - 4, width, GROUND_LEVEL - 1, dirt);
    grid.fill(0, GROUND_LEVEL - 1, width, GROUND_LEVEL, grass);

    for (i, x) in (8..width - 8).step_by(14).enumerate() {
        let y = GROUND_LEVEL + 3 + (i as i32 % 3) * 2;
        grid.fill(x, y, x + 5, y + 1, brick);
    }

    // darker the deeper you dig
    for y in 0..GROUND_LEVEL {
        let depth = (GROUND_LEVEL - y) as u32;
        let level = 255u32.saturating_sub(depth * 6).max(64) as u8;
        for x in 0..width {
            grid.set_light_at(x, y, level);
        }
    }

    let mut world = WorldState::new(grid, settings.physics);
    let feet = Vec2::new(WORLD_WIDTH as f32 / 2.0, GROUND_LEVEL as f32);
    world.spawn_player(feet, PLAYER_HITBOX, PLAYER_SPRITE);
    world
}

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{HtmlCanvasElement, KeyboardEvent, MouseEvent, WheelEvent};

    use tilefall::assets::{decode_image, texture_path, tile_path};
    use tilefall::atlas::{TexturePack, TexturePackBuilder, TileCode, Tileset, TilesetBuilder};
    use tilefall::consts::{AIR, RASTER_UNITS_PER_FRAME};
    use tilefall::error::GpuError;
    use tilefall::geom::Viewport;
    use tilefall::platform::{Clock, KeyState, PerformanceClock};
    use tilefall::renderer::{GpuContext, Renderer, Scene, request_device};
    use tilefall::settings::Settings;
    use tilefall::sim::{TickInput, TickOutcome, TileEdit, Ticker, WorldState, tick};
    use tilefall::work::{Pending, WorkQueue};

    use super::{PLAYER_SPRITE, TILE_NAMES, build_world};

    /// How often tick diagnostics are logged
    const DIAGNOSTIC_INTERVAL_MS: f64 = 5000.0;

    /// Keys whose browser default (scrolling) is suppressed
    const CAPTURED_KEYS: &[&str] = &["ArrowLeft", "ArrowRight", "ArrowUp", "ArrowDown", "Space"];

    /// Everything the frame and tick callbacks share
    struct App {
        settings: Settings,
        clock: PerformanceClock,
        ticker: Ticker,
        keys: KeyState,
        pending_edit: Option<TileEdit>,
        selected: TileCode,
        viewport: Viewport,
        renderer: Option<Renderer>,
        recovering: bool,
        work: WorkQueue,
        tileset_pending: Option<Pending<Tileset>>,
        pack_pending: Option<Pending<TexturePack>>,
        tileset: Option<Tileset>,
        pack: Option<TexturePack>,
        world: Option<WorldState>,
        last_diagnostic_ms: f64,
    }

    impl App {
        fn new(settings: Settings) -> Self {
            let viewport = Viewport::new(
                settings.aspect_ratio,
                settings.view_height_tiles,
                settings.min_view_height,
                settings.max_view_height,
            );
            Self {
                ticker: Ticker::new(settings.tick_ms()),
                clock: PerformanceClock::new(),
                keys: KeyState::new(),
                pending_edit: None,
                selected: 1,
                viewport,
                renderer: None,
                recovering: false,
                work: WorkQueue::new(),
                tileset_pending: None,
                pack_pending: None,
                tileset: None,
                pack: None,
                world: None,
                last_diagnostic_ms: 0.0,
                settings,
            }
        }

        /// Pick up finished atlas jobs; the world is built once tiles exist
        fn collect_jobs(&mut self) {
            if !self.work.is_empty() {
                self.work.run(RASTER_UNITS_PER_FRAME);
            }
            if let Some(pack) = self.pack_pending.as_ref().and_then(Pending::take) {
                log::info!(
                    "texture pack ready: {} sprite(s), {}x{}, fill {:.2}",
                    pack.len(),
                    pack.width(),
                    pack.height(),
                    pack.fill()
                );
                self.pack = Some(pack);
                self.pack_pending = None;
            }
            if let Some(tileset) = self.tileset_pending.as_ref().and_then(Pending::take) {
                log::info!(
                    "tileset ready: {} tile(s) in a {}x{} grid",
                    tileset.tile_count(),
                    tileset.width_in_tiles(),
                    tileset.height_in_tiles()
                );
                self.world = Some(build_world(&tileset, &self.settings));
                self.tileset = Some(tileset);
                self.tileset_pending = None;
                self.ticker.start(self.clock.now_ms());
            }
        }

        /// Run due ticks; returns the delay until the next poll
        fn advance(&mut self) -> Option<f64> {
            let Self {
                ticker,
                clock,
                keys,
                pending_edit,
                world,
                ..
            } = self;
            let world = world.as_mut()?;
            let (outcome, delay) = ticker.advance(&*clock, || {
                let mut input = TickInput::from_keys(keys);
                input.edit = pending_edit.take();
                tick(world, &input);
            })?;
            if let TickOutcome::HardReset = outcome {
                log::warn!("tick loop fell behind ({} hard reset(s))", ticker.hard_resets());
            }
            Some(delay)
        }

        /// Returns true when the GPU device was just lost
        fn render(&mut self, now_ms: f64) -> bool {
            if let Some(feet) = self.world.as_ref().and_then(|w| w.player()).map(|p| p.position) {
                self.viewport.follow(feet);
            }

            if now_ms - self.last_diagnostic_ms > DIAGNOSTIC_INTERVAL_MS {
                self.last_diagnostic_ms = now_ms;
                log::debug!(
                    "tick {} avg {:.3}ms, {} hard reset(s)",
                    self.ticker.tick_index(),
                    self.ticker.average_tick_ms(),
                    self.ticker.hard_resets()
                );
            }

            if self.recovering {
                return false;
            }
            let (Some(renderer), Some(world), Some(tileset)) =
                (self.renderer.as_mut(), self.world.as_mut(), self.tileset.as_ref())
            else {
                return false;
            };

            let scene = Scene {
                world,
                viewport: &self.viewport,
                tileset,
                sprites: self.pack.as_ref(),
            };
            match renderer.render(scene) {
                Ok(()) => false,
                Err(GpuError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                    renderer.gpu.reconfigure();
                    false
                }
                Err(GpuError::Surface(wgpu::SurfaceError::Timeout)) => false,
                Err(GpuError::ContextLost) => {
                    renderer.on_context_lost();
                    self.recovering = true;
                    true
                }
                Err(e) => {
                    log::error!("render failed: {e}");
                    false
                }
            }
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.viewport.resize(width, height);
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.resize(width, height);
            }
        }

        fn select_tile(&mut self, digit: u32) {
            let Some(tileset) = self.tileset.as_ref() else {
                return;
            };
            if (digit as usize) < tileset.tile_count() && digit as TileCode != AIR {
                self.selected = digit as TileCode;
                log::info!("selected tile '{}'", tileset.to_tile(self.selected).unwrap_or("?"));
            }
        }

        fn edit_at(&mut self, pointer: Vec2, button: i16) {
            let Some((x, y)) = self.viewport.pick_tile(pointer) else {
                return;
            };
            let code = match button {
                0 => self.selected,
                2 => AIR,
                _ => return,
            };
            self.pending_edit = Some(TileEdit { x, y, code });
        }
    }

    fn canvas_pixels(canvas: &HtmlCanvasElement) -> (u32, u32) {
        let dpr = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio());
        let width = (canvas.client_width() as f64 * dpr) as u32;
        let height = (canvas.client_height() as f64 * dpr) as u32;
        (width.max(1), height.max(1))
    }

    /// Pointer position in drawable pixels
    fn pointer_pixels(event: &MouseEvent) -> Vec2 {
        let dpr = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio()) as f32;
        Vec2::new(event.offset_x() as f32, event.offset_y() as f32) * dpr
    }

    async fn fetch_bytes(url: &str) -> Result<Vec<u8>, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let response: web_sys::Response = JsFuture::from(window.fetch_with_str(url)).await?.dyn_into()?;
        if !response.ok() {
            return Err(JsValue::from_str(&format!("HTTP {}", response.status())));
        }
        let buffer = JsFuture::from(response.array_buffer()?).await?;
        Ok(js_sys::Uint8Array::new(&buffer).to_vec())
    }

    /// Fetch and decode every image, then queue both atlas jobs
    async fn load_assets(app: Rc<RefCell<App>>) {
        let tile_size = app.borrow().settings.tile_size;
        let mut tiles = TilesetBuilder::new(tile_size);
        for name in TILE_NAMES {
            let handle = tiles.register(name);
            let url = tile_path(name);
            let delivered = match fetch_bytes(&url).await {
                Ok(bytes) => decode_image(&bytes).map_err(|e| e.to_string()),
                Err(e) => Err(format!("{e:?}")),
            };
            let settled = match delivered {
                Ok(image) => tiles.deliver(handle, image),
                Err(e) => {
                    log::error!("failed to load {url}: {e}");
                    tiles.fail(handle)
                }
            };
            if let Err(e) = settled {
                log::error!("tile '{name}': {e}");
            }
        }

        let mut sprites = TexturePackBuilder::new();
        let handle = sprites.register(PLAYER_SPRITE);
        let url = texture_path(PLAYER_SPRITE);
        let settled = match fetch_bytes(&url).await {
            Ok(bytes) => match decode_image(&bytes) {
                Ok(image) => sprites.deliver(handle, image),
                Err(e) => {
                    log::error!("failed to decode {url}: {e}");
                    sprites.fail(handle)
                }
            },
            Err(e) => {
                log::error!("failed to load {url}: {e:?}");
                sprites.fail(handle)
            }
        };
        if let Err(e) = settled {
            log::error!("sprite '{PLAYER_SPRITE}': {e}");
        }

        let mut app = app.borrow_mut();
        match tiles.into_job() {
            Ok((job, pending)) => {
                app.work.push(Box::new(job));
                app.tileset_pending = Some(pending);
            }
            Err(e) => log::error!("tileset not built: {e}"),
        }
        match sprites.into_job() {
            Ok((job, pending)) => {
                app.work.push(Box::new(job));
                app.pack_pending = Some(pending);
            }
            Err(e) => log::error!("texture pack not built: {e}"),
        }
    }

    async fn init_gpu(canvas: &HtmlCanvasElement, width: u32, height: u32) -> Result<GpuContext, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        });
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .map_err(|e| GpuError::CreateSurface(e.to_string()))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;
        log::info!("Using adapter: {:?}", adapter.get_info().name);
        GpuContext::new(surface, adapter, width, height).await
    }

    async fn recover_device(app: Rc<RefCell<App>>, adapter: wgpu::Adapter) {
        let restored = request_device(&adapter).await;
        let mut app = app.borrow_mut();
        match restored {
            Ok((device, queue)) => {
                if let Some(renderer) = app.renderer.as_mut() {
                    renderer.install_device(device, queue);
                }
                if let Some(world) = app.world.as_mut() {
                    world.grid.mark_update();
                }
            }
            Err(e) => log::error!("device recovery failed, retrying: {e}"),
        }
        app.recovering = false;
    }

    pub async fn run() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::error_1(&JsValue::from_str(&e.to_string()));
        }

        log::info!("Tilefall starting...");

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .ok_or_else(|| JsValue::from_str("no canvas"))?
            .dyn_into()?;

        let (width, height) = canvas_pixels(&canvas);
        canvas.set_width(width);
        canvas.set_height(height);

        let settings = Settings::load();
        // write back so the stored copy is sanitized and lists every field
        settings.save();
        let app = Rc::new(RefCell::new(App::new(settings)));
        app.borrow_mut().resize(width, height);

        match init_gpu(&canvas, width, height).await {
            Ok(gpu) => app.borrow_mut().renderer = Some(Renderer::new(gpu)),
            Err(e) => log::error!("rendering disabled: {e}"),
        }

        setup_input_handlers(&canvas, app.clone())?;

        wasm_bindgen_futures::spawn_local(load_assets(app.clone()));
        request_animation_frame(app.clone());
        schedule_tick(app, 0.0);

        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }
        log::info!("Tilefall running!");
        Ok(())
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, app: Rc<RefCell<App>>) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;

        // Keyboard
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let code = event.code();
                if CAPTURED_KEYS.contains(&code.as_str()) {
                    event.prevent_default();
                }
                let mut a = app.borrow_mut();
                if let Some(digit) = code.strip_prefix("Digit").and_then(|d| d.parse::<u32>().ok()) {
                    a.select_tile(digit);
                }
                a.keys.press(&code);
            });
            window.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                app.borrow_mut().keys.release(&event.code());
            });
            window.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }
        // Keyups are lost while unfocused
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                app.borrow_mut().keys.clear();
            });
            window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        // Mouse: left places, right clears
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                event.prevent_default();
                app.borrow_mut().edit_at(pointer_pixels(&event), event.button());
            });
            canvas.add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                event.prevent_default();
            });
            canvas.add_event_listener_with_callback("contextmenu", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        // Wheel zoom about the pointer
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: WheelEvent| {
                event.prevent_default();
                let mut a = app.borrow_mut();
                let step = a.settings.zoom_step;
                let factor = if event.delta_y() > 0.0 {
                    step
                } else if event.delta_y() < 0.0 {
                    1.0 / step
                } else {
                    return;
                };
                a.viewport.zoom_at_canvas(pointer_pixels(&event), factor);
            });
            canvas.add_event_listener_with_callback("wheel", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        // Resize
        {
            let canvas = canvas.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let (width, height) = canvas_pixels(&canvas);
                canvas.set_width(width);
                canvas.set_height(height);
                app.borrow_mut().resize(width, height);
            });
            window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }
        Ok(())
    }

    fn schedule_tick(app: Rc<RefCell<App>>, delay_ms: f64) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move || tick_loop(app));
        if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            delay_ms.ceil() as i32,
        ) {
            log::error!("setTimeout failed: {e:?}");
        }
        closure.forget();
    }

    fn tick_loop(app: Rc<RefCell<App>>) {
        let next = app.borrow_mut().advance();
        // poll again later while waiting for the world to exist
        let tick_ms = app.borrow().ticker.tick_ms();
        schedule_tick(app, next.unwrap_or(tick_ms));
    }

    fn request_animation_frame(app: Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(app, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(app: Rc<RefCell<App>>, time: f64) {
        let recover_with = {
            let mut a = app.borrow_mut();
            a.collect_jobs();
            let lost = a.render(time);
            if lost {
                a.renderer.as_ref().map(|r| r.gpu.adapter.clone())
            } else {
                None
            }
        };
        if let Some(adapter) = recover_with {
            wasm_bindgen_futures::spawn_local(recover_device(app.clone(), adapter));
        }
        request_animation_frame(app);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() -> Result<(), JsValue> {
    wasm_game::run().await
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();

    log::info!("Tilefall (native) starting...");
    log::info!("Native mode runs a headless simulation - use `trunk serve` for the web version");

    demo::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Headless run: build both atlases from generated images and simulate a
/// few seconds of play against a manual clock
#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use image::{Rgba, RgbaImage};

    use tilefall::atlas::{TexturePackBuilder, TilesetBuilder};
    use std::collections::HashSet;

    use tilefall::platform::{Clock, KeyState, ManualClock, SystemClock};
    use tilefall::renderer::instructions_for;
    use tilefall::settings::Settings;
    use tilefall::sim::{TickInput, Ticker, tick};

    use super::{PLAYER_SPRITE, TILE_NAMES, build_world};

    const DEMO_TICKS: u32 = 240;

    pub fn run() {
        let settings = Settings::load();

        let mut tiles = TilesetBuilder::new(settings.tile_size);
        for (i, name) in TILE_NAMES.iter().enumerate() {
            let handle = tiles.register(name);
            let shade = 60 + 40 * i as u8;
            let image = RgbaImage::from_pixel(settings.tile_size, settings.tile_size, Rgba([shade, shade, shade, 255]));
            if let Err(e) = tiles.deliver(handle, image) {
                log::error!("tile '{name}': {e}");
            }
        }
        let tileset = match tiles.build() {
            Ok(tileset) => tileset,
            Err(e) => {
                log::error!("tileset not built: {e}");
                return;
            }
        };
        log::info!(
            "tileset: {} tile(s), atlas {}x{}",
            tileset.tile_count(),
            tileset.atlas_size().x,
            tileset.atlas_size().y
        );

        let mut sprites = TexturePackBuilder::new();
        let handle = sprites.register(PLAYER_SPRITE);
        if let Err(e) = sprites.deliver(handle, RgbaImage::from_pixel(12, 28, Rgba([220, 80, 40, 255]))) {
            log::error!("sprite '{PLAYER_SPRITE}': {e}");
        }
        let pack = match sprites.build() {
            Ok(pack) => pack,
            Err(e) => {
                log::error!("texture pack not built: {e}");
                return;
            }
        };

        let mut world = build_world(&tileset, &settings);
        let wall = SystemClock::new();
        let began = wall.now_ms();
        let clock = ManualClock::new(0.0);
        let mut ticker = Ticker::new(settings.tick_ms());
        ticker.start(clock.now_ms());

        let mut keys = KeyState::new();
        keys.press("ArrowRight");
        for step in 0..DEMO_TICKS {
            if step == DEMO_TICKS / 2 {
                keys.release("ArrowRight");
                keys.press("Space");
            }
            clock.advance(ticker.tick_ms());
            ticker.advance(&clock, || tick(&mut world, &TickInput::from_keys(&keys)));
        }

        log::info!(
            "simulated {:.0}ms of play in {:.1}ms",
            clock.now_ms(),
            wall.now_ms() - began
        );
        if let Some(player) = world.player() {
            log::info!(
                "after {} tick(s): player at ({:.2}, {:.2}), on ground: {}",
                world.time_ticks,
                player.position.x,
                player.position.y,
                player.on_ground()
            );
        }
        log::info!(
            "{} sprite(s) to draw, pack fill {:.2}",
            instructions_for(&world.entities, &pack, &mut HashSet::new()).len(),
            pack.fill()
        );
    }
}
