//! Plinko Drop entry point
//!
//! Handles platform-specific initialization and runs the game loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{
        Document, HtmlCanvasElement, HtmlInputElement, HtmlSelectElement, KeyboardEvent, MouseEvent,
        Request, RequestInit, RequestMode, Response,
    };

    use plinko_drop::autobet::AutobetConfig;
    use plinko_drop::error::NetworkFailure;
    use plinko_drop::platform::now_ms;
    use plinko_drop::renderer::{Palette, RenderState, build_scene};
    use plinko_drop::round::{RoundRequest, RoundResponse, error_for_status};
    use plinko_drop::sim::RiskTier;
    use plinko_drop::{
        Cents, PlinkoError, PlinkoGame, RoundHistory, Settings, cents_from_dollars, format_cents,
    };

    /// Used when the page does not provide `data-balance` on the canvas
    const DEFAULT_BALANCE: Cents = 100_000;

    thread_local! {
        static SESSION: RefCell<Option<Rc<RefCell<App>>>> = const { RefCell::new(None) };
    }

    struct App {
        game: PlinkoGame,
        render_state: Option<RenderState>,
        last_time: f64,
        hovered: Option<usize>,
        tooltip: Option<String>,
        status: String,
    }

    impl App {
        fn new(game: PlinkoGame) -> Self {
            Self {
                game,
                render_state: None,
                last_time: 0.0,
                hovered: None,
                tooltip: None,
                status: String::new(),
            }
        }

        fn report(&mut self, error: &PlinkoError) {
            self.status = error.user_message();
        }

        /// Advance the session; returns an autobet request that needs sending
        fn update(&mut self, dt: f32) -> Option<RoundRequest> {
            let now = now_ms();
            if let Some(e) = self.game.expire_requests(now) {
                self.report(&e);
            }
            self.game.advance(dt, now);

            match self.game.poll_autobet(now)? {
                Ok(request) => Some(request),
                Err(e) => {
                    self.report(&e);
                    None
                }
            }
        }

        fn render(&mut self) {
            let vertices = build_scene(&self.game, now_ms(), self.hovered);
            let clear = Palette::new(self.game.settings().high_contrast).background;
            if let Some(ref mut render_state) = self.render_state {
                match render_state.render(&vertices, clear) {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        let (w, h) = render_state.size;
                        let field = render_state.field_size;
                        render_state.resize(w, h, field);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of memory!");
                    }
                    Err(e) => log::warn!("Render error: {:?}", e),
                }
            }
        }

        /// Update HUD elements in DOM
        fn update_hud(&self, document: &Document) {
            set_text(document, "hud-balance", &format_cents(self.game.balance()));

            let history = self.game.history();
            let receipt = history
                .latest()
                .map(|e| format!("{}x · {}", e.multiplier, e.receipt.display()))
                .unwrap_or_default();
            set_text(document, "hud-receipt", &receipt);
            set_text(document, "hud-net", &format_cents(history.net()));

            let autobet = self.game.autobet();
            let autobet_text = if autobet.is_active() {
                match autobet.remaining() {
                    Some(n) => format!("Autobet: {} left", n),
                    None => "Autobet: running".to_string(),
                }
            } else {
                autobet
                    .stop_reason()
                    .map(|r| r.message().to_string())
                    .unwrap_or_default()
            };
            set_text(document, "hud-autobet", &autobet_text);
            set_text(
                document,
                "autobet-btn",
                if autobet.is_active() { "Stop" } else { "Autobet" },
            );
            set_text(document, "status", &self.status);

            if let Some(el) = document.get_element_by_id("tooltip") {
                el.set_text_content(self.tooltip.as_deref());
                let _ = el.class_list().toggle_with_force("hidden", self.tooltip.is_none());
            }
            if let Some(el) = document.get_element_by_id("drop-btn") {
                let _ = el.class_list().toggle_with_force("busy", self.game.is_busy());
            }
        }
    }

    fn set_text(document: &Document, id: &str, text: &str) {
        if let Some(el) = document.get_element_by_id(id) {
            if el.text_content().as_deref() != Some(text) {
                el.set_text_content(Some(text));
            }
        }
    }

    fn input_value(document: &Document, id: &str) -> Option<String> {
        document
            .get_element_by_id(id)?
            .dyn_into::<HtmlInputElement>()
            .ok()
            .map(|el| el.value())
    }

    fn select_value(document: &Document, id: &str) -> Option<String> {
        document
            .get_element_by_id(id)?
            .dyn_into::<HtmlSelectElement>()
            .ok()
            .map(|el| el.value())
    }

    /// Bet field in dollars, as cents
    fn read_bet(document: &Document) -> Option<Cents> {
        let dollars: f64 = input_value(document, "bet-input")?.trim().parse().ok()?;
        dollars.is_finite().then(|| cents_from_dollars(dollars))
    }

    /// Reflect stored settings in the form controls
    fn sync_controls(document: &Document, settings: &Settings) {
        if let Some(el) = document
            .get_element_by_id("rows-select")
            .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
        {
            el.set_value(&settings.rows.to_string());
        }
        if let Some(el) = document
            .get_element_by_id("risk-select")
            .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
        {
            el.set_value(settings.risk.as_str());
        }
        if let Some(el) = document
            .get_element_by_id("bet-input")
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
        {
            el.set_value(&format!("{:.2}", settings.bet_cents as f64 / 100.0));
        }
    }

    /// Size the canvas backing store; returns (physical, logical) sizes
    fn size_canvas(window: &web_sys::Window, canvas: &HtmlCanvasElement) -> ((u32, u32), (f32, f32)) {
        let dpr = window.device_pixel_ratio();
        let client_w = canvas.client_width();
        let client_h = canvas.client_height();
        let width = (client_w as f64 * dpr) as u32;
        let height = (client_h as f64 * dpr) as u32;
        canvas.set_width(width);
        canvas.set_height(height);
        ((width, height), (client_w as f32, client_h as f32))
    }

    /// POST a round request to the authority
    async fn post_round(endpoint: &str, request: &RoundRequest) -> Result<RoundResponse, PlinkoError> {
        let transport =
            |e: JsValue| PlinkoError::Network(NetworkFailure::Transport(format!("{:?}", e)));

        let body = request.to_json()?;
        let opts = RequestInit::new();
        opts.set_method("POST");
        opts.set_mode(RequestMode::SameOrigin);
        opts.set_body(&JsValue::from_str(&body));

        let req = Request::new_with_str_and_init(endpoint, &opts).map_err(transport)?;
        req.headers()
            .set("Content-Type", "application/json")
            .map_err(transport)?;

        let window = web_sys::window().ok_or_else(|| transport(JsValue::NULL))?;
        let value = JsFuture::from(window.fetch_with_request(&req))
            .await
            .map_err(transport)?;
        let response: Response = value.dyn_into().map_err(transport)?;
        let text = JsFuture::from(response.text().map_err(transport)?)
            .await
            .map_err(transport)?
            .as_string()
            .unwrap_or_default();

        if !response.ok() {
            return Err(error_for_status(response.status(), &text, request.bet_amount));
        }
        RoundResponse::from_json(&text)
    }

    /// Send a request and feed its answer back into the session
    fn send_round(app: Rc<RefCell<App>>, request: RoundRequest) {
        let endpoint = app.borrow().game.settings().round_endpoint.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let result = post_round(&endpoint, &request).await;
            let mut a = app.borrow_mut();
            match a.game.complete_drop(request.request_id, result, now_ms()) {
                Ok(_) => a.status.clear(),
                // The session moved on; nothing to show
                Err(PlinkoError::StaleResponse(_)) => {}
                Err(e) => a.report(&e),
            }
        });
    }

    fn try_drop(app: &Rc<RefCell<App>>) {
        let request = {
            let document = web_sys::window().unwrap().document().unwrap();
            let mut a = app.borrow_mut();
            let bet = read_bet(&document).unwrap_or(a.game.settings().bet_cents);
            let begun = a
                .game
                .set_bet(bet)
                .and_then(|()| a.game.begin_drop(bet, now_ms()));
            match begun {
                Ok(request) => request,
                Err(e) => {
                    a.report(&e);
                    return;
                }
            }
        };
        send_round(app.clone(), request);
    }

    /// Authoritative balance pushed by the host page (dollars)
    #[wasm_bindgen]
    pub fn push_session_balance(dollars: f64) {
        if !dollars.is_finite() {
            log::warn!("Ignoring non-finite balance push");
            return;
        }
        SESSION.with(|session| {
            if let Some(app) = session.borrow().as_ref() {
                let applied = app.borrow_mut().game.apply_server_balance(cents_from_dollars(dollars));
                log::info!(
                    "Balance push {} ({})",
                    format_cents(cents_from_dollars(dollars)),
                    if applied { "applied" } else { "deferred until settle" }
                );
            }
        });
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Plinko Drop starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .expect("no canvas")
            .dyn_into()
            .expect("not a canvas");

        let ((width, height), field_size) = size_canvas(&window, &canvas);

        let settings = Settings::load();
        sync_controls(&document, &settings);
        let balance = canvas
            .get_attribute("data-balance")
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite())
            .map(cents_from_dollars)
            .unwrap_or(DEFAULT_BALANCE);

        let seed = js_sys::Date::now() as u64;
        let game = match PlinkoGame::new(settings, field_size.0, field_size.1, balance, seed) {
            Ok(game) => game.with_history(RoundHistory::load()),
            Err(e) => {
                log::error!("Could not start session: {}", e);
                return;
            }
        };
        let app = Rc::new(RefCell::new(App::new(game)));

        log::info!("Session initialized with seed: {}", seed);

        // Initialize WebGPU
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU,
            ..Default::default()
        });

        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .expect("Failed to create surface");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("Failed to get adapter");

        log::info!("Using adapter: {:?}", adapter.get_info().name);

        let render_state = RenderState::new(surface, &adapter, width, height, field_size)
            .await
            .expect("Failed to create device");
        app.borrow_mut().render_state = Some(render_state);

        SESSION.with(|session| *session.borrow_mut() = Some(app.clone()));

        setup_input_handlers(&canvas, app.clone());
        setup_controls(app.clone());
        setup_resize(canvas, app.clone());
        setup_visibility(app.clone());

        if let Some(hud) = document.get_element_by_id("hud") {
            let _ = hud.set_attribute("class", "");
        }

        request_animation_frame(app);

        log::info!("Plinko Drop running!");
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, app: Rc<RefCell<App>>) {
        // Hover tooltips (offsets are CSS pixels, same as field coordinates)
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let mut a = app.borrow_mut();
                if !a.game.settings().tooltips {
                    a.hovered = None;
                    a.tooltip = None;
                    return;
                }
                let point = Vec2::new(event.offset_x() as f32, event.offset_y() as f32);
                let tip = a.game.hover_tooltip(point);
                a.hovered = tip.map(|t| t.bucket);
                a.tooltip = tip.map(|t| t.text());
            });
            let _ = canvas
                .add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                let mut a = app.borrow_mut();
                a.hovered = None;
                a.tooltip = None;
            });
            let _ = canvas
                .add_event_listener_with_callback("mouseleave", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Space drops a ball
        {
            let document = web_sys::window().unwrap().document().unwrap();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if event.code() == "Space" && !event.repeat() {
                    event.prevent_default();
                    try_drop(&app);
                }
            });
            let _ = document
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_controls(app: Rc<RefCell<App>>) {
        let window = web_sys::window().unwrap();
        let document = window.document().unwrap();

        if let Some(btn) = document.get_element_by_id("drop-btn") {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                try_drop(&app);
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        if let Some(select) = document.get_element_by_id("rows-select") {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let document = web_sys::window().unwrap().document().unwrap();
                let mut a = app.borrow_mut();
                let result = select_value(&document, "rows-select")
                    .and_then(|v| v.parse::<u8>().ok())
                    .ok_or_else(|| PlinkoError::validation("rows", "Pick a row count"))
                    .and_then(|rows| a.game.set_rows(rows));
                if let Err(e) = result {
                    a.report(&e);
                    sync_controls(&document, a.game.settings());
                }
            });
            let _ = select.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        if let Some(select) = document.get_element_by_id("risk-select") {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let document = web_sys::window().unwrap().document().unwrap();
                let mut a = app.borrow_mut();
                let result = select_value(&document, "risk-select")
                    .and_then(|v| RiskTier::parse(&v))
                    .ok_or_else(|| PlinkoError::validation("risk", "Pick a risk tier"))
                    .and_then(|risk| a.game.set_risk(risk));
                if let Err(e) = result {
                    a.report(&e);
                    sync_controls(&document, a.game.settings());
                }
            });
            let _ = select.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        if let Some(btn) = document.get_element_by_id("autobet-btn") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                let document = web_sys::window().unwrap().document().unwrap();
                let mut a = app.borrow_mut();
                if a.game.autobet().is_active() {
                    a.game.stop_autobet();
                    return;
                }
                let base_bet = read_bet(&document).unwrap_or(a.game.settings().bet_cents);
                // 0 or empty runs until a stop condition
                let count = input_value(&document, "autobet-count")
                    .and_then(|v| v.trim().parse::<u32>().ok())
                    .filter(|&n| n > 0);
                let config = AutobetConfig {
                    base_bet,
                    count,
                    ..Default::default()
                };
                match a.game.start_autobet(config) {
                    Ok(()) => a.status.clear(),
                    Err(e) => a.report(&e),
                }
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_resize(canvas: HtmlCanvasElement, app: Rc<RefCell<App>>) {
        let window = web_sys::window().unwrap();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let window = web_sys::window().unwrap();
            let ((width, height), field_size) = size_canvas(&window, &canvas);
            let mut a = app.borrow_mut();
            match a.game.resize(field_size.0, field_size.1, now_ms()) {
                Ok(settled) if !settled.is_empty() => {
                    log::info!("Resize settled {} ball(s) in flight", settled.len());
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("Resize rejected: {}", e);
                    return;
                }
            }
            if let Some(ref mut render_state) = a.render_state {
                render_state.resize(width, height, field_size);
            }
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    /// Leaving the page abandons in-flight work; balls are settled, requests ignored
    fn setup_visibility(app: Rc<RefCell<App>>) {
        let document = web_sys::window().unwrap().document().unwrap();
        let document_clone = document.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            if document_clone.visibility_state() == web_sys::VisibilityState::Hidden {
                let mut a = app.borrow_mut();
                let settled = a.game.cancel(now_ms());
                log::info!("Page hidden; settled {} ball(s)", settled.len());
                a.last_time = 0.0;
            }
        });
        let _ = document.add_event_listener_with_callback(
            "visibilitychange",
            closure.as_ref().unchecked_ref(),
        );
        closure.forget();
    }

    fn request_animation_frame(app: Rc<RefCell<App>>) {
        let window = web_sys::window().unwrap();
        let closure = Closure::once(move |time: f64| {
            game_loop(app, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(app: Rc<RefCell<App>>, time: f64) {
        let autobet_request = {
            let mut a = app.borrow_mut();

            let dt = if a.last_time > 0.0 {
                ((time - a.last_time) / 1000.0) as f32
            } else {
                plinko_drop::consts::SIM_DT
            };
            a.last_time = time;

            let request = a.update(dt);
            a.render();
            if let Some(document) = web_sys::window().and_then(|w| w.document()) {
                a.update_hud(&document);
            }
            request
        };

        if let Some(request) = autobet_request {
            send_round(app.clone(), request);
        }

        request_animation_frame(app);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_game::run().await;
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Plinko Drop (native) starting...");
    log::info!("Native mode runs a headless session - run with `trunk serve` for the web version");

    if let Err(e) = run_headless() {
        log::error!("Headless session failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// A few manual drops and an autobet run against the local authority
#[cfg(not(target_arch = "wasm32"))]
fn run_headless() -> Result<(), plinko_drop::PlinkoError> {
    use plinko_drop::autobet::{AutobetConfig, Strategy};
    use plinko_drop::consts::DROP_DEBOUNCE_MS;
    use plinko_drop::round::{LocalAuthority, RoundAuthority, verify_receipt};
    use plinko_drop::{PlinkoGame, Settings, format_cents};

    const FRAME_DT: f32 = 1.0 / 60.0;
    const SERVER_SEED: &str = "headless-server-seed";
    const CLIENT_SEED: &str = "headless-client-seed";

    let settings = Settings {
        rows: 12,
        ..Default::default()
    };
    let rows = settings.rows;
    let mut authority = LocalAuthority::new(100_000, SERVER_SEED, CLIENT_SEED);
    println!("Server seed commitment: {}", authority.server_seed_hash());

    let mut game = PlinkoGame::new(settings, 800.0, 800.0, authority.balance(), 42)?;
    let mut now = 0.0;
    let frame = |game: &mut PlinkoGame, now: &mut f64| {
        *now += FRAME_DT as f64 * 1000.0;
        game.advance(FRAME_DT, *now);
    };

    for _ in 0..3 {
        game.drop_with(&mut authority, 500, now)?;
        while game.is_busy() {
            frame(&mut game, &mut now);
        }
        now += DROP_DEBOUNCE_MS;
    }

    game.start_autobet(AutobetConfig {
        base_bet: 200,
        count: Some(10),
        on_loss: Strategy::Multiply(1.5),
        stop_loss: Some(5_000),
        ..Default::default()
    })?;
    while game.autobet().is_active() || game.is_busy() {
        if let Some(result) = game.poll_autobet(now) {
            match result {
                Ok(request) => {
                    let response = authority.request_round(&request);
                    if let Err(e) = game.complete_drop(request.request_id, response, now) {
                        log::warn!("Autobet round failed: {}", e);
                    }
                }
                Err(e) => log::warn!("Autobet could not start a round: {}", e),
            }
        }
        frame(&mut game, &mut now);
    }
    if let Some(reason) = game.autobet().stop_reason() {
        println!("Autobet: {}", reason.message());
    }

    let history = game.history();
    for entry in history.entries.iter().rev() {
        let verified = (1..=authority.nonce()).any(|nonce| {
            verify_receipt(SERVER_SEED, CLIENT_SEED, nonce, rows, &entry.receipt)
                == Some(entry.target_bucket)
        });
        println!(
            "Round {:>3}: bet {:>7} -> {:>5}x paid {:>8} (bucket {}, {}) receipt {} {}",
            entry.request_id,
            format_cents(entry.bet),
            entry.multiplier,
            format_cents(entry.payout),
            entry.visual_bucket,
            entry.via.as_str(),
            entry.receipt.display(),
            if verified { "verified" } else { "UNVERIFIED" }
        );
    }
    println!(
        "{} rounds, wagered {}, paid {}, net {}",
        history.rounds,
        format_cents(history.wagered),
        format_cents(history.paid_out),
        format_cents(history.net())
    );
    println!(
        "Balance {} (authority {}), server seed revealed: {}",
        format_cents(game.balance()),
        format_cents(authority.balance()),
        authority.reveal_server_seed()
    );
    Ok(())
}
