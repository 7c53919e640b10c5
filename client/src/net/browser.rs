//! Browser driver: gloo-net websocket, gloo-timers and Leptos signals.
//!
//! The coordination core never touches the socket or the clock. This module
//! supplies both inside the page: it opens a websocket whenever the session
//! asks for one, feeds inbound units back with `Date.now()` timestamps, pumps
//! timers with `gloo_timers` sleeps and publishes a read-only view through
//! `RwSignal`s for the page to render.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures are reported to the session as a close; the session
//! decides when to reconnect. Nothing here propagates errors to the page.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::mpsc;
use leptos::prelude::{RwSignal, Set};

use crate::config::SessionConfig;
use crate::net::connection::{ConnectionState, endpoint_url};
use crate::session::{Effect, Session};
use crate::state::snapshot::SessionSnapshot;
use crate::state::ui::{ControlStates, UiAffordances};

/// Longest the timer pump sleeps, so a timer armed mid-sleep is not missed by
/// more than one capture tick.
const MAX_PUMP_SLEEP_MS: u64 = 100;

/// Poll period while the browser completes the websocket handshake.
const OPEN_POLL_MS: u64 = 20;

/// Everything the page renders, refreshed after every session event.
#[derive(Clone, Debug)]
pub struct SessionView {
    pub snapshot: SessionSnapshot,
    pub ui: UiAffordances,
    pub controls: ControlStates,
    pub connection: ConnectionState,
}

impl SessionView {
    fn of(session: &Session) -> Self {
        Self {
            snapshot: session.snapshot().clone(),
            ui: session.ui().clone(),
            controls: session.controls(),
            connection: session.connection_state(),
        }
    }
}

/// Shared handle to the running session. Cheap to clone into event handlers.
#[derive(Clone)]
pub struct BrowserSession {
    session: Rc<RefCell<Session>>,
    outbound: Rc<RefCell<Option<mpsc::UnboundedSender<String>>>>,
    url: Rc<str>,
    pub view: RwSignal<SessionView>,
    /// Most recent video frame (JPEG bytes).
    pub frame: RwSignal<Option<Vec<u8>>>,
}

impl BrowserSession {
    /// Run an operator action (or any session call) at the current time and
    /// apply whatever it produced.
    pub fn act<T>(&self, action: impl FnOnce(&mut Session, u64) -> T) -> T {
        let out = {
            let mut session = self.session.borrow_mut();
            action(&mut session, now_ms())
        };
        self.flush();
        out
    }

    fn flush(&self) {
        let (effects, view) = {
            let mut session = self.session.borrow_mut();
            (session.drain_effects(), SessionView::of(&session))
        };
        for effect in effects {
            match effect {
                Effect::Connect { attempt } => {
                    leptos::logging::log!("ws connect attempt {attempt}: {}", self.url);
                    leptos::task::spawn_local(connect_and_run(self.clone()));
                }
                Effect::Send(command) => self.transmit(messages::encode_command(&command)),
                Effect::DisplayFrame(bytes) => self.frame.set(Some(bytes)),
                Effect::Notify(notice) => leptos::logging::log!("[{:?}] {}", notice.severity, notice.text),
            }
        }
        self.view.set(view);
    }

    fn transmit(&self, text: String) {
        let outbound = self.outbound.borrow();
        let Some(tx) = outbound.as_ref() else {
            leptos::logging::warn!("ws send dropped: no transport");
            return;
        };
        if let Err(err) = tx.unbounded_send(text) {
            leptos::logging::warn!("ws send dropped: {err}");
        }
    }
}

/// Start the session against the endpoint derived from the page URL.
pub fn spawn_session(config: SessionConfig) -> BrowserSession {
    let page_url = web_sys::window()
        .map(|window| window.location().href().unwrap_or_default())
        .unwrap_or_default();
    let session = Session::new(config);
    let handle = BrowserSession {
        view: RwSignal::new(SessionView::of(&session)),
        frame: RwSignal::new(None),
        session: Rc::new(RefCell::new(session)),
        outbound: Rc::new(RefCell::new(None)),
        url: Rc::from(endpoint_url(&page_url)),
    };

    handle.act(|session, now| session.start(now));
    leptos::task::spawn_local(pump_timers(handle.clone()));
    handle
}

/// Sleep until the next timer deadline and advance the session.
async fn pump_timers(handle: BrowserSession) {
    loop {
        let now = now_ms();
        let next = handle.session.borrow().next_deadline();
        let wait = next.map_or(MAX_PUMP_SLEEP_MS, |deadline| deadline.saturating_sub(now).min(MAX_PUMP_SLEEP_MS));
        gloo_timers::future::sleep(std::time::Duration::from_millis(wait)).await;
        handle.act(Session::advance);
    }
}

/// Open the websocket, run send/receive until either side ends, then report
/// the close.
async fn connect_and_run(handle: BrowserSession) {
    use futures::{SinkExt, StreamExt};
    use gloo_net::websocket::futures::WebSocket;
    use gloo_net::websocket::{Message, State};

    let ws = match WebSocket::open(&handle.url) {
        Ok(ws) => ws,
        Err(err) => {
            leptos::logging::warn!("ws open failed: {err}");
            handle.act(Session::on_close);
            return;
        }
    };
    // `open` returns while the socket is still CONNECTING.
    loop {
        match ws.state() {
            State::Open => break,
            State::Connecting => gloo_timers::future::sleep(std::time::Duration::from_millis(OPEN_POLL_MS)).await,
            State::Closing | State::Closed => {
                leptos::logging::warn!("ws handshake failed: {}", handle.url);
                handle.act(Session::on_close);
                return;
            }
        }
    }

    let (mut ws_write, mut ws_read) = ws.split();
    let (tx, mut rx) = mpsc::unbounded::<String>();
    *handle.outbound.borrow_mut() = Some(tx);
    handle.act(Session::on_open);

    let send_task = async {
        while let Some(text) = rx.next().await {
            if let Err(err) = ws_write.send(Message::Text(text)).await {
                leptos::logging::warn!("ws send error: {err}");
                break;
            }
        }
    };

    let recv_task = async {
        while let Some(msg) = ws_read.next().await {
            match msg {
                Ok(Message::Text(text)) => handle.act(|session, now| session.on_text(now, &text)),
                Ok(Message::Bytes(bytes)) => handle.act(|session, now| session.on_binary(now, bytes)),
                Err(err) => {
                    leptos::logging::warn!("ws recv error: {err}");
                    break;
                }
            }
        }
    };

    futures::future::select(Box::pin(send_task), Box::pin(recv_task)).await;

    *handle.outbound.borrow_mut() = None;
    handle.act(Session::on_close);
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}
