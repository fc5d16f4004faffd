use crate::{
    summary::SummaryPayload,
    summary_client::SUMMARY_PATH,
};
use actix_web::{
    App,
    HttpResponse,
    HttpServer,
    dev::ServerHandle,
    http::StatusCode,
    web,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    net::TcpListener,
    sync::{
        Arc,
        Mutex,
        atomic::{
            AtomicUsize,
            Ordering,
        },
        mpsc,
    },
    thread::JoinHandle,
};

/// What the fake server answers on `GET /api/summary`.
#[derive(Clone, Debug)]
pub enum FakeResponse {
    Payload(SummaryPayload),
    Status(u16, String),
    RawJson(String),
}

#[derive(Clone)]
struct SharedState {
    response: Arc<Mutex<FakeResponse>>,
    hits: Arc<AtomicUsize>,
}

/// In-process summary server on an ephemeral localhost port.
pub struct FakeSummaryServer {
    base_url: String,
    state: SharedState,
    server_handle: ServerHandle,
    server_thread: Option<JoinHandle<std::io::Result<()>>>,
}

impl FakeSummaryServer {
    pub fn start(initial: FakeResponse) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .wrap_err("failed to bind HTTP listener for fake summary server")?;
        let address = listener
            .local_addr()
            .wrap_err("failed to read listener address")?;
        let base_url = format!("http://{address}");

        let state = SharedState {
            response: Arc::new(Mutex::new(initial)),
            hits: Arc::new(AtomicUsize::new(0)),
        };

        let server_state = state.clone();
        let (handle_tx, handle_rx) = mpsc::channel();
        let server_thread = std::thread::spawn(move || {
            let sys = actix_web::rt::System::new();
            sys.block_on(async move {
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(web::Data::new(server_state.clone()))
                        .route(SUMMARY_PATH, web::get().to(handle_summary))
                })
                .workers(1)
                .shutdown_timeout(1)
                .listen(listener)?
                .run();
                let _ = handle_tx.send(server.handle());
                server.await
            })
        });

        let server_handle = handle_rx
            .recv()
            .map_err(|_| eyre!("fake summary server failed to start"))?;
        tracing::info!("fake summary server listening on {}", base_url);

        Ok(Self {
            base_url,
            state,
            server_handle,
            server_thread: Some(server_thread),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_response(&self, response: FakeResponse) {
        let mut guard = self
            .state
            .response
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = response;
    }

    /// Number of summary requests served so far.
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

impl Drop for FakeSummaryServer {
    fn drop(&mut self) {
        let _ = self.server_handle.stop(false);
        if let Some(thread) = self.server_thread.take() {
            let _ = thread.join();
        }
    }
}

async fn handle_summary(state: web::Data<SharedState>) -> HttpResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let response = state
        .response
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    match response {
        FakeResponse::Payload(payload) => HttpResponse::Ok().json(payload),
        FakeResponse::Status(code, body) => {
            let status =
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            HttpResponse::build(status).body(body)
        }
        FakeResponse::RawJson(body) => HttpResponse::Ok()
            .content_type("application/json")
            .body(body),
    }
}
