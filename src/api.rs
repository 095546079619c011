use crate::services::{
    dispatcher::{DispatchRequest, DispatchResponse},
    lifecycle::{PendingRequest, RequestTransport},
};
use actix_server::ServerHandle;
use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer,
    http::header::ContentType,
    web::{self, Data},
};
use anyhow::{Context, Result};
use log::{debug, info};
use tokio::sync::{mpsc, oneshot};

type Arguments = Vec<(String, String)>;

/// Sending side of the dispatcher queue, shared by all server workers.
#[derive(Clone)]
pub struct RequestQueue(mpsc::Sender<PendingRequest>);

impl RequestQueue {
    pub fn new(sender: mpsc::Sender<PendingRequest>) -> Self {
        Self(sender)
    }

    /// Queue a request and wait for its reply. `None` if the dispatcher
    /// stopped before answering.
    pub async fn submit(&self, request: DispatchRequest) -> Option<DispatchResponse> {
        let (reply, receiver) = oneshot::channel();

        self.0.send(PendingRequest { request, reply }).await.ok()?;

        receiver.await.ok()
    }
}

pub struct Api;

impl Api {
    /// Catch-all handler: every route is decided by the dispatcher.
    pub async fn forward(
        req: HttpRequest,
        form: Option<web::Form<Arguments>>,
        queue: Data<RequestQueue>,
    ) -> HttpResponse {
        debug!("forward() called: {} {}", req.method(), req.path());

        let mut args = web::Query::<Arguments>::from_query(req.query_string())
            .map(web::Query::into_inner)
            .unwrap_or_else(|e| {
                debug!("ignoring malformed query: {e}");
                Vec::new()
            });
        if let Some(form) = form {
            args.extend(form.into_inner());
        }

        let request = DispatchRequest {
            method: req.method().clone(),
            path: req.path().to_string(),
            args,
        };

        match queue.submit(request).await {
            Some(response) => HttpResponse::build(response.status)
                .content_type(ContentType::plaintext())
                .body(response.body),
            None => HttpResponse::ServiceUnavailable()
                .content_type(ContentType::plaintext())
                .body("service unavailable"),
        }
    }
}

/// HTTP front of the dispatcher. The server only runs while bound.
pub struct HttpTransport {
    port: u16,
    queue_depth: usize,
    server: Option<ServerHandle>,
}

impl HttpTransport {
    pub fn new(port: u16, queue_depth: usize) -> Self {
        Self {
            port,
            queue_depth,
            server: None,
        }
    }
}

impl RequestTransport for HttpTransport {
    async fn bind(&mut self) -> Result<mpsc::Receiver<PendingRequest>> {
        self.unbind().await;

        let (sender, receiver) = mpsc::channel(self.queue_depth);
        let queue = Data::new(RequestQueue::new(sender));

        let server = HttpServer::new(move || {
            App::new()
                .app_data(queue.clone())
                .default_service(web::route().to(Api::forward))
        })
        .workers(1)
        .bind(("0.0.0.0", self.port))
        .context("failed to bind server")?
        .disable_signals()
        .run();

        self.server = Some(server.handle());
        tokio::spawn(server);

        info!("listening on port {}", self.port);

        Ok(receiver)
    }

    async fn unbind(&mut self) {
        if let Some(server) = self.server.take() {
            server.stop(true).await;
            debug!("server stopped");
        }
    }
}
