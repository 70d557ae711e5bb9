//! A stand-in for the prove server's `/api/prove` endpoint

use std::{sync::Arc, time::Duration};

use actix_web::{
    dev::ServerHandle,
    http::StatusCode,
    web::{self, Data, Json},
    App, HttpResponse, HttpServer,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use zk_primitives::PublicInputs;

use client::{CircuitInputs, PoseidonCircuit, Prover};

use crate::{
    port_pool::{Port, PortPool},
    LocalProver,
};

#[derive(Debug, Clone)]
enum Answer {
    Fixed { status: StatusCode, body: Value },
    /// Prove the request with [`LocalProver`]
    Prove,
}

#[derive(Debug, Clone)]
struct Reply {
    answer: Answer,
    delay: Duration,
}

#[derive(Debug)]
struct State {
    reply: Mutex<Reply>,
    requests: Mutex<Vec<Value>>,
}

/// Records every prove request and answers with a scripted reply
///
/// The server is stopped when dropped, so it must be dropped inside a tokio runtime.
pub struct MockProveServer {
    port: Port,
    handle: ServerHandle,
    state: Arc<State>,
}

impl MockProveServer {
    /// Bind on a leased local port and start serving
    ///
    /// Replies `500 {"error": "no reply configured"}` until told otherwise.
    pub fn start() -> std::io::Result<Self> {
        let port = PortPool::lease();
        let state = Arc::new(State {
            reply: Mutex::new(Reply {
                answer: Answer::Fixed {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: json!({ "error": "no reply configured" }),
                },
                delay: Duration::ZERO,
            }),
            requests: Mutex::new(Vec::new()),
        });

        let data = Data::from(Arc::clone(&state));
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .route("/api/prove", web::post().to(prove))
        })
        .workers(1)
        .bind(("127.0.0.1", port.number()))?
        .run();

        let handle = server.handle();
        tokio::spawn(server);

        Ok(Self {
            port,
            handle,
            state,
        })
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port.number())
    }

    pub fn respond_with(&self, status: u16, body: Value) {
        self.state.reply.lock().answer = Answer::Fixed {
            status: StatusCode::from_u16(status).expect("valid status code"),
            body,
        };
    }

    /// Answer with a proof in the server's success shape
    pub fn respond_with_proof(&self, proof: &[u8], public_inputs: &PublicInputs) {
        self.respond_with(200, proof_body(proof, public_inputs));
    }

    /// Answer every request the way a real prove server would, checking it with [`LocalProver`]
    pub fn prove_requests(&self) {
        self.state.reply.lock().answer = Answer::Prove;
    }

    /// Hold every reply for `delay`
    pub fn delay(&self, delay: Duration) {
        self.state.reply.lock().delay = delay;
    }

    /// Request bodies received so far
    #[must_use]
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().clone()
    }
}

impl Drop for MockProveServer {
    fn drop(&mut self) {
        let handle = self.handle.clone();
        tokio::spawn(async move { handle.stop(false).await });
    }
}

async fn prove(state: Data<State>, body: Json<Value>) -> HttpResponse {
    let request = body.into_inner();
    state.requests.lock().push(request.clone());

    let reply = state.reply.lock().clone();
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    match reply.answer {
        Answer::Fixed { status, body } => HttpResponse::build(status).json(body),
        Answer::Prove => match local_proof(request).await {
            Ok(body) => HttpResponse::Ok().json(body),
            Err(error) => HttpResponse::InternalServerError().json(json!({ "error": error })),
        },
    }
}

async fn local_proof(request: Value) -> Result<Value, String> {
    let inputs: CircuitInputs = serde_json::from_value(request).map_err(|err| err.to_string())?;

    LocalProver::<PoseidonCircuit>::default()
        .prove(&inputs)
        .await
        .map(|proof| proof_body(&proof.bytes, &proof.public_inputs))
        .map_err(|err| err.to_string())
}

fn proof_body(proof: &[u8], public_inputs: &PublicInputs) -> Value {
    let words: Vec<String> = public_inputs
        .to_array()
        .iter()
        .map(|word| word.to_hex())
        .collect();

    json!({
        "proof": format!("0x{}", hex::encode(proof)),
        "publicInputs": words,
    })
}
