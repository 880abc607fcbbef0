// Business logic shared by handlers and background jobs

pub mod advice;
pub mod analytics;
pub mod fundings;
pub mod ledger;
pub mod payments;
pub mod push;
pub mod subscriptions;

pub use advice::Advisor;
pub use payments::PaymentGateway;
pub use push::PushClient;

#[cfg(test)]
pub(crate) mod test_support {
    use tokio::net::TcpListener;

    /// URL of a server that accepts connections and never answers
    pub async fn silent_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}/send", addr)
    }

    /// URL of a server that answers every request with `body`
    pub async fn json_endpoint(body: serde_json::Value) -> String {
        let app = axum::Router::new().fallback(move || async move { axum::Json(body) });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/send", addr)
    }
}
