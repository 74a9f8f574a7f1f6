mod error;
mod memory;

pub use error::{Error, Result};
pub use memory::MemoryStore;

use std::{env, future::IntoFuture};

use axum::Router;
use tokio::{
	net::TcpListener,
	sync::oneshot::{self, Sender},
};

pub fn env_redis_url() -> Option<String> {
	env::var("ARMORY_REDIS_URL").ok()
}

/// A mock upstream served on a loopback port until dropped.
pub struct Upstream {
	base_url: String,
	shutdown: Option<Sender<()>>,
}
impl Upstream {
	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	pub fn url(&self, path: &str) -> String {
		format!("{}{path}", self.base_url)
	}
}
impl Drop for Upstream {
	fn drop(&mut self) {
		if let Some(tx) = self.shutdown.take() {
			let _ = tx.send(());
		}
	}
}

pub async fn spawn_upstream(app: Router) -> Result<Upstream> {
	let listener = TcpListener::bind("127.0.0.1:0").await?;
	let addr = listener.local_addr()?;
	let (tx, rx) = oneshot::channel();
	let server = axum::serve(listener, app).with_graceful_shutdown(async move {
		let _ = rx.await;
	});

	tokio::spawn(async move {
		if let Err(err) = server.into_future().await {
			eprintln!("Mock upstream stopped with an error: {err}.");
		}
	});

	Ok(Upstream { base_url: format!("http://{addr}"), shutdown: Some(tx) })
}
