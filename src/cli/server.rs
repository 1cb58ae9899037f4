use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use prometheus::{BasicAuthentication, labels};
use tokio::net::TcpListener;
use tokio::task::spawn_blocking;
use tokio::time::{Duration, sleep};

use crate::cli::SubCommandExtend;
use crate::config::{EmbedOptions, Opts, SearchOptions};
use crate::embed::ClipHttpEmbedder;
use crate::server;
use crate::store::{QdrantStore, VectorStore};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
    /// Prometheus push gateway URL
    #[arg(long, value_name = "URL")]
    pub prometheus_push: Option<String>,
    /// Instance label value for pushed metrics
    #[arg(long, value_name = "NAME")]
    pub prometheus_instance: Option<String>,
    /// Push gateway credentials, `username:password`
    #[arg(long, value_name = "AUTH")]
    pub prometheus_auth: Option<String>,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let store = Arc::new(QdrantStore::new(&opts.store)?);
        store.ensure_collection().await?;

        let embedder = Arc::new(ClipHttpEmbedder::new(&self.embed)?);
        let state = server::AppState::new(
            store,
            embedder,
            self.search.clone(),
            opts.store.collection.clone(),
        );
        let app = server::create_app(state);

        if let Some(url) = self.prometheus_push.clone() {
            let instance = self.prometheus_instance.clone().unwrap_or_else(|| self.addr.clone());
            let auth = self.prometheus_auth.clone().and_then(|s| {
                let (username, password) = s.split_once(':')?;
                Some((username.to_string(), password.to_string()))
            });
            tokio::spawn(async move {
                loop {
                    let metric_families = prometheus::gather();
                    let url = url.clone();
                    let instance = instance.clone();
                    let auth = auth.clone();
                    let push = spawn_blocking(move || {
                        prometheus::push_metrics(
                            "framesearch",
                            labels! {
                                "instance".to_string() => instance.clone(),
                            },
                            &url,
                            metric_families,
                            auth.map(|(username, password)| BasicAuthentication {
                                username,
                                password,
                            }),
                        )
                    })
                    .await;
                    match push {
                        Ok(Err(e)) => error!("pushing metrics failed: {e}"),
                        Err(e) => error!("metrics push task failed: {e}"),
                        Ok(Ok(())) => {}
                    }
                    sleep(Duration::from_secs(30)).await;
                }
            });
        }

        info!("server listening on http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
