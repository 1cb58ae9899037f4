mod ingest;
mod search;
mod server;
mod validate;

pub use ingest::*;
pub use search::*;
pub use server::*;
pub use validate::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
