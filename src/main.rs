//! registry-sync: copy images between Docker Registry V2 registries

use registry_sync::cli::{Args, Runner};
use std::process;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();
    let runner = Runner::new(args);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    if let Err(e) = runner.run(&cancel).await {
        runner.output().error(&format!("{}", e));
        process::exit(1);
    }
}
