//! Log2Mongo 演示程序
//!
//! 连接串通过 LOG2MONGO_URI 环境变量或第一个命令行参数传入：
//!
//! ```text
//! cargo run --example log2mongo_demo -- mongodb://localhost/database.collection
//! ```

use log2mongo::env_config::{self, LOG2MONGO_URI_ENV};
use tracing::{debug, error, info, warn};

const DEMO_URI: &str = "mongodb://localhost/database.collection?collection_append=false";
const DEMO_RUN: &str = "cargo run --example log2mongo_demo --";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mongo_uri = env_config::resolve_uri(&args);

    if !mongo_uri.starts_with("mongodb://") && !mongo_uri.starts_with("mongodb+srv://") {
        // 输入无效时只打印用法并干净返回，不构造任何文档
        eprintln!("ERROR: Bad property {}: {}", LOG2MONGO_URI_ENV, mongo_uri);
        eprintln!();
        eprintln!("USAGE: {} <{}>", DEMO_RUN, LOG2MONGO_URI_ENV);
        eprintln!("eg. {} {}", DEMO_RUN, DEMO_URI);
        eprintln!();
        return Ok(());
    }

    log2mongo::init(&mongo_uri).await?;

    debug!("Print property: {} = {}", LOG2MONGO_URI_ENV, mongo_uri);

    info!("Demo message from Log2Mongo 1.");
    warn!("Demo message from Log2Mongo 2.");
    error!("Demo message from Log2Mongo 3.");

    log2mongo::shutdown().await?;
    println!();
    println!(" === end === ");
    Ok(())
}
