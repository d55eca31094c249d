#[tokio::main]
async fn main() {
    if let Err(e) = combat_replay::run().await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
